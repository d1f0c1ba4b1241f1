//! The UN-system job sites we crawl, one selector profile each.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CrawlerSettings;
use crate::crawler::harness::Crawler;
use crate::crawler::{CrawlError, CrawlerRegistry};
use crate::extractors::fetch::HttpFetcher;
use crate::extractors::html::{CellLayout, DetailProfile, Field, HtmlExtractor, IdSource, SiteProfile};
use crate::extractors::CrawlLimits;
use crate::storage::JobStore;

/// Markup used by several agency sites that share a vacancy-portal vendor.
const COMMON_LOCATION: &str = r#"[class*="location"], [class*="place"], [class*="city"], [class*="duty"]"#;
const COMMON_DEADLINE: &str = r#"[class*="deadline"], [class*="closing"]"#;
const COMMON_GRADE: &str = r#"[class*="grade"], [class*="level"]"#;
const COMMON_TITLE: &str = "h1, h2, h3, h4, a";

const GENERIC_DETAIL: DetailProfile = DetailProfile {
    title: "h1",
    content: &[
        ".job-description",
        ".vacancy-description",
        "#job-details",
        ".job-details",
        ".content",
        "main",
    ],
    metadata: None,
    apply_link: None,
};

pub static UN_CAREERS: SiteProfile = SiteProfile {
    organization: "UN",
    id_prefix: "UN-",
    base_url: "https://careers.un.org",
    listing_url: "https://careers.un.org/jobopening?language=en",
    page_param: None,
    items: &[".view-content tr", ".vacancy-list-item", ".job-item", "tbody tr"],
    title: Some("a"),
    link: r#"a[href*="jobopening"], a[href*="/lbw/"]"#,
    location: None,
    deadline: None,
    posted: None,
    grade: None,
    organization_name: None,
    description: None,
    cells: CellLayout::Heuristic,
    title_has_city: false,
    ids: &[IdSource::LinkPattern(r"jobopening/(\d+)"), IdSource::LastPathSegment],
    detail: Some(DetailProfile {
        title: "h1.page-title, h1, .job-title",
        content: &[".view-content, .job-content, .vacancy-content"],
        metadata: Some(
            ".job-details div, .job-details span, .job-details p, .job-details tr, \
             .vacancy-details tr, .vacancy-details div, .field-group-div div",
        ),
        apply_link: None,
    }),
};

pub static UNCAREER: SiteProfile = SiteProfile {
    organization: "UNCAREER",
    id_prefix: "UNCAREER-",
    base_url: "https://uncareer.net",
    listing_url: "https://uncareer.net/tag/internship",
    page_param: Some("page"),
    items: &["div.vacancy"],
    title: None,
    link: "a",
    location: None,
    deadline: Some("p:nth-of-type(3)"),
    posted: Some("p:nth-of-type(2)"),
    grade: None,
    organization_name: Some("p:nth-of-type(1) a"),
    description: None,
    cells: CellLayout::None,
    title_has_city: true,
    ids: &[IdSource::LastPathSegment],
    detail: Some(DetailProfile {
        title: "h1",
        content: &["div.col-md-9"],
        metadata: Some("ul.list-group li"),
        apply_link: Some(r#".btn.btn-success[target="_blank"]"#),
    }),
};

pub static WHO: SiteProfile = SiteProfile {
    organization: "WHO",
    id_prefix: "WHO-",
    base_url: "https://www.who.int",
    listing_url: "https://www.who.int/careers",
    page_param: None,
    items: &[
        ".job-listing",
        ".vacancy-item",
        ".career-item",
        ".job-card",
        "[data-job-id]",
        r#"a[href*="/careers/"], a[href*="/jobs/"], a[href*="/vacancies/"]"#,
    ],
    title: Some(COMMON_TITLE),
    link: "a",
    location: Some(r#"[class*="location"], [class*="place"], [class*="city"]"#),
    deadline: Some(COMMON_DEADLINE),
    posted: None,
    grade: Some(COMMON_GRADE),
    organization_name: None,
    description: None,
    cells: CellLayout::None,
    title_has_city: false,
    ids: &[IdSource::Attribute {
        within: None,
        name: "data-job-id",
    }],
    detail: None,
};

pub static FAO: SiteProfile = SiteProfile {
    organization: "FAO",
    id_prefix: "FAO-",
    base_url: "https://www.fao.org",
    listing_url: "https://www.fao.org/employment/vacancies",
    page_param: None,
    items: &[
        ".vacancy-item",
        ".job-listing",
        ".career-item",
        ".job-card",
        "tr[data-job-id]",
        ".vacancy-row",
        r#"a[href*="/employment/"], a[href*="/vacancies/"], a[href*="/jobs/"]"#,
    ],
    title: Some(COMMON_TITLE),
    link: "a",
    location: Some(COMMON_LOCATION),
    deadline: Some(COMMON_DEADLINE),
    posted: None,
    grade: Some(COMMON_GRADE),
    organization_name: None,
    description: None,
    cells: CellLayout::None,
    title_has_city: false,
    ids: &[],
    detail: Some(GENERIC_DETAIL),
};

pub static UNOPS: SiteProfile = SiteProfile {
    organization: "UNOPS",
    id_prefix: "UNOPS-",
    base_url: "https://jobs.unops.org",
    listing_url: "https://jobs.unops.org/Pages/JobSearch.aspx",
    page_param: None,
    items: &[
        ".job-item",
        ".vacancy-item",
        ".job-listing",
        ".career-item",
        "tr[data-job-id]",
        ".job-row",
        r#"a[href*="/Pages/JobDetails"], a[href*="/job/"]"#,
    ],
    title: Some(COMMON_TITLE),
    link: "a",
    location: Some(r#"[class*="location"], [class*="place"], [class*="city"]"#),
    deadline: Some(COMMON_DEADLINE),
    posted: None,
    grade: Some(COMMON_GRADE),
    organization_name: None,
    description: None,
    cells: CellLayout::None,
    title_has_city: false,
    ids: &[],
    detail: None,
};

pub static ILO: SiteProfile = SiteProfile {
    organization: "ILO",
    id_prefix: "ILO-",
    base_url: "https://jobs.ilo.org",
    listing_url: "https://jobs.ilo.org/vacancies",
    page_param: Some("page"),
    items: &[
        r#"div[class*="job"], article[class*="job"], tr[class*="job"], div[class*="vacancy"], article[class*="vacancy"], tr[class*="vacancy"]"#,
        r#"a[href*="/vacancies/"], a[href*="/jobs/"]"#,
    ],
    title: Some("h2, h3, h4, strong, b"),
    link: "a[href]",
    location: Some(COMMON_LOCATION),
    deadline: Some(COMMON_DEADLINE),
    posted: None,
    grade: None,
    organization_name: None,
    description: None,
    cells: CellLayout::None,
    title_has_city: false,
    ids: &[IdSource::LastPathSegment],
    detail: Some(DetailProfile {
        title: "h1",
        content: &["div.job-description", "#job-details"],
        metadata: None,
        apply_link: None,
    }),
};

pub static UNDP: SiteProfile = SiteProfile {
    organization: "UNDP",
    id_prefix: "UNDP-",
    base_url: "https://jobs.undp.org",
    listing_url: "https://jobs.undp.org/cj_view_jobs.cfm",
    page_param: None,
    items: &["tr.job-row"],
    title: None,
    link: "td a",
    location: None,
    deadline: None,
    posted: None,
    grade: None,
    organization_name: None,
    description: None,
    cells: CellLayout::Positional(&[Field::Title, Field::Description, Field::Location, Field::Grade]),
    title_has_city: false,
    ids: &[IdSource::Attribute {
        within: Some("td[data-id]"),
        name: "data-id",
    }],
    detail: None,
};

pub static UNICEF: SiteProfile = SiteProfile {
    organization: "UNICEF",
    id_prefix: "UNICEF-",
    base_url: "https://www.unicef.org",
    listing_url: "https://www.unicef.org/careers/search-jobs",
    page_param: None,
    items: &[".job-card"],
    title: Some(".job-title"),
    link: "a",
    location: Some(".job-location"),
    deadline: None,
    posted: None,
    grade: None,
    organization_name: None,
    description: Some(".job-description"),
    cells: CellLayout::None,
    title_has_city: false,
    ids: &[IdSource::Attribute {
        within: None,
        name: "data-job-id",
    }],
    detail: None,
};

pub static ALL_SITES: [&SiteProfile; 8] = [
    &UN_CAREERS,
    &UNCAREER,
    &WHO,
    &FAO,
    &UNOPS,
    &ILO,
    &UNDP,
    &UNICEF,
];

/// One crawler per site, each with its own paced HTTP fetcher, all saving into `store`.
pub fn build_registry(
    settings: &CrawlerSettings,
    store: Arc<dyn JobStore>,
) -> Result<CrawlerRegistry, CrawlError> {
    let limits = CrawlLimits {
        max_jobs: settings.max_jobs_per_site,
        max_pages: settings.max_pages,
    };

    let mut registry = CrawlerRegistry::new();
    for profile in ALL_SITES {
        let fetcher = HttpFetcher::new(
            Duration::from_secs(settings.http_timeout_secs),
            Duration::from_millis(settings.request_delay_ms),
        )?;
        let extractor = HtmlExtractor::new(profile, Arc::new(fetcher), limits)?;
        registry.register(Crawler::from_settings(Arc::new(extractor), store.clone(), settings));
    }
    Ok(registry)
}
