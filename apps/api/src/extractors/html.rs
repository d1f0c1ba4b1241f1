//! Selector-driven HTML extractor shared by every site.
//!
//! A [`SiteProfile`] names where things live on a site's listing and detail pages;
//! [`HtmlExtractor`] does the fetching, parsing and inference. `scraper::Html` is not
//! `Send`, so documents are only ever parsed inside synchronous helpers and never held
//! across an await.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::crawler::CrawlError;
use crate::extractors::fetch::PageSource;
use crate::extractors::{CrawlLimits, ListingElement, SiteExtractor};
use crate::heuristics::{
    absolutize_url, clean_text, detect_remote, extract_contract_type, extract_duty_station,
    extract_experience_years, extract_grade, find_date, find_deadline, infer_education_level,
    infer_language_requirements, last_path_segment, parse_date, stable_job_id,
};
use crate::models::job::JobDraft;

/// Paragraphs shorter than this are treated as labels, not description.
const MIN_PARAGRAPH_CHARS: usize = 20;

// ────────────────────────────────────────────────────────────────────────────
// Profiles
// ────────────────────────────────────────────────────────────────────────────

/// Meaning of one table cell in a positional row layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Location,
    Grade,
    Deadline,
    Posted,
    Organization,
    Skip,
}

/// How `<td>` cells of a listing row are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLayout {
    /// Cells are ignored.
    None,
    /// Each cell is classified by its content: organization code, grade, date, location.
    Heuristic,
    /// Cells map to fields by position.
    Positional(&'static [Field]),
}

/// Where a site-assigned job id comes from. Sources are tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// An attribute on the listing element, or on the first match of `within`.
    Attribute {
        within: Option<&'static str>,
        name: &'static str,
    },
    /// Capture group 1 of a pattern applied to the job link.
    LinkPattern(&'static str),
    /// Last path segment of the job link.
    LastPathSegment,
}

/// Where fields live on a job's own page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailProfile {
    pub title: &'static str,
    /// Tried in order; the first match is the content area.
    pub content: &'static [&'static str],
    /// Elements holding `Label: value` pairs.
    pub metadata: Option<&'static str>,
    pub apply_link: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteProfile {
    pub organization: &'static str,
    /// Prepended to every job id, e.g. `UN-`.
    pub id_prefix: &'static str,
    pub base_url: &'static str,
    pub listing_url: &'static str,
    /// Query parameter carrying the page number. `None` means a single listing page.
    pub page_param: Option<&'static str>,
    /// Tried in order; the first selector with matches wins.
    pub items: &'static [&'static str],
    pub title: Option<&'static str>,
    pub link: &'static str,
    pub location: Option<&'static str>,
    pub deadline: Option<&'static str>,
    pub posted: Option<&'static str>,
    pub grade: Option<&'static str>,
    pub organization_name: Option<&'static str>,
    pub description: Option<&'static str>,
    pub cells: CellLayout,
    /// Listing titles read `Title, City`.
    pub title_has_city: bool,
    pub ids: &'static [IdSource],
    pub detail: Option<DetailProfile>,
}

// ────────────────────────────────────────────────────────────────────────────
// Compiled selectors
// ────────────────────────────────────────────────────────────────────────────

fn selector(raw: &str) -> Result<Selector, CrawlError> {
    Selector::parse(raw).map_err(|_| CrawlError::Selector(raw.to_string()))
}

fn optional_selector(raw: Option<&str>) -> Result<Option<Selector>, CrawlError> {
    raw.map(selector).transpose()
}

enum CompiledId {
    Attribute {
        within: Option<Selector>,
        name: &'static str,
    },
    LinkPattern(Regex),
    LastPathSegment,
}

struct CompiledDetail {
    title: Selector,
    content: Vec<Selector>,
    metadata: Option<Selector>,
    apply_link: Option<Selector>,
}

struct Compiled {
    items: Vec<Selector>,
    title: Option<Selector>,
    link: Selector,
    location: Option<Selector>,
    deadline: Option<Selector>,
    posted: Option<Selector>,
    grade: Option<Selector>,
    organization_name: Option<Selector>,
    description: Option<Selector>,
    cell: Selector,
    ids: Vec<CompiledId>,
    detail: Option<CompiledDetail>,
}

impl Compiled {
    fn new(profile: &SiteProfile) -> Result<Self, CrawlError> {
        let ids = profile
            .ids
            .iter()
            .map(|source| {
                Ok(match *source {
                    IdSource::Attribute { within, name } => CompiledId::Attribute {
                        within: optional_selector(within)?,
                        name,
                    },
                    IdSource::LinkPattern(pattern) => CompiledId::LinkPattern(
                        Regex::new(pattern).map_err(|_| CrawlError::Selector(pattern.to_string()))?,
                    ),
                    IdSource::LastPathSegment => CompiledId::LastPathSegment,
                })
            })
            .collect::<Result<Vec<_>, CrawlError>>()?;

        let detail = profile
            .detail
            .map(|d| -> Result<CompiledDetail, CrawlError> {
                Ok(CompiledDetail {
                    title: selector(d.title)?,
                    content: d.content.iter().map(|s| selector(s)).collect::<Result<_, _>>()?,
                    metadata: optional_selector(d.metadata)?,
                    apply_link: optional_selector(d.apply_link)?,
                })
            })
            .transpose()?;

        Ok(Self {
            items: profile.items.iter().map(|s| selector(s)).collect::<Result<_, _>>()?,
            title: optional_selector(profile.title)?,
            link: selector(profile.link)?,
            location: optional_selector(profile.location)?,
            deadline: optional_selector(profile.deadline)?,
            posted: optional_selector(profile.posted)?,
            grade: optional_selector(profile.grade)?,
            organization_name: optional_selector(profile.organization_name)?,
            description: optional_selector(profile.description)?,
            cell: selector("td")?,
            ids,
            detail,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Text helpers
// ────────────────────────────────────────────────────────────────────────────

fn text_of(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn first_text(root: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let selector = selector?;
    root.select(selector).map(text_of).find(|t| !t.is_empty())
}

fn date_in(text: &str) -> Option<chrono::NaiveDate> {
    parse_date(text).or_else(|| find_date(text))
}

/// Fills inferred fields that the page did not state outright.
fn infer_from_text(draft: &mut JobDraft, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    if draft.years_of_experience.is_none() {
        draft.years_of_experience = extract_experience_years(text);
    }
    if draft.education_level.is_none() {
        draft.education_level = infer_education_level(text);
    }
    if draft.language_requirements.is_empty() {
        draft.language_requirements = infer_language_requirements(text);
    }
    if draft.remote_eligible.is_none() && detect_remote(text) {
        draft.remote_eligible = Some(true);
    }
    if draft.contract_type.is_none() {
        draft.contract_type = extract_contract_type(text);
    }
}

/// Bare agency codes such as `UNEP` in a listing cell.
static ORG_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,}$").unwrap());

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Responsibilities,
    Qualifications,
}

fn section_of(heading: &str) -> Section {
    let heading = heading.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| heading.contains(w));
    if has(&["responsibilit", "duties", "accountabilit", "key functions", "main tasks"]) {
        Section::Responsibilities
    } else if has(&["qualification", "requirement", "competenc", "education", "experience", "skills"]) {
        Section::Qualifications
    } else {
        Section::Other
    }
}

/// Bold text opens a section only when it stands alone in its block, as in
/// `<p><strong>Responsibilities</strong></p>`. Labels inside bullets stay content.
fn is_bold_heading(el: ElementRef<'_>) -> bool {
    let in_bullet = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "li");
    if in_bullet {
        return false;
    }
    match el.parent().and_then(ElementRef::wrap) {
        Some(parent) => text_of(parent) == text_of(el),
        None => true,
    }
}

fn join_lines(lines: Vec<String>, separator: &str) -> Option<String> {
    (!lines.is_empty()).then(|| lines.join(separator))
}

// ────────────────────────────────────────────────────────────────────────────
// Extractor
// ────────────────────────────────────────────────────────────────────────────

pub struct HtmlExtractor {
    profile: &'static SiteProfile,
    compiled: Compiled,
    source: Arc<dyn PageSource>,
    limits: CrawlLimits,
}

impl HtmlExtractor {
    pub fn new(
        profile: &'static SiteProfile,
        source: Arc<dyn PageSource>,
        limits: CrawlLimits,
    ) -> Result<Self, CrawlError> {
        Ok(Self {
            profile,
            compiled: Compiled::new(profile)?,
            source,
            limits,
        })
    }

    pub fn profile(&self) -> &'static SiteProfile {
        self.profile
    }

    /// Listing URL for `page` (1-based), or `None` past the last page.
    pub fn page_url(&self, page: u32) -> Option<String> {
        let base = self.profile.listing_url;
        if page <= 1 {
            return Some(base.to_string());
        }
        let param = self.profile.page_param?;
        let separator = if base.contains('?') { '&' } else { '?' };
        Some(format!("{base}{separator}{param}={page}"))
    }

    /// Listing entries of one page, from the first item selector that matches anything.
    pub fn listing_elements(&self, html: &str) -> Vec<ListingElement> {
        let document = Html::parse_document(html);
        for item in &self.compiled.items {
            let found: Vec<ListingElement> = document
                .select(item)
                .map(|el| ListingElement {
                    tag: el.value().name().to_string(),
                    html: el.html(),
                })
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn job_id(&self, root: ElementRef<'_>, link: &str, title: &str, location: Option<&str>) -> String {
        let prefix = self.profile.id_prefix;
        for source in &self.compiled.ids {
            let found = match source {
                CompiledId::Attribute { within, name } => {
                    let holder = match within {
                        Some(sel) => root.select(sel).next(),
                        None => Some(root),
                    };
                    holder
                        .and_then(|el| el.value().attr(name))
                        .map(|v| v.trim().to_string())
                }
                CompiledId::LinkPattern(re) => re
                    .captures(link)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
                CompiledId::LastPathSegment => last_path_segment(link),
            };
            if let Some(id) = found.filter(|id| !id.is_empty()) {
                return format!("{prefix}{id}");
            }
        }
        stable_job_id(prefix, title, location)
    }

    fn read_cells(&self, root: ElementRef<'_>, draft: &mut JobDraft) {
        let cells: Vec<ElementRef<'_>> = root.select(&self.compiled.cell).collect();
        match self.profile.cells {
            CellLayout::None => {}
            CellLayout::Positional(fields) => {
                for (cell, field) in cells.iter().zip(fields.iter()) {
                    let Some(text) = non_empty(text_of(*cell)) else {
                        continue;
                    };
                    match field {
                        Field::Title => draft.title = Some(text),
                        Field::Description => draft.description = Some(text),
                        Field::Location => draft.location = Some(text),
                        Field::Grade => draft.grade = Some(text),
                        Field::Deadline => draft.deadline = date_in(&text),
                        Field::Posted => draft.posted_date = date_in(&text),
                        Field::Organization => draft.organization = Some(text),
                        Field::Skip => {}
                    }
                }
            }
            CellLayout::Heuristic => {
                for cell in cells {
                    let text = text_of(cell);
                    if text.is_empty() || draft.title.as_deref() == Some(text.as_str()) {
                        continue;
                    }
                    if ORG_CODE.is_match(&text) {
                        draft.organization = Some(text);
                    } else if let Some(grade) = extract_grade(&text) {
                        draft.grade = Some(grade);
                    } else if let Some(date) = find_date(&text) {
                        draft.deadline = Some(date);
                    } else if text.contains(',') && text.len() < 100 {
                        draft.location = Some(text);
                    }
                }
            }
        }
    }

    /// Parses one listing entry. `None` when it has no link or no title.
    pub fn parse_listing(&self, element: &ListingElement) -> Option<JobDraft> {
        let markup = match element.tag.as_str() {
            "tr" => format!("<table><tbody>{}</tbody></table>", element.html),
            _ => element.html.clone(),
        };
        let fragment = Html::parse_fragment(&markup);
        let root = fragment
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == element.tag)?;

        let link_el = if self.compiled.link.matches(&root) {
            root
        } else {
            root.select(&self.compiled.link).next()?
        };
        let link = absolutize_url(self.profile.base_url, link_el.value().attr("href")?)?;

        let mut draft = JobDraft::default();
        // Heuristic cells skip the title cell, so read the title first.
        if self.profile.cells == CellLayout::Heuristic {
            draft.title = first_text(root, self.compiled.title.as_ref());
        }
        self.read_cells(root, &mut draft);

        if draft.title.is_none() {
            draft.title = match &self.compiled.title {
                Some(sel) if sel.matches(&root) && root.select(sel).next().is_none() => {
                    non_empty(text_of(root))
                }
                sel => first_text(root, sel.as_ref()),
            }
            .or_else(|| non_empty(text_of(link_el)));
        }
        let mut title = draft.title.take()?;

        if self.profile.title_has_city {
            if let Some((name, city)) = title.rsplit_once(", ") {
                if draft.location.is_none() && !city.trim().is_empty() {
                    draft.location = Some(city.trim().to_string());
                }
                title = name.trim().to_string();
            }
        }
        if title.is_empty() {
            return None;
        }

        if let Some(location) = first_text(root, self.compiled.location.as_ref()) {
            draft.location = Some(location);
        }
        if let Some(deadline) = first_text(root, self.compiled.deadline.as_ref()).and_then(|t| date_in(&t)) {
            draft.deadline = Some(deadline);
        }
        if let Some(posted) = first_text(root, self.compiled.posted.as_ref()).and_then(|t| date_in(&t)) {
            draft.posted_date = Some(posted);
        }
        if let Some(grade) = first_text(root, self.compiled.grade.as_ref()) {
            draft.grade = extract_grade(&grade).or(Some(grade));
        }
        if let Some(org) = first_text(root, self.compiled.organization_name.as_ref()) {
            draft.organization = Some(org);
        }
        if let Some(description) = first_text(root, self.compiled.description.as_ref()) {
            draft.description = Some(description);
        }
        if let Some(location) = &draft.location {
            if detect_remote(location) {
                draft.remote_eligible = Some(true);
            }
        }

        draft.job_id = Some(self.job_id(root, &link, &title, draft.location.as_deref()));
        draft.title = Some(title);
        draft.apply_url = Some(link.clone());
        draft.source_url = Some(link);

        let description = draft.description.clone().unwrap_or_default();
        infer_from_text(&mut draft, &description);
        Some(draft)
    }

    /// Parses a job's own page. `None` when the site has no detail profile.
    pub fn parse_detail(&self, url: &str, html: &str) -> Option<JobDraft> {
        let detail = self.compiled.detail.as_ref()?;
        let document = Html::parse_document(html);
        let root = document.root_element();
        let mut draft = JobDraft::default();

        draft.title = first_text(root, Some(&detail.title));

        let mut description = Vec::new();
        let mut responsibilities = Vec::new();
        let mut qualifications = Vec::new();

        let content = detail
            .content
            .iter()
            .find_map(|sel| document.select(sel).next());
        if let Some(content) = content {
            let mut section = Section::Other;
            for el in content.descendants().filter_map(ElementRef::wrap) {
                match el.value().name() {
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                        section = section_of(&text_of(el));
                    }
                    "strong" | "b" if is_bold_heading(el) => {
                        section = section_of(&text_of(el));
                    }
                    "li" => {
                        let text = text_of(el);
                        if text.is_empty() {
                            continue;
                        }
                        match section {
                            Section::Responsibilities => responsibilities.push(text),
                            Section::Qualifications => qualifications.push(text),
                            Section::Other => {}
                        }
                    }
                    "p" => {
                        let text = text_of(el);
                        if text.chars().count() <= MIN_PARAGRAPH_CHARS {
                            continue;
                        }
                        match section {
                            Section::Responsibilities => responsibilities.push(text.clone()),
                            Section::Qualifications => qualifications.push(text.clone()),
                            Section::Other => {}
                        }
                        description.push(text);
                    }
                    _ => {}
                }
            }
            if description.is_empty() {
                description.extend(non_empty(text_of(content)));
            }
        }

        draft.description = join_lines(description, "\n\n");
        draft.responsibilities = join_lines(responsibilities, "\n");
        draft.qualifications = join_lines(qualifications, "\n");

        if let Some(metadata) = &detail.metadata {
            self.read_metadata(document.select(metadata), &mut draft);
        }

        if let Some(apply) = &detail.apply_link {
            draft.apply_url = document
                .select(apply)
                .filter_map(|el| el.value().attr("href"))
                .find_map(|href| absolutize_url(url, href));
        }

        let page_text = text_of(root);
        if draft.deadline.is_none() {
            draft.deadline = find_deadline(&page_text);
        }
        if draft.duty_station.is_none() {
            draft.duty_station = extract_duty_station(&page_text);
        }

        let body = [&draft.description, &draft.responsibilities, &draft.qualifications]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        infer_from_text(&mut draft, &body);
        Some(draft)
    }

    fn read_metadata<'a>(&self, items: impl Iterator<Item = ElementRef<'a>>, draft: &mut JobDraft) {
        let mut city = None;
        let mut country = None;

        for item in items {
            let text = text_of(item);
            let Some((label, value)) = text.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let label = label.to_lowercase();

            if label.contains("grade") || label.contains("level") {
                match extract_grade(&value.to_uppercase()) {
                    Some(grade) => draft.grade = Some(grade),
                    None if label.contains("post level") => draft.category = Some(value.to_string()),
                    None => {}
                }
            } else if label.contains("contract") || label.contains("appointment") {
                if let Some(contract) = extract_contract_type(value) {
                    draft.contract_type = Some(contract);
                }
            } else if label.contains("organization") || label.contains("department") {
                draft.organization = Some(value.to_string());
            } else if label.contains("duty station") || label.contains("location") {
                draft.duty_station = Some(value.to_string());
                draft.location = Some(value.to_string());
            } else if label.contains("country") {
                country = Some(value.to_string());
            } else if label.contains("city") {
                city = Some(value.to_string());
            } else if label.contains("deadline") || label.contains("closing") {
                draft.deadline = date_in(value).or(draft.deadline);
            } else if label.contains("posted") || label.contains("posting") || label.contains("published") {
                draft.posted_date = date_in(value).or(draft.posted_date);
            } else if label.contains("category") || label.contains("tags") {
                if draft.category.is_none() {
                    draft.category = Some(value.to_string());
                }
            }
        }

        match (city, country) {
            (Some(city), Some(country)) => draft.location = Some(format!("{city}, {country}")),
            (Some(city), None) => draft.location = Some(city),
            (None, Some(country)) if draft.location.is_none() => draft.location = Some(country),
            _ => {}
        }
    }
}

#[async_trait]
impl SiteExtractor for HtmlExtractor {
    fn organization(&self) -> &str {
        self.profile.organization
    }

    fn limits(&self) -> CrawlLimits {
        self.limits
    }

    async fn fetch_listing(&self, page: u32) -> Result<Vec<ListingElement>, CrawlError> {
        let Some(url) = self.page_url(page) else {
            return Ok(Vec::new());
        };
        let html = self.source.fetch(&url).await?;
        Ok(self.listing_elements(&html))
    }

    fn parse_element(&self, element: &ListingElement) -> Option<JobDraft> {
        self.parse_listing(element)
    }

    async fn fetch_detail(&self, url: &str) -> Result<Option<JobDraft>, CrawlError> {
        if self.compiled.detail.is_none() {
            return Ok(None);
        }
        let html = self.source.fetch(url).await?;
        Ok(self.parse_detail(url, &html))
    }
}
