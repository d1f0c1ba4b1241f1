//! Per-site job extractors.
//!
//! Every site is a selector profile (`sites`) over one shared HTML extractor (`html`).
//! Text heuristics live in `crate::heuristics`; HTTP access goes through `fetch::PageSource`.

pub mod fetch;
pub mod html;
pub mod sites;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::crawler::CrawlError;
use crate::models::job::JobDraft;

/// Bounds on a single crawl of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_jobs: usize,
    pub max_pages: u32,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_jobs: 50,
            max_pages: 5,
        }
    }
}

/// One listing entry, detached from its page so it can cross await points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingElement {
    /// Element name, e.g. `tr`, `div`, `a`.
    pub tag: String,
    /// Outer HTML of the element.
    pub html: String,
}

#[async_trait]
pub trait SiteExtractor: Send + Sync {
    /// Organization code, also the default `organization` of every job.
    fn organization(&self) -> &str;

    fn limits(&self) -> CrawlLimits;

    /// Listing entries on page `page` (1-based). An empty list ends pagination.
    async fn fetch_listing(&self, page: u32) -> Result<Vec<ListingElement>, CrawlError>;

    /// `None` when the entry lacks a title or a link.
    fn parse_element(&self, element: &ListingElement) -> Option<JobDraft>;

    /// Detail-page fields for the job at `url`. Sites without detail pages return `None`.
    async fn fetch_detail(&self, _url: &str) -> Result<Option<JobDraft>, CrawlError> {
        Ok(None)
    }

    /// Walks listing pages and enriches each entry from its detail page.
    ///
    /// A failure on the first listing page is an error (and is retried by the harness).
    /// Later page failures, unparseable entries and detail failures are logged and skipped.
    async fn crawl(&self) -> Result<Vec<JobDraft>, CrawlError> {
        let limits = self.limits();
        let mut drafts: Vec<JobDraft> = Vec::new();

        'pages: for page in 1..=limits.max_pages.max(1) {
            let elements = match self.fetch_listing(page).await {
                Ok(elements) => elements,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!("{}: stopping at listing page {page}: {e}", self.organization());
                    break;
                }
            };

            if elements.is_empty() {
                debug!("{}: no entries on page {page}", self.organization());
                break;
            }

            for element in &elements {
                if drafts.len() >= limits.max_jobs {
                    break 'pages;
                }

                let Some(mut draft) = self.parse_element(element) else {
                    debug!("{}: skipping <{}> without title or link", self.organization(), element.tag);
                    continue;
                };

                if let Some(url) = draft.source_url.clone() {
                    match self.fetch_detail(&url).await {
                        Ok(Some(detail)) => draft.enrich(detail),
                        Ok(None) => {}
                        Err(e) => warn!("{}: detail page {url} skipped: {e}", self.organization()),
                    }
                }

                drafts.push(draft);
            }
        }

        info!("{}: extracted {} job(s)", self.organization(), drafts.len());
        Ok(drafts)
    }
}
