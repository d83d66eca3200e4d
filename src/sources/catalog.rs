//! NASA eclipse catalog source
//!
//! The catalogs publish one HTML page per century (`SE2001-2100.html`,
//! `LE1901-2000.html`). A batch usually asks for several years of the same
//! century at once, so each page is downloaded once and shared through a
//! `OnceCell`. Failed downloads are not cached.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::crawler::batch::{YearFetch, YearSource};
use crate::crawler::fetcher::HttpFetcher;
use crate::models::{EclipseKind, EclipseRecord};
use crate::parser::parse_catalog_page;
use crate::utils::century_span;
use crate::utils::error::SourceError;

/// Years the five-millennium catalog pages can serve
const FIRST_YEAR: i32 = 1;
const LAST_YEAR: i32 = 3000;

struct CatalogPage {
    records: Vec<EclipseRecord>,
    failures: usize,
    failures_reported: AtomicBool,
}

type PageCell = Arc<OnceCell<Arc<CatalogPage>>>;

/// Solar or lunar eclipses from the NASA century catalogs
pub struct NasaCatalogSource {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
    kind: EclipseKind,
    pages: Mutex<HashMap<(i32, i32), PageCell>>,
}

impl NasaCatalogSource {
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: &str, kind: EclipseKind) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// URL of the century page holding `year`
    pub fn page_url(&self, year: i32) -> String {
        let (first, last) = century_span(year);
        let prefix = match self.kind {
            EclipseKind::Solar => "SE",
            EclipseKind::Lunar => "LE",
        };
        format!("{}/{prefix}{first:04}-{last:04}.html", self.base_url)
    }

    async fn page(&self, year: i32) -> Result<Arc<CatalogPage>, SourceError> {
        let cell = {
            let mut pages = self.pages.lock().await;
            pages.entry(century_span(year)).or_default().clone()
        };

        let page = cell
            .get_or_try_init(|| async {
                let url = self.page_url(year);
                let html = self.fetcher.fetch_text(&url).await?;
                let report = parse_catalog_page(&html, self.kind)?;

                tracing::info!(
                    url = %url,
                    records = report.parsed.len(),
                    failures = report.failure_count(),
                    "Loaded catalog page"
                );

                Ok::<_, SourceError>(Arc::new(CatalogPage {
                    failures: report.failure_count(),
                    records: report.parsed,
                    failures_reported: AtomicBool::new(false),
                }))
            })
            .await?;

        Ok(page.clone())
    }
}

#[async_trait]
impl YearSource for NasaCatalogSource {
    type Record = EclipseRecord;

    fn name(&self) -> &str {
        match self.kind {
            EclipseKind::Solar => "solar-catalog",
            EclipseKind::Lunar => "lunar-catalog",
        }
    }

    async fn fetch_year(&self, year: i32) -> Result<YearFetch<EclipseRecord>, SourceError> {
        if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
            return Err(SourceError::YearNotCovered(year));
        }

        let page = self.page(year).await?;
        let records = page
            .records
            .iter()
            .filter(|record| record.year == year)
            .cloned()
            .collect();

        // Page-level failures are charged to the first year served from it
        let failures = if page.failures_reported.swap(true, Ordering::SeqCst) {
            0
        } else {
            page.failures
        };

        Ok(YearFetch::with_failures(records, failures))
    }
}
