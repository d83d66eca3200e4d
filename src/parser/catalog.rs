//! NASA eclipse catalog page extraction
//!
//! Catalog pages are HTML documents whose data lives in `<pre>` blocks: one
//! eclipse per row, each row starting with the catalog sequence number. Header
//! and legend lines never start with a number and are skipped; numbered rows
//! that yield no date are reported as parse failures.

use scraper::{Html, Selector};

use crate::models::{EclipseKind, EclipseRecord};
use crate::parser::date::{parse_date, ParseReport};
use crate::utils::error::ParseError;

/// Source tag for catalog rows
pub const CATALOG_SOURCE: &str = "nasa-catalog";

/// Catalog table text, all `<pre>` blocks concatenated
pub fn extract_table_text(html: &str) -> Result<String, ParseError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("pre").map_err(|e| ParseError::UnexpectedShape(format!("{e:?}")))?;

    let blocks: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect();

    if blocks.is_empty() {
        return Err(ParseError::NoCatalogTable);
    }

    Ok(blocks.join("\n"))
}

/// Whether a line is a numbered data row
pub fn is_data_row(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|first| first.chars().all(|c| c.is_ascii_digit()))
}

/// Parse every data row of a catalog page into records
pub fn parse_catalog_page(html: &str, kind: EclipseKind) -> Result<ParseReport<EclipseRecord>, ParseError> {
    let text = extract_table_text(html)?;
    let mut report = ParseReport::default();

    for line in text.lines().filter(|line| is_data_row(line)) {
        match parse_date(line) {
            Ok(date) => report.parsed.push(EclipseRecord::new(
                date.to_naive(),
                kind,
                line.trim(),
                CATALOG_SOURCE,
            )),
            Err(err) => report.record_failure(line, err),
        }
    }

    tracing::debug!(
        kind = %kind,
        rows = report.parsed.len(),
        failures = report.failure_count(),
        "Parsed catalog page"
    );

    Ok(report)
}
