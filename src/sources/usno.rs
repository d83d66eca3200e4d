//! USNO Astronomical Applications API
//!
//! Two endpoints, both keyed by year:
//! - `/moon/phases/year?year=YYYY` returns `phasedata`
//! - `/eclipses/solar/year?year=YYYY` returns `eclipses_in_year`

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::crawler::batch::{YearFetch, YearSource};
use crate::crawler::fetcher::HttpFetcher;
use crate::models::{EclipseKind, EclipseRecord, MoonPhase, PhaseRecord};
use crate::parser::ParsedDate;
use crate::utils::normalize_whitespace;
use crate::utils::error::{ParseError, SourceError};

/// Source tag for USNO eclipse records
pub const USNO_SOURCE: &str = "usno";

#[derive(Debug, Deserialize)]
struct PhaseResponse {
    #[serde(default)]
    phasedata: Option<Vec<RawPhase>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPhase {
    year: i32,
    month: u32,
    day: u32,
    phase: String,
    #[serde(default)]
    time: String,
}

#[derive(Debug, Deserialize)]
struct SolarResponse {
    #[serde(default)]
    eclipses_in_year: Option<Vec<RawEclipse>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEclipse {
    year: i32,
    month: u32,
    day: u32,
    #[serde(default)]
    event: String,
}

fn missing_array(field: &str, error: Option<String>) -> ParseError {
    match error {
        Some(message) => ParseError::UnexpectedShape(format!("upstream error: {message}")),
        None => ParseError::UnexpectedShape(format!("missing `{field}` array")),
    }
}

/// Parse a USNO moon-phase response for `year`
///
/// Rows with an invalid date or unknown phase name are dropped and counted.
/// Rows for other years are ignored.
pub fn parse_phase_response(body: &str, year: i32) -> Result<YearFetch<PhaseRecord>, ParseError> {
    let response: PhaseResponse = serde_json::from_str(body)?;
    let rows = response
        .phasedata
        .ok_or_else(|| missing_array("phasedata", response.error))?;

    let mut records = Vec::with_capacity(rows.len());
    let mut failures = 0;

    for row in rows.into_iter().filter(|row| row.year == year) {
        let parsed = ParsedDate::new(row.year, row.month, row.day)
            .map_err(ParseError::from)
            .and_then(|date| Ok((date, MoonPhase::parse(&row.phase)?)));

        match parsed {
            Ok((date, phase)) => records.push(PhaseRecord {
                year: date.year,
                month: date.month,
                day: date.day,
                phase,
                time: row.time,
            }),
            Err(err) => {
                tracing::debug!(year, error = %err, "Dropped moon phase row");
                failures += 1;
            }
        }
    }

    Ok(YearFetch::with_failures(records, failures))
}

/// Parse a USNO solar-eclipse response for `year`
pub fn parse_solar_response(body: &str, year: i32) -> Result<YearFetch<EclipseRecord>, ParseError> {
    let response: SolarResponse = serde_json::from_str(body)?;
    let rows = response
        .eclipses_in_year
        .ok_or_else(|| missing_array("eclipses_in_year", response.error))?;

    let mut records = Vec::with_capacity(rows.len());
    let mut failures = 0;

    for row in rows.into_iter().filter(|row| row.year == year) {
        match ParsedDate::new(row.year, row.month, row.day) {
            Ok(date) => records.push(EclipseRecord::new(
                date.to_naive(),
                EclipseKind::Solar,
                normalize_whitespace(&row.event),
                USNO_SOURCE,
            )),
            Err(err) => {
                tracing::debug!(year, error = %err, "Dropped solar eclipse row");
                failures += 1;
            }
        }
    }

    Ok(YearFetch::with_failures(records, failures))
}

/// Moon phases from USNO
pub struct UsnoMoonSource {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
}

impl UsnoMoonSource {
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn year_url(&self, year: i32) -> String {
        format!("{}/moon/phases/year?year={year}", self.base_url)
    }
}

#[async_trait]
impl YearSource for UsnoMoonSource {
    type Record = PhaseRecord;

    fn name(&self) -> &str {
        "moon-phases"
    }

    async fn fetch_year(&self, year: i32) -> Result<YearFetch<PhaseRecord>, SourceError> {
        let body = self.fetcher.fetch_text(&self.year_url(year)).await?;
        Ok(parse_phase_response(&body, year)?)
    }
}

/// Solar eclipses from USNO
pub struct UsnoSolarSource {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
}

impl UsnoSolarSource {
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn year_url(&self, year: i32) -> String {
        format!("{}/eclipses/solar/year?year={year}", self.base_url)
    }
}

#[async_trait]
impl YearSource for UsnoSolarSource {
    type Record = EclipseRecord;

    fn name(&self) -> &str {
        "solar-usno"
    }

    async fn fetch_year(&self, year: i32) -> Result<YearFetch<EclipseRecord>, SourceError> {
        let body = self.fetcher.fetch_text(&self.year_url(year)).await?;
        Ok(parse_solar_response(&body, year)?)
    }
}
