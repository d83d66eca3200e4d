//! Error types for the cosmic-birthday fetchers
//!
//! This module defines custom error types used throughout the application.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection failure (DNS, refused, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Upstream answered with something other than 200
    #[error("HTTP status {code}: {body}")]
    HttpStatus { code: u16, body: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be built or the body could not be read
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl FetchError {
    /// Classify a reqwest error into network or timeout
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::Client(err)
        }
    }

    /// HTTP status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Why a string could not be turned into a calendar date
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    /// None of the known date shapes occur in the input
    #[error("no date pattern in {input:?}")]
    NoPattern { input: String },

    /// A pattern matched but the calendar date does not exist
    #[error("invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

/// Errors that can occur while turning a response body into records
#[derive(Error, Debug)]
pub enum ParseError {
    /// Response body was not valid JSON for the expected shape
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response parsed but carries data for another year
    #[error("Unexpected response: {0}")]
    UnexpectedShape(String),

    /// Moon phase name not recognized
    #[error("Unknown moon phase: {0}")]
    UnknownPhase(String),

    /// Catalog page had no `<pre>` table
    #[error("No catalog table found")]
    NoCatalogTable,

    /// Date could not be parsed
    #[error(transparent)]
    Date(#[from] DateParseError),
}

/// Failure of a single per-year source call
#[derive(Error, Debug)]
pub enum SourceError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Year outside the range a source can serve
    #[error("Year {0} is not covered by this source")]
    YearNotCovered(i32),
}
