//! Response parsing and data extraction
//!
//! This module turns loosely structured upstream text into typed records:
//! dates, catalog rows, and eclipse subtype labels.

pub mod catalog;
pub mod classify;
pub mod date;

// Re-export main parsers and public types
pub use catalog::{parse_catalog_page, CATALOG_SOURCE};
pub use classify::{classify, detect_subtype, EclipseSubtype};
pub use date::{parse_date, parse_lines, ParseFailure, ParseReport, ParsedDate};
