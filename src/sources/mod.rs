//! Per-year data sources
//!
//! Every live source implements [`YearSource`](crate::crawler::batch::YearSource)
//! and is driven by the batch runner. The fallback catalog needs no network.

pub mod catalog;
pub mod fallback;
pub mod usno;

pub use catalog::NasaCatalogSource;
pub use fallback::{FallbackCatalog, SAROS_SOURCE, TABLE_SOURCE};
pub use usno::{UsnoMoonSource, UsnoSolarSource, USNO_SOURCE};
