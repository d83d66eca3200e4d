//! cosmic-birthday - moon-phase and eclipse dataset builder
//!
//! Fetches moon phases and eclipses for a range of years from public
//! astronomy sources, merges them into one JSON dataset, and answers
//! "which years did my birthday fall on a full moon or an eclipse?".
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - HTTP fetcher, year-batch runner and dataset pipeline
//! - [`sources`] - USNO, NASA catalog and offline fallback sources
//! - [`parser`] - Date extraction, catalog rows and eclipse classification
//! - [`models`] - Core data structures and types
//! - [`storage`] - Checkpoints, merging and dataset files
//! - [`matcher`] - Birthday lookup over a dataset
//! - [`relay`] - Permissive CORS relay server
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use cosmic_birthday::config::Config;
//! use cosmic_birthday::crawler::pipeline::{DatasetPipeline, FetchTarget};
//! use cosmic_birthday::matcher::{find_matches, parse_birth_date};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pipeline = DatasetPipeline::new(config)?;
//!     pipeline.run(FetchTarget::All, false).await?;
//!
//!     let dataset = pipeline.store().load_dataset()?.unwrap_or_default();
//!     let report = find_matches(parse_birth_date("1999-08-11")?, &dataset);
//!     println!("{:?}", report.moon_phases.full_moon);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod matcher;
pub mod models;
pub mod parser;
pub mod relay;
pub mod sources;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::batch::{BatchConfig, BatchRunner, YearLedger, YearSource};
    pub use crate::crawler::fetcher::HttpFetcher;
    pub use crate::crawler::pipeline::{DatasetPipeline, FetchTarget};
    pub use crate::error::{CosmicErrorTrait, Error, ErrorCategory, Result};
    pub use crate::matcher::{find_matches, BirthdayReport};
    pub use crate::models::{Dataset, EclipseKind, EclipseRecord, MoonPhase, PhaseRecord};
}

// Direct re-exports for convenience
pub use models::{Dataset, EclipseKind, EclipseRecord, MoonPhase, PhaseRecord};
