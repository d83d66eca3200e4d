//! Fetching and orchestration
//!
//! - [`fetcher`]: one rate-limited GET with a timeout
//! - [`batch`]: year-batch runner and its ledger
//! - [`pipeline`]: sources, merge and persistence wired together

pub mod batch;
pub mod fetcher;
pub mod pipeline;

pub use batch::{BatchConfig, BatchRunner, ProgressSink, ProgressSnapshot, YearLedger, YearSource};
pub use fetcher::HttpFetcher;
pub use pipeline::{DatasetPipeline, FetchTarget, PipelineReport};
