//! Persistence for fetch runs
//!
//! Checkpoints after every batch, cross-source merging, and the final JSON
//! dataset files.

pub mod checkpoint;
pub mod dataset;
pub mod merge;

pub use checkpoint::CheckpointManager;
pub use dataset::{read_dataset, DatasetStore, EclipseFile, MoonPhaseFile, DATASET_FILE};
pub use merge::{dedupe_eclipses, merge_eclipses, MergeReport};
