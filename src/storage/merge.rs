//! Cross-source eclipse merge
//!
//! Lists are concatenated in priority order and the first record per
//! (year, month) wins. Day is deliberately not part of the key: two sources
//! may disagree on the day of the same eclipse by one across time zones.

use std::collections::HashSet;

use crate::models::EclipseRecord;

/// Counts from one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub input: usize,
    pub kept: usize,
    pub duplicates: usize,
}

/// Keep the first record per (year, month), then sort by (year, month, day)
pub fn dedupe_eclipses(records: Vec<EclipseRecord>) -> Vec<EclipseRecord> {
    let mut seen = HashSet::new();
    let mut kept: Vec<EclipseRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.merge_key()))
        .collect();

    // stable: equal keys keep their order
    kept.sort_by_key(EclipseRecord::sort_key);
    kept
}

/// Merge lists in priority order
pub fn merge_eclipses<'a, I>(lists: I) -> (Vec<EclipseRecord>, MergeReport)
where
    I: IntoIterator<Item = &'a [EclipseRecord]>,
{
    let combined: Vec<EclipseRecord> = lists.into_iter().flatten().cloned().collect();
    let input = combined.len();
    let merged = dedupe_eclipses(combined);

    let report = MergeReport {
        input,
        kept: merged.len(),
        duplicates: input - merged.len(),
    };

    tracing::debug!(
        input = report.input,
        kept = report.kept,
        duplicates = report.duplicates,
        "Merged eclipse lists"
    );

    (merged, report)
}
