//! Year-batch orchestration
//!
//! Walks a year range in fixed-size batches. Every year of a batch is fetched
//! concurrently, results are folded into an explicit [`YearLedger`] once the
//! whole batch has settled, a [`ProgressSnapshot`] is handed to the sink, and
//! the runner sleeps before the next batch.
//!
//! ```text
//!  years ──▶ [batch 1] ──join_all──▶ ledger ──▶ sink ──sleep──▶ [batch 2] ...
//! ```
//!
//! A single failing year never fails its batch. It is recorded in the ledger
//! with `success: false` and its error text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::{CosmicErrorTrait, Error, Result};
use crate::utils::error::SourceError;

// ============================================================================
// Configuration
// ============================================================================

/// Batch runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// First year, inclusive
    pub start_year: i32,

    /// Last year, inclusive
    pub end_year: i32,

    /// Years fetched concurrently per batch
    pub batch_size: usize,

    /// Pause between batches
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            start_year: 1960,
            end_year: 2100,
            batch_size: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl BatchConfig {
    /// Take the year range and batching from application config
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_year: config.fetch.start_year,
            end_year: config.fetch.end_year,
            batch_size: config.fetch.batch_size,
            delay: config.batch_delay(),
        }
    }

    /// Reject empty ranges and zero-sized batches
    pub fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            return Err(Error::config(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch size must be greater than 0"));
        }
        Ok(())
    }

    /// Every year in the range, ascending
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }

    /// Number of years in the range
    pub fn year_count(&self) -> usize {
        (self.end_year - self.start_year + 1).max(0) as usize
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// What one source call produced for a year
#[derive(Debug, Clone, PartialEq)]
pub struct YearFetch<T> {
    pub records: Vec<T>,

    /// Rows that were present upstream but could not be parsed
    pub parse_failures: usize,
}

impl<T> YearFetch<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            parse_failures: 0,
        }
    }

    pub fn with_failures(records: Vec<T>, parse_failures: usize) -> Self {
        Self {
            records,
            parse_failures,
        }
    }
}

/// Ledger entry for one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOutcome<T> {
    pub year: i32,
    pub success: bool,
    pub records: Vec<T>,
    #[serde(default)]
    pub parse_failures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> YearOutcome<T> {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

/// Per-year accumulator threaded through the runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearLedger<T> {
    years: BTreeMap<i32, YearOutcome<T>>,
}

impl<T> Default for YearLedger<T> {
    fn default() -> Self {
        Self {
            years: BTreeMap::new(),
        }
    }
}

impl<T> YearLedger<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a successful fetch, replacing any earlier entry
    pub fn record_success(&mut self, year: i32, fetch: YearFetch<T>) {
        self.years.insert(
            year,
            YearOutcome {
                year,
                success: true,
                records: fetch.records,
                parse_failures: fetch.parse_failures,
                error: None,
            },
        );
    }

    /// Store a failed fetch, replacing any earlier entry
    pub fn record_failure(&mut self, year: i32, error: &SourceError) {
        self.years.insert(
            year,
            YearOutcome {
                year,
                success: false,
                records: Vec::new(),
                parse_failures: 0,
                error: Some(error.to_string()),
            },
        );
    }

    /// Whether `year` already succeeded
    pub fn is_complete(&self, year: i32) -> bool {
        self.years.get(&year).is_some_and(|o| o.success)
    }

    pub fn get(&self, year: i32) -> Option<&YearOutcome<T>> {
        self.years.get(&year)
    }

    /// Entries in ascending year order
    pub fn outcomes(&self) -> impl Iterator<Item = &YearOutcome<T>> {
        self.years.values()
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.years.values().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.years.values().filter(|o| !o.success).count()
    }

    /// Years recorded as failed
    pub fn failed_years(&self) -> Vec<i32> {
        self.years
            .values()
            .filter(|o| !o.success)
            .map(|o| o.year)
            .collect()
    }

    pub fn parse_failures(&self) -> usize {
        self.years.values().map(|o| o.parse_failures).sum()
    }

    pub fn record_count(&self) -> usize {
        self.years.values().map(YearOutcome::count).sum()
    }

    /// Drop entries outside `start..=end`
    pub fn retain_range(&mut self, start: i32, end: i32) {
        self.years.retain(|year, _| (start..=end).contains(year));
    }

    /// All records of successful years, in year order
    pub fn into_records(self) -> Vec<T> {
        self.years
            .into_values()
            .filter(|o| o.success)
            .flat_map(|o| o.records)
            .collect()
    }

    /// Entries keyed by year
    pub fn into_outcomes(self) -> BTreeMap<i32, YearOutcome<T>> {
        self.years
    }
}

// ============================================================================
// Sources and progress
// ============================================================================

/// A source that can be asked for one year at a time
#[async_trait]
pub trait YearSource: Send + Sync {
    type Record: Send;

    /// Stable name, used for checkpoints and logs
    fn name(&self) -> &str;

    async fn fetch_year(&self, year: i32) -> std::result::Result<YearFetch<Self::Record>, SourceError>;
}

/// Progress written after every batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot<T> {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub batches_completed: usize,
    pub ledger: YearLedger<T>,
}

/// Receives a snapshot after every batch
pub trait ProgressSink<T>: Send + Sync {
    fn save(&self, snapshot: &ProgressSnapshot<T>) -> Result<()>;
}

/// Sink that drops every snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl<T> ProgressSink<T> for NoProgress {
    fn save(&self, _snapshot: &ProgressSnapshot<T>) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Drives a [`YearSource`] over a year range
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    /// Create a runner, rejecting invalid ranges before any request
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Years still to fetch, split into batches
    pub fn plan<T>(&self, ledger: &YearLedger<T>) -> Vec<Vec<i32>> {
        let pending: Vec<i32> = self
            .config
            .years()
            .filter(|year| !ledger.is_complete(*year))
            .collect();

        pending
            .chunks(self.config.batch_size)
            .map(<[i32]>::to_vec)
            .collect()
    }

    /// Fetch every pending year and return the filled ledger
    ///
    /// Years already successful in `ledger` are skipped. Sink failures are
    /// logged and do not stop the run.
    pub async fn run<S>(
        &self,
        source: &S,
        ledger: YearLedger<S::Record>,
        sink: &dyn ProgressSink<S::Record>,
    ) -> YearLedger<S::Record>
    where
        S: YearSource + ?Sized,
    {
        let batches = self.plan(&ledger);
        let total = batches.len();
        let now = Utc::now();

        let mut snapshot = ProgressSnapshot {
            name: source.name().to_string(),
            started_at: now,
            updated_at: now,
            batches_completed: 0,
            ledger,
        };

        tracing::info!(
            source = source.name(),
            start_year = self.config.start_year,
            end_year = self.config.end_year,
            batches = total,
            skipped = self.config.year_count() - batches.iter().map(Vec::len).sum::<usize>(),
            "Starting batch run"
        );

        for (index, batch) in batches.iter().enumerate() {
            let batch_no = index + 1;
            tracing::info!(
                source = source.name(),
                batch = batch_no,
                of = total,
                years = ?batch,
                "Fetching batch"
            );

            let results = join_all(
                batch
                    .iter()
                    .map(|&year| async move { (year, source.fetch_year(year).await) }),
            )
            .await;

            for (year, result) in results {
                match result {
                    Ok(fetch) => {
                        tracing::debug!(
                            source = source.name(),
                            year,
                            records = fetch.records.len(),
                            "Year fetched"
                        );
                        snapshot.ledger.record_success(year, fetch);
                    }
                    Err(err) => {
                        tracing::warn!(
                            source = source.name(),
                            year,
                            category = err.category().as_str(),
                            recoverable = err.is_recoverable(),
                            error = %err,
                            "Year failed"
                        );
                        snapshot.ledger.record_failure(year, &err);
                    }
                }
            }

            snapshot.batches_completed = batch_no;
            snapshot.updated_at = Utc::now();
            if let Err(err) = sink.save(&snapshot) {
                tracing::warn!(source = source.name(), batch = batch_no, error = %err, "Failed to save progress");
            }

            if batch_no < total && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        tracing::info!(
            source = source.name(),
            succeeded = snapshot.ledger.succeeded(),
            failed = snapshot.ledger.failed(),
            "Batch run finished"
        );

        snapshot.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::FetchError;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns the year itself; fails on years listed in `failing`
    struct EchoSource {
        failing: Vec<i32>,
        calls: AtomicUsize,
    }

    impl EchoSource {
        fn new(failing: Vec<i32>) -> Self {
            Self {
                failing,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl YearSource for EchoSource {
        type Record = i32;

        fn name(&self) -> &str {
            "echo"
        }

        async fn fetch_year(&self, year: i32) -> std::result::Result<YearFetch<i32>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&year) {
                return Err(SourceError::Fetch(FetchError::Timeout));
            }
            Ok(YearFetch::new(vec![year]))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<usize>>,
    }

    impl ProgressSink<i32> for RecordingSink {
        fn save(&self, snapshot: &ProgressSnapshot<i32>) -> Result<()> {
            self.batches.lock().unwrap().push(snapshot.batches_completed);
            Ok(())
        }
    }

    struct FailingSink;

    impl ProgressSink<i32> for FailingSink {
        fn save(&self, _snapshot: &ProgressSnapshot<i32>) -> Result<()> {
            Err(Error::other("disk full"))
        }
    }

    fn runner(start: i32, end: i32, batch_size: usize, delay: Duration) -> BatchRunner {
        BatchRunner::new(BatchConfig {
            start_year: start,
            end_year: end,
            batch_size,
            delay,
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let reversed = BatchConfig {
            start_year: 2001,
            end_year: 2000,
            ..Default::default()
        };
        assert!(matches!(BatchRunner::new(reversed), Err(Error::Config(_))));

        let empty_batch = BatchConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(BatchRunner::new(empty_batch).is_err());
    }

    #[test]
    fn test_plan_chunks() {
        let runner = runner(2000, 2006, 3, Duration::ZERO);
        let plan = runner.plan(&YearLedger::<i32>::new());
        assert_eq!(
            plan,
            vec![vec![2000, 2001, 2002], vec![2003, 2004, 2005], vec![2006]]
        );
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_fatal() {
        let runner = runner(2000, 2004, 2, Duration::ZERO);
        let source = EchoSource::new(vec![2002]);

        let ledger = runner.run(&source, YearLedger::new(), &NoProgress).await;

        assert_eq!(ledger.len(), 5);
        assert_eq!(ledger.succeeded(), 4);
        assert_eq!(ledger.failed_years(), vec![2002]);
        let failed = ledger.get(2002).unwrap();
        assert!(!failed.success);
        assert!(failed.error.as_deref().unwrap().contains("timeout"));
        assert_eq!(ledger.into_records(), vec![2000, 2001, 2003, 2004]);
    }

    #[tokio::test]
    async fn test_resume_skips_completed_years() {
        let runner = runner(2000, 2004, 2, Duration::ZERO);

        let mut ledger = YearLedger::new();
        ledger.record_success(2000, YearFetch::new(vec![2000]));
        ledger.record_success(2001, YearFetch::new(vec![2001]));
        ledger.record_failure(2002, &SourceError::YearNotCovered(2002));

        let source = EchoSource::new(vec![]);
        let ledger = runner.run(&source, ledger, &NoProgress).await;

        // 2002 failed before and is retried
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.succeeded(), 5);
    }

    #[tokio::test]
    async fn test_snapshot_after_every_batch() {
        let runner = runner(2000, 2004, 2, Duration::ZERO);
        let sink = RecordingSink::default();

        runner
            .run(&EchoSource::new(vec![]), YearLedger::new(), &sink)
            .await;

        assert_eq!(*sink.batches.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_run() {
        let runner = runner(2000, 2003, 1, Duration::ZERO);
        let ledger = runner
            .run(&EchoSource::new(vec![]), YearLedger::new(), &FailingSink)
            .await;
        assert_eq!(ledger.succeeded(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_batches_only() {
        let runner = runner(2000, 2004, 2, Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        runner
            .run(&EchoSource::new(vec![]), YearLedger::new(), &NoProgress)
            .await;

        // three batches, two pauses
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(15), "elapsed {elapsed:?}");
    }

    #[test]
    fn test_ledger_serde() {
        let mut ledger = YearLedger::new();
        ledger.record_success(1999, YearFetch::with_failures(vec![1, 2], 1));
        ledger.record_failure(2000, &SourceError::YearNotCovered(2000));

        let json = serde_json::to_string(&ledger).unwrap();
        let back: YearLedger<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
        assert_eq!(back.parse_failures(), 1);
    }

    proptest! {
        #[test]
        fn prop_every_year_exactly_once(
            start in 1960i32..2100,
            span in 0i32..40,
            batch_size in 1usize..12,
        ) {
            let end = start + span;
            let runner = runner(start, end, batch_size, Duration::ZERO);
            let source = EchoSource::new(vec![]);

            let ledger = tokio_test::block_on(runner.run(&source, YearLedger::new(), &NoProgress));

            let years: Vec<i32> = ledger.outcomes().map(|o| o.year).collect();
            prop_assert_eq!(years, (start..=end).collect::<Vec<_>>());
            prop_assert_eq!(source.calls.load(Ordering::SeqCst), (end - start + 1) as usize);
        }
    }
}
