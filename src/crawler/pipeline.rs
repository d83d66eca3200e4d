//! End-to-end dataset pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ USNO moon    │──▶│              │   │             │   │ moon-phases  │
//! │ USNO solar   │──▶│ BatchRunner  │──▶│   merge +   │──▶│ solar/lunar  │
//! │ NASA catalog │──▶│ (per source) │   │  fallback   │   │ master file  │
//! └──────────────┘   └──────┬───────┘   └─────────────┘   └──────────────┘
//!                           │
//!                     checkpoints/
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cosmic_birthday::config::Config;
//! use cosmic_birthday::crawler::pipeline::{DatasetPipeline, FetchTarget};
//!
//! # async fn example() -> cosmic_birthday::error::Result<()> {
//! let pipeline = DatasetPipeline::new(Config::default())?;
//! let report = pipeline.run(FetchTarget::All, false).await?;
//!
//! println!("{} phases", report.metadata.counts.total_phases);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::crawler::batch::{
    BatchConfig, BatchRunner, NoProgress, ProgressSink, YearLedger, YearSource,
};
use crate::crawler::fetcher::HttpFetcher;
use crate::error::{Error, Result};
use crate::models::{
    Dataset, DatasetMetadata, EclipseKind, EclipseRecord, PhaseRecord, YearRecord,
};
use crate::sources::{
    FallbackCatalog, NasaCatalogSource, UsnoMoonSource, UsnoSolarSource, USNO_SOURCE,
};
use crate::storage::{merge_eclipses, CheckpointManager, DatasetStore, EclipseFile, MoonPhaseFile};

// ============================================================================
// Targets and reports
// ============================================================================

/// Which datasets a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchTarget {
    Moon,
    Eclipses,
    #[default]
    All,
}

impl FetchTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moon => "moon",
            Self::Eclipses => "eclipses",
            Self::All => "all",
        }
    }

    pub fn includes_moon(&self) -> bool {
        matches!(self, Self::Moon | Self::All)
    }

    pub fn includes_eclipses(&self) -> bool {
        matches!(self, Self::Eclipses | Self::All)
    }
}

impl FromStr for FetchTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "moon" | "moon-phases" => Ok(Self::Moon),
            "eclipses" => Ok(Self::Eclipses),
            "all" => Ok(Self::All),
            other => Err(Error::config(format!(
                "unknown target '{other}' (expected moon, eclipses or all)"
            ))),
        }
    }
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of [`DatasetPipeline::run`]
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Metadata of the master dataset
    pub metadata: DatasetMetadata,

    /// Files written, in write order
    pub files: Vec<PathBuf>,

    /// Failed years per source name
    pub failed_years: BTreeMap<String, Vec<i32>>,
}

impl PipelineReport {
    pub fn is_complete(&self) -> bool {
        self.failed_years.values().all(Vec::is_empty)
    }
}

/// Files produced by one collection pass, before anything is written
#[derive(Debug, Default)]
struct Collected {
    moon: Option<MoonPhaseFile>,
    solar: Option<EclipseFile>,
    lunar: Option<EclipseFile>,
    failed_years: BTreeMap<String, Vec<i32>>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Fetches, merges and persists the moon-phase and eclipse datasets
pub struct DatasetPipeline {
    config: Config,
    fetcher: Arc<HttpFetcher>,
    runner: BatchRunner,
    store: DatasetStore,
    checkpoints: CheckpointManager,
}

impl DatasetPipeline {
    /// Create a pipeline with a fetcher built from `config`
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::from_config(&config)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a pipeline around an existing fetcher
    pub fn with_fetcher(config: Config, fetcher: Arc<HttpFetcher>) -> Result<Self> {
        config.validate()?;

        let runner = BatchRunner::new(BatchConfig::from_config(&config))?;
        let store = DatasetStore::new(&config.output.data_dir)?;
        let checkpoints = CheckpointManager::new(&store.checkpoint_dir())?;

        Ok(Self {
            config,
            fetcher,
            runner,
            store,
            checkpoints,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    fn year_range(&self) -> (i32, i32) {
        (self.config.fetch.start_year, self.config.fetch.end_year)
    }

    fn base_metadata(&self) -> DatasetMetadata {
        let (start, end) = self.year_range();
        DatasetMetadata::new(start, end)
    }

    /// Fetch `target`, write its files and rebuild the master dataset
    ///
    /// Per-year failures are recorded in the output. Write failures are
    /// returned as errors.
    pub async fn run(&self, target: FetchTarget, resume: bool) -> Result<PipelineReport> {
        let base = self.base_metadata();

        tracing::info!(
            run_id = %base.run_id,
            target = %target,
            start_year = base.coverage.start_year,
            end_year = base.coverage.end_year,
            resume,
            "Starting dataset pipeline"
        );

        let collected = self.collect_files(target, &base, resume, true).await;
        let mut files = Vec::new();

        if let Some(moon) = &collected.moon {
            files.push(self.store.write_moon_phases(moon)?);
        }
        if let Some(solar) = &collected.solar {
            files.push(self.store.write_eclipses(EclipseKind::Solar, solar)?);
        }
        if let Some(lunar) = &collected.lunar {
            files.push(self.store.write_eclipses(EclipseKind::Lunar, lunar)?);
        }

        let master = self.store.assemble(base)?;
        files.push(self.store.write_dataset(&master)?);

        let report = PipelineReport {
            metadata: master.metadata,
            files,
            failed_years: collected.failed_years,
        };

        if report.is_complete() && !self.config.output.keep_checkpoints {
            for name in report.failed_years.keys() {
                if let Err(err) = self.checkpoints.delete(name) {
                    tracing::warn!(checkpoint = %name, error = %err, "Failed to delete checkpoint");
                }
            }
        }

        tracing::info!(
            run_id = %report.metadata.run_id,
            phases = report.metadata.counts.total_phases,
            solar = report.metadata.counts.solar_eclipses,
            lunar = report.metadata.counts.lunar_eclipses,
            parse_failures = report.metadata.counts.parse_failures,
            complete = report.is_complete(),
            "Dataset pipeline finished"
        );

        Ok(report)
    }

    /// Fetch `target` into memory without touching the data directory
    pub async fn collect(&self, target: FetchTarget) -> Dataset {
        let base = self.base_metadata();
        let collected = self.collect_files(target, &base, false, false).await;

        let mut dataset = Dataset {
            metadata: base,
            moon_phases: BTreeMap::new(),
            solar_eclipses: Vec::new(),
            lunar_eclipses: Vec::new(),
        };

        let parts = [
            collected.moon.map(|f| (f.metadata, Some(f.moon_phases), None, None)),
            collected.solar.map(|f| (f.metadata, None, Some(f.eclipses), None)),
            collected.lunar.map(|f| (f.metadata, None, None, Some(f.eclipses))),
        ];
        for (metadata, moon, solar, lunar) in parts.into_iter().flatten() {
            dataset.metadata.counts.parse_failures += metadata.counts.parse_failures;
            for source in &metadata.sources {
                dataset.metadata.add_source(source);
            }
            if let Some(moon) = moon {
                dataset.moon_phases = moon;
            }
            if let Some(solar) = solar {
                dataset.solar_eclipses = solar;
            }
            if let Some(lunar) = lunar {
                dataset.lunar_eclipses = lunar;
            }
        }

        dataset.refresh_counts();
        dataset
    }

    async fn collect_files(
        &self,
        target: FetchTarget,
        base: &DatasetMetadata,
        resume: bool,
        persist_progress: bool,
    ) -> Collected {
        let mut collected = Collected::default();

        if target.includes_moon() {
            let sink: &dyn ProgressSink<PhaseRecord> = if persist_progress {
                &self.checkpoints
            } else {
                &NoProgress
            };
            let source = UsnoMoonSource::new(self.fetcher.clone(), &self.config.sources.usno_base_url);
            let ledger = self.drive(&source, resume, sink).await;

            collected
                .failed_years
                .insert(source.name().to_string(), ledger.failed_years());
            collected.moon = Some(self.moon_file(ledger, base));
        }

        if target.includes_eclipses() {
            let sink: &dyn ProgressSink<EclipseRecord> = if persist_progress {
                &self.checkpoints
            } else {
                &NoProgress
            };
            let sources = &self.config.sources;

            let usno = UsnoSolarSource::new(self.fetcher.clone(), &sources.usno_base_url);
            let solar_catalog = NasaCatalogSource::new(
                self.fetcher.clone(),
                &sources.nasa_solar_catalog_url,
                EclipseKind::Solar,
            );
            let lunar_catalog = NasaCatalogSource::new(
                self.fetcher.clone(),
                &sources.nasa_lunar_catalog_url,
                EclipseKind::Lunar,
            );

            let usno_ledger = self.drive(&usno, resume, sink).await;
            let solar_ledger = self.drive(&solar_catalog, resume, sink).await;
            let lunar_ledger = self.drive(&lunar_catalog, resume, sink).await;

            for (name, ledger) in [
                (usno.name(), &usno_ledger),
                (solar_catalog.name(), &solar_ledger),
                (lunar_catalog.name(), &lunar_ledger),
            ] {
                collected
                    .failed_years
                    .insert(name.to_string(), ledger.failed_years());
            }

            collected.solar = Some(self.eclipse_file(
                EclipseKind::Solar,
                vec![usno_ledger, solar_ledger],
                base,
            ));
            collected.lunar = Some(self.eclipse_file(EclipseKind::Lunar, vec![lunar_ledger], base));
        }

        collected
    }

    /// Seed a ledger (from checkpoint on resume) and run the source
    async fn drive<S>(
        &self,
        source: &S,
        resume: bool,
        sink: &dyn ProgressSink<S::Record>,
    ) -> YearLedger<S::Record>
    where
        S: YearSource,
        S::Record: DeserializeOwned,
    {
        let ledger = if resume {
            let (start, end) = self.year_range();
            let mut ledger = self.checkpoints.load_ledger(source.name());
            ledger.retain_range(start, end);
            ledger
        } else {
            YearLedger::new()
        };

        self.runner.run(source, ledger, sink).await
    }

    fn moon_file(&self, ledger: YearLedger<PhaseRecord>, base: &DatasetMetadata) -> MoonPhaseFile {
        let mut metadata = base.clone();
        metadata.counts.years_succeeded = ledger.succeeded();
        metadata.counts.years_failed = ledger.failed();
        metadata.counts.total_phases = ledger.record_count();
        metadata.counts.parse_failures = ledger.parse_failures();
        if ledger.succeeded() > 0 {
            metadata.add_source(USNO_SOURCE);
        }

        let moon_phases = ledger
            .into_outcomes()
            .into_iter()
            .map(|(year, outcome)| {
                let record = YearRecord {
                    year,
                    success: outcome.success,
                    count: outcome.records.len(),
                    phases: outcome.records,
                    error: outcome.error,
                };
                (year, record)
            })
            .collect();

        MoonPhaseFile {
            metadata,
            moon_phases,
        }
    }

    /// Merge live ledgers (priority order) with the fallback list
    fn eclipse_file(
        &self,
        kind: EclipseKind,
        ledgers: Vec<YearLedger<EclipseRecord>>,
        base: &DatasetMetadata,
    ) -> EclipseFile {
        let (start, end) = self.year_range();
        let mut metadata = base.clone();

        let succeeded: BTreeSet<i32> = ledgers
            .iter()
            .flat_map(|l| l.outcomes().filter(|o| o.success).map(|o| o.year))
            .collect();
        metadata.counts.years_succeeded = succeeded.len();
        metadata.counts.years_failed = metadata.counts.years_requested.saturating_sub(succeeded.len());
        metadata.counts.parse_failures = ledgers.iter().map(YearLedger::parse_failures).sum();

        let mut lists: Vec<Vec<EclipseRecord>> =
            ledgers.into_iter().map(YearLedger::into_records).collect();

        if self.config.sources.use_fallback {
            let fallback = FallbackCatalog::new(self.config.sources.saros_projection);
            lists.push(fallback.eclipses(kind, start, end));
        }

        let (eclipses, report) = merge_eclipses(lists.iter().map(Vec::as_slice));

        for record in &eclipses {
            metadata.add_source(&record.source);
        }
        match kind {
            EclipseKind::Solar => metadata.counts.solar_eclipses = eclipses.len(),
            EclipseKind::Lunar => metadata.counts.lunar_eclipses = eclipses.len(),
        }

        tracing::info!(
            kind = %kind,
            kept = report.kept,
            duplicates = report.duplicates,
            "Merged eclipse sources"
        );

        EclipseFile { metadata, eclipses }
    }
}
