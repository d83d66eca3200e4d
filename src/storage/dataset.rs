//! Final dataset files
//!
//! Layout under the data directory:
//!
//! ```text
//! data/
//! ├── moon-phases.json        { metadata, moonPhases }
//! ├── solar-eclipses.json     { metadata, eclipses }
//! ├── lunar-eclipses.json     { metadata, eclipses }
//! ├── cosmic-dataset.json     { metadata, moonPhases, solarEclipses, lunarEclipses }
//! └── checkpoints/
//! ```
//!
//! Every file is pretty-printed JSON written to a temp file and renamed into
//! place, so a reader never sees a half-written dataset.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{Dataset, DatasetMetadata, EclipseKind, EclipseRecord, YearRecord};
use crate::utils::write_json_atomic;

pub const MOON_PHASES_FILE: &str = "moon-phases.json";
pub const SOLAR_ECLIPSES_FILE: &str = "solar-eclipses.json";
pub const LUNAR_ECLIPSES_FILE: &str = "lunar-eclipses.json";
pub const DATASET_FILE: &str = "cosmic-dataset.json";
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// `moon-phases.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoonPhaseFile {
    pub metadata: DatasetMetadata,
    pub moon_phases: BTreeMap<i32, YearRecord>,
}

/// `solar-eclipses.json` / `lunar-eclipses.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EclipseFile {
    pub metadata: DatasetMetadata,
    pub eclipses: Vec<EclipseRecord>,
}

/// Read a master dataset from an arbitrary path
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path)
        .map_err(|e| Error::with_source(format!("Failed to open {}", path.display()), e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Reads and writes dataset files in one directory
#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    /// Open `dir`, creating it if needed
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Directory for checkpoint files
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_DIR)
    }

    pub fn eclipse_file_name(kind: EclipseKind) -> &'static str {
        match kind {
            EclipseKind::Solar => SOLAR_ECLIPSES_FILE,
            EclipseKind::Lunar => LUNAR_ECLIPSES_FILE,
        }
    }

    /// Atomically write `value` as pretty JSON
    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(file_name);
        write_json_atomic(&path, value)
            .map_err(|e| Error::with_source(format!("Failed to write {}", path.display()), e))?;

        tracing::info!(path = %path.display(), "Wrote dataset file");
        Ok(path)
    }

    /// Read a JSON file; `None` when it does not exist
    pub fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>> {
        let path = self.path(file_name);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)
            .map_err(|e| Error::with_source(format!("Failed to open {}", path.display()), e))?;
        let value = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(value))
    }

    pub fn write_moon_phases(&self, file: &MoonPhaseFile) -> Result<PathBuf> {
        self.write_json(MOON_PHASES_FILE, file)
    }

    pub fn load_moon_phases(&self) -> Result<Option<MoonPhaseFile>> {
        self.read_json(MOON_PHASES_FILE)
    }

    pub fn write_eclipses(&self, kind: EclipseKind, file: &EclipseFile) -> Result<PathBuf> {
        self.write_json(Self::eclipse_file_name(kind), file)
    }

    pub fn load_eclipses(&self, kind: EclipseKind) -> Result<Option<EclipseFile>> {
        self.read_json(Self::eclipse_file_name(kind))
    }

    pub fn write_dataset(&self, dataset: &Dataset) -> Result<PathBuf> {
        self.write_json(DATASET_FILE, dataset)
    }

    pub fn load_dataset(&self) -> Result<Option<Dataset>> {
        self.read_json(DATASET_FILE)
    }

    /// Build the master dataset from whatever per-domain files exist
    ///
    /// `metadata` is the current run's metadata. Coverage widens to every
    /// component file's range, counts are recomputed, and sources and parse
    /// failures are combined from the component files.
    pub fn assemble(&self, metadata: DatasetMetadata) -> Result<Dataset> {
        let mut dataset = Dataset {
            metadata,
            moon_phases: BTreeMap::new(),
            solar_eclipses: Vec::new(),
            lunar_eclipses: Vec::new(),
        };
        dataset.metadata.counts.parse_failures = 0;

        fn absorb(meta: &DatasetMetadata, dataset: &mut Dataset) {
            if meta.coverage != dataset.metadata.coverage {
                tracing::debug!(
                    file_start = meta.coverage.start_year,
                    file_end = meta.coverage.end_year,
                    "Component file covers other years, widening master coverage"
                );
            }
            dataset.metadata.extend_coverage(meta.coverage);
            dataset.metadata.counts.parse_failures += meta.counts.parse_failures;
            for source in &meta.sources {
                dataset.metadata.add_source(source);
            }
        }

        if let Some(file) = self.load_moon_phases()? {
            absorb(&file.metadata, &mut dataset);
            dataset.moon_phases = file.moon_phases;
        }
        if let Some(file) = self.load_eclipses(EclipseKind::Solar)? {
            absorb(&file.metadata, &mut dataset);
            dataset.solar_eclipses = file.eclipses;
        }
        if let Some(file) = self.load_eclipses(EclipseKind::Lunar)? {
            absorb(&file.metadata, &mut dataset);
            dataset.lunar_eclipses = file.eclipses;
        }

        dataset.refresh_counts();
        Ok(dataset)
    }
}
