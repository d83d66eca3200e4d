// Core data structures for the moon-phase and eclipse dataset

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::utils::error::ParseError;

/// Named point in the lunar cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoonPhase {
    #[serde(rename = "New Moon")]
    NewMoon,
    #[serde(rename = "First Quarter")]
    FirstQuarter,
    #[serde(rename = "Full Moon")]
    FullMoon,
    #[serde(rename = "Last Quarter", alias = "Third Quarter")]
    LastQuarter,
}

impl MoonPhase {
    /// Parse an upstream phase name
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.trim().to_lowercase().as_str() {
            "new moon" => Ok(Self::NewMoon),
            "first quarter" => Ok(Self::FirstQuarter),
            "full moon" => Ok(Self::FullMoon),
            "last quarter" | "third quarter" => Ok(Self::LastQuarter),
            _ => Err(ParseError::UnknownPhase(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMoon => "New Moon",
            Self::FirstQuarter => "First Quarter",
            Self::FullMoon => "Full Moon",
            Self::LastQuarter => "Last Quarter",
        }
    }

    pub fn all() -> [Self; 4] {
        [
            Self::NewMoon,
            Self::FirstQuarter,
            Self::FullMoon,
            Self::LastQuarter,
        ]
    }
}

impl std::fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One moon phase event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub phase: MoonPhase,
    pub time: String, // "HH:MM" UT as published
}

impl PhaseRecord {
    /// ISO `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Calendar date, if the record holds a real date
    pub fn naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Solar or lunar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EclipseKind {
    Solar,
    Lunar,
}

impl EclipseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Lunar => "lunar",
        }
    }

    /// Title-case name used in labels
    pub fn title(&self) -> &'static str {
        match self {
            Self::Solar => "Solar",
            Self::Lunar => "Lunar",
        }
    }

    /// Parse from string ("solar" / "lunar", case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "solar" => Some(Self::Solar),
            "lunar" => Some(Self::Lunar),
            _ => None,
        }
    }
}

impl std::fmt::Display for EclipseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One eclipse, normalized across sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EclipseRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub date: String, // YYYY-MM-DD
    #[serde(rename = "type")]
    pub kind: EclipseKind,
    pub description: String,
    pub source: String,
}

impl EclipseRecord {
    /// Build a record from a calendar date
    pub fn new(
        date: NaiveDate,
        kind: EclipseKind,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        use chrono::Datelike;

        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            date: date.format("%Y-%m-%d").to_string(),
            kind,
            description: description.into(),
            source: source.into(),
        }
    }

    /// Dedup key used when merging sources
    pub fn merge_key(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    /// Chronological sort key
    pub fn sort_key(&self) -> (i32, u32, u32) {
        (self.year, self.month, self.day)
    }
}

/// Moon phases for one year as persisted in the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    pub year: i32,
    pub success: bool,
    pub phases: Vec<PhaseRecord>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// First and last year of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub start_year: i32,
    pub end_year: i32,
}

impl Coverage {
    /// Number of years in the range
    pub fn year_count(&self) -> usize {
        (self.end_year - self.start_year + 1).max(0) as usize
    }

    /// Smallest range holding both
    pub fn union(self, other: Coverage) -> Coverage {
        Coverage {
            start_year: self.start_year.min(other.start_year),
            end_year: self.end_year.max(other.end_year),
        }
    }
}

/// Tallies recorded with each dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetCounts {
    pub years_requested: usize,
    pub years_succeeded: usize,
    pub years_failed: usize,
    pub total_phases: usize,
    pub solar_eclipses: usize,
    pub lunar_eclipses: usize,
    pub parse_failures: usize,
}

/// Metadata block written at the top of every dataset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub coverage: Coverage,
    pub counts: DatasetCounts,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl DatasetMetadata {
    /// Start metadata for a run over `start..=end`
    pub fn new(start_year: i32, end_year: i32) -> Self {
        let now = Utc::now();
        let coverage = Coverage {
            start_year,
            end_year,
        };
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            generated_at: now,
            coverage,
            counts: DatasetCounts {
                years_requested: coverage.year_count(),
                ..Default::default()
            },
            sources: Vec::new(),
        }
    }

    /// Widen coverage to include `other`; `years_requested` follows
    pub fn extend_coverage(&mut self, other: Coverage) {
        self.coverage = self.coverage.union(other);
        self.counts.years_requested = self.coverage.year_count();
    }

    /// Add a source name once
    pub fn add_source(&mut self, name: &str) {
        if !self.sources.iter().any(|s| s == name) {
            self.sources.push(name.to_string());
        }
    }
}

/// The consolidated dataset consumed by the lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    #[serde(default)]
    pub moon_phases: BTreeMap<i32, YearRecord>,
    #[serde(default)]
    pub solar_eclipses: Vec<EclipseRecord>,
    #[serde(default)]
    pub lunar_eclipses: Vec<EclipseRecord>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(1960, 2100)
    }
}

impl Dataset {
    /// Empty dataset covering `start..=end`
    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            metadata: DatasetMetadata::new(start_year, end_year),
            moon_phases: BTreeMap::new(),
            solar_eclipses: Vec::new(),
            lunar_eclipses: Vec::new(),
        }
    }

    /// Recompute the record counts from the collections
    pub fn refresh_counts(&mut self) {
        let counts = &mut self.metadata.counts;
        counts.years_succeeded = self.moon_phases.values().filter(|r| r.success).count();
        counts.years_failed = self.moon_phases.values().filter(|r| !r.success).count();
        counts.total_phases = self.moon_phases.values().map(|r| r.count).sum();
        counts.solar_eclipses = self.solar_eclipses.len();
        counts.lunar_eclipses = self.lunar_eclipses.len();
        self.metadata.generated_at = Utc::now();
    }

    /// Both eclipse lists, solar first
    pub fn eclipses(&self) -> impl Iterator<Item = &EclipseRecord> {
        self.solar_eclipses.iter().chain(self.lunar_eclipses.iter())
    }
}
