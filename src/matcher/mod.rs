//! Birthday matcher
//!
//! Pure functions over a loaded [`Dataset`]: which years on or after the
//! birth year had a moon phase or an eclipse on the birth day and month.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::models::{Dataset, EclipseKind, EclipseRecord, MoonPhase, YearRecord};
use crate::parser::{classify, parse_date};
use crate::utils::error::DateParseError;

/// Years per moon phase, ascending and deduplicated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseMatches {
    pub full_moon: BTreeSet<i32>,
    pub new_moon: BTreeSet<i32>,
    pub first_quarter: BTreeSet<i32>,
    pub last_quarter: BTreeSet<i32>,
}

impl PhaseMatches {
    pub fn get(&self, phase: MoonPhase) -> &BTreeSet<i32> {
        match phase {
            MoonPhase::FullMoon => &self.full_moon,
            MoonPhase::NewMoon => &self.new_moon,
            MoonPhase::FirstQuarter => &self.first_quarter,
            MoonPhase::LastQuarter => &self.last_quarter,
        }
    }

    fn get_mut(&mut self, phase: MoonPhase) -> &mut BTreeSet<i32> {
        match phase {
            MoonPhase::FullMoon => &mut self.full_moon,
            MoonPhase::NewMoon => &mut self.new_moon,
            MoonPhase::FirstQuarter => &mut self.first_quarter,
            MoonPhase::LastQuarter => &mut self.last_quarter,
        }
    }

    /// Total matches across all phases
    pub fn total(&self) -> usize {
        MoonPhase::all().iter().map(|p| self.get(*p).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// An eclipse on the birthday
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EclipseMatch {
    pub year: i32,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: EclipseKind,
    /// Classifier label, e.g. "Total Solar Eclipse"
    pub label: String,
    pub source: String,
}

/// Everything found for one birth date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayReport {
    pub birth_date: NaiveDate,
    pub moon_phases: PhaseMatches,
    pub eclipses: Vec<EclipseMatch>,
}

impl BirthdayReport {
    pub fn is_empty(&self) -> bool {
        self.moon_phases.is_empty() && self.eclipses.is_empty()
    }
}

/// Parse a `YYYY-MM-DD` birth date (other recognized date shapes also work)
pub fn parse_birth_date(input: &str) -> Result<NaiveDate, DateParseError> {
    Ok(parse_date(input)?.to_naive())
}

/// Bucket years whose phase records fall on the birth day and month
pub fn match_moon_phases(birth: NaiveDate, moon_phases: &BTreeMap<i32, YearRecord>) -> PhaseMatches {
    let mut matches = PhaseMatches::default();

    for record in moon_phases.range(birth.year()..).map(|(_, r)| r) {
        for phase in &record.phases {
            if phase.year >= birth.year() && phase.month == birth.month() && phase.day == birth.day() {
                matches.get_mut(phase.phase).insert(phase.year);
            }
        }
    }

    matches
}

/// Eclipses on the birth day and month, one per (year, category), by year
pub fn match_eclipses<'a>(
    birth: NaiveDate,
    eclipses: impl IntoIterator<Item = &'a EclipseRecord>,
) -> Vec<EclipseMatch> {
    let mut seen = HashSet::new();

    let mut matches: Vec<EclipseMatch> = eclipses
        .into_iter()
        .filter(|e| e.year >= birth.year() && e.month == birth.month() && e.day == birth.day())
        .filter(|e| seen.insert((e.year, e.kind)))
        .map(|e| EclipseMatch {
            year: e.year,
            date: e.date.clone(),
            kind: e.kind,
            label: classify(&e.description, e.kind),
            source: e.source.clone(),
        })
        .collect();

    matches.sort_by_key(|m| m.year);
    matches
}

/// Run both matchers over `dataset`
pub fn find_matches(birth: NaiveDate, dataset: &Dataset) -> BirthdayReport {
    let report = BirthdayReport {
        birth_date: birth,
        moon_phases: match_moon_phases(birth, &dataset.moon_phases),
        eclipses: match_eclipses(birth, dataset.eclipses()),
    };

    tracing::debug!(
        birth = %birth,
        phases = report.moon_phases.total(),
        eclipses = report.eclipses.len(),
        "Birthday matched"
    );

    report
}
