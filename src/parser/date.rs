//! Typed date extraction from loosely structured text
//!
//! Upstream sources publish dates as `2024 Mar 25` (catalog rows), ISO
//! `2024-03-25`, or prose such as `April 8, 2024` / `8 April 2024`. Every
//! extraction returns a [`Result`], so a line that yields no date is reported
//! as a [`DateParseError`] instead of disappearing.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::utils::error::DateParseError;

const MONTH_NAMES: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

/// A calendar date pulled out of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParsedDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl ParsedDate {
    /// Validated constructor
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, DateParseError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|_| Self { year, month, day })
            .ok_or(DateParseError::InvalidDate { year, month, day })
    }

    pub fn to_naive(&self) -> NaiveDate {
        // Only constructed through `new`, which validated the date.
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).unwrap_or_default()
    }

    /// ISO `YYYY-MM-DD`
    pub fn iso(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl From<NaiveDate> for ParsedDate {
    fn from(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// A line that did not produce a date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub line: String,
    pub error: DateParseError,
}

/// Outcome of scanning many lines
#[derive(Debug, Clone)]
pub struct ParseReport<T> {
    pub parsed: Vec<T>,
    pub failures: Vec<ParseFailure>,
}

impl<T> Default for ParseReport<T> {
    fn default() -> Self {
        Self {
            parsed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> ParseReport<T> {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn record_failure(&mut self, line: &str, error: DateParseError) {
        tracing::debug!(line = %line.trim(), error = %error, "Dropped unparseable line");
        self.failures.push(ParseFailure {
            line: line.to_string(),
            error,
        });
    }
}

/// Month number for an English month name or abbreviation
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

enum Layout {
    YearMonthDay,
    IsoNumeric,
    MonthDayYear,
    DayMonthYear,
}

fn patterns() -> &'static [(Regex, Layout)] {
    static PATTERNS: OnceLock<Vec<(Regex, Layout)>> = OnceLock::new();

    PATTERNS.get_or_init(|| {
        let build = |pattern: String| Regex::new(&pattern).expect("Invalid regex pattern");
        vec![
            (
                build(format!(r"(?i)\b(\d{{4}})\s+({MONTH_NAMES})\.?\s+(\d{{1,2}})\b")),
                Layout::YearMonthDay,
            ),
            (
                build(String::from(r"\b(\d{4})-(\d{1,2})-(\d{1,2})(?:T|\b)")),
                Layout::IsoNumeric,
            ),
            (
                build(format!(
                    r"(?i)\b({MONTH_NAMES})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
                )),
                Layout::MonthDayYear,
            ),
            (
                build(format!(
                    r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTH_NAMES})\.?,?\s+(\d{{4}})\b"
                )),
                Layout::DayMonthYear,
            ),
        ]
    })
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

fn fields(caps: &Captures<'_>, layout: &Layout) -> Option<(i32, u32, u32)> {
    match layout {
        Layout::YearMonthDay => Some((
            number(caps, 1)?,
            month_from_name(caps.get(2)?.as_str())?,
            number(caps, 3)?,
        )),
        Layout::IsoNumeric => Some((number(caps, 1)?, number(caps, 2)?, number(caps, 3)?)),
        Layout::MonthDayYear => Some((
            number(caps, 3)?,
            month_from_name(caps.get(1)?.as_str())?,
            number(caps, 2)?,
        )),
        Layout::DayMonthYear => Some((
            number(caps, 3)?,
            month_from_name(caps.get(2)?.as_str())?,
            number(caps, 1)?,
        )),
    }
}

/// Extract the first valid date from `input`
///
/// Patterns are tried in order: `YYYY Mon DD`, ISO, `Month DD, YYYY`,
/// `DD Month YYYY`. When something date-shaped matches but is not a real
/// calendar date, the first such mismatch is reported.
pub fn parse_date(input: &str) -> Result<ParsedDate, DateParseError> {
    let mut first_invalid = None;

    for (regex, layout) in patterns() {
        for caps in regex.captures_iter(input) {
            let Some((year, month, day)) = fields(&caps, layout) else {
                continue;
            };
            match ParsedDate::new(year, month, day) {
                Ok(date) => return Ok(date),
                Err(err) => {
                    first_invalid.get_or_insert(err);
                }
            }
        }
    }

    Err(first_invalid.unwrap_or_else(|| DateParseError::NoPattern {
        input: crate::utils::truncate_text(input.trim(), 80),
    }))
}

/// Parse every line of `text`, keeping the line next to its date
pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> ParseReport<(ParsedDate, &'a str)> {
    let mut report = ParseReport::default();

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        match parse_date(line) {
            Ok(date) => report.parsed.push((date, line)),
            Err(err) => report.record_failure(line, err),
        }
    }

    report
}
