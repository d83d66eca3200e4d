//! Offline eclipse list
//!
//! A table of well-known eclipses between 1960 and 2100, optionally widened by
//! projecting each entry whole Saros periods forwards and backwards. Projected
//! dates can be off by a day; they only fill (year, month) slots the live
//! sources left empty.

use chrono::{Duration, NaiveDate};

use crate::models::{EclipseKind, EclipseRecord};

/// Source tag for table entries
pub const TABLE_SOURCE: &str = "fallback-table";

/// Source tag for Saros-projected entries
pub const SAROS_SOURCE: &str = "saros-projection";

/// Length of one Saros cycle in days
pub const SAROS_DAYS: f64 = 6585.3211;

const SOLAR_TABLE: &[(i32, u32, u32, &str)] = &[
    (1961, 2, 15, "Total"),
    (1963, 7, 20, "Total"),
    (1970, 3, 7, "Total"),
    (1973, 6, 30, "Total"),
    (1979, 2, 26, "Total"),
    (1991, 7, 11, "Total"),
    (1994, 5, 10, "Annular"),
    (1999, 8, 11, "Total"),
    (2001, 6, 21, "Total"),
    (2006, 3, 29, "Total"),
    (2009, 7, 22, "Total"),
    (2012, 5, 20, "Annular"),
    (2013, 11, 3, "Hybrid"),
    (2015, 3, 20, "Total"),
    (2016, 3, 9, "Total"),
    (2017, 8, 21, "Total"),
    (2019, 7, 2, "Total"),
    (2020, 6, 21, "Annular"),
    (2020, 12, 14, "Total"),
    (2021, 6, 10, "Annular"),
    (2023, 4, 20, "Hybrid"),
    (2023, 10, 14, "Annular"),
    (2024, 4, 8, "Total"),
    (2024, 10, 2, "Annular"),
    (2026, 8, 12, "Total"),
    (2027, 8, 2, "Total"),
    (2028, 7, 22, "Total"),
    (2030, 6, 1, "Annular"),
    (2031, 11, 14, "Hybrid"),
    (2033, 3, 30, "Total"),
    (2035, 9, 2, "Total"),
    (2037, 7, 13, "Total"),
    (2041, 4, 30, "Total"),
    (2044, 8, 23, "Total"),
    (2045, 8, 12, "Total"),
    (2052, 3, 30, "Total"),
    (2078, 5, 11, "Total"),
    (2079, 5, 1, "Total"),
    (2099, 9, 14, "Total"),
];

const LUNAR_TABLE: &[(i32, u32, u32, &str)] = &[
    (1960, 3, 13, "Total"),
    (1964, 12, 19, "Total"),
    (1968, 4, 13, "Total"),
    (1971, 8, 6, "Total"),
    (1982, 7, 6, "Total"),
    (1989, 8, 17, "Total"),
    (1997, 9, 16, "Total"),
    (2000, 1, 21, "Total"),
    (2000, 7, 16, "Total"),
    (2003, 11, 9, "Total"),
    (2007, 3, 3, "Total"),
    (2008, 2, 21, "Total"),
    (2010, 12, 21, "Total"),
    (2011, 6, 15, "Total"),
    (2014, 4, 15, "Total"),
    (2015, 9, 28, "Total"),
    (2018, 1, 31, "Total"),
    (2018, 7, 27, "Total"),
    (2019, 1, 21, "Total"),
    (2021, 5, 26, "Total"),
    (2021, 11, 19, "Partial"),
    (2022, 5, 16, "Total"),
    (2022, 11, 8, "Total"),
    (2023, 5, 5, "Penumbral"),
    (2024, 3, 25, "Penumbral"),
    (2024, 9, 18, "Partial"),
    (2025, 3, 14, "Total"),
    (2025, 9, 7, "Total"),
    (2026, 3, 3, "Total"),
    (2028, 12, 31, "Total"),
    (2029, 6, 26, "Total"),
    (2029, 12, 20, "Total"),
    (2032, 4, 25, "Total"),
    (2033, 4, 14, "Total"),
];

/// Hardcoded eclipses with optional Saros projection
#[derive(Debug, Clone, Copy)]
pub struct FallbackCatalog {
    projection: bool,
}

impl FallbackCatalog {
    pub fn new(projection: bool) -> Self {
        Self { projection }
    }

    fn table(kind: EclipseKind) -> &'static [(i32, u32, u32, &'static str)] {
        match kind {
            EclipseKind::Solar => SOLAR_TABLE,
            EclipseKind::Lunar => LUNAR_TABLE,
        }
    }

    /// Table entries inside `start..=end`
    pub fn table_entries(&self, kind: EclipseKind, start: i32, end: i32) -> Vec<EclipseRecord> {
        Self::table(kind)
            .iter()
            .filter(|(year, ..)| (start..=end).contains(year))
            .filter_map(|&(year, month, day, subtype)| {
                let date = NaiveDate::from_ymd_opt(year, month, day)?;
                let description = format!("{subtype} {} Eclipse", kind.title());
                Some(EclipseRecord::new(date, kind, description, TABLE_SOURCE))
            })
            .collect()
    }

    /// Saros projections of every table entry that land inside `start..=end`
    pub fn projected_entries(&self, kind: EclipseKind, start: i32, end: i32) -> Vec<EclipseRecord> {
        let Some(range_start) = NaiveDate::from_ymd_opt(start, 1, 1) else {
            return Vec::new();
        };
        let Some(range_end) = NaiveDate::from_ymd_opt(end, 12, 31) else {
            return Vec::new();
        };

        let mut records = Vec::new();

        for &(year, month, day, subtype) in Self::table(kind) {
            let Some(base) = NaiveDate::from_ymd_opt(year, month, day) else {
                continue;
            };
            let description = format!("{subtype} {} Eclipse (Saros projection)", kind.title());

            for direction in [-1i64, 1] {
                for cycle in 1i64.. {
                    let offset = (cycle as f64 * SAROS_DAYS).round() as i64 * direction;
                    let Some(date) = base.checked_add_signed(Duration::days(offset)) else {
                        break;
                    };
                    // Walking away from the range ends the walk; walking toward it skips
                    let past_end = if direction > 0 { date > range_end } else { date < range_start };
                    if past_end {
                        break;
                    }
                    if date < range_start || date > range_end {
                        continue;
                    }
                    records.push(EclipseRecord::new(date, kind, description.clone(), SAROS_SOURCE));
                }
            }
        }

        records.sort_by_key(EclipseRecord::sort_key);
        records
    }

    /// Fallback list for `kind`: table first, then projections when enabled
    pub fn eclipses(&self, kind: EclipseKind, start: i32, end: i32) -> Vec<EclipseRecord> {
        let mut records = self.table_entries(kind, start, end);
        if self.projection {
            records.extend(self.projected_entries(kind, start, end));
        }
        records
    }
}
