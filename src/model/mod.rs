//! Record types served by the cache and the pure CSV parsers that build them.
//!
//! Dated records implement [`HasDateIdentity`]; every record implements
//! [`CachedRecord`], whose `select` either range-filters by date or passes
//! the rows through untouched. The choice is made per type at compile time.
pub mod daily;
pub mod directory;
pub mod stats;

pub use daily::{DailyMetrics, parse_daily};
pub use directory::{Hospital, Municipality, RetirementHome, parse_directory};
pub use stats::{StatsDay, WeeklyStats, parse_stats, parse_weekly_stats};

use crate::cache::DataFilter;
use crate::error::{Error, Result};
use chrono::NaiveDate;

/// A record that belongs to exactly one calendar day.
pub trait HasDateIdentity {
    fn date(&self) -> NaiveDate;
}

/// Anything a cache slot can hold.
pub trait CachedRecord: Clone + Send + Sync + 'static {
    /// Apply `filter` to `records`, preserving order.
    fn select(records: &[Self], filter: &DataFilter) -> Vec<Self>;
}

/// Inclusive date-range selection over dated records.
#[must_use]
pub fn filter_by_date<T: HasDateIdentity + Clone>(records: &[T], filter: &DataFilter) -> Vec<T> {
    records
        .iter()
        .filter(|r| filter.contains(r.date()))
        .cloned()
        .collect()
}

macro_rules! dated_records {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::model::CachedRecord for $ty {
                fn select(records: &[Self], filter: &$crate::cache::DataFilter) -> Vec<Self> {
                    $crate::model::filter_by_date(records, filter)
                }
            }
        )*
    };
}

macro_rules! undated_records {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::model::CachedRecord for $ty {
                fn select(records: &[Self], _filter: &$crate::cache::DataFilter) -> Vec<Self> {
                    records.to_vec()
                }
            }
        )*
    };
}

dated_records!(StatsDay, WeeklyStats, DailyMetrics);
undated_records!(Hospital, Municipality, RetirementHome);

/// Where a row keeps its date.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DateColumns {
    Iso(usize),
    Split { year: usize, month: usize, day: usize },
}

impl DateColumns {
    /// Prefer a `date` column, fall back to `year`/`month`/`day`.
    pub(crate) fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        if let Some(idx) = find("date") {
            return Ok(Self::Iso(idx));
        }
        match (find("year"), find("month"), find("day")) {
            (Some(year), Some(month), Some(day)) => Ok(Self::Split { year, month, day }),
            _ => Err(Error::Custom(
                "no date column (expected `date` or `year`,`month`,`day`)".to_string(),
            )),
        }
    }

    pub(crate) fn is_date_column(self, idx: usize) -> bool {
        match self {
            Self::Iso(i) => i == idx,
            Self::Split { year, month, day } => idx == year || idx == month || idx == day,
        }
    }

    pub(crate) fn read(self, row: &csv::StringRecord) -> Result<NaiveDate> {
        match self {
            Self::Iso(idx) => Ok(NaiveDate::parse_from_str(cell(row, idx)?, "%Y-%m-%d")?),
            Self::Split { year, month, day } => {
                let y: i32 = parse_cell(row, year)?;
                let m: u32 = parse_cell(row, month)?;
                let d: u32 = parse_cell(row, day)?;
                NaiveDate::from_ymd_opt(y, m, d)
                    .ok_or_else(|| Error::Custom(format!("invalid date {y}-{m}-{d}")))
            }
        }
    }
}

pub(crate) fn reader(raw: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes())
}

fn cell(row: &csv::StringRecord, idx: usize) -> Result<&str> {
    row.get(idx)
        .ok_or_else(|| Error::Custom(format!("row has no column {idx}")))
}

fn parse_cell<V: std::str::FromStr>(row: &csv::StringRecord, idx: usize) -> Result<V> {
    let raw = cell(row, idx)?;
    raw.parse()
        .map_err(|_| Error::Custom(format!("invalid value `{raw}` in column {idx}")))
}

/// Empty cells mean "no value", anything else must be an integer.
pub(crate) fn parse_count(column: &str, raw: &str) -> Result<Option<i64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| Error::Custom(format!("invalid value `{raw}` in column `{column}`")))
}
