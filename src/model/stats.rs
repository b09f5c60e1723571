use super::{DateColumns, HasDateIdentity, parse_count, reader};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the national daily summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsDay {
    pub date: NaiveDate,
    #[serde(rename = "dayFromStart", skip_serializing_if = "Option::is_none")]
    pub day_from_start: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(flatten)]
    pub values: BTreeMap<String, i64>,
}

impl HasDateIdentity for StatsDay {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// One row of the weekly summary, dated by the first day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyStats {
    pub week: String,
    pub date: NaiveDate,
    #[serde(rename = "to", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(flatten)]
    pub values: BTreeMap<String, i64>,
}

impl HasDateIdentity for WeeklyStats {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Parse `stats.csv`.
///
/// # Errors
///
/// Returns an error when the body is not CSV, has no date column, or holds
/// a non-integer in a numeric column.
pub fn parse_stats(raw: &str) -> Result<Vec<StatsDay>> {
    let mut rdr = reader(raw);
    let headers = rdr.headers()?.clone();
    let dates = DateColumns::locate(&headers)?;

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let mut day = StatsDay {
            date: dates.read(&row)?,
            day_from_start: None,
            phase: None,
            values: BTreeMap::new(),
        };
        for (idx, (column, value)) in headers.iter().zip(row.iter()).enumerate() {
            if dates.is_date_column(idx) {
                continue;
            }
            match column {
                "phase" => day.phase = (!value.is_empty()).then(|| value.to_string()),
                "day" => {
                    day.day_from_start = parse_count(column, value)?
                        .map(i32::try_from)
                        .transpose()
                        .map_err(|_| Error::Custom(format!("day `{value}` out of range")))?;
                }
                _ => {
                    if let Some(v) = parse_count(column, value)? {
                        day.values.insert(column.to_string(), v);
                    }
                }
            }
        }
        out.push(day);
    }
    Ok(out)
}

/// Parse `stats-weekly.csv`.
///
/// # Errors
///
/// Same failure modes as [`parse_stats`], plus a missing `week` column.
pub fn parse_weekly_stats(raw: &str) -> Result<Vec<WeeklyStats>> {
    let mut rdr = reader(raw);
    let headers = rdr.headers()?.clone();
    let dates = DateColumns::locate(&headers)?;
    let week_idx = headers
        .iter()
        .position(|h| h == "week")
        .ok_or_else(|| Error::Custom("no `week` column".to_string()))?;

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let mut week = WeeklyStats {
            week: row.get(week_idx).unwrap_or_default().to_string(),
            date: dates.read(&row)?,
            date_to: None,
            values: BTreeMap::new(),
        };
        for (idx, (column, value)) in headers.iter().zip(row.iter()).enumerate() {
            if idx == week_idx || dates.is_date_column(idx) {
                continue;
            }
            if column == "date.to" {
                if !value.is_empty() {
                    week.date_to = Some(NaiveDate::parse_from_str(value, "%Y-%m-%d")?);
                }
            } else if let Some(v) = parse_count(column, value)? {
                week.values.insert(column.to_string(), v);
            }
        }
        out.push(week);
    }
    Ok(out)
}
