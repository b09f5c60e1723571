use super::{DateColumns, HasDateIdentity, parse_count, reader};
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// A day of counters, some of them broken down per entity
/// (region, hospital, facility, ...).
///
/// Columns named `<prefix>.<entity>.<metric>` land in `groups[entity][metric]`,
/// everything else in `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub values: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, BTreeMap<String, i64>>,
}

impl HasDateIdentity for DailyMetrics {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Metric name used when a grouped column has no trailing metric segment.
const GROUP_TOTAL: &str = "total";

fn split_grouped<'a>(prefix: &str, column: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = column.strip_prefix(prefix)?.strip_prefix('.')?;
    Some(rest.split_once('.').unwrap_or((rest, GROUP_TOTAL)))
}

/// Parse a per-day CSV whose entity breakdown columns start with `group_prefix`.
///
/// # Errors
///
/// Returns an error when the body is not CSV, has no date column, or holds
/// a non-integer in a counter column.
pub fn parse_daily(raw: &str, group_prefix: &str) -> Result<Vec<DailyMetrics>> {
    let mut rdr = reader(raw);
    let headers = rdr.headers()?.clone();
    let dates = DateColumns::locate(&headers)?;

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let mut day = DailyMetrics {
            date: dates.read(&row)?,
            values: BTreeMap::new(),
            groups: BTreeMap::new(),
        };
        for (idx, (column, value)) in headers.iter().zip(row.iter()).enumerate() {
            if dates.is_date_column(idx) {
                continue;
            }
            let Some(v) = parse_count(column, value)? else {
                continue;
            };
            match split_grouped(group_prefix, column) {
                Some((entity, metric)) => {
                    day.groups
                        .entry(entity.to_string())
                        .or_default()
                        .insert(metric.to_string(), v);
                }
                None => {
                    day.values.insert(column.to_string(), v);
                }
            }
        }
        out.push(day);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_columns() {
        let raw = "date,region.lj.todate,region.mb.todate,region.lj,region.unknown.todate,total\n\
                   2020-04-01,10,4,3,,17\n";
        let days = parse_daily(raw, "region").unwrap();
        let day = &days[0];

        assert_eq!(day.groups["lj"]["todate"], 10);
        assert_eq!(day.groups["lj"][GROUP_TOTAL], 3);
        assert_eq!(day.groups["mb"]["todate"], 4);
        assert!(!day.groups.contains_key("unknown"));
        assert_eq!(day.values["total"], 17);
    }

    #[test]
    fn test_prefix_must_match_whole_segment() {
        let raw = "date,regional.x\n2020-04-01,5\n";
        let days = parse_daily(raw, "region").unwrap();
        assert!(days[0].groups.is_empty());
        assert_eq!(days[0].values["regional.x"], 5);
    }

    #[test]
    fn test_split_date_columns_are_not_counters() {
        let raw = "year,month,day,hc.zd.examinations\n2020,4,2,12\n";
        let days = parse_daily(raw, "hc").unwrap();
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2020, 4, 2).unwrap());
        assert!(days[0].values.is_empty());
        assert_eq!(days[0].groups["zd"]["examinations"], 12);
    }

    #[test]
    fn test_ragged_rows_fail() {
        assert!(parse_daily("date,a\n2020-04-01,1,2\n", "x").is_err());
    }
}
