use super::slot::CacheSlot;
use crate::metrics::{Endpoint, Metrics};
use crate::model::CachedRecord;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;

/// Optional inclusive date bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DataFilter {
    #[must_use]
    pub const fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Answer to a read. `data` is `None` when the caller already holds the
/// current version; `raw_body`, `token` and `timestamp` always describe the
/// full cached payload, never the filtered view.
#[derive(Debug, Clone)]
pub struct CachedResponse<T> {
    pub data: Option<Vec<T>>,
    pub raw_body: Arc<str>,
    pub token: Option<String>,
    pub timestamp: Option<i64>,
}

impl<T> CachedResponse<T> {
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.data.is_none()
    }
}

/// Records the read's duration when dropped, flagged as an exception if
/// the read is unwinding.
struct ReadTimer<'a> {
    resource: &'a str,
    metrics: &'a Metrics,
    started: Instant,
}

impl Drop for ReadTimer<'_> {
    fn drop(&mut self) {
        self.metrics.observe_request(
            Endpoint::Serve(self.resource),
            self.started.elapsed(),
            std::thread::panicking(),
        );
    }
}

/// Serve one read from the slot. No I/O happens here.
pub fn read<T: CachedRecord>(
    resource: &str,
    slot: &CacheSlot<T>,
    metrics: &Metrics,
    caller_token: Option<&str>,
    filter: &DataFilter,
) -> CachedResponse<T> {
    let _timer = ReadTimer {
        resource,
        metrics,
        started: Instant::now(),
    };

    let snapshot = slot.read();
    let data = if snapshot.matches(caller_token) {
        None
    } else {
        metrics.cache_miss(resource);
        Some(T::select(&snapshot.records, filter))
    };

    CachedResponse {
        data,
        raw_body: snapshot.raw_body.clone(),
        token: snapshot.token.clone(),
        timestamp: snapshot.timestamp,
    }
}
