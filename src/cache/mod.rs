pub mod config;
pub mod fetcher;
pub mod health;
pub mod notifier;
pub mod read_path;
pub mod registry;
pub mod scheduler;
pub mod slot;
pub mod snapshot;

pub use config::CacheConfig;
pub use fetcher::{FetchError, FetchOutcome, Fetcher};
pub use health::{HealthTracker, Transition};
pub use notifier::{AlertSink, LogSink, Notifier, WebhookSink, spawn_notifier};
pub use read_path::{CachedResponse, DataFilter, read};
pub use registry::{RefreshTarget, Refreshed, Registry, ResourceEntry, ids};
pub use scheduler::{CycleReport, RefreshScheduler, SchedulerHandle};
pub use slot::CacheSlot;
pub use snapshot::Snapshot;
