use super::snapshot::Snapshot;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Single-writer, many-reader holder of one resource's current [`Snapshot`].
///
/// Reads are wait-free loads of an `Arc`; a publish swaps the whole
/// snapshot, so a reader sees either the old one or the new one.
#[derive(Debug)]
pub struct CacheSlot<T> {
    current: ArcSwap<Snapshot<T>>,
    published: watch::Sender<bool>,
    generation: AtomicU64,
}

impl<T> CacheSlot<T> {
    #[must_use]
    pub fn new() -> Self {
        let (published, _) = watch::channel(false);
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            published,
            generation: AtomicU64::new(0),
        }
    }

    /// Current snapshot. Never blocks.
    #[must_use]
    pub fn read(&self) -> Arc<Snapshot<T>> {
        self.current.load_full()
    }

    /// Replace the visible snapshot.
    pub fn publish(&self, snapshot: Snapshot<T>) {
        self.current.store(Arc::new(snapshot));
        self.generation.fetch_add(1, Ordering::Release);
        self.published.send_replace(true);
    }

    /// Number of publishes so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_populated(&self) -> bool {
        *self.published.borrow()
    }

    /// Resolve once the first snapshot has been published. Startup only;
    /// the request path uses [`CacheSlot::read`].
    pub async fn wait_first(&self) -> Arc<Snapshot<T>> {
        let mut rx = self.published.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|populated| *populated).await;
        self.read()
    }
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
