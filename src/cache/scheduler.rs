use super::fetcher::Fetcher;
use super::health::HealthTracker;
use super::registry::{RefreshTarget, Refreshed};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Tally of one refresh cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub published: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Keeps every registered resource fresh on a fixed period.
pub struct RefreshScheduler {
    targets: Vec<Arc<dyn RefreshTarget>>,
    fetcher: Fetcher,
    health: Arc<HealthTracker>,
    period: Duration,
}

/// Running scheduler. Dropping the handle stops the loop as well, just without waiting.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to exit and wait for it. A cycle already in flight
    /// runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!("refresh loop ended abnormally: {}", e);
        }
    }
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(
        targets: Vec<Arc<dyn RefreshTarget>>,
        fetcher: Fetcher,
        health: Arc<HealthTracker>,
        period: Duration,
    ) -> Self {
        Self {
            targets,
            fetcher,
            health,
            period,
        }
    }

    /// Spawn the refresh loop. The first cycle starts immediately.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run_refresh_loop(shutdown_rx).await;
        });
        SchedulerHandle { shutdown_tx, task }
    }

    async fn run_refresh_loop(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            "refresh loop started ({} resources, every {}s)",
            self.targets.len(),
            self.period.as_secs()
        );

        let mut ticker = interval(self.period);
        // a cycle that overruns the period is followed straight away by the next
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("refresh loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Refresh every resource concurrently and wait for all of them.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        debug!("refresh cycle starting");

        let results = join_all(self.targets.iter().map(|target| self.refresh_one(target.as_ref()))).await;

        let mut report = CycleReport::default();
        for result in results {
            match result {
                Some(Refreshed::Published { .. }) => report.published += 1,
                Some(Refreshed::Unchanged) => report.unchanged += 1,
                None => report.failed += 1,
            }
        }

        info!(
            "refresh cycle done in {:.2}s: {} updated, {} unchanged, {} failed",
            started.elapsed().as_secs_f64(),
            report.published,
            report.unchanged,
            report.failed
        );
        report
    }

    async fn refresh_one(&self, target: &dyn RefreshTarget) -> Option<Refreshed> {
        match target.refresh(&self.fetcher).await {
            Ok(refreshed) => {
                if let Err(e) = self.health.record_success(target.id(), target.url()) {
                    error!("health update for {} failed: {}", target.id(), e);
                }
                Some(refreshed)
            }
            Err(reason) => {
                if let Err(e) = self
                    .health
                    .record_failure(target.id(), target.url(), &reason.to_string())
                {
                    error!("health update for {} failed: {}", target.id(), e);
                }
                None
            }
        }
    }
}
