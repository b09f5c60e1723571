use super::notifier::Notifier;
use crate::error::{Result, lock_poisoned_error};
use crate::metrics::Metrics;
use std::collections::BTreeSet;
use std::sync::RwLock;
use tracing::{info, warn};

/// What a fetch outcome did to a resource's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    StillDown,
    Recovered,
    StillHealthy,
}

/// Per-resource up/down state. A resource is down exactly while its id is
/// in the set; each resource moves independently of the others.
pub struct HealthTracker {
    down: RwLock<BTreeSet<String>>,
    notifier: Notifier,
    metrics: Metrics,
}

impl HealthTracker {
    #[must_use]
    pub fn new(notifier: Notifier, metrics: Metrics) -> Self {
        Self {
            down: RwLock::new(BTreeSet::new()),
            notifier,
            metrics,
        }
    }

    /// Feed a failed fetch. Every failure while down is reported again.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock was poisoned.
    pub fn record_failure(&self, resource: &str, url: &str, reason: &str) -> Result<Transition> {
        let newly_down = self
            .down
            .write()
            .map_err(|_| lock_poisoned_error("health"))?
            .insert(resource.to_string());

        if newly_down {
            warn!("{} is down: {}", resource, reason);
            self.metrics.mark_down(resource);
            self.notifier
                .notify(format!("Started failing {url} because {reason}"));
            Ok(Transition::WentDown)
        } else {
            warn!("{} still down: {}", resource, reason);
            self.notifier
                .notify(format!("Failed retrieving {url} because {reason}"));
            Ok(Transition::StillDown)
        }
    }

    /// Feed a successful fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock was poisoned.
    pub fn record_success(&self, resource: &str, url: &str) -> Result<Transition> {
        let recovered = self
            .down
            .write()
            .map_err(|_| lock_poisoned_error("health"))?
            .remove(resource);

        if recovered {
            info!("{} recovered", resource);
            self.metrics.mark_up(resource);
            self.notifier
                .notify(format!("Started retrieving data from {url}"));
            Ok(Transition::Recovered)
        } else {
            Ok(Transition::StillHealthy)
        }
    }

    /// Ids of resources currently down, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock was poisoned.
    pub fn down(&self) -> Result<Vec<String>> {
        Ok(self
            .down
            .read()
            .map_err(|_| lock_poisoned_error("health"))?
            .iter()
            .cloned()
            .collect())
    }

    #[must_use]
    pub fn is_down(&self, resource: &str) -> bool {
        self.down
            .read()
            .is_ok_and(|down| down.contains(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const URL: &str = "https://origin/regions.csv";

    fn tracker() -> (HealthTracker, Metrics, mpsc::Receiver<String>) {
        let (notifier, rx) = Notifier::channel(16);
        let metrics = Metrics::new().unwrap();
        (HealthTracker::new(notifier, metrics.clone()), metrics, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_healthy_success_is_silent() {
        let (health, metrics, mut rx) = tracker();
        assert_eq!(health.record_success("regions", URL).unwrap(), Transition::StillHealthy);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(metrics.down_gauge("regions"), 0);
    }

    #[test]
    fn test_two_failures_one_transition() {
        let (health, metrics, mut rx) = tracker();

        assert_eq!(health.record_failure("regions", URL, "Service Unavailable").unwrap(), Transition::WentDown);
        assert_eq!(health.record_failure("regions", URL, "Service Unavailable").unwrap(), Transition::StillDown);

        assert_eq!(
            drain(&mut rx),
            vec![
                format!("Started failing {URL} because Service Unavailable"),
                format!("Failed retrieving {URL} because Service Unavailable"),
            ]
        );
        assert_eq!(metrics.down_gauge("regions"), 1);
        assert!(health.is_down("regions"));
    }

    #[test]
    fn test_recovery_notifies_once() {
        let (health, metrics, mut rx) = tracker();
        health.record_failure("regions", URL, "boom").unwrap();
        drain(&mut rx);

        assert_eq!(health.record_success("regions", URL).unwrap(), Transition::Recovered);
        assert_eq!(health.record_success("regions", URL).unwrap(), Transition::StillHealthy);

        assert_eq!(drain(&mut rx), vec![format!("Started retrieving data from {URL}")]);
        assert_eq!(metrics.down_gauge("regions"), 0);
        assert!(health.down().unwrap().is_empty());
    }

    #[test]
    fn test_resources_are_independent() {
        let (health, metrics, _rx) = tracker();
        health.record_failure("regions", URL, "boom").unwrap();

        assert!(!health.is_down("stats"));
        assert_eq!(metrics.down_gauge("stats"), 0);
        assert_eq!(health.down().unwrap(), vec!["regions".to_string()]);
    }
}
