//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Runtime helpers supporting the telemetry generator."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Fixed-period ticker. The first tick completes immediately; missed ticks
/// are delayed rather than burst.
#[derive(Debug)]
pub struct PeriodicTicker {
    period: Duration,
    interval: tokio::time::Interval,
}

impl PeriodicTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Named set of spawned worker tasks that are joined together.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "spawning worker");
        self.tasks.push((name, tokio::spawn(fut)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Wait for every worker to exit. A panicked worker is logged and does not
    /// prevent the remaining workers from being joined.
    pub async fn join(self) {
        for (name, handle) in self.tasks {
            if let Err(err) = handle.await {
                error!(task = name, error = %err, "worker join failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_immediately_then_on_period() {
        let mut ticker = PeriodicTicker::new(Duration::from_secs(30));
        let first = ticker.tick().await;
        let second = ticker.tick().await;
        assert_eq!(second - first, Duration::from_secs(30));
        assert_eq!(ticker.period(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn join_waits_for_all_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();
        for name in ["a", "b", "c"] {
            let counter = counter.clone();
            group.spawn(name, async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(group.len(), 3);
        assert_eq!(group.names(), vec!["a", "b", "c"]);
        group.join().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panicking_worker_does_not_block_join() {
        let mut group = TaskGroup::new();
        group.spawn("boom", async { panic!("worker failure") });
        group.spawn("fine", async {});
        group.join().await;
    }
}
