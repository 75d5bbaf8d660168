//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "New-data notification hook used by the generator."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Emitted periodically while the generator runs to tell listeners that new
/// readings may be available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataEvent {
    /// Monotonic within one generator run, starting at 1.
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
}

/// Delivery side of the notify task. Implementations must not block.
#[async_trait]
pub trait DataNotifier: Send + Sync + std::fmt::Debug {
    async fn notify(&self, event: NewDataEvent);
}

/// Fans events out to in-process subscribers (e.g. a websocket layer).
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<NewDataEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NewDataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl DataNotifier for BroadcastNotifier {
    async fn notify(&self, event: NewDataEvent) {
        // No subscribers is the normal state for a headless daemon.
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "new-data event broadcast"),
            Err(_) => debug!("new-data event dropped, no subscribers"),
        }
    }
}

/// Writes each event to the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl DataNotifier for LogNotifier {
    async fn notify(&self, event: NewDataEvent) {
        info!(sequence = event.sequence, emitted_at = %event.emitted_at, "new data available");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let notifier = BroadcastNotifier::new(4);
        let mut rx = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);
        let event = NewDataEvent {
            sequence: 1,
            emitted_at: Utc::now(),
        };
        notifier.notify(event.clone()).await;
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn notify_without_subscribers_is_harmless() {
        let notifier = BroadcastNotifier::default();
        notifier
            .notify(NewDataEvent {
                sequence: 7,
                emitted_at: Utc::now(),
            })
            .await;
        LogNotifier
            .notify(NewDataEvent {
                sequence: 8,
                emitted_at: Utc::now(),
            })
            .await;
    }
}
