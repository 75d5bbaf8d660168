//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Shared cancellation signal for periodic workers."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use tokio::sync::watch;

/// Create a linked cancellation source and token.
pub fn cancellation() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelToken { rx })
}

/// Owning side of a cancellation signal. Dropping it also cancels.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Cheap, cloneable view of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once cancellation is signalled or the source is gone.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let (source, token) = cancellation();
        let mut waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        assert!(!token.is_cancelled());
        source.cancel();
        task.await.unwrap();
        assert!(token.is_cancelled());
        assert!(source.token().is_cancelled());
    }

    #[tokio::test]
    async fn dropping_the_source_cancels() {
        let (source, mut token) = cancellation();
        drop(source);
        assert!(token.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
    }
}
