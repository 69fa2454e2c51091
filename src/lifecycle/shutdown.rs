//! Stop coordination for a running listener.

use tokio::sync::watch;

/// One-shot stop trigger shared between a listener's owner and its serve task.
///
/// Backed by a watch channel, so a subscriber created before or after the
/// trigger observes it, and dropping the `Shutdown` also releases waiters.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the stop signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the stop signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once the stop signal fires or its `Shutdown` is dropped.
    pub async fn recv(mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_subscriber_sees_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(100), shutdown.subscribe().recv())
            .await
            .expect("signal should already be set");
    }

    #[tokio::test]
    async fn dropping_the_trigger_releases_waiters() {
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        drop(shutdown);

        tokio::time::timeout(Duration::from_millis(100), signal.recv())
            .await
            .expect("waiter should be released");
    }

    #[tokio::test]
    async fn untriggered_signal_stays_pending() {
        let shutdown = Shutdown::new();
        let result = tokio::time::timeout(Duration::from_millis(50), shutdown.subscribe().recv()).await;
        assert!(result.is_err());
    }
}
