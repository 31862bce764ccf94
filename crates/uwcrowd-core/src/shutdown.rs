//! Cooperative shutdown signalling.
//!
//! A [`Shutdown`] is held by whoever decides when the engine stops (the
//! binary's Ctrl-C handler, a test). Every worker, the publisher, and the
//! observer server hold a [`ShutdownSignal`] and check it at their
//! suspension points. Triggering is idempotent and sticky: a signal
//! created after the trigger still reports it.

use tokio::sync::watch;

/// The sending half: raise once to stop everything listening.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create an untriggered shutdown handle.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Request shutdown. Listeners finish their in-flight step and exit.
    pub fn trigger(&self) {
        // send_replace never fails, even with no receivers.
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new listener.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving half, one per listener.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested (immediately if it already was).
    ///
    /// Also resolves if the [`Shutdown`] handle is dropped, so a listener
    /// never outlives its owner.
    pub async fn wait(&mut self) {
        // Err means the sender is gone, which we treat as shutdown.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        assert!(!signal.is_triggered());

        let waiter = tokio::spawn(async move { signal.wait().await });
        shutdown.trigger();
        assert!(tokio::time::timeout(Duration::from_secs(1), waiter).await.is_ok());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn late_listener_sees_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        let mut signal = shutdown.signal();
        assert!(signal.is_triggered());
        signal.wait().await;
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_listeners() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        drop(shutdown);
        signal.wait().await;
    }
}
