//! Shutdown coordination for acceptors.
//!
//! Only listeners observe the signal. Workers keep running until their pool
//! is dropped, so connections already being served finish normally.

use tokio::sync::broadcast;

/// Broadcasts a one-shot stop signal to every listener.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the stop signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every subscribed listener to stop accepting.
    ///
    /// Returns how many listeners were notified.
    pub fn trigger(&self) -> usize {
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::info!(listeners = notified, "Shutdown triggered");
        notified
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
