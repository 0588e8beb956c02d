//! Shutdown trigger shared by the signal task and the server.

use tokio::sync::broadcast;

/// Fires once to tell the server to stop accepting and drain.
///
/// Dropping it without firing closes every receiver instead.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}
