use tokio::sync::broadcast;

use cove_types::events::ChangeEvent;

/// Fans committed row changes out to every subscribed client.
///
/// Subscribers that lag far enough to overflow the channel observe a
/// `Lagged` error and must refetch; the dispatcher itself never blocks on a
/// slow consumer.
#[derive(Clone)]
pub struct Dispatcher {
    broadcast_tx: broadcast::Sender<ChangeEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self { broadcast_tx }
    }

    /// Subscribe to the change feed. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all subscribers. Dropped silently when nobody
    /// is listening.
    pub fn broadcast(&self, event: ChangeEvent) {
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
