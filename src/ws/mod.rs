//! WebSocket connection layer

pub mod handler;
pub mod protocol;

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use protocol::ServerMsg;

/// Handle to one peer's connection: its identity plus the outbound channel
/// drained by that connection's writer task.
#[derive(Clone)]
pub struct PeerHandle {
    pub id: Uuid,
    tx: UnboundedSender<ServerMsg>,
}

impl PeerHandle {
    pub fn new(id: Uuid, tx: UnboundedSender<ServerMsg>) -> Self {
        Self { id, tx }
    }

    /// Fire-and-forget delivery. A closed channel means the peer is gone;
    /// the caller never blocks or retries.
    pub fn send(&self, msg: ServerMsg) {
        let _ = self.tx.send(msg);
    }

    /// Whether the connection's writer task is still draining the channel
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}
