//! Matchmaking service - pairs waiting peers into sessions

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::room::RoomRegistry;
use crate::ws::protocol::{ServerMsg, Side};
use crate::ws::PeerHandle;

use super::queue::MatchQueue;

/// Owns the process-wide waiting list. Constructed once at startup; every
/// connection task goes through the mutex, so a peer can never be paired
/// twice by concurrent joins.
pub struct Matchmaker {
    queue: Mutex<MatchQueue>,
    rooms: Arc<RoomRegistry>,
}

impl Matchmaker {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self {
            queue: Mutex::new(MatchQueue::new()),
            rooms,
        }
    }

    /// queue:join: append to the waiting list, then attempt pairing
    pub fn enqueue(&self, peer: PeerHandle) {
        if self.rooms.is_member(peer.id) {
            warn!(peer_id = %peer.id, "Queue join from a peer already in a session ignored");
            return;
        }

        let peer_id = peer.id;
        let mut queue = self.queue.lock();
        if queue.enqueue(peer) {
            info!(peer_id = %peer_id, queue_size = queue.len(), "Peer joined matchmaking queue");
        } else {
            debug!(peer_id = %peer_id, "Peer already queued, join ignored");
        }
        self.pair_waiting(&mut queue);
    }

    /// queue:leave or disconnect; idempotent removal
    pub fn remove(&self, peer_id: Uuid) {
        if self.queue.lock().dequeue(peer_id).is_some() {
            info!(peer_id = %peer_id, "Peer left matchmaking queue");
        }
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_queued(&self, peer_id: Uuid) -> bool {
        self.queue.lock().contains(peer_id)
    }

    /// Pair the two oldest waiting peers while at least two remain, creating
    /// a session and notifying both of their side each time. Runs under the
    /// queue lock held by the caller's entry point.
    fn pair_waiting(&self, queue: &mut MatchQueue) {
        while let Some((a, b)) = queue.next_pair() {
            // Independent unbiased coin flip, fixed for the session's lifetime
            let (left, right) = if rand::random() { (a, b) } else { (b, a) };

            let session_id = self.rooms.create_room(left.clone(), right.clone());

            // Fire-and-forget: if delivery fails the session still exists and
            // the peer's own transport surfaces the failure.
            left.send(ServerMsg::MatchFound {
                session_id,
                side: Side::Left,
            });
            right.send(ServerMsg::MatchFound {
                session_id,
                side: Side::Right,
            });

            info!(
                session_id = %session_id,
                left = %left.id,
                right = %right.id,
                "Paired peers into a session"
            );
        }
    }
}
