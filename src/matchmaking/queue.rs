//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::ws::PeerHandle;

/// A connection waiting to be paired
pub struct WaitingPeer {
    pub peer: PeerHandle,
    pub queued_at: Instant,
}

impl WaitingPeer {
    pub fn new(peer: PeerHandle) -> Self {
        Self {
            peer,
            queued_at: Instant::now(),
        }
    }

    /// How long this peer has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// An ordered waiting list of not-yet-paired peers
pub struct MatchQueue {
    queue: VecDeque<WaitingPeer>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append a peer to the tail. Re-joining while already queued is a no-op;
    /// returns false in that case.
    pub fn enqueue(&mut self, peer: PeerHandle) -> bool {
        if self.contains(peer.id) {
            return false;
        }
        self.queue.push_back(WaitingPeer::new(peer));
        true
    }

    /// Remove a peer if present (explicit leave or disconnect). Idempotent.
    pub fn dequeue(&mut self, peer_id: Uuid) -> Option<WaitingPeer> {
        let pos = self.queue.iter().position(|p| p.peer.id == peer_id)?;
        self.queue.remove(pos)
    }

    pub fn contains(&self, peer_id: Uuid) -> bool {
        self.queue.iter().any(|p| p.peer.id == peer_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop the two oldest connected peers, FIFO.
    ///
    /// A stale head is discarded and the scan continues without consuming the
    /// younger peer. A stale younger peer is discarded too, but the older one
    /// goes back to the front and the scan stops until fresh arrivals, so
    /// arrival order is never shuffled.
    pub fn next_pair(&mut self) -> Option<(PeerHandle, PeerHandle)> {
        while self.queue.len() >= 2 {
            let older = self.queue.pop_front()?;
            let younger = self.queue.pop_front()?;

            if !older.peer.is_connected() {
                self.queue.push_front(younger);
                continue;
            }
            if !younger.peer.is_connected() {
                self.queue.push_front(older);
                return None;
            }

            return Some((older.peer, younger.peer));
        }
        None
    }
}

impl Default for MatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
