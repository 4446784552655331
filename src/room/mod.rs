//! Room registry: scopes message relay to the two members of one session

use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{ServerMsg, Side};
use crate::ws::PeerHandle;

/// One member of a session with its fixed side assignment
#[derive(Clone)]
pub struct RoomMember {
    pub peer: PeerHandle,
    pub side: Side,
}

/// One active match between exactly two peers
pub struct Room {
    pub id: Uuid,
    pub members: [RoomMember; 2],
}

/// Registry of all active sessions.
///
/// Shared by every connection task; the maps serialize their own mutation, and
/// a session that has already been torn down makes every later operation on it
/// a logged no-op.
pub struct RoomRegistry {
    rooms: DashMap<Uuid, Room>,
    /// peer id -> session id; a connection is a member of at most one session
    membership: DashMap<Uuid, Uuid>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            membership: DashMap::new(),
        }
    }

    /// Allocate a session for two freshly paired peers. `left` defends the
    /// left goal mouth, `right` the right one, for the session's lifetime.
    pub fn create_room(&self, left: PeerHandle, right: PeerHandle) -> Uuid {
        let id = Uuid::new_v4();

        for peer in [&left, &right] {
            if self.membership.contains_key(&peer.id) {
                // The matchmaker refuses queued peers that are already in a
                // session, so this indicates a pairing bug upstream.
                warn!(peer_id = %peer.id, session_id = %id, "Peer already in a session at pairing time");
            }
            self.membership.insert(peer.id, id);
        }

        self.rooms.insert(
            id,
            Room {
                id,
                members: [
                    RoomMember {
                        peer: left,
                        side: Side::Left,
                    },
                    RoomMember {
                        peer: right,
                        side: Side::Right,
                    },
                ],
            },
        );

        info!(session_id = %id, "Session created");
        id
    }

    /// The session a peer currently belongs to, if any
    pub fn session_of(&self, peer_id: Uuid) -> Option<Uuid> {
        self.membership.get(&peer_id).map(|entry| *entry.value())
    }

    pub fn is_member(&self, peer_id: Uuid) -> bool {
        self.membership.contains_key(&peer_id)
    }

    /// Forward `msg` to every member of the session except the sender.
    /// Stale session ids and non-member senders are logged no-ops.
    pub fn relay(&self, session_id: Uuid, from: Uuid, msg: ServerMsg) {
        let Some(room) = self.rooms.get(&session_id) else {
            debug!(session_id = %session_id, "Relay into unknown session dropped");
            return;
        };

        if !room.members.iter().any(|m| m.peer.id == from) {
            warn!(session_id = %session_id, peer_id = %from, "Relay from non-member dropped");
            return;
        }

        for member in room.members.iter().filter(|m| m.peer.id != from) {
            member.peer.send(msg.clone());
        }
    }

    /// Discard a session and unsubscribe its members. Members other than
    /// `leaving` are told the room ended. Idempotent: tearing down a session
    /// that no longer exists is a no-op.
    pub fn teardown(&self, session_id: Uuid, leaving: Option<Uuid>) {
        let Some((_, room)) = self.rooms.remove(&session_id) else {
            debug!(session_id = %session_id, "Teardown of unknown session ignored");
            return;
        };

        for member in &room.members {
            self.membership.remove(&member.peer.id);
            if Some(member.peer.id) != leaving {
                member.peer.send(ServerMsg::RoomLeft);
            }
        }

        info!(session_id = %session_id, "Session torn down");
    }

    pub fn active_sessions(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::InputState;
    use tokio::sync::mpsc;

    fn peer() -> (PeerHandle, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerHandle::new(Uuid::new_v4(), tx), rx)
    }

    #[test]
    fn sides_are_assigned_exactly_once_per_member() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = peer();
        let (b, _rx_b) = peer();

        let id = registry.create_room(a.clone(), b.clone());
        let room = registry.rooms.get(&id).unwrap();
        assert_eq!(room.members[0].side, Side::Left);
        assert_eq!(room.members[1].side, Side::Right);
        assert_eq!(registry.session_of(a.id), Some(id));
        assert_eq!(registry.session_of(b.id), Some(id));
    }

    #[test]
    fn relay_never_echoes_to_the_sender() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = peer();
        let (b, mut rx_b) = peer();
        let id = registry.create_room(a.clone(), b.clone());

        registry.relay(
            id,
            a.id,
            ServerMsg::OpponentInput {
                state: InputState {
                    jump: true,
                    ..Default::default()
                },
            },
        );

        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerMsg::OpponentInput { state }) if state.jump
        ));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn relay_from_non_member_is_dropped() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = peer();
        let (b, mut rx_b) = peer();
        let (outsider, _rx_o) = peer();
        let id = registry.create_room(a, b);

        registry.relay(id, outsider.id, ServerMsg::RoomLeft);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn teardown_notifies_the_remaining_member_and_is_idempotent() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = peer();
        let (b, mut rx_b) = peer();
        let id = registry.create_room(a.clone(), b.clone());

        registry.teardown(id, Some(a.id));
        assert!(matches!(rx_b.try_recv(), Ok(ServerMsg::RoomLeft)));
        assert!(rx_a.try_recv().is_err());
        assert!(!registry.is_member(a.id));
        assert!(!registry.is_member(b.id));
        assert_eq!(registry.active_sessions(), 0);

        // second teardown of the same session is a no-op
        registry.teardown(id, Some(a.id));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn relay_into_a_torn_down_session_is_a_no_op() {
        let registry = RoomRegistry::new();
        let (a, _rx_a) = peer();
        let (b, mut rx_b) = peer();
        let id = registry.create_room(a.clone(), b);

        registry.teardown(id, None);
        rx_b.try_recv().ok(); // drain the RoomLeft

        registry.relay(id, a.id, ServerMsg::RoomLeft);
        assert!(rx_b.try_recv().is_err());
    }
}
