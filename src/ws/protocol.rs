//! Session protocol message definitions
//! These are the wire types exchanged between a peer and the relay

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which end of the pitch a peer defends for the life of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The other end of the pitch
    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Latest known control intent of one participant.
///
/// The remote copy is overwritten wholesale on every received update: no
/// merging, no sequence numbers, last message wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub kick: bool,
}

impl InputState {
    pub fn any(&self) -> bool {
        self.left || self.right || self.jump || self.kick
    }
}

/// Messages sent from a peer to the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Request a spot in the matchmaking queue (no-op if already queued)
    #[serde(rename = "queue:join")]
    QueueJoin,

    /// Leave the queue (no-op if not queued)
    #[serde(rename = "queue:leave")]
    QueueLeave,

    /// Local input snapshot, relayed to the session peer once per tick
    #[serde(rename = "input")]
    Input {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        state: InputState,
    },

    /// A locally detected goal, naming the side that conceded.
    /// The sender resets for kickoff but does not touch its own tally.
    #[serde(rename = "goal")]
    Goal {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        #[serde(rename = "concedingSide")]
        conceding_side: Side,
    },
}

/// Messages sent from the relay to a peer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// Pairing succeeded; begins the COUNTDOWN phase on the peer
    #[serde(rename = "match:found")]
    MatchFound {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        side: Side,
    },

    /// The session peer's input snapshot; overwrites the remote-input copy
    #[serde(rename = "opponent:input")]
    OpponentInput { state: InputState },

    /// The session peer detected a goal; the receiver increments its tally
    /// for the conceding side's opponent
    #[serde(rename = "opponent:goal")]
    OpponentGoal {
        #[serde(rename = "concedingSide")]
        conceding_side: Side,
    },

    /// The other session member disconnected or left; the session is over
    #[serde(rename = "room:left")]
    RoomLeft,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_original_event_names() {
        let json = serde_json::to_value(&ClientMsg::QueueJoin).unwrap();
        assert_eq!(json["type"], "queue:join");

        let session_id = Uuid::new_v4();
        let json = serde_json::to_value(&ClientMsg::Input {
            session_id,
            state: InputState {
                right: true,
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(json["type"], "input");
        assert_eq!(json["sessionId"], session_id.to_string());
        assert_eq!(json["state"]["right"], true);
        assert_eq!(json["state"]["left"], false);
    }

    #[test]
    fn goal_event_names_the_conceding_side() {
        let json = serde_json::to_value(&ClientMsg::Goal {
            session_id: Uuid::new_v4(),
            conceding_side: Side::Left,
        })
        .unwrap();
        assert_eq!(json["type"], "goal");
        assert_eq!(json["concedingSide"], "left");
    }

    #[test]
    fn match_found_round_trips() {
        let msg = ServerMsg::MatchFound {
            session_id: Uuid::new_v4(),
            side: Side::Right,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("match:found"));
        let back: ServerMsg = serde_json::from_str(&json).unwrap();
        match back {
            ServerMsg::MatchFound { side, .. } => assert_eq!(side, Side::Right),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn malformed_payloads_fail_to_parse() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"input"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"warp"}"#).is_err());
    }

    #[test]
    fn side_opponent_is_involutive() {
        assert_eq!(Side::Left.opponent(), Side::Right);
        assert_eq!(Side::Right.opponent().opponent(), Side::Right);
    }
}
