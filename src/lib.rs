//! headball - relay and match core for 2-player head-ball arcade matches
//!
//! Server side: a WebSocket relay that pairs waiting peers (FIFO), scopes
//! message forwarding to the resulting two-member session, and tears the
//! session down when a member leaves. The relay never interprets simulation
//! state.
//!
//! Client side: the per-peer match core: an independently stepped physics
//! simulation fed by local input and the last relayed opponent snapshot, a
//! countdown/running/paused/ended lifecycle, and receipt-driven goal
//! arbitration. There is no authoritative copy of the world; see
//! [`game::reconcile`] for the divergence probe.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod room;
pub mod util;
pub mod ws;
