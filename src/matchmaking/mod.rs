//! Matchmaking: FIFO waiting list and pairing

pub mod queue;
pub mod service;

pub use queue::{MatchQueue, WaitingPeer};
pub use service::Matchmaker;
