//! Per-peer match core: physics, lifecycle and divergence probing

pub mod physics;
pub mod reconcile;
pub mod session;

pub use physics::Pitch;
pub use reconcile::{StateDigest, SyncProbe};
pub use session::{run_until_ended, MatchOutcome, MatchPhase, MatchSession, MatchSettings, ScoreTally};
