//! Time utilities for the match simulation

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Nominal tick rate of a peer's local simulation loop.
///
/// Step magnitudes in [`crate::game::physics`] are per-tick rather than
/// delta-scaled, so this rate defines the feel of the game.
pub const SIMULATION_TPS: u32 = 60;

/// Duration of one simulation tick
pub const TICK_DURATION: Duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);

/// Convert a wall-clock duration into whole simulation ticks
pub fn ticks_in(duration: Duration) -> u32 {
    (duration.as_secs_f64() * SIMULATION_TPS as f64).round() as u32
}
