//! Divergence probe for the replicated simulations.
//!
//! The two peers never reconcile physical state; this probe makes the drift
//! observable instead of silent. Every N ticks it folds the quantized body
//! state into a digest an outer layer can compare across peers. Disabled by
//! default and never corrective.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::physics::{Body, Pitch, PlayerBody};

/// A checksum of one peer's simulated world at a given tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDigest {
    pub tick: u64,
    pub checksum: u64,
}

/// Periodic digest sampler
pub struct SyncProbe {
    interval: u32,
    since_last: u32,
}

impl SyncProbe {
    /// Sample every `interval` ticks (60 = once a second at the nominal rate)
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            since_last: 0,
        }
    }

    /// Call once per simulation tick; yields a digest on sampling ticks
    pub fn observe(&mut self, pitch: &Pitch) -> Option<StateDigest> {
        self.since_last += 1;
        if self.since_last < self.interval {
            return None;
        }
        self.since_last = 0;
        Some(StateDigest {
            tick: pitch.tick(),
            checksum: checksum(pitch),
        })
    }
}

/// Fold the pitch into a checksum, side-normalized so both peers hash the
/// same world regardless of which player is locally controlled.
fn checksum(pitch: &Pitch) -> u64 {
    let mut hasher = DefaultHasher::new();
    let (left, right) = pitch.players_by_side();
    hash_player(&mut hasher, left);
    hash_player(&mut hasher, right);
    hash_body(&mut hasher, &pitch.ball);
    hasher.finish()
}

fn hash_player(hasher: &mut DefaultHasher, player: &PlayerBody) {
    quantize(player.x).hash(hasher);
    quantize(player.y).hash(hasher);
    quantize(player.vx).hash(hasher);
    quantize(player.vy).hash(hasher);
    player.grounded.hash(hasher);
}

fn hash_body(hasher: &mut DefaultHasher, body: &Body) {
    quantize(body.x).hash(hasher);
    quantize(body.y).hash(hasher);
    quantize(body.vx).hash(hasher);
    quantize(body.vy).hash(hasher);
}

/// Sixteenth-unit grid; fine enough to catch real drift, coarse enough to
/// ignore float noise from identical step sequences
fn quantize(v: f32) -> i32 {
    (v * 16.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{InputState, Side};
    use rand::rngs::mock::StepRng;

    fn no_kick_rng() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    /// Two peers stepping mirrored views of the same match agree as long as
    /// no probabilistic remote kick is in play.
    #[test]
    fn mirrored_simulations_produce_equal_digests() {
        let mut left_view = Pitch::new(Side::Left);
        let mut right_view = Pitch::new(Side::Right);
        let mut probe_a = SyncProbe::new(30);
        let mut probe_b = SyncProbe::new(30);
        let mut rng = no_kick_rng();

        // each player retreats toward its own goal; the ball stays untouched
        let left_player = InputState {
            left: true,
            ..Default::default()
        };
        let right_player = InputState {
            right: true,
            ..Default::default()
        };

        let mut compared = 0;
        for _ in 0..120 {
            left_view.step(left_player, right_player, &mut rng);
            right_view.step(right_player, left_player, &mut rng);

            let a = probe_a.observe(&left_view);
            let b = probe_b.observe(&right_view);
            if let (Some(a), Some(b)) = (a, b) {
                assert_eq!(a, b, "peers diverged without a divergence source");
                compared += 1;
            }
        }
        assert_eq!(compared, 4);
    }

    #[test]
    fn digests_differ_once_the_worlds_drift() {
        let mut a = Pitch::new(Side::Left);
        let mut b = Pitch::new(Side::Left);
        let mut rng = no_kick_rng();

        a.step(
            InputState {
                right: true,
                ..Default::default()
            },
            InputState::default(),
            &mut rng,
        );
        b.step(InputState::default(), InputState::default(), &mut rng);

        let mut probe_a = SyncProbe::new(1);
        let mut probe_b = SyncProbe::new(1);
        let da = probe_a.observe(&a).unwrap();
        let db = probe_b.observe(&b).unwrap();
        assert_ne!(da.checksum, db.checksum);
    }
}
