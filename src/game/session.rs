//! Per-peer match lifecycle: countdown, running, paused, ended.
//!
//! One `MatchSession` drives one queue/session cycle on one peer. The host's
//! presentation layer feeds it raw input intents and frame ticks; the network
//! layer feeds it relay messages. Message arrival only overwrites the
//! remote-input snapshot or the score bookkeeping; it never blocks a tick.
//!
//! Scoring is deliberately asymmetric: a locally detected goal is relayed to
//! the session peer but never applied to the local tally; tallies move only
//! on *receipt* of an opponent goal event. A crossing that only one
//! simulation sees can therefore leave the tallies diverged, a known risk of
//! the no-authority design, observable through the optional [`SyncProbe`].

use std::env;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::TICK_DURATION;
use crate::ws::protocol::{ClientMsg, InputState, ServerMsg, Side};

use super::physics::Pitch;
use super::reconcile::{StateDigest, SyncProbe};

/// Lifecycle phase of one peer's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting in the matchmaking queue
    Queued,
    /// Paired; inputs accepted but physics frozen
    Countdown,
    /// Match in progress
    Running,
    /// Frozen by visibility loss; the match clock keeps counting
    Paused,
    /// Terminal for this session; a rematch is a fresh cycle
    Ended,
}

/// How a finished match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The match clock reached zero
    TimeUp,
    /// The opponent disconnected or left the room
    OpponentLeft,
}

/// Running goal count for each side; monotonically non-decreasing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreTally {
    pub left: u32,
    pub right: u32,
}

impl ScoreTally {
    /// Credit the goal to the conceding side's opponent
    fn record_concession(&mut self, conceding: Side) {
        match conceding.opponent() {
            Side::Left => self.left += 1,
            Side::Right => self.right += 1,
        }
    }
}

/// Wall-clock durations of one match cycle
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub countdown: Duration,
    pub match_length: Duration,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(3),
            match_length: Duration::from_secs(60),
        }
    }
}

impl MatchSettings {
    /// Load overrides from COUNTDOWN_SECS / MATCH_SECS
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };
        Self {
            countdown: secs("COUNTDOWN_SECS", defaults.countdown),
            match_length: secs("MATCH_SECS", defaults.match_length),
        }
    }
}

/// One peer's session, from queue join to terminal end
pub struct MatchSession {
    settings: MatchSettings,
    outbound: mpsc::UnboundedSender<ClientMsg>,
    phase: MatchPhase,
    session_id: Option<Uuid>,
    side: Option<Side>,
    pitch: Option<Pitch>,
    rng: ChaCha8Rng,
    score: ScoreTally,
    local_input: InputState,
    remote_input: InputState,
    /// Match clock to apply when RUNNING begins; adjustable beforehand
    pending_clock: Duration,
    countdown_deadline: Option<Instant>,
    match_deadline: Option<Instant>,
    outcome: Option<MatchOutcome>,
    probe: Option<SyncProbe>,
    latest_digest: Option<StateDigest>,
}

impl MatchSession {
    /// Enter the matchmaking queue; the returned session is in QUEUED
    pub fn join_queue(outbound: mpsc::UnboundedSender<ClientMsg>, settings: MatchSettings) -> Self {
        let _ = outbound.send(ClientMsg::QueueJoin);
        Self {
            settings,
            outbound,
            phase: MatchPhase::Queued,
            session_id: None,
            side: None,
            pitch: None,
            rng: ChaCha8Rng::from_entropy(),
            score: ScoreTally::default(),
            local_input: InputState::default(),
            remote_input: InputState::default(),
            pending_clock: settings.match_length,
            countdown_deadline: None,
            match_deadline: None,
            outcome: None,
            probe: None,
            latest_digest: None,
        }
    }

    /// Leave the queue before pairing. Idempotent; a pairing notification
    /// that arrives later is ignored.
    pub fn leave_queue(&mut self) {
        if self.phase == MatchPhase::Queued {
            let _ = self.outbound.send(ClientMsg::QueueLeave);
            self.finish(None);
        }
    }

    /// Deliver one relay message. Called from the network receive path;
    /// only snapshots and bookkeeping are touched, never the running tick.
    pub fn handle_server_msg(&mut self, msg: ServerMsg, now: Instant) {
        match msg {
            ServerMsg::MatchFound { session_id, side } => {
                if self.phase != MatchPhase::Queued {
                    debug!(session_id = %session_id, "Late match:found ignored");
                    return;
                }
                self.session_id = Some(session_id);
                self.side = Some(side);
                self.pitch = Some(Pitch::new(side));
                self.phase = MatchPhase::Countdown;
                self.countdown_deadline = Some(now + self.settings.countdown);
                info!(session_id = %session_id, side = ?side, "Match found, countdown started");
            }
            ServerMsg::OpponentInput { state } => {
                if self.phase != MatchPhase::Ended {
                    // Overwrite wholesale; last message wins
                    self.remote_input = state;
                }
            }
            ServerMsg::OpponentGoal { conceding_side } => {
                if matches!(
                    self.phase,
                    MatchPhase::Countdown | MatchPhase::Running | MatchPhase::Paused
                ) {
                    self.score.record_concession(conceding_side);
                    if let Some(pitch) = self.pitch.as_mut() {
                        pitch.reset_kickoff();
                    }
                }
            }
            ServerMsg::RoomLeft => {
                if self.phase != MatchPhase::Ended {
                    info!("Opponent left the room, match over");
                    self.finish(Some(MatchOutcome::OpponentLeft));
                }
            }
        }
    }

    /// Record the local control intent for the next tick
    pub fn set_input(&mut self, input: InputState) {
        self.local_input = input;
    }

    /// Advance one frame. Drives the countdown and match clocks and, while
    /// RUNNING, one physics tick plus the per-tick input broadcast.
    pub fn tick(&mut self, now: Instant) {
        match self.phase {
            MatchPhase::Countdown => {
                if self.countdown_deadline.is_some_and(|d| now >= d) {
                    self.countdown_deadline = None;
                    self.match_deadline = Some(now + self.pending_clock);
                    self.phase = MatchPhase::Running;
                    info!("Countdown over, match running");
                }
            }
            MatchPhase::Running => {
                if self.match_deadline.is_some_and(|d| now >= d) {
                    self.finish(Some(MatchOutcome::TimeUp));
                    return;
                }
                self.step_simulation();
            }
            MatchPhase::Paused => {
                // The match clock keeps counting while frozen
                if self.match_deadline.is_some_and(|d| now >= d) {
                    self.finish(Some(MatchOutcome::TimeUp));
                }
            }
            MatchPhase::Queued | MatchPhase::Ended => {}
        }
    }

    fn step_simulation(&mut self) {
        let Some(pitch) = self.pitch.as_mut() else {
            return;
        };

        if let Some(conceding) = pitch.step(self.local_input, self.remote_input, &mut self.rng) {
            // Reset for kickoff and relay the crossing; the local tally is
            // left untouched until the peer's own detection comes back
            pitch.reset_kickoff();
            if let Some(session_id) = self.session_id {
                let _ = self.outbound.send(ClientMsg::Goal {
                    session_id,
                    conceding_side: conceding,
                });
            }
        }

        if let Some(probe) = self.probe.as_mut() {
            if let Some(digest) = probe.observe(pitch) {
                self.latest_digest = Some(digest);
            }
        }

        // Broadcast the local snapshot every tick, changed or not
        if let Some(session_id) = self.session_id {
            let _ = self.outbound.send(ClientMsg::Input {
                session_id,
                state: self.local_input,
            });
        }
    }

    /// Freeze or resume the simulation (visibility change). Resuming is
    /// refused once the match clock has expired or the match has ended.
    pub fn pause(&mut self, paused: bool, now: Instant) {
        match (self.phase, paused) {
            (MatchPhase::Running, true) => self.phase = MatchPhase::Paused,
            (MatchPhase::Paused, false) => {
                if self.match_deadline.is_some_and(|d| now < d) {
                    self.phase = MatchPhase::Running;
                }
            }
            _ => {}
        }
    }

    /// Tear the session down. Terminal and idempotent; all pending timers
    /// are cancelled so none can fire into a later match.
    pub fn destroy(&mut self) {
        self.finish(None);
    }

    /// Adjust the match clock: immediately while RUNNING/PAUSED, or the
    /// clock the match will start with while still queued or counting down.
    pub fn set_remaining_time(&mut self, secs: u64, now: Instant) {
        let clock = Duration::from_secs(secs);
        match self.phase {
            MatchPhase::Running | MatchPhase::Paused => {
                self.match_deadline = Some(now + clock);
            }
            MatchPhase::Queued | MatchPhase::Countdown => {
                self.pending_clock = clock;
            }
            MatchPhase::Ended => {}
        }
    }

    /// Wall-clock time left on the match clock
    pub fn remaining_time(&self, now: Instant) -> Duration {
        match self.phase {
            MatchPhase::Queued | MatchPhase::Countdown => self.pending_clock,
            MatchPhase::Running | MatchPhase::Paused => self
                .match_deadline
                .map(|d| d.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO),
            MatchPhase::Ended => Duration::ZERO,
        }
    }

    /// Sample a state digest every `interval` ticks (see [`SyncProbe`])
    pub fn enable_sync_probe(&mut self, interval: u32) {
        self.probe = Some(SyncProbe::new(interval));
    }

    pub fn latest_digest(&self) -> Option<StateDigest> {
        self.latest_digest
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn score(&self) -> ScoreTally {
        self.score
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn remote_input(&self) -> InputState {
        self.remote_input
    }

    /// The simulated world, present once a match has been found. The
    /// presentation layer reads body positions from here each frame.
    pub fn pitch(&self) -> Option<&Pitch> {
        self.pitch.as_ref()
    }

    pub fn pitch_mut(&mut self) -> Option<&mut Pitch> {
        self.pitch.as_mut()
    }

    fn finish(&mut self, outcome: Option<MatchOutcome>) {
        if self.phase == MatchPhase::Ended {
            return;
        }
        self.phase = MatchPhase::Ended;
        self.outcome = self.outcome.or(outcome);
        self.countdown_deadline = None;
        self.match_deadline = None;
    }
}

/// Drive a session with a default headless host: a fixed-rate frame interval
/// plus asynchronous message delivery, until the session ends. A rendering
/// host supplies its own frame scheduling instead and calls
/// [`MatchSession::tick`] itself.
pub async fn run_until_ended(
    session: &mut MatchSession,
    mut inbound: mpsc::UnboundedReceiver<ServerMsg>,
) {
    let mut frames = tokio::time::interval(TICK_DURATION);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    while session.phase() != MatchPhase::Ended {
        tokio::select! {
            _ = frames.tick() => session.tick(Instant::now()),
            msg = inbound.recv() => match msg {
                Some(msg) => session.handle_server_msg(msg, Instant::now()),
                // transport gone; nothing further can arrive
                None => session.destroy(),
            },
        }
    }
}
