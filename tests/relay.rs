//! End-to-end scenarios over the dispatch layer: two client match cores wired
//! through the relay's queue, rooms and message forwarding, without sockets.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uuid::Uuid;

use headball::app::AppState;
use headball::config::Config;
use headball::game::physics::{BALL_RADIUS, GROUND_Y};
use headball::game::{MatchOutcome, MatchPhase, MatchSession, MatchSettings};
use headball::ws::handler::{handle_client_msg, handle_disconnect};
use headball::ws::protocol::{ClientMsg, InputState, ServerMsg};
use headball::ws::PeerHandle;

fn test_state() -> AppState {
    AppState::new(Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "info".to_string(),
        client_origin: "*".to_string(),
    })
}

/// Register a fake connection: the handle the relay sees plus the receiver a
/// writer task would drain.
fn connect(state: &AppState) -> (PeerHandle, mpsc::UnboundedReceiver<ServerMsg>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let peer = PeerHandle::new(Uuid::new_v4(), tx);
    state.peers.insert(peer.id, peer.clone());
    (peer, rx)
}

/// One full peer: relay-side handle plus a client match core
struct TestPeer {
    handle: PeerHandle,
    inbound: mpsc::UnboundedReceiver<ServerMsg>,
    outbound: mpsc::UnboundedReceiver<ClientMsg>,
    session: MatchSession,
}

impl TestPeer {
    fn join(state: &AppState, settings: MatchSettings) -> Self {
        let (handle, inbound) = connect(state);
        let (client_tx, outbound) = mpsc::unbounded_channel();
        let session = MatchSession::join_queue(client_tx, settings);
        let mut peer = Self {
            handle,
            inbound,
            outbound,
            session,
        };
        peer.flush_outbound(state); // deliver the queue:join
        peer
    }

    /// Dispatch everything the client core has sent into the relay
    fn flush_outbound(&mut self, state: &AppState) {
        while let Ok(msg) = self.outbound.try_recv() {
            handle_client_msg(state, &self.handle, msg);
        }
    }

    /// Deliver everything the relay has forwarded into the client core
    fn flush_inbound(&mut self, now: Instant) {
        while let Ok(msg) = self.inbound.try_recv() {
            self.session.handle_server_msg(msg, now);
        }
    }
}

fn instant_settings() -> MatchSettings {
    MatchSettings {
        countdown: Duration::ZERO,
        match_length: Duration::from_secs(60),
    }
}

/// Pair two fresh peers and run both into RUNNING
fn paired_match(state: &AppState, now: Instant) -> (TestPeer, TestPeer) {
    let mut a = TestPeer::join(state, instant_settings());
    let mut b = TestPeer::join(state, instant_settings());
    for peer in [&mut a, &mut b] {
        peer.flush_inbound(now);
        assert_eq!(peer.session.phase(), MatchPhase::Countdown);
        peer.session.tick(now);
        assert_eq!(peer.session.phase(), MatchPhase::Running);
    }
    (a, b)
}

#[test]
fn two_joins_pair_within_one_pass_with_complementary_sides() {
    let state = test_state();
    let now = Instant::now();
    let (a, b) = paired_match(&state, now);

    let side_a = a.session.side().expect("a has a side");
    let side_b = b.session.side().expect("b has a side");
    assert_eq!(side_a, side_b.opponent());
    assert_eq!(a.session.session_id(), b.session.session_id());
    assert_eq!(state.rooms.active_sessions(), 1);
    assert_eq!(state.matchmaker.queue_size(), 0);
}

#[test]
fn pairing_is_fifo_fair_across_three_arrivals() {
    let state = test_state();
    let now = Instant::now();
    let mut a = TestPeer::join(&state, instant_settings());
    let mut b = TestPeer::join(&state, instant_settings());
    let mut c = TestPeer::join(&state, instant_settings());

    a.flush_inbound(now);
    b.flush_inbound(now);
    c.flush_inbound(now);

    assert_eq!(
        a.session.session_id().expect("a paired"),
        b.session.session_id().expect("b paired"),
        "the two oldest arrivals pair together"
    );
    assert_eq!(c.session.phase(), MatchPhase::Queued);
    assert!(state.matchmaker.is_queued(c.handle.id));
}

#[test]
fn a_stale_queued_connection_never_consumes_a_live_one() {
    let state = test_state();
    let (stale, stale_rx) = connect(&state);
    handle_client_msg(&state, &stale, ClientMsg::QueueJoin);
    drop(stale_rx); // transport died while waiting

    let now = Instant::now();
    let mut b = TestPeer::join(&state, instant_settings());
    let mut c = TestPeer::join(&state, instant_settings());
    b.flush_inbound(now);
    c.flush_inbound(now);

    assert_eq!(
        b.session.session_id().expect("b paired"),
        c.session.session_id().expect("c paired")
    );
    assert!(!state.rooms.is_member(stale.id));
}

#[test]
fn input_overwrites_the_opponent_snapshot_before_the_next_tick() {
    let state = test_state();
    let now = Instant::now();
    let (mut a, mut b) = paired_match(&state, now);

    a.session.set_input(InputState {
        right: true,
        ..Default::default()
    });
    a.session.tick(now); // broadcasts the snapshot
    a.flush_outbound(&state);
    b.flush_inbound(now);

    assert_eq!(
        b.session.remote_input(),
        InputState {
            left: false,
            right: true,
            jump: false,
            kick: false,
        }
    );
}

#[test]
fn goal_detection_reaches_only_the_other_peer_and_its_tally() {
    let state = test_state();
    let now = Instant::now();
    let (mut a, mut b) = paired_match(&state, now);

    // drive a crossing into the LEFT goal mouth on a's simulation
    {
        let pitch = a.session.pitch_mut().unwrap();
        pitch.ball.x = BALL_RADIUS + 2.0;
        pitch.ball.y = GROUND_Y - 20.0;
        pitch.ball.vx = -4.0;
    }
    a.session.tick(now);
    a.flush_outbound(&state);
    b.flush_inbound(now);

    // the receiver credits the conceding side's opponent, exactly once
    assert_eq!(b.session.score().right, 1);
    assert_eq!(b.session.score().left, 0);

    // the detector's own tally is untouched until an event comes back
    assert_eq!(a.session.score().left, 0);
    assert_eq!(a.session.score().right, 0);

    // and the reverse direction credits a the same way
    {
        let pitch = b.session.pitch_mut().unwrap();
        pitch.ball.x = BALL_RADIUS + 2.0;
        pitch.ball.y = GROUND_Y - 20.0;
        pitch.ball.vx = -4.0;
    }
    b.session.tick(now);
    b.flush_outbound(&state);
    a.flush_inbound(now);
    assert_eq!(a.session.score().right, 1);
}

#[test]
fn disconnect_ends_the_remaining_peer_with_opponent_left() {
    let state = test_state();
    let now = Instant::now();
    let (a, mut b) = paired_match(&state, now);

    handle_disconnect(&state, a.handle.id);
    b.flush_inbound(now);

    assert_eq!(b.session.phase(), MatchPhase::Ended);
    assert_eq!(b.session.outcome(), Some(MatchOutcome::OpponentLeft));
    assert_eq!(state.rooms.active_sessions(), 0);

    // tearing down what is already gone stays a no-op
    handle_disconnect(&state, a.handle.id);
    assert_eq!(state.rooms.active_sessions(), 0);
}

#[test]
fn an_explicit_leave_racing_the_transport_close_cleans_up_once() {
    let state = test_state();
    let (peer, _rx) = connect(&state);
    handle_client_msg(&state, &peer, ClientMsg::QueueJoin);

    handle_client_msg(&state, &peer, ClientMsg::QueueLeave);
    handle_disconnect(&state, peer.id);
    handle_disconnect(&state, peer.id);

    assert_eq!(state.matchmaker.queue_size(), 0);
    assert!(state.peers.is_empty());
}

#[test]
fn relay_after_teardown_is_dropped_silently() {
    let state = test_state();
    let now = Instant::now();
    let (mut a, mut b) = paired_match(&state, now);
    let session_id = a.session.session_id().unwrap();

    handle_disconnect(&state, b.handle.id);
    a.flush_inbound(now);
    assert_eq!(a.session.phase(), MatchPhase::Ended);

    // a late input into the dead session goes nowhere and breaks nothing
    handle_client_msg(
        &state,
        &a.handle,
        ClientMsg::Input {
            session_id,
            state: InputState::default(),
        },
    );
}

#[test]
fn the_match_clock_ends_the_session_exactly_once_in_real_time() {
    let state = test_state();
    let now = Instant::now();
    let mut a = TestPeer::join(
        &state,
        MatchSettings {
            countdown: Duration::ZERO,
            match_length: Duration::from_millis(30),
        },
    );
    let mut b = TestPeer::join(&state, instant_settings());
    a.flush_inbound(now);
    b.flush_inbound(now);
    a.session.tick(now);
    assert_eq!(a.session.phase(), MatchPhase::Running);

    // irregular tick cadence; the clock is wall-time driven
    let mut transitions = 0;
    for pause_ms in [1u64, 6, 2, 14, 3, 9, 25, 5] {
        std::thread::sleep(Duration::from_millis(pause_ms));
        let was_running = a.session.phase() == MatchPhase::Running;
        a.session.tick(Instant::now());
        if was_running && a.session.phase() == MatchPhase::Ended {
            transitions += 1;
        }
    }

    assert_eq!(a.session.phase(), MatchPhase::Ended);
    assert_eq!(transitions, 1);
    assert_eq!(a.session.outcome(), Some(MatchOutcome::TimeUp));
}
