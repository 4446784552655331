//! Per-peer stepping engine for two player bodies and a ball.
//!
//! Each peer runs the full simulation locally, advancing its own player from
//! local input and the opponent from the last relayed input snapshot. The two
//! simulations are only approximately consistent; divergence is bounded by
//! the per-tick input relay, not corrected.
//!
//! Step magnitudes are per-tick at the nominal rate in
//! [`crate::util::time::SIMULATION_TPS`], not delta-scaled.

use rand::Rng;

use crate::ws::protocol::{InputState, Side};

/// Playing field in virtual units
pub const PITCH_WIDTH: f32 = 900.0;
pub const PITCH_HEIGHT: f32 = 500.0;
/// Ground line; bodies are anchored at their base
pub const GROUND_Y: f32 = PITCH_HEIGHT - 40.0;

/// Goal mouth geometry at each end of the pitch
pub const GOAL_WIDTH: f32 = 80.0;
pub const GOAL_HEIGHT: f32 = 120.0;
/// A ball must be below the crossbar by this lip to count as a crossing
const GOAL_MOUTH_LIP: f32 = 10.0;

pub const PLAYER_RADIUS: f32 = 24.0;
pub const BALL_RADIUS: f32 = 14.0;
/// Horizontal offset of each player's spawn point from its own goal
const SPAWN_OFFSET: f32 = 120.0;
/// Kickoff drop height of the ball above the ground line
const BALL_DROP: f32 = 60.0;

const GRAVITY: f32 = 0.8;
const FRICTION: f32 = 0.92;
const MOVE_THRUST: f32 = 2.3;
const JUMP_IMPULSE: f32 = -12.0;
/// Horizontal speeds below this snap to a dead stop
const STOP_EPSILON: f32 = 0.05;

const KICK_POWER: f32 = 9.0;
/// Extra reach beyond touching distance for a kick to connect
const KICK_RANGE_PAD: f32 = 10.0;
/// Ticks between local kick attempts (~250 ms at 60 Hz)
pub const KICK_COOLDOWN_TICKS: u32 = 15;
/// Per-tick chance that the opponent's held kick flag fires; relayed state
/// does not carry the exact kick timing
pub const REMOTE_KICK_CHANCE: f64 = 0.2;

const WALL_RESTITUTION: f32 = 0.9;
const GROUND_RESTITUTION: f32 = 0.85;
const ROLL_DAMPING: f32 = 0.98;
/// Fraction of the impact speed kept when the ball is pushed off the goal roof
const CROSSBAR_DAMPING: f32 = 0.5;

const BOUNCE_IMPULSE: f32 = 1.5;
/// Fraction of the player's own velocity the ball inherits on contact
const CARRY_FACTOR: f32 = 0.2;

/// A simulated circular body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
}

impl Body {
    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// A player body with ground contact state and its side affinity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerBody {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub grounded: bool,
    pub side: Side,
}

impl PlayerBody {
    fn spawn(side: Side) -> Self {
        Self {
            x: spawn_x(side),
            y: GROUND_Y,
            vx: 0.0,
            vy: 0.0,
            radius: PLAYER_RADIUS,
            grounded: true,
            side,
        }
    }
}

fn spawn_x(side: Side) -> f32 {
    match side {
        Side::Left => SPAWN_OFFSET,
        Side::Right => PITCH_WIDTH - SPAWN_OFFSET,
    }
}

/// The full simulated world of one peer
pub struct Pitch {
    /// The locally controlled player
    pub home: PlayerBody,
    /// The opponent, advanced from relayed input
    pub away: PlayerBody,
    pub ball: Body,
    /// Remaining ticks before the local player may kick again
    kick_cooldown: u32,
    tick: u64,
}

impl Pitch {
    pub fn new(home_side: Side) -> Self {
        let mut pitch = Self {
            home: PlayerBody::spawn(home_side),
            away: PlayerBody::spawn(home_side.opponent()),
            ball: Body {
                x: PITCH_WIDTH / 2.0,
                y: GROUND_Y - BALL_DROP,
                vx: 0.0,
                vy: 0.0,
                radius: BALL_RADIUS,
            },
            kick_cooldown: 0,
            tick: 0,
        };
        pitch.reset_kickoff();
        pitch
    }

    /// Put both players and the ball back in their kickoff spots
    pub fn reset_kickoff(&mut self) {
        self.home = PlayerBody::spawn(self.home.side);
        self.away = PlayerBody::spawn(self.away.side);
        self.ball.x = PITCH_WIDTH / 2.0;
        self.ball.y = GROUND_Y - BALL_DROP;
        self.ball.vx = 0.0;
        self.ball.vy = 0.0;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The two players in pitch order, independent of which one is local
    pub fn players_by_side(&self) -> (&PlayerBody, &PlayerBody) {
        match self.home.side {
            Side::Left => (&self.home, &self.away),
            Side::Right => (&self.away, &self.home),
        }
    }

    /// Advance the world one tick. Returns the conceding side if the ball
    /// crossed into a goal mouth this tick; the caller resets for kickoff
    /// and relays the event.
    pub fn step(
        &mut self,
        local: InputState,
        remote: InputState,
        rng: &mut impl Rng,
    ) -> Option<Side> {
        self.tick += 1;

        control(&mut self.home, local);
        control(&mut self.away, remote);

        step_player(&mut self.home);
        step_player(&mut self.away);
        step_ball(&mut self.ball);

        collide(&mut self.ball, &self.home);
        collide(&mut self.ball, &self.away);

        if self.kick_cooldown > 0 {
            self.kick_cooldown -= 1;
        }
        if local.kick && self.kick_cooldown == 0 {
            // Cooldown is consumed by the attempt, connecting or not
            try_kick(&mut self.ball, &self.home);
            self.kick_cooldown = KICK_COOLDOWN_TICKS;
        }
        if remote.kick && rng.gen_bool(REMOTE_KICK_CHANCE) {
            try_kick(&mut self.ball, &self.away);
        }

        self.goal_crossed()
    }

    /// The mouth the ball currently sits in, as the side that conceded
    fn goal_crossed(&self) -> Option<Side> {
        let ball = &self.ball;
        let below_crossbar = ball.y > GROUND_Y - GOAL_HEIGHT + GOAL_MOUTH_LIP;
        if !below_crossbar {
            return None;
        }
        if ball.x < ball.radius + 2.0 {
            Some(Side::Left)
        } else if ball.x > PITCH_WIDTH - ball.radius - 2.0 {
            Some(Side::Right)
        } else {
            None
        }
    }
}

/// Apply one tick of control intent to a player's velocity
fn control(player: &mut PlayerBody, input: InputState) {
    if input.left {
        player.vx -= MOVE_THRUST;
    }
    if input.right {
        player.vx += MOVE_THRUST;
    }
    if input.jump && player.grounded {
        player.vy = JUMP_IMPULSE;
        player.grounded = false;
    }
}

/// Integrate a player and clamp it to the pitch; contact zeroes velocity
fn step_player(player: &mut PlayerBody) {
    player.vy += GRAVITY;
    player.x += player.vx;
    player.y += player.vy;

    if player.y > GROUND_Y {
        player.y = GROUND_Y;
        player.vy = 0.0;
        player.grounded = true;
    }
    if player.x < player.radius {
        player.x = player.radius;
        player.vx = 0.0;
    }
    if player.x > PITCH_WIDTH - player.radius {
        player.x = PITCH_WIDTH - player.radius;
        player.vx = 0.0;
    }

    player.vx *= FRICTION;
    if player.vx.abs() < STOP_EPSILON {
        player.vx = 0.0;
    }
}

/// Integrate the ball; wall and ground contacts are inelastic bounces
fn step_ball(ball: &mut Body) {
    ball.vy += GRAVITY;
    ball.x += ball.vx;
    ball.y += ball.vy;

    if ball.x < ball.radius {
        ball.x = ball.radius;
        ball.vx *= -WALL_RESTITUTION;
    }
    if ball.x > PITCH_WIDTH - ball.radius {
        ball.x = PITCH_WIDTH - ball.radius;
        ball.vx *= -WALL_RESTITUTION;
    }
    if ball.y < ball.radius {
        ball.y = ball.radius;
        ball.vy *= -WALL_RESTITUTION;
    }
    if ball.y > GROUND_Y - 2.0 {
        ball.y = GROUND_Y - 2.0;
        ball.vy *= -GROUND_RESTITUTION;
        ball.vx *= ROLL_DAMPING;
    }

    // Crossbar: keep the ball out of the goal roof
    let crossbar_y = GROUND_Y - GOAL_HEIGHT;
    if ball.y - ball.radius < crossbar_y
        && (ball.x < GOAL_WIDTH || ball.x > PITCH_WIDTH - GOAL_WIDTH)
    {
        ball.y = crossbar_y + ball.radius;
        ball.vy = ball.vy.abs() * CROSSBAR_DAMPING;
    }
}

/// Circle-circle penetration correction plus an impulse about the contact
/// normal; only the ball is displaced
fn collide(ball: &mut Body, player: &PlayerBody) {
    let dx = ball.x - player.x;
    let dy = ball.y - player.y;
    let dist = (dx * dx + dy * dy).sqrt();
    let min_dist = ball.radius + player.radius;
    if dist >= min_dist {
        return;
    }

    let denom = if dist == 0.0 { 1.0 } else { dist };
    let nx = dx / denom;
    let ny = dy / denom;
    let overlap = min_dist - dist;
    ball.x += nx * overlap;
    ball.y += ny * overlap;

    let rel_vx = ball.vx - player.vx;
    let rel_vy = ball.vy - player.vy;
    let dot = rel_vx * nx + rel_vy * ny;
    ball.vx -= BOUNCE_IMPULSE * dot * nx;
    ball.vy -= BOUNCE_IMPULSE * dot * ny;

    ball.vx += player.vx * CARRY_FACTOR;
    ball.vy += player.vy * CARRY_FACTOR;
}

/// Kick impulse directed player -> ball, biased toward the opponent's end
fn try_kick(ball: &mut Body, player: &PlayerBody) {
    let dx = ball.x - player.x;
    let dy = ball.y - player.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist >= player.radius + ball.radius + KICK_RANGE_PAD {
        return;
    }

    let angle = dy.atan2(dx);
    let dir = match player.side {
        Side::Left => 1.0,
        Side::Right => -1.0,
    };
    ball.vx += angle.cos() * KICK_POWER + dir * 2.0;
    ball.vy += angle.sin() * KICK_POWER - 2.0;
}
