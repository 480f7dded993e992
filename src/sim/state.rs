//! Simulation state and core types
//!
//! Everything the physics tick mutates lives in [`World`]. The host only sees
//! it through [`PhysicsSnapshot`] and [`RenderSnapshot`].

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::kinematics::forward_kinematics;
use crate::consts::*;

/// Current phase of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// Ball not in play yet (viewport unsized or never reset)
    Waiting,
    /// Ball in flight, physics running
    Active,
    /// Episode ended and awaits a reset
    Terminal(EpisodeOutcome),
}

/// Terminal signal of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    /// Ball entered the goal rectangle
    Goal,
    /// Ball fell to the floor (or the episode ran out of ticks)
    Miss,
}

impl EpisodeOutcome {
    /// Reward added to the last step of the episode
    pub fn terminal_reward(self) -> f32 {
        match self {
            EpisodeOutcome::Goal => 1.0,
            EpisodeOutcome::Miss => -1.0,
        }
    }
}

/// Canvas size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// False until the host reports a usable size
    pub fn is_sized(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Shoulder position: horizontal midpoint, floor level
    #[inline]
    pub fn arm_base(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height)
    }

    /// Clamp a point into the viewport
    #[inline]
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(0.0, self.width.max(0.0)),
            point.y.clamp(0.0, self.height.max(0.0)),
        )
    }
}

/// Axis-aligned goal rectangle (top-left corner + size)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Goal {
    /// Standard goal placement for a viewport
    pub fn layout(viewport: &Viewport) -> Self {
        let center = Vec2::new(
            viewport.width * GOAL_CENTER_X_FRAC,
            viewport.height * GOAL_CENTER_Y_FRAC,
        );
        Self {
            x: center.x - GOAL_WIDTH * 0.5,
            y: center.y - GOAL_HEIGHT * 0.5,
            width: GOAL_WIDTH,
            height: GOAL_HEIGHT,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }
}

/// The ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// False while waiting for the episode to start
    pub active: bool,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: BALL_RADIUS,
            active: false,
        }
    }
}

/// Joint angles and link lengths of the 2-link arm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arm {
    /// Shoulder angle (radians, absolute)
    pub theta1: f32,
    /// Elbow angle (radians, relative to the upper link)
    pub theta2: f32,
    pub l1: f32,
    pub l2: f32,
    /// Elbow position at the end of the previous tick
    pub prev_elbow: Vec2,
    /// End-effector position at the end of the previous tick
    pub prev_effector: Vec2,
    /// Tick of the last impulse per segment (upper, fore)
    pub last_hit_tick: [Option<u64>; 2],
}

impl Arm {
    pub fn new(l1: f32, l2: f32) -> Self {
        Self {
            theta1: -std::f32::consts::FRAC_PI_2,
            theta2: 0.0,
            l1: l1.max(1.0),
            l2: l2.max(1.0),
            prev_elbow: Vec2::ZERO,
            prev_effector: Vec2::ZERO,
            last_hit_tick: [None; 2],
        }
    }

    /// Total reach from the shoulder
    #[inline]
    pub fn reach(&self) -> f32 {
        self.l1 + self.l2
    }

    /// (elbow, effector) for the current angles
    #[inline]
    pub fn joints(&self, base: Vec2) -> (Vec2, Vec2) {
        forward_kinematics(base, self.theta1, self.theta2, self.l1, self.l2)
    }

    /// Resting IK target: straight above the shoulder at 60% reach
    pub fn rest_target(&self, base: Vec2) -> Vec2 {
        base - Vec2::new(0.0, self.reach() * 0.6)
    }

    /// Forget motion history so the next tick sees zero segment velocity
    pub fn sync_history(&mut self, base: Vec2) {
        let (elbow, effector) = self.joints(base);
        self.prev_elbow = elbow;
        self.prev_effector = effector;
    }
}

/// Read-only view handed to the action-choosing caller each active tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicsSnapshot {
    pub ball: Ball,
    pub effector: Vec2,
    pub goal: Goal,
    pub viewport: Viewport,
}

/// Read-only view for the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub theta1: f32,
    pub theta2: f32,
    pub base: Vec2,
    pub elbow: Vec2,
    pub effector: Vec2,
    pub ball: Ball,
    pub goal: Goal,
    pub viewport: Viewport,
    pub phase: EpisodePhase,
    /// Fraction of a fixed step elapsed since the last tick, for interpolation
    pub alpha: f32,
}

/// RNG state wrapper
#[derive(Debug, Clone)]
pub struct RngState {
    rng: Pcg32,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Uniform sample in [lo, hi)
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        self.rng.random_range(lo..hi)
    }
}

/// Complete physics state
#[derive(Debug, Clone)]
pub struct World {
    pub viewport: Viewport,
    pub goal: Goal,
    pub arm: Arm,
    pub ball: Ball,
    /// IK target the arm tracks
    pub target: Vec2,
    pub phase: EpisodePhase,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Ticks elapsed in the current episode
    pub episode_ticks: u64,
    /// Episode length limit (0 disables truncation)
    pub max_episode_ticks: u64,
    /// Reset immediately after a terminal tick
    pub auto_reset: bool,
    pub rng_state: RngState,
}

impl World {
    /// Create a world for the given viewport; the ball waits until the first reset
    pub fn new(viewport: Viewport, seed: u64) -> Self {
        let mut arm = Arm::new(ARM_UPPER_LENGTH, ARM_FORE_LENGTH);
        let base = viewport.arm_base();
        arm.sync_history(base);
        let target = arm.rest_target(base);

        let mut world = Self {
            viewport,
            goal: Goal::layout(&viewport),
            arm,
            ball: Ball::default(),
            target,
            phase: EpisodePhase::Waiting,
            time_ticks: 0,
            episode_ticks: 0,
            max_episode_ticks: DEFAULT_MAX_EPISODE_TICKS,
            auto_reset: true,
            rng_state: RngState::new(seed),
        };
        world.place_waiting_ball();
        world
    }

    /// Put the ball back at its spawn point with fresh velocity and start an episode.
    ///
    /// No-op until the viewport has a usable size.
    pub fn reset_episode(&mut self) {
        if !self.viewport.is_sized() {
            return;
        }
        let base = self.viewport.arm_base();
        let jitter = self.viewport.width * BALL_SPAWN_JITTER_FRAC;
        let x = self.viewport.width * 0.5 + self.rng_state.range(-jitter, jitter);
        let vx = self.rng_state.range(-BALL_SPAWN_MAX_VX, BALL_SPAWN_MAX_VX);

        self.ball = Ball {
            pos: Vec2::new(x, self.viewport.height * BALL_SPAWN_Y_FRAC),
            vel: Vec2::new(vx, 0.0),
            radius: BALL_RADIUS,
            active: true,
        };
        self.target = self.viewport.clamp(self.arm.rest_target(base));
        self.arm.last_hit_tick = [None; 2];
        self.arm.sync_history(base);
        self.episode_ticks = 0;
        self.phase = EpisodePhase::Active;
    }

    /// Apply a new viewport size. Re-lays-out the goal; the ball only moves while waiting.
    pub fn resize(&mut self, viewport: Viewport) {
        if !viewport.is_sized() || viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.goal = Goal::layout(&viewport);
        self.target = viewport.clamp(self.target);
        // Shoulder moved: keep segment velocities from spiking on the next tick
        self.arm.sync_history(viewport.arm_base());
        if self.phase == EpisodePhase::Waiting {
            self.place_waiting_ball();
        }
    }

    fn place_waiting_ball(&mut self) {
        self.ball.pos = Vec2::new(
            self.viewport.width * 0.5,
            self.viewport.height * BALL_SPAWN_Y_FRAC,
        );
        self.ball.vel = Vec2::ZERO;
        self.ball.active = false;
    }

    /// Current end-effector position
    pub fn effector(&self) -> Vec2 {
        self.arm.joints(self.viewport.arm_base()).1
    }

    /// Snapshot for action selection, only while an episode is active
    pub fn snapshot(&self) -> Option<PhysicsSnapshot> {
        if self.phase != EpisodePhase::Active {
            return None;
        }
        Some(PhysicsSnapshot {
            ball: self.ball,
            effector: self.effector(),
            goal: self.goal,
            viewport: self.viewport,
        })
    }

    /// Snapshot for the renderer, always available
    pub fn render_snapshot(&self) -> RenderSnapshot {
        let base = self.viewport.arm_base();
        let (elbow, effector) = self.arm.joints(base);
        RenderSnapshot {
            theta1: self.arm.theta1,
            theta2: self.arm.theta2,
            base,
            elbow,
            effector,
            ball: self.ball,
            goal: self.goal,
            viewport: self.viewport,
            phase: self.phase,
            alpha: 0.0,
        }
    }
}
