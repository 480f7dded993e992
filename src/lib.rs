//! Arm Juggler - a 2-link arm that learns to juggle a ball into a goal
//!
//! Core modules:
//! - `sim`: Deterministic simulation (kinematics, physics, collisions)
//! - `rl`: Hand-differentiated policy network and policy-gradient learners
//! - `trainer`: Training loop controller gluing the simulation to the learner
//! - `settings`: Training configuration and presets
//! - `platform`: JSON host boundary and browser bindings

pub mod platform;
pub mod rl;
pub mod settings;
pub mod sim;
pub mod trainer;

pub use settings::{PolicyMode, Settings};
pub use trainer::{EpisodeEnd, Sandbox, TrainingStats};

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest wall-clock delta accepted for a single frame (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;
    /// Upper bound of the training speed multiplier
    pub const MAX_SIMULATION_SPEED: f32 = 40.0;

    /// Viewport used until the host reports a real size
    pub const DEFAULT_VIEWPORT_WIDTH: f32 = 800.0;
    pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 600.0;

    /// Arm geometry (pixels)
    pub const ARM_UPPER_LENGTH: f32 = 160.0;
    pub const ARM_FORE_LENGTH: f32 = 130.0;
    /// Half-thickness of an arm segment, added to the ball radius for capsule tests
    pub const SEGMENT_PADDING: f32 = 6.0;
    /// Slack kept below full extension so the law of cosines stays well-conditioned
    pub const IK_REACH_EPSILON: f32 = 0.5;
    /// Distance floor when the IK target sits on the shoulder
    pub const IK_MIN_DISTANCE: f32 = 1e-3;
    /// Fraction of the remaining angle covered per reference frame
    pub const ARM_SMOOTHING: f32 = 0.25;
    /// Frame rate the smoothing and damping factors are tuned for
    pub const REFERENCE_HZ: f32 = 60.0;
    /// Pixels the IK target moves per tick for a unit action
    pub const ACTION_SCALE: f32 = 6.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 12.0;
    /// Downward acceleration (pixels/s²)
    pub const GRAVITY: f32 = 600.0;
    /// Velocity retained per reference frame
    pub const BALL_DAMPING: f32 = 0.999;
    pub const BALL_MAX_SPEED: f32 = 1400.0;
    pub const BALL_SPAWN_Y_FRAC: f32 = 0.15;
    /// Horizontal spawn jitter as a fraction of viewport width
    pub const BALL_SPAWN_JITTER_FRAC: f32 = 0.12;
    pub const BALL_SPAWN_MAX_VX: f32 = 80.0;

    /// Collision response
    pub const WALL_RESTITUTION: f32 = 0.8;
    pub const ARM_RESTITUTION: f32 = 0.7;
    /// Share of the segment's normal velocity handed to the ball on contact
    pub const ARM_VELOCITY_TRANSFER: f32 = 0.6;
    /// Ticks before the same segment may apply another impulse
    pub const COLLISION_COOLDOWN_TICKS: u64 = 8;

    /// Goal layout (center as a fraction of the viewport)
    pub const GOAL_WIDTH: f32 = 100.0;
    pub const GOAL_HEIGHT: f32 = 70.0;
    pub const GOAL_CENTER_X_FRAC: f32 = 0.82;
    pub const GOAL_CENTER_Y_FRAC: f32 = 0.3;

    /// Velocity normalization for the observation vector (pixels/s)
    pub const VELOCITY_SCALE: f32 = 800.0;
    /// Episode tick limit (20 seconds of simulated time)
    pub const DEFAULT_MAX_EPISODE_TICKS: u64 = 20 * 120;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    if !angle.is_finite() {
        return 0.0;
    }
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
