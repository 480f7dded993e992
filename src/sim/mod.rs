//! Deterministic simulation module
//!
//! All arm and ball physics lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - No rendering, learning or platform dependencies

pub mod clock;
pub mod collision;
pub mod kinematics;
pub mod state;
pub mod tick;

pub use clock::FixedStep;
pub use collision::{CollisionResult, ball_capsule_collision, ball_goal_overlap};
pub use kinematics::{forward_kinematics, solve_ik};
pub use state::{
    Arm, Ball, EpisodeOutcome, EpisodePhase, Goal, PhysicsSnapshot, RenderSnapshot, Viewport,
    World,
};
pub use tick::{TickInput, TickReport, tick};
