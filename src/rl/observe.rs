//! Observation vector fed to the policy

use crate::consts::VELOCITY_SCALE;
use crate::sim::PhysicsSnapshot;

/// Length of the observation vector
pub const STATE_DIM: usize = 8;

/// Normalized state: ball position, ball velocity, ball→goal center, ball→effector.
///
/// Positions and offsets are divided by the viewport size so the policy sees
/// roughly unit-range inputs on any canvas.
pub fn observe(snapshot: &PhysicsSnapshot) -> [f32; STATE_DIM] {
    let w = snapshot.viewport.width.max(1.0);
    let h = snapshot.viewport.height.max(1.0);
    let ball = &snapshot.ball;
    let to_goal = snapshot.goal.center() - ball.pos;
    let to_effector = snapshot.effector - ball.pos;

    let state = [
        ball.pos.x / w,
        ball.pos.y / h,
        ball.vel.x / VELOCITY_SCALE,
        ball.vel.y / VELOCITY_SCALE,
        to_goal.x / w,
        to_goal.y / h,
        to_effector.x / w,
        to_effector.y / h,
    ];
    state.map(|v| if v.is_finite() { v } else { 0.0 })
}
