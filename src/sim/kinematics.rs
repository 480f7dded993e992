//! Closed-form 2-link inverse kinematics
//!
//! Screen space: x grows right, y grows down. An angle of -π/2 points the
//! link straight up from its joint. `theta2` is measured relative to the
//! upper link.

use glam::Vec2;

use crate::consts::{IK_MIN_DISTANCE, IK_REACH_EPSILON};

/// Solve joint angles that put the end-effector on `target`.
///
/// Targets beyond `l1 + l2 - IK_REACH_EPSILON` are pulled back along the
/// same direction. Always returns finite angles.
pub fn solve_ik(target: Vec2, base: Vec2, l1: f32, l2: f32) -> (f32, f32) {
    // Solved in f64: acos is ill-conditioned near full extension
    let (l1, l2) = (l1 as f64, l2 as f64);
    let dx = (target.x - base.x) as f64;
    let dy = (target.y - base.y) as f64;

    let max_reach = (l1 + l2 - IK_REACH_EPSILON as f64).max(IK_MIN_DISTANCE as f64);
    let dist = (dx * dx + dy * dy).sqrt();
    let heading = if dist > 0.0 { dy.atan2(dx) } else { 0.0 };
    let dist = dist.clamp(IK_MIN_DISTANCE as f64, max_reach);

    // Interior angle at the elbow
    let cos_elbow = ((l1 * l1 + l2 * l2 - dist * dist) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
    let theta2 = std::f64::consts::PI - cos_elbow.acos();

    // Angle between the upper link and the shoulder→target line
    let cos_offset = ((l1 * l1 + dist * dist - l2 * l2) / (2.0 * l1 * dist)).clamp(-1.0, 1.0);
    let theta1 = heading - cos_offset.acos();

    (theta1 as f32, theta2 as f32)
}

/// Elbow and end-effector positions for the given joint angles
#[inline]
pub fn forward_kinematics(base: Vec2, theta1: f32, theta2: f32, l1: f32, l2: f32) -> (Vec2, Vec2) {
    let elbow = base + Vec2::from_angle(theta1) * l1;
    let effector = elbow + Vec2::from_angle(theta1 + theta2) * l2;
    (elbow, effector)
}
