//! Collision detection and response
//!
//! Arm segments are capsules (segment + padding), walls are the viewport
//! edges and the goal is an axis-aligned rectangle.

use glam::Vec2;

use super::state::{Ball, Goal, Viewport};

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Surface normal at collision (pointing toward ball center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
    /// Parameter of the closest point along the segment (0 = start, 1 = end)
    pub t: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
            t: 0.0,
        }
    }
}

/// Check a ball against the capsule around segment `a`-`b`
pub fn ball_capsule_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    a: Vec2,
    b: Vec2,
    padding: f32,
) -> CollisionResult {
    let seg = b - a;
    let len_sq = seg.length_squared();
    let t = if len_sq < 1e-4 {
        0.0
    } else {
        ((ball_pos - a).dot(seg) / len_sq).clamp(0.0, 1.0)
    };
    let closest = a + seg * t;
    let offset = ball_pos - closest;
    let dist = offset.length();
    let reach = ball_radius + padding;

    if dist >= reach {
        return CollisionResult::miss();
    }

    let normal = if dist > 1e-5 {
        offset / dist
    } else {
        // Center on the segment: push out along the perpendicular facing up-screen
        let perp = Vec2::new(-seg.y, seg.x).normalize_or(Vec2::NEG_Y);
        if perp.y > 0.0 { -perp } else { perp }
    };

    CollisionResult {
        hit: true,
        normal,
        penetration: reach - dist,
        t,
    }
}

/// Resolve a ball/moving-surface contact.
///
/// The approaching part of the relative velocity is bounced with `restitution`,
/// then `transfer` times the surface's normal speed is added on top so a
/// swinging arm can launch the ball.
pub fn resolve_moving_contact(
    ball_vel: Vec2,
    surface_vel: Vec2,
    normal: Vec2,
    restitution: f32,
    transfer: f32,
) -> Vec2 {
    let relative = ball_vel - surface_vel;
    let approach = relative.dot(normal);
    let mut vel = ball_vel;
    if approach < 0.0 {
        vel -= (1.0 + restitution) * approach * normal;
    }
    let push = surface_vel.dot(normal);
    if push > 0.0 {
        vel += normal * push * transfer;
    }
    vel
}

/// Bounce off the left, right and top walls. Returns true on any contact.
///
/// The floor is left open: crossing it ends the episode.
pub fn resolve_walls(ball: &mut Ball, viewport: &Viewport, restitution: f32) -> bool {
    let r = ball.radius;
    let mut hit = false;

    if ball.pos.x - r < 0.0 {
        ball.pos.x = r.min(viewport.width);
        ball.vel.x = ball.vel.x.abs() * restitution;
        hit = true;
    } else if ball.pos.x + r > viewport.width {
        ball.pos.x = (viewport.width - r).max(0.0);
        ball.vel.x = -ball.vel.x.abs() * restitution;
        hit = true;
    }

    if ball.pos.y - r < 0.0 {
        ball.pos.y = r.min(viewport.height);
        ball.vel.y = ball.vel.y.abs() * restitution;
        hit = true;
    }

    hit
}

/// True once the ball's bottom edge reaches the floor
#[inline]
pub fn ball_below_floor(ball: &Ball, viewport: &Viewport) -> bool {
    ball.pos.y + ball.radius >= viewport.height
}

/// Circle/rectangle overlap by clamping the center onto the rectangle
pub fn ball_goal_overlap(ball_pos: Vec2, ball_radius: f32, goal: &Goal) -> bool {
    let closest = ball_pos.clamp(goal.min(), goal.max());
    (ball_pos - closest).length_squared() < ball_radius * ball_radius
}
