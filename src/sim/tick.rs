//! Fixed timestep simulation tick
//!
//! Advances the arm and the ball by one step and reports terminal outcomes.

use glam::Vec2;

use super::collision::{
    ball_below_floor, ball_capsule_collision, ball_goal_overlap, resolve_moving_contact,
    resolve_walls,
};
use super::kinematics::solve_ik;
use super::state::{EpisodeOutcome, EpisodePhase, World};
use crate::consts::*;
use crate::normalize_angle;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// IK target delta in action units; each component is clamped to [-1, 1]
    pub action: Option<Vec2>,
}

impl TickInput {
    pub fn with_action(action: [f32; 2]) -> Self {
        Self {
            action: Some(Vec2::from_array(action)),
        }
    }
}

/// What happened during a tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Set on the tick the episode ended
    pub outcome: Option<EpisodeOutcome>,
    /// Arm contacts that produced an impulse
    pub contacts: u32,
}

/// Per-step fraction of the remaining angle the arm covers
#[inline]
fn smoothing_factor(dt: f32) -> f32 {
    1.0 - (1.0 - ARM_SMOOTHING).powf(dt * REFERENCE_HZ)
}

/// Per-step velocity retention
#[inline]
fn damping_factor(dt: f32) -> f32 {
    BALL_DAMPING.powf(dt * REFERENCE_HZ)
}

/// Advance the world by one fixed timestep
pub fn tick(world: &mut World, input: &TickInput, dt: f32) -> TickReport {
    let mut report = TickReport::default();
    if world.phase != EpisodePhase::Active || dt <= 0.0 {
        return report;
    }

    world.time_ticks += 1;
    world.episode_ticks += 1;
    let base = world.viewport.arm_base();

    // Move the IK target by the action
    if let Some(action) = input.action {
        if action.is_finite() {
            let delta = action.clamp(Vec2::splat(-1.0), Vec2::splat(1.0)) * ACTION_SCALE;
            world.target = world.viewport.clamp(world.target + delta);
        }
    }

    // Track the IK solution with frame-rate independent smoothing
    let arm = &mut world.arm;
    let (goal_theta1, goal_theta2) = solve_ik(world.target, base, arm.l1, arm.l2);
    let alpha = smoothing_factor(dt);
    arm.theta1 = normalize_angle(arm.theta1 + normalize_angle(goal_theta1 - arm.theta1) * alpha);
    arm.theta2 = normalize_angle(arm.theta2 + normalize_angle(goal_theta2 - arm.theta2) * alpha);

    let (elbow, effector) = arm.joints(base);
    let elbow_vel = (elbow - arm.prev_elbow) / dt;
    let effector_vel = (effector - arm.prev_effector) / dt;
    arm.prev_elbow = elbow;
    arm.prev_effector = effector;

    // Integrate the ball
    let ball = &mut world.ball;
    ball.vel.y += GRAVITY * dt;
    ball.vel *= damping_factor(dt);
    ball.pos += ball.vel * dt;

    // Arm segments as capsules: (start, end, start velocity, end velocity)
    let segments = [
        (base, elbow, Vec2::ZERO, elbow_vel),
        (elbow, effector, elbow_vel, effector_vel),
    ];
    for (i, &(a, b, vel_a, vel_b)) in segments.iter().enumerate() {
        let hit = ball_capsule_collision(ball.pos, ball.radius, a, b, SEGMENT_PADDING);
        if !hit.hit {
            continue;
        }
        ball.pos += hit.normal * hit.penetration;

        let ready = arm.last_hit_tick[i]
            .is_none_or(|last| world.time_ticks.saturating_sub(last) >= COLLISION_COOLDOWN_TICKS);
        if !ready {
            continue;
        }
        let surface_vel = vel_a.lerp(vel_b, hit.t);
        ball.vel = resolve_moving_contact(
            ball.vel,
            surface_vel,
            hit.normal,
            ARM_RESTITUTION,
            ARM_VELOCITY_TRANSFER,
        )
        .clamp_length_max(BALL_MAX_SPEED);
        arm.last_hit_tick[i] = Some(world.time_ticks);
        report.contacts += 1;
    }

    resolve_walls(ball, &world.viewport, WALL_RESTITUTION);

    let outcome = if ball_below_floor(ball, &world.viewport) {
        Some(EpisodeOutcome::Miss)
    } else if ball_goal_overlap(ball.pos, ball.radius, &world.goal) {
        Some(EpisodeOutcome::Goal)
    } else if world.max_episode_ticks > 0 && world.episode_ticks >= world.max_episode_ticks {
        log::debug!("Episode truncated after {} ticks", world.episode_ticks);
        Some(EpisodeOutcome::Miss)
    } else {
        None
    };

    if let Some(outcome) = outcome {
        log::debug!(
            "Episode ended: {:?} after {} ticks",
            outcome,
            world.episode_ticks
        );
        world.phase = EpisodePhase::Terminal(outcome);
        report.outcome = Some(outcome);
        if world.auto_reset {
            world.reset_episode();
        }
    }

    report
}
