//! Training loop controller
//!
//! [`Sandbox`] owns the world, the policy and the learner, and drives them from
//! host frame callbacks. Per fixed step: snapshot → policy → tick → buffer,
//! then learning on episode end before the next action is chosen.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::consts::{MAX_SIMULATION_SPEED, MAX_SUBSTEPS, SIM_DT};
use crate::rl::{Learner, PolicyNetwork, StepRecord, Trajectory, UpdateReport, observe};
use crate::settings::{PolicyMode, Settings};
use crate::sim::{
    EpisodeOutcome, EpisodePhase, FixedStep, RenderSnapshot, TickInput, Viewport, World, tick,
};

/// Episodes kept for the rolling success rate
const RECENT_WINDOW: usize = 100;

/// Upper bound on physics steps in a single frame
pub const MAX_FRAME_STEPS: u32 = MAX_SUBSTEPS * MAX_SIMULATION_SPEED as u32;

/// Emitted once per finished episode
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeEnd {
    pub outcome: EpisodeOutcome,
    /// 1-based episode number within the current run (frozen outside training)
    pub episode: u64,
    /// Goals scored since the sandbox was created
    pub score: u64,
    /// Goals in the current run
    pub goals: u64,
    /// Misses in the current run
    pub misses: u64,
    /// Ticks the episode lasted
    pub steps: u64,
    /// Undiscounted reward including the terminal reward
    pub episode_return: f32,
    /// Set when this episode completed a batch
    pub update: Option<UpdateReport>,
}

/// Running counters for the current training run; greedy play is not counted
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingStats {
    pub episodes: u64,
    pub goals: u64,
    pub misses: u64,
    pub updates: u64,
    pub std: f32,
    pub baseline: f32,
    /// Goal share over the last 100 episodes
    pub success_rate: f32,
    #[serde(skip)]
    recent: VecDeque<bool>,
}

impl TrainingStats {
    fn record(&mut self, outcome: EpisodeOutcome) {
        self.episodes += 1;
        let goal = outcome == EpisodeOutcome::Goal;
        if goal {
            self.goals += 1;
        } else {
            self.misses += 1;
        }

        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(goal);
        let hits = self.recent.iter().filter(|&&g| g).count();
        self.success_rate = hits as f32 / self.recent.len() as f32;
    }

    fn sync(&mut self, learner: &Learner) {
        self.updates = learner.updates();
        self.std = learner.std();
        self.baseline = learner.baseline();
    }
}

/// Apply the speed multiplier to a base step count, carrying the fractional part
pub fn scaled_steps(base: u32, speed: f32, carry: &mut f32) -> u32 {
    let total = base as f32 * speed + *carry;
    let whole = total.floor();
    *carry = total - whole;
    if whole >= MAX_FRAME_STEPS as f32 {
        *carry = 0.0;
        return MAX_FRAME_STEPS;
    }
    whole as u32
}

/// The whole learning sandbox: simulation, policy, learner and bookkeeping
#[derive(Debug, Clone)]
pub struct Sandbox {
    world: World,
    clock: FixedStep,
    settings: Settings,
    /// None until training has been started once
    policy: Option<PolicyNetwork>,
    learner: Option<Learner>,
    trajectory: Trajectory,
    /// Weight init and exploration noise
    rng: Pcg32,
    training: bool,
    speed: f32,
    speed_carry: f32,
    stats: TrainingStats,
    score: u64,
    episode_steps: u64,
    episode_return: f32,
}

impl Sandbox {
    pub fn new(settings: Settings, viewport: Viewport) -> Self {
        let settings = settings.sanitized();
        let mut world = World::new(viewport, settings.seed);
        world.max_episode_ticks = settings.max_episode_ticks;
        world.reset_episode();

        Self {
            world,
            clock: FixedStep::new(),
            rng: Pcg32::seed_from_u64(settings.seed.wrapping_add(1)),
            speed: settings.simulation_speed,
            settings,
            policy: None,
            learner: None,
            trajectory: Trajectory::new(),
            training: false,
            speed_carry: 0.0,
            stats: TrainingStats::default(),
            score: 0,
            episode_steps: 0,
            episode_return: 0.0,
        }
    }

    // === Accessors ===

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn policy(&self) -> Option<&PolicyNetwork> {
        self.policy.as_ref()
    }

    pub fn learner(&self) -> Option<&Learner> {
        self.learner.as_ref()
    }

    /// Steps recorded so far in the current episode
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn mode(&self) -> PolicyMode {
        self.settings.mode
    }

    pub fn simulation_speed(&self) -> f32 {
        self.speed
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn render_snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            alpha: self.clock.alpha(),
            ..self.world.render_snapshot()
        }
    }

    // === Host commands ===

    /// Respawn the ball; any partial trajectory is dropped
    pub fn reset_episode(&mut self) {
        self.trajectory.clear();
        self.episode_steps = 0;
        self.episode_return = 0.0;
        self.world.reset_episode();
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.world.resize(Viewport::new(width, height));
        // First real size: start the ball
        if self.world.phase == EpisodePhase::Waiting {
            self.reset_episode();
        }
    }

    /// Fresh weights, optimizer, exploration std, baseline and counters
    pub fn start_training(&mut self) {
        let policy = PolicyNetwork::new(&self.settings.hidden_layers, &mut self.rng);
        let learner = Learner::new(&self.settings, &policy);
        log::info!(
            "Training started: {} {} ({} params)",
            self.settings.mode.as_str(),
            policy.arch_string(),
            policy.param_count()
        );

        self.stats = TrainingStats::default();
        self.stats.sync(&learner);
        self.policy = Some(policy);
        self.learner = Some(learner);
        self.training = true;
        self.clock.reset();
        self.speed_carry = 0.0;
        self.reset_episode();
    }

    /// Abort training. The partial episode is discarded, not learned from;
    /// the current policy keeps driving the arm greedily.
    pub fn stop_training(&mut self) {
        if !self.training {
            return;
        }
        self.training = false;
        self.trajectory.clear();
        if let Some(learner) = &mut self.learner {
            learner.discard();
        }
        log::info!(
            "Training stopped after {} episodes ({} updates)",
            self.stats.episodes,
            self.stats.updates
        );
    }

    /// Switch learning rule. Buffers are discarded and the episode restarts.
    pub fn set_policy_mode(&mut self, mode: PolicyMode) {
        if mode == self.settings.mode {
            return;
        }
        self.settings.mode = mode;
        if let Some(learner) = &mut self.learner {
            learner.set_mode(mode);
            self.stats.sync(learner);
        }
        log::info!("Policy mode set to {}", mode.as_str());
        if self.training {
            self.reset_episode();
        }
    }

    /// Physics steps per frame multiplier while training, clamped to [1, 40]
    pub fn set_simulation_speed(&mut self, speed: f32) {
        let speed = if speed.is_finite() { speed } else { 1.0 };
        self.speed = speed.clamp(1.0, MAX_SIMULATION_SPEED);
        self.speed_carry = 0.0;
    }

    // === Frame loop ===

    /// Advance by a wall-clock frame delta (seconds)
    pub fn frame(&mut self, dt: f32) -> Vec<EpisodeEnd> {
        let base = self.clock.advance(dt, MAX_SUBSTEPS);
        let steps = if self.training {
            scaled_steps(base, self.speed, &mut self.speed_carry)
        } else {
            base
        };

        let mut ended = Vec::new();
        for _ in 0..steps {
            if let Some(end) = self.step() {
                ended.push(end);
            }
        }
        ended
    }

    /// Run exactly one fixed physics step
    pub fn step(&mut self) -> Option<EpisodeEnd> {
        let snapshot = self.world.snapshot()?;
        let state = observe(&snapshot);

        let mut sampled = None;
        let input = match (&self.policy, &self.learner) {
            (Some(policy), Some(learner)) if self.training => {
                let sample = policy.sample(&state, learner.std(), &mut self.rng);
                sampled = Some(sample);
                TickInput::with_action(sample.action)
            }
            (Some(policy), _) => TickInput::with_action(policy.mean_action(&state)),
            // Untrained: hold the rest target
            (None, _) => TickInput::default(),
        };

        let report = tick(&mut self.world, &input, SIM_DT);
        let reward = report.contacts as f32 * self.settings.contact_reward;
        self.episode_steps += 1;
        self.episode_return += reward;

        if let Some(sample) = sampled {
            self.trajectory.push(StepRecord {
                state,
                action: sample.action,
                log_prob: sample.log_prob,
                reward,
            });
        }

        let outcome = report.outcome?;
        Some(self.finish_episode(outcome))
    }

    fn finish_episode(&mut self, outcome: EpisodeOutcome) -> EpisodeEnd {
        self.episode_return += outcome.terminal_reward();
        if outcome == EpisodeOutcome::Goal {
            self.score += 1;
        }

        let mut update = None;
        let trajectory = self.trajectory.take();
        if self.training {
            self.stats.record(outcome);
            if let (Some(policy), Some(learner)) = (&mut self.policy, &mut self.learner) {
                update = learner.finish_episode(policy, trajectory, outcome);
                if let Some(report) = &update {
                    log::info!(
                        "{} update #{}: {} episodes, {} steps, mean return {:.3}, baseline {:.3}, |r-1| {:.4}, clipped {:.1}%, std {:.3}",
                        report.mode.as_str(),
                        learner.updates(),
                        report.episodes,
                        report.steps,
                        report.mean_return,
                        report.baseline,
                        report.mean_ratio_deviation,
                        report.clip_fraction * 100.0,
                        report.std
                    );
                }
                self.stats.sync(learner);
            }
        }

        let end = EpisodeEnd {
            outcome,
            episode: self.stats.episodes,
            score: self.score,
            goals: self.stats.goals,
            misses: self.stats.misses,
            steps: self.episode_steps,
            episode_return: self.episode_return,
            update,
        };
        log::debug!(
            "Episode {} {:?}: {} steps, return {:.3}, success {:.0}%",
            end.episode,
            outcome,
            end.steps,
            end.episode_return,
            self.stats.success_rate * 100.0
        );

        self.episode_steps = 0;
        self.episode_return = 0.0;
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_settings(mode: PolicyMode) -> Settings {
        Settings {
            ppo_batch_episodes: 2,
            max_episode_ticks: 200,
            ..Settings::small_network(mode)
        }
    }

    fn sandbox(mode: PolicyMode) -> Sandbox {
        Sandbox::new(quick_settings(mode), Viewport::default())
    }

    /// Step until `done` holds, failing after a generous bound
    fn step_until(sandbox: &mut Sandbox, mut done: impl FnMut(&Sandbox) -> bool) {
        for _ in 0..10_000 {
            if done(sandbox) {
                return;
            }
            sandbox.step();
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_new_sandbox_starts_episode() {
        let sandbox = sandbox(PolicyMode::Ppo);
        assert_eq!(sandbox.world().phase, EpisodePhase::Active);
        assert!(!sandbox.is_training());
        assert!(sandbox.policy().is_none());
    }

    #[test]
    fn test_untrained_arm_holds_rest_target() {
        let mut sandbox = sandbox(PolicyMode::Ppo);
        let target = sandbox.world().target;
        for _ in 0..30 {
            sandbox.step();
        }
        assert_eq!(sandbox.world().target, target);
        assert!(sandbox.trajectory().is_empty());
    }

    #[test]
    fn test_training_records_steps() {
        let mut sandbox = sandbox(PolicyMode::PolicyGradient);
        sandbox.start_training();
        for _ in 0..10 {
            sandbox.step();
        }
        assert_eq!(sandbox.trajectory().len(), 10);
        let step = sandbox.trajectory().steps()[0];
        assert!(step.log_prob.is_finite());
    }

    #[test]
    fn test_episode_end_updates_pg_policy() {
        let mut sandbox = sandbox(PolicyMode::PolicyGradient);
        sandbox.start_training();
        let mut end = None;
        for _ in 0..1_000 {
            if let Some(e) = sandbox.step() {
                end = Some(e);
                break;
            }
        }
        let end = end.expect("episode ends within the tick limit");
        assert_eq!(end.episode, 1);
        assert!(end.steps <= 200);
        assert!(end.update.is_some());
        assert!(sandbox.trajectory().is_empty());
        assert_eq!(sandbox.stats().updates, 1);
        assert_eq!(end.goals + end.misses, 1);
    }

    #[test]
    fn test_mode_switch_mid_episode_resets_learning_state() {
        let mut sandbox = sandbox(PolicyMode::Ppo);
        sandbox.start_training();

        // One full PPO batch moves the baseline off zero
        step_until(&mut sandbox, |s| s.stats().updates == 1);
        // Queue one episode of the next batch, then go mid-episode
        step_until(&mut sandbox, |s| s.learner().is_some_and(|l| l.batch().len() == 1));
        for _ in 0..5 {
            sandbox.step();
        }
        let learner = sandbox.learner().expect("training");
        assert!(learner.baseline() != 0.0);
        assert!(!sandbox.trajectory().is_empty());

        sandbox.set_policy_mode(PolicyMode::PolicyGradient);
        let learner = sandbox.learner().expect("training");
        assert_eq!(learner.mode(), PolicyMode::PolicyGradient);
        assert_eq!(learner.baseline(), 0.0);
        assert!(learner.batch().is_empty());
        assert!(sandbox.trajectory().is_empty());
        assert_eq!(sandbox.mode(), PolicyMode::PolicyGradient);
    }

    #[test]
    fn test_stop_discards_partial_episode() {
        let mut sandbox = sandbox(PolicyMode::Ppo);
        sandbox.start_training();
        for _ in 0..20 {
            sandbox.step();
        }
        sandbox.stop_training();
        assert!(!sandbox.is_training());
        assert!(sandbox.trajectory().is_empty());
        assert!(sandbox.learner().is_some_and(|l| l.batch().is_empty()));

        // Trained policy keeps acting greedily, nothing is recorded
        for _ in 0..20 {
            sandbox.step();
        }
        assert!(sandbox.trajectory().is_empty());
    }

    #[test]
    fn test_greedy_episodes_not_counted() {
        let mut sandbox = sandbox(PolicyMode::PolicyGradient);
        sandbox.start_training();
        step_until(&mut sandbox, |s| s.stats().episodes == 1);
        sandbox.stop_training();

        let before = sandbox.stats().episodes;
        let mut ended = None;
        for _ in 0..1_000 {
            if let Some(end) = sandbox.step() {
                ended = Some(end);
                break;
            }
        }
        let end = ended.expect("greedy episode ends within the tick limit");
        assert!(end.update.is_none());
        assert_eq!(sandbox.stats().episodes, before);
        assert_eq!(end.goals + end.misses, before);
    }

    #[test]
    fn test_render_snapshot_carries_interpolation() {
        let mut sandbox = sandbox(PolicyMode::Ppo);
        sandbox.frame(SIM_DT * 1.5);
        let alpha = sandbox.render_snapshot().alpha;
        assert!(alpha > 0.4 && alpha < 0.6, "alpha {alpha}");
    }

    #[test]
    fn test_start_reinitializes() {
        let mut sandbox = sandbox(PolicyMode::PolicyGradient);
        sandbox.start_training();
        step_until(&mut sandbox, |s| s.stats().episodes >= 2);
        let old_weights = sandbox.policy().map(|p| p.layers[0].weights.clone());

        sandbox.start_training();
        assert_eq!(sandbox.stats().episodes, 0);
        assert_eq!(sandbox.stats().updates, 0);
        let learner = sandbox.learner().expect("training");
        assert_eq!(learner.optimizer().steps(), 0);
        assert_eq!(learner.std(), sandbox.settings().initial_std);
        assert_ne!(sandbox.policy().map(|p| p.layers[0].weights.clone()), old_weights);
    }

    #[test]
    fn test_scaled_steps_carries_fraction() {
        let mut carry = 0.0;
        assert_eq!(scaled_steps(1, 2.5, &mut carry), 2);
        assert_eq!(scaled_steps(1, 2.5, &mut carry), 3);
        assert_eq!(carry, 0.0);
        assert_eq!(scaled_steps(0, 2.5, &mut carry), 0);
    }

    #[test]
    fn test_scaled_steps_capped() {
        let mut carry = 0.0;
        assert_eq!(scaled_steps(MAX_SUBSTEPS, 40.0, &mut carry), MAX_FRAME_STEPS);
        assert_eq!(scaled_steps(1000, 40.0, &mut carry), MAX_FRAME_STEPS);
    }

    #[test]
    fn test_speed_multiplier_only_while_training() {
        let mut sandbox = sandbox(PolicyMode::Ppo);
        sandbox.set_simulation_speed(100.0);
        assert_eq!(sandbox.simulation_speed(), MAX_SIMULATION_SPEED);

        // Idle: a long frame runs at most MAX_SUBSTEPS steps
        let before = sandbox.world().time_ticks;
        sandbox.frame(1.0);
        assert_eq!(sandbox.world().time_ticks - before, MAX_SUBSTEPS as u64);

        sandbox.start_training();
        let before = sandbox.world().time_ticks;
        sandbox.frame(1.0);
        assert_eq!(sandbox.world().time_ticks - before, MAX_FRAME_STEPS as u64);
    }

    #[test]
    fn test_speed_clamped_low() {
        let mut sandbox = sandbox(PolicyMode::Ppo);
        sandbox.set_simulation_speed(0.0);
        assert_eq!(sandbox.simulation_speed(), 1.0);
        sandbox.set_simulation_speed(f32::NAN);
        assert_eq!(sandbox.simulation_speed(), 1.0);
    }

    #[test]
    fn test_rolling_success_rate() {
        let mut stats = TrainingStats::default();
        for _ in 0..RECENT_WINDOW {
            stats.record(EpisodeOutcome::Miss);
        }
        stats.record(EpisodeOutcome::Goal);
        assert_eq!(stats.episodes, RECENT_WINDOW as u64 + 1);
        assert!((stats.success_rate - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_resize_starts_waiting_world() {
        let mut sandbox = Sandbox::new(quick_settings(PolicyMode::Ppo), Viewport::new(0.0, 0.0));
        assert_eq!(sandbox.world().phase, EpisodePhase::Waiting);
        assert!(sandbox.step().is_none());
        sandbox.resize(640.0, 480.0);
        assert_eq!(sandbox.world().phase, EpisodePhase::Active);
    }
}
