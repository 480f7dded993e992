//! Policy-gradient and clipped-PPO updates
//!
//! Returns are Monte-Carlo (no critic). A scalar running baseline reduces
//! variance; PPO reuses each batch for several epochs with a clipped ratio.

use serde::Serialize;

use super::buffer::{Batch, Trajectory};
use super::optim::Adam;
use super::policy::{PolicyNetwork, gaussian_log_prob, gaussian_log_prob_grad};
use crate::settings::{PolicyMode, Settings};
use crate::sim::EpisodeOutcome;

/// Bound on |new log-prob − old log-prob| before exponentiating
const MAX_LOG_RATIO: f32 = 20.0;
/// Floor on the advantage standard deviation when normalizing
const ADVANTAGE_STD_EPSILON: f32 = 1e-6;

/// Summary of one learning update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub mode: PolicyMode,
    pub episodes: usize,
    pub steps: usize,
    pub epochs: u32,
    pub mean_return: f32,
    pub baseline: f32,
    /// Mean |ratio − 1| over the first epoch
    pub mean_ratio_deviation: f32,
    /// Share of samples whose gradient was clipped to zero (all epochs)
    pub clip_fraction: f32,
    /// Exploration std after decay
    pub std: f32,
}

/// `G_t = r_t + γ·G_{t+1}`, computed backward
pub fn discounted_returns(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for (ret, &reward) in returns.iter_mut().zip(rewards).rev() {
        running = reward + gamma * running;
        *ret = running;
    }
    returns
}

/// Shift and scale to zero mean, unit variance
pub fn normalize(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt().max(ADVANTAGE_STD_EPSILON);
    for v in values.iter_mut() {
        *v = (*v - mean) / std;
    }
}

/// Gradient weight of the clipped surrogate `min(r·A, clip(r)·A)`.
///
/// Where the clipped branch is the smaller one and the ratio sits outside
/// `[1-ε, 1+ε]`, the objective is flat and the weight is zero.
pub fn ppo_gradient_scale(ratio: f32, advantage: f32, clip_epsilon: f32) -> f32 {
    let clipped = if advantage >= 0.0 {
        ratio > 1.0 + clip_epsilon
    } else {
        ratio < 1.0 - clip_epsilon
    };
    if clipped { 0.0 } else { ratio }
}

/// Gradient weight applied to `A · ∇log π` for a sample
pub fn gradient_scale(mode: PolicyMode, ratio: f32, advantage: f32, clip_epsilon: f32) -> f32 {
    match mode {
        PolicyMode::PolicyGradient => ratio,
        PolicyMode::Ppo => ppo_gradient_scale(ratio, advantage, clip_epsilon),
    }
}

/// Owns everything the update mutates besides the weights: batch, baseline,
/// exploration std and Adam state.
#[derive(Debug, Clone)]
pub struct Learner {
    settings: Settings,
    mode: PolicyMode,
    batch: Batch,
    baseline: f32,
    std: f32,
    adam: Adam,
    updates: u64,
}

impl Learner {
    /// Fresh learner state for `policy`
    pub fn new(settings: &Settings, policy: &PolicyNetwork) -> Self {
        let mode = settings.mode;
        Self {
            settings: settings.clone(),
            mode,
            batch: Batch::new(settings.batch_episodes(mode)),
            baseline: 0.0,
            std: settings.initial_std,
            adam: Adam::new(&policy.array_lens(), settings.learning_rate),
            updates: 0,
        }
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    /// Current exploration standard deviation
    pub fn std(&self) -> f32 {
        self.std
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn optimizer(&self) -> &Adam {
        &self.adam
    }

    /// Switch learning rule. Queued episodes and the baseline are dropped.
    /// Returns false if the mode was already active.
    pub fn set_mode(&mut self, mode: PolicyMode) -> bool {
        if mode == self.mode {
            return false;
        }
        self.mode = mode;
        self.settings.mode = mode;
        self.batch = Batch::new(self.settings.batch_episodes(mode));
        self.baseline = 0.0;
        true
    }

    /// Drop queued episodes without learning from them
    pub fn discard(&mut self) {
        self.batch.clear();
    }

    /// Close an episode: apply the terminal reward, queue it and update the
    /// policy once the batch is full.
    pub fn finish_episode(
        &mut self,
        policy: &mut PolicyNetwork,
        mut trajectory: Trajectory,
        outcome: EpisodeOutcome,
    ) -> Option<UpdateReport> {
        if trajectory.is_empty() {
            return None;
        }
        trajectory.apply_terminal_reward(outcome.terminal_reward());
        self.batch.push(trajectory);
        if !self.batch.is_ready() {
            return None;
        }
        self.update(policy)
    }

    /// Run the update on whatever is queued
    pub fn update(&mut self, policy: &mut PolicyNetwork) -> Option<UpdateReport> {
        let episodes = self.batch.drain();
        let returns: Vec<f32> = episodes
            .iter()
            .flat_map(|t| discounted_returns(&t.rewards(), self.settings.gamma))
            .collect();
        if returns.is_empty() {
            return None;
        }
        let n = returns.len();
        let mean_return = returns.iter().sum::<f32>() / n as f32;

        let decay = self.settings.baseline_decay;
        self.baseline = decay * self.baseline + (1.0 - decay) * mean_return;

        let mut advantages: Vec<f32> = returns.iter().map(|g| g - self.baseline).collect();
        if self.settings.normalize_advantages {
            normalize(&mut advantages);
        }

        let epochs = self.settings.epochs(self.mode).max(1);
        let clip_epsilon = self.settings.clip_epsilon;
        let std = self.std;
        let inv_n = 1.0 / n as f32;

        let mut grads = policy.zero_grads();
        let mut ratio_deviation = 0.0f32;
        let mut clipped = 0usize;

        for epoch in 0..epochs {
            grads.zero();
            let steps = episodes.iter().flat_map(|t| t.steps());
            for (step, &advantage) in steps.zip(&advantages) {
                let fwd = policy.forward(&step.state);
                let new_log_prob = gaussian_log_prob(&step.action, &fwd.mean, std);
                let log_ratio = (new_log_prob - step.log_prob).clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO);
                let ratio = log_ratio.exp();
                if epoch == 0 {
                    ratio_deviation += (ratio - 1.0).abs();
                }

                let scale = gradient_scale(self.mode, ratio, advantage, clip_epsilon);
                if scale == 0.0 {
                    clipped += 1;
                    continue;
                }

                // Loss = -A·scale·log π, averaged over the batch
                let d_log_prob = gaussian_log_prob_grad(&step.action, &fwd.mean, std);
                let coeff = -advantage * scale * inv_n;
                policy.backward(&fwd, d_log_prob.map(|d| d * coeff), &mut grads);
            }

            if !grads.is_finite() {
                log::warn!("Non-finite gradients in epoch {}, skipping step", epoch);
                continue;
            }
            self.adam.step(&mut policy.arrays_mut(), &grads.arrays());
        }

        self.std = (self.std * self.settings.std_decay(self.mode)).max(self.settings.min_std);
        self.updates += 1;

        Some(UpdateReport {
            mode: self.mode,
            episodes: episodes.len(),
            steps: n,
            epochs,
            mean_return,
            baseline: self.baseline,
            mean_ratio_deviation: ratio_deviation * inv_n,
            clip_fraction: clipped as f32 / (n as f32 * epochs as f32),
            std: self.std,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::buffer::StepRecord;
    use crate::rl::observe::STATE_DIM;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn network(seed: u64) -> PolicyNetwork {
        PolicyNetwork::new(&[16], &mut Pcg32::seed_from_u64(seed))
    }

    /// Episode of `len` steps sampled from `policy`
    fn rollout(policy: &PolicyNetwork, std: f32, len: usize, rng: &mut Pcg32) -> Trajectory {
        let mut traj = Trajectory::new();
        for i in 0..len {
            let x = i as f32 / len as f32;
            let state = [x, 1.0 - x, 0.1, -0.2, 0.3, x * 0.5, -x, 0.2];
            let sample = policy.sample(&state, std, rng);
            traj.push(StepRecord {
                state,
                action: sample.action,
                log_prob: sample.log_prob,
                reward: 0.0,
            });
        }
        traj
    }

    #[test]
    fn test_discounted_returns() {
        let (r0, r1, r2) = (0.5f32, -0.25, 1.0);
        let gamma = 0.99;
        let returns = discounted_returns(&[r0, r1, r2], gamma);
        let expected = [r0 + gamma * (r1 + gamma * r2), r1 + gamma * r2, r2];
        for (got, want) in returns.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
        assert!(discounted_returns(&[], gamma).is_empty());
    }

    #[test]
    fn test_normalize() {
        let mut values = [1.0f32, 2.0, 3.0, 4.0];
        normalize(&mut values);
        let mean: f32 = values.iter().sum::<f32>() / 4.0;
        let var: f32 = values.iter().map(|v| v * v).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-5);

        // Constant input: no NaN
        let mut flat = [2.0f32; 3];
        normalize(&mut flat);
        assert!(flat.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_ppo_scale_sign_aware() {
        let eps = 0.2;
        // Positive advantage: only a too-large ratio is clipped
        assert_eq!(ppo_gradient_scale(1.5, 1.0, eps), 0.0);
        assert_eq!(ppo_gradient_scale(0.5, 1.0, eps), 0.5);
        // Negative advantage: only a too-small ratio is clipped
        assert_eq!(ppo_gradient_scale(0.5, -1.0, eps), 0.0);
        assert_eq!(ppo_gradient_scale(1.5, -1.0, eps), 1.5);
        // Inside the band nothing is clipped
        assert_eq!(ppo_gradient_scale(1.1, -1.0, eps), 1.1);
        assert_eq!(gradient_scale(PolicyMode::PolicyGradient, 1.5, 1.0, eps), 1.5);
    }

    proptest! {
        #[test]
        fn prop_ppo_unit_ratio_is_plain_gradient(advantage in -10.0f32..10.0, eps in 0.05f32..0.5) {
            prop_assert_eq!(ppo_gradient_scale(1.0, advantage, eps), 1.0);
            prop_assert_eq!(
                gradient_scale(PolicyMode::Ppo, 1.0, advantage, eps),
                gradient_scale(PolicyMode::PolicyGradient, 1.0, advantage, eps)
            );
        }
    }

    #[test]
    fn test_empty_trajectory_is_noop() {
        let mut policy = network(1);
        let mut learner = Learner::new(&Settings::small_network(PolicyMode::PolicyGradient), &policy);
        let report = learner.finish_episode(&mut policy, Trajectory::new(), EpisodeOutcome::Goal);
        assert!(report.is_none());
        assert!(learner.batch().is_empty());
        assert_eq!(learner.optimizer().steps(), 0);
    }

    #[test]
    fn test_ppo_waits_for_full_batch() {
        let settings = Settings::small_network(PolicyMode::Ppo);
        let mut policy = network(2);
        let mut learner = Learner::new(&settings, &policy);
        let mut rng = Pcg32::seed_from_u64(9);

        for i in 0..settings.ppo_batch_episodes {
            let traj = rollout(&policy, learner.std(), 20, &mut rng);
            let report = learner.finish_episode(&mut policy, traj, EpisodeOutcome::Miss);
            if i + 1 < settings.ppo_batch_episodes {
                assert!(report.is_none());
                assert_eq!(learner.batch().len(), i + 1);
            } else {
                let report = report.expect("batch full");
                assert_eq!(report.episodes, settings.ppo_batch_episodes);
                assert_eq!(report.steps, 20 * settings.ppo_batch_episodes);
                assert_eq!(report.epochs, settings.ppo_epochs);
                // Nothing moved before the first epoch, so ratios start at 1
                assert!(report.mean_ratio_deviation < 1e-4);
            }
        }
        assert!(learner.batch().is_empty());
        assert_eq!(learner.optimizer().steps(), settings.ppo_epochs);
        assert!(learner.std() < settings.initial_std);
    }

    #[test]
    fn test_pg_update_baseline_and_decay() {
        let settings = Settings::small_network(PolicyMode::PolicyGradient);
        let mut policy = network(3);
        let mut learner = Learner::new(&settings, &policy);
        let mut rng = Pcg32::seed_from_u64(4);

        let traj = rollout(&policy, learner.std(), 1, &mut rng);
        let report = learner
            .finish_episode(&mut policy, traj, EpisodeOutcome::Goal)
            .expect("single episode batch");
        // One-step episode with return 1: baseline = 0.05
        assert!((report.mean_return - 1.0).abs() < 1e-6);
        assert!((learner.baseline() - 0.05).abs() < 1e-6);
        assert!((learner.std() - settings.initial_std * settings.pg_std_decay).abs() < 1e-6);
        assert_eq!(report.clip_fraction, 0.0);
    }

    #[test]
    fn test_positive_advantage_raises_action_probability() {
        let settings = Settings {
            normalize_advantages: false,
            ..Settings::small_network(PolicyMode::PolicyGradient)
        };
        let mut policy = network(5);
        let mut learner = Learner::new(&settings, &policy);
        let std = learner.std();

        let state = [0.2f32; STATE_DIM];
        let mean = policy.mean_action(&state);
        let action = [mean[0] + 0.3, mean[1] - 0.3];
        let before = gaussian_log_prob(&action, &mean, std);

        let mut traj = Trajectory::new();
        traj.push(StepRecord {
            state,
            action,
            log_prob: before,
            reward: 0.0,
        });
        learner.finish_episode(&mut policy, traj, EpisodeOutcome::Goal);

        let after = gaussian_log_prob(&action, &policy.mean_action(&state), std);
        assert!(after > before, "{after} <= {before}");
    }

    #[test]
    fn test_negative_advantage_lowers_action_probability() {
        let settings = Settings {
            normalize_advantages: false,
            ..Settings::small_network(PolicyMode::Ppo)
        };
        let mut policy = network(6);
        let mut learner = Learner::new(&settings, &policy);
        let std = learner.std();

        let state = [-0.1f32; STATE_DIM];
        let mean = policy.mean_action(&state);
        let action = [mean[0] - 0.2, mean[1] + 0.4];
        let before = gaussian_log_prob(&action, &mean, std);

        for _ in 0..settings.ppo_batch_episodes {
            let mut traj = Trajectory::new();
            traj.push(StepRecord {
                state,
                action,
                log_prob: before,
                reward: 0.0,
            });
            learner.finish_episode(&mut policy, traj, EpisodeOutcome::Miss);
        }

        let after = gaussian_log_prob(&action, &policy.mean_action(&state), std);
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn test_mode_switch_resets() {
        let settings = Settings::small_network(PolicyMode::Ppo);
        let mut policy = network(7);
        let mut learner = Learner::new(&settings, &policy);
        let mut rng = Pcg32::seed_from_u64(8);

        // Fill one batch to move the baseline, then queue a partial one
        for _ in 0..settings.ppo_batch_episodes + 1 {
            let traj = rollout(&policy, learner.std(), 5, &mut rng);
            learner.finish_episode(&mut policy, traj, EpisodeOutcome::Miss);
        }
        assert!(learner.baseline() != 0.0);
        assert_eq!(learner.batch().len(), 1);

        assert!(learner.set_mode(PolicyMode::PolicyGradient));
        assert_eq!(learner.baseline(), 0.0);
        assert!(learner.batch().is_empty());
        assert_eq!(learner.batch().threshold(), 1);
        assert!(!learner.set_mode(PolicyMode::PolicyGradient));
    }
}
