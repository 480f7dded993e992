//! Trajectory and batch buffers
//!
//! A [`Trajectory`] is appended to once per tick while an episode is live.
//! Finished trajectories collect in a [`Batch`] until the learner drains it.

use serde::Serialize;

use super::observe::STATE_DIM;
use super::policy::ACTION_DIM;

/// One policy decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepRecord {
    pub state: [f32; STATE_DIM],
    pub action: [f32; ACTION_DIM],
    /// Log-probability of `action` under the policy that sampled it
    pub log_prob: f32,
    pub reward: f32,
}

/// Ordered log of a single episode
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    steps: Vec<StepRecord>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn rewards(&self) -> Vec<f32> {
        self.steps.iter().map(|s| s.reward).collect()
    }

    /// Undiscounted sum of rewards
    pub fn total_reward(&self) -> f32 {
        self.steps.iter().map(|s| s.reward).sum()
    }

    /// Add the episode outcome to the last step's reward
    pub fn apply_terminal_reward(&mut self, reward: f32) {
        if let Some(last) = self.steps.last_mut() {
            last.reward += reward;
        }
    }

    /// Move the contents out, leaving this buffer empty
    pub fn take(&mut self) -> Trajectory {
        std::mem::take(self)
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

/// Finished episodes awaiting an update
#[derive(Debug, Clone)]
pub struct Batch {
    episodes: Vec<Trajectory>,
    /// Episodes required before the batch is ready
    threshold: usize,
}

impl Batch {
    pub fn new(threshold: usize) -> Self {
        Self {
            episodes: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Queue a finished episode; empty trajectories are dropped
    pub fn push(&mut self, trajectory: Trajectory) {
        if !trajectory.is_empty() {
            self.episodes.push(trajectory);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.episodes.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.episodes.iter().map(Trajectory::len).sum()
    }

    /// Take every queued episode at once
    pub fn drain(&mut self) -> Vec<Trajectory> {
        std::mem::take(&mut self.episodes)
    }

    pub fn clear(&mut self) {
        self.episodes.clear();
    }
}
