//! Training settings and presets
//!
//! Hosts may hand these over as JSON; anything out of range is clamped by
//! [`Settings::sanitized`] rather than rejected.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MAX_EPISODE_TICKS, MAX_SIMULATION_SPEED};

/// Learning rule driving the policy update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PolicyMode {
    /// Vanilla policy gradient (REINFORCE), one update per episode
    PolicyGradient,
    /// Clipped PPO over a batch of episodes
    #[default]
    Ppo,
}

impl PolicyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::PolicyGradient => "Policy Gradient",
            PolicyMode::Ppo => "PPO",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pg" | "reinforce" | "policy-gradient" | "policy_gradient" | "vanilla" => {
                Some(PolicyMode::PolicyGradient)
            }
            "ppo" => Some(PolicyMode::Ppo),
            _ => None,
        }
    }
}

/// Learner and environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: PolicyMode,

    // === Network ===
    /// Hidden layer widths (tanh)
    pub hidden_layers: Vec<usize>,

    // === Optimizer ===
    pub learning_rate: f32,

    // === Returns & advantages ===
    /// Discount factor
    pub gamma: f32,
    /// Weight kept by the running baseline on each update
    pub baseline_decay: f32,
    /// Scale advantages to zero mean / unit variance per batch
    pub normalize_advantages: bool,

    // === PPO ===
    pub clip_epsilon: f32,
    /// Optimization passes over each batch
    pub ppo_epochs: u32,
    /// Episodes collected before each PPO update
    pub ppo_batch_episodes: usize,

    // === Exploration ===
    pub initial_std: f32,
    pub min_std: f32,
    /// Multiplicative std decay per policy-gradient update
    pub pg_std_decay: f32,
    /// Multiplicative std decay per PPO update (slower)
    pub ppo_std_decay: f32,

    // === Environment ===
    /// Reward per arm contact that bounced the ball
    pub contact_reward: f32,
    /// Episode length limit in ticks (0 = unlimited)
    pub max_episode_ticks: u64,
    /// Physics steps per rendered step while training
    pub simulation_speed: f32,
    /// Seed for weights, exploration noise and ball spawns
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Ppo,

            hidden_layers: vec![64, 64],

            learning_rate: 1e-3,

            gamma: 0.99,
            baseline_decay: 0.95,
            normalize_advantages: true,

            clip_epsilon: 0.2,
            ppo_epochs: 4,
            ppo_batch_episodes: 4,

            initial_std: 0.5,
            min_std: 0.05,
            pg_std_decay: 0.995,
            ppo_std_decay: 0.998,

            contact_reward: 0.05,
            max_episode_ticks: DEFAULT_MAX_EPISODE_TICKS,
            simulation_speed: 1.0,
            seed: 0x5eed,
        }
    }
}

impl Settings {
    /// Defaults for the given learning rule
    pub fn for_mode(mode: PolicyMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Single small hidden layer (8→16→2), quick to train
    pub fn small_network(mode: PolicyMode) -> Self {
        Self {
            hidden_layers: vec![16],
            ..Self::for_mode(mode)
        }
    }

    /// Episodes per update for the given mode
    pub fn batch_episodes(&self, mode: PolicyMode) -> usize {
        match mode {
            PolicyMode::PolicyGradient => 1,
            PolicyMode::Ppo => self.ppo_batch_episodes,
        }
    }

    /// Optimization epochs per update for the given mode
    pub fn epochs(&self, mode: PolicyMode) -> u32 {
        match mode {
            PolicyMode::PolicyGradient => 1,
            PolicyMode::Ppo => self.ppo_epochs,
        }
    }

    /// Std decay per update for the given mode
    pub fn std_decay(&self, mode: PolicyMode) -> f32 {
        match mode {
            PolicyMode::PolicyGradient => self.pg_std_decay,
            PolicyMode::Ppo => self.ppo_std_decay,
        }
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Settings>(json).map(Settings::sanitized)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Clamp every field into a usable range, warning about each fix
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();

        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            log::warn!("Invalid hidden layers {:?}, using defaults", self.hidden_layers);
            self.hidden_layers = defaults.hidden_layers.clone();
        }
        fix(&mut self.learning_rate, 1e-6, 1.0, "learning_rate");
        fix(&mut self.gamma, 0.0, 1.0, "gamma");
        fix(&mut self.baseline_decay, 0.0, 1.0, "baseline_decay");
        fix(&mut self.clip_epsilon, 0.01, 0.99, "clip_epsilon");
        fix(&mut self.initial_std, 1e-3, 5.0, "initial_std");
        fix(&mut self.min_std, 1e-3, self.initial_std, "min_std");
        fix(&mut self.pg_std_decay, 0.5, 1.0, "pg_std_decay");
        fix(&mut self.ppo_std_decay, 0.5, 1.0, "ppo_std_decay");
        fix(&mut self.contact_reward, -1.0, 1.0, "contact_reward");
        fix(&mut self.simulation_speed, 1.0, MAX_SIMULATION_SPEED, "simulation_speed");

        if self.ppo_epochs == 0 {
            log::warn!("ppo_epochs must be at least 1");
            self.ppo_epochs = 1;
        }
        if self.ppo_batch_episodes == 0 {
            log::warn!("ppo_batch_episodes must be at least 1");
            self.ppo_batch_episodes = 1;
        }
        self
    }
}

fn fix(value: &mut f32, lo: f32, hi: f32, name: &str) {
    let clamped = if value.is_finite() { value.clamp(lo, hi) } else { lo };
    if clamped != *value {
        log::warn!("Setting {} = {} out of range, using {}", name, value, clamped);
        *value = clamped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!(PolicyMode::from_str("PPO"), Some(PolicyMode::Ppo));
        assert_eq!(PolicyMode::from_str(" reinforce "), Some(PolicyMode::PolicyGradient));
        assert_eq!(PolicyMode::from_str("pg"), Some(PolicyMode::PolicyGradient));
        assert_eq!(PolicyMode::from_str("dqn"), None);
    }

    #[test]
    fn test_mode_dependent_knobs() {
        let settings = Settings::default();
        assert_eq!(settings.batch_episodes(PolicyMode::PolicyGradient), 1);
        assert_eq!(settings.batch_episodes(PolicyMode::Ppo), 4);
        assert_eq!(settings.epochs(PolicyMode::PolicyGradient), 1);
        assert!(settings.std_decay(PolicyMode::Ppo) > settings.std_decay(PolicyMode::PolicyGradient));
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let settings = Settings::from_json(r#"{"mode":"PolicyGradient","learning_rate":0.01}"#)
            .expect("valid json");
        assert_eq!(settings.mode, PolicyMode::PolicyGradient);
        assert_eq!(settings.learning_rate, 0.01);
        assert_eq!(settings.hidden_layers, vec![64, 64]);
    }

    #[test]
    fn test_json_round_trip() {
        let settings = Settings::small_network(PolicyMode::Ppo);
        let json = settings.to_json().expect("serializable");
        assert_eq!(Settings::from_json(&json).expect("valid json"), settings);
    }

    #[test]
    fn test_json_garbage_is_error() {
        assert!(Settings::from_json("not json").is_err());
    }

    #[test]
    fn test_sanitized_clamps() {
        let settings = Settings {
            hidden_layers: vec![],
            gamma: 1.5,
            learning_rate: f32::NAN,
            simulation_speed: 100.0,
            ppo_epochs: 0,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.hidden_layers, vec![64, 64]);
        assert_eq!(settings.gamma, 1.0);
        assert_eq!(settings.learning_rate, 1e-6);
        assert_eq!(settings.simulation_speed, MAX_SIMULATION_SPEED);
        assert_eq!(settings.ppo_epochs, 1);
    }
}
