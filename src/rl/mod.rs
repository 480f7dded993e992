//! Reinforcement learning
//!
//! Everything here is plain `f32` arithmetic with no autodiff:
//! - `observe`: world snapshot → normalized state vector
//! - `policy`: MLP Gaussian policy, forward and backward passes
//! - `buffer`: per-episode trajectories and update batches
//! - `optim`: Adam
//! - `learner`: policy-gradient and PPO updates

pub mod buffer;
pub mod learner;
pub mod observe;
pub mod optim;
pub mod policy;

pub use buffer::{Batch, StepRecord, Trajectory};
pub use learner::{Learner, UpdateReport, discounted_returns};
pub use observe::{STATE_DIM, observe};
pub use optim::Adam;
pub use policy::{ACTION_DIM, PolicyNetwork, Sample};
