//! Feed-forward Gaussian policy with a hand-written backward pass
//!
//! `state → [tanh hidden]… → linear mean`. Actions are drawn from a diagonal
//! Gaussian around the mean with one shared standard deviation.

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::observe::STATE_DIM;

/// Action dimensions (IK target dx, dy)
pub const ACTION_DIM: usize = 2;

/// Lower bound applied to the standard deviation in every density computation
pub const STD_EPSILON: f32 = 1e-3;

const LOG_SQRT_2PI: f32 = 0.918_938_5;

/// One dense layer. `weights[i * fan_out + j]` connects input `i` to output `j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub fan_in: usize,
    pub fan_out: usize,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl Layer {
    /// Xavier-normal weights, zero biases
    fn xavier(fan_in: usize, fan_out: usize, rng: &mut Pcg32) -> Self {
        let std = (2.0 / (fan_in + fan_out) as f32).sqrt();
        let weights = (0..fan_in * fan_out)
            .map(|_| standard_normal(rng) * std)
            .collect();
        Self {
            fan_in,
            fan_out,
            weights,
            biases: vec![0.0; fan_out],
        }
    }

    fn apply(&self, input: &[f32], out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(&self.biases);
        for (i, &x) in input.iter().enumerate() {
            let row = &self.weights[i * self.fan_out..(i + 1) * self.fan_out];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
    }
}

/// Forward pass result, kept for backprop
#[derive(Debug, Clone)]
pub struct Forward {
    /// Input followed by every hidden layer's tanh output
    pub activations: Vec<Vec<f32>>,
    pub mean: [f32; ACTION_DIM],
}

/// A sampled action
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub action: [f32; ACTION_DIM],
    pub log_prob: f32,
}

/// Gradient arrays shaped like the network's layers
#[derive(Debug, Clone)]
pub struct Gradients {
    pub layers: Vec<Layer>,
}

impl Gradients {
    pub fn zero(&mut self) {
        for layer in &mut self.layers {
            layer.weights.fill(0.0);
            layer.biases.fill(0.0);
        }
    }

    /// Flat views in optimizer order: w0, b0, w1, b1, …
    pub fn arrays(&self) -> Vec<&[f32]> {
        self.layers
            .iter()
            .flat_map(|l| [l.weights.as_slice(), l.biases.as_slice()])
            .collect()
    }

    pub fn is_finite(&self) -> bool {
        self.arrays().iter().all(|a| a.iter().all(|v| v.is_finite()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyNetwork {
    pub layers: Vec<Layer>,
}

impl PolicyNetwork {
    /// Fresh random network `STATE_DIM → hidden… → ACTION_DIM`
    pub fn new(hidden: &[usize], rng: &mut Pcg32) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut fan_in = STATE_DIM;
        for &width in hidden {
            let width = width.max(1);
            layers.push(Layer::xavier(fan_in, width, rng));
            fan_in = width;
        }
        layers.push(Layer::xavier(fan_in, ACTION_DIM, rng));
        Self { layers }
    }

    /// Layer sizes, e.g. `8→64→64→2`
    pub fn arch_string(&self) -> String {
        let mut parts = vec![STATE_DIM.to_string()];
        parts.extend(self.layers.iter().map(|l| l.fan_out.to_string()));
        parts.join("→")
    }

    pub fn param_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }

    /// Shapes of the parameter arrays in optimizer order
    pub fn array_lens(&self) -> Vec<usize> {
        self.layers
            .iter()
            .flat_map(|l| [l.weights.len(), l.biases.len()])
            .collect()
    }

    /// Mutable flat views in optimizer order: w0, b0, w1, b1, …
    pub fn arrays_mut(&mut self) -> Vec<&mut [f32]> {
        self.layers
            .iter_mut()
            .flat_map(|l| [l.weights.as_mut_slice(), l.biases.as_mut_slice()])
            .collect()
    }

    pub fn zero_grads(&self) -> Gradients {
        Gradients {
            layers: self
                .layers
                .iter()
                .map(|l| Layer {
                    fan_in: l.fan_in,
                    fan_out: l.fan_out,
                    weights: vec![0.0; l.weights.len()],
                    biases: vec![0.0; l.biases.len()],
                })
                .collect(),
        }
    }

    pub fn forward(&self, state: &[f32; STATE_DIM]) -> Forward {
        let mut activations = Vec::with_capacity(self.layers.len());
        activations.push(state.to_vec());

        let last = self.layers.len() - 1;
        let mut mean = [0.0; ACTION_DIM];
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut out = Vec::with_capacity(layer.fan_out);
            layer.apply(&activations[idx], &mut out);
            if idx == last {
                mean.copy_from_slice(&out[..ACTION_DIM]);
            } else {
                out.iter_mut().for_each(|v| *v = v.tanh());
                activations.push(out);
            }
        }

        Forward { activations, mean }
    }

    /// Accumulate dL/dθ into `grads` given dL/d(mean)
    pub fn backward(&self, fwd: &Forward, d_mean: [f32; ACTION_DIM], grads: &mut Gradients) {
        let mut delta = d_mean.to_vec();

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let input = &fwd.activations[idx];
            let grad = &mut grads.layers[idx];

            for (b, d) in grad.biases.iter_mut().zip(&delta) {
                *b += d;
            }
            for (i, &x) in input.iter().enumerate() {
                let row = &mut grad.weights[i * layer.fan_out..(i + 1) * layer.fan_out];
                for (g, d) in row.iter_mut().zip(&delta) {
                    *g += x * d;
                }
            }

            if idx == 0 {
                break;
            }
            // delta_prev = (W · delta) ⊙ (1 - a²)
            delta = input
                .iter()
                .enumerate()
                .map(|(i, &a)| {
                    let row = &layer.weights[i * layer.fan_out..(i + 1) * layer.fan_out];
                    let back: f32 = row.iter().zip(&delta).map(|(w, d)| w * d).sum();
                    back * (1.0 - a * a)
                })
                .collect();
        }
    }

    /// Draw an exploratory action around the predicted mean
    pub fn sample(&self, state: &[f32; STATE_DIM], std: f32, rng: &mut Pcg32) -> Sample {
        let mean = self.forward(state).mean;
        let std = std.max(STD_EPSILON);
        let action = mean.map(|m| m + std * standard_normal(rng));
        Sample {
            action,
            log_prob: gaussian_log_prob(&action, &mean, std),
        }
    }

    /// Greedy action (no exploration noise)
    pub fn mean_action(&self, state: &[f32; STATE_DIM]) -> [f32; ACTION_DIM] {
        self.forward(state).mean
    }
}

/// Log-density of a diagonal Gaussian with shared `std`
pub fn gaussian_log_prob(action: &[f32; ACTION_DIM], mean: &[f32; ACTION_DIM], std: f32) -> f32 {
    let std = std.max(STD_EPSILON);
    let log_std = std.ln();
    action
        .iter()
        .zip(mean)
        .map(|(a, m)| {
            let z = (a - m) / std;
            -0.5 * z * z - log_std - LOG_SQRT_2PI
        })
        .sum()
}

/// d log π(a) / d mean = (a - μ) / σ²
pub fn gaussian_log_prob_grad(
    action: &[f32; ACTION_DIM],
    mean: &[f32; ACTION_DIM],
    std: f32,
) -> [f32; ACTION_DIM] {
    let var = std.max(STD_EPSILON).powi(2);
    [(action[0] - mean[0]) / var, (action[1] - mean[1]) / var]
}

/// Box-Muller standard normal sample
pub fn standard_normal(rng: &mut Pcg32) -> f32 {
    let u1: f32 = rng.random::<f32>().max(1e-7);
    let u2: f32 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}
