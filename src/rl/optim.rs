//! Adam optimizer over a list of flat parameter arrays

#[derive(Debug, Clone)]
pub struct Adam {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    t: u32,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    /// One moment pair per parameter array, in the order `step` receives them
    pub fn new(array_lens: &[usize], lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: array_lens.iter().map(|&n| vec![0.0; n]).collect(),
            v: array_lens.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    /// Global step count
    pub fn steps(&self) -> u32 {
        self.t
    }

    /// Raw first moment of array `index`
    pub fn first_moment(&self, index: usize) -> &[f32] {
        &self.m[index]
    }

    /// Raw second moment of array `index`
    pub fn second_moment(&self, index: usize) -> &[f32] {
        &self.v[index]
    }

    /// Descend one step: `θ -= lr · m̂ / (√v̂ + ε)`
    pub fn step(&mut self, params: &mut [&mut [f32]], grads: &[&[f32]]) {
        debug_assert_eq!(params.len(), self.m.len());
        debug_assert_eq!(grads.len(), self.m.len());

        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (((p, g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(&mut self.m)
            .zip(&mut self.v)
        {
            for j in 0..p.len() {
                let grad = if g[j].is_finite() { g[j] } else { 0.0 };
                m[j] = self.beta1 * m[j] + (1.0 - self.beta1) * grad;
                v[j] = self.beta2 * v[j] + (1.0 - self.beta2) * grad * grad;
                let m_hat = m[j] / bias_correction1;
                let v_hat = v[j] / bias_correction2;
                p[j] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
    }
}
