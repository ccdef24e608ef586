//! Adam Optimizer and Cosine Annealing Schedule
//!
//! Update rule (per parameter i, bias-corrected):
//!
//! - m[i] = b1*m[i] + (1-b1)*g[i]
//! - v[i] = b2*v[i] + (1-b2)*g[i]^2
//! - mhat = m[i] / (1 - b1^t), vhat = v[i] / (1 - b2^t)
//! - w[i] = w[i] - lr * mhat / (sqrt(vhat) + eps)
//!
//! Indices with zero gradient are skipped entirely (moments untouched), so
//! parameters the batch never exercised do not drift from the eps term.
//!
//! Cosine annealing: lr(t) = 0.5 * lr_max * (1 + cos(pi * t / t_max)),
//! decaying from lr_max at t=0 to zero at t=t_max.

use crate::parameters::{Weights, PARAMETER_COUNT};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Adam optimizer over the 21-weight vector.
#[derive(Clone, Debug)]
pub struct Adam {
    lr: f64,
    m: Weights,
    v: Weights,
    step: u32,
}

impl Adam {
    /// Creates an Adam optimizer with the given learning rate and standard
    /// moment decay rates (b1 = 0.9, b2 = 0.999, eps = 1e-8).
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            m: [0.0; PARAMETER_COUNT],
            v: [0.0; PARAMETER_COUNT],
            step: 0,
        }
    }

    /// Applies one Adam step and returns the updated weights.
    pub fn update(&mut self, mut weights: Weights, grads: &Weights) -> Weights {
        self.step += 1;

        let bc1 = 1.0 - BETA1.powi(self.step as i32);
        let bc2 = 1.0 - BETA2.powi(self.step as i32);

        for i in 0..PARAMETER_COUNT {
            let g = grads[i];
            if g == 0.0 {
                continue;
            }

            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * g;
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * g * g;

            let m_hat = self.m[i] / bc1;
            let v_hat = self.v[i] / bc2;

            weights[i] -= self.lr * m_hat / (v_hat.sqrt() + ADAM_EPS);
        }

        weights
    }

    /// Replaces the learning rate (driven by [`CosineAnnealing`]).
    pub fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Cosine-annealed learning-rate schedule.
#[derive(Clone, Debug)]
pub struct CosineAnnealing {
    lr_max: f64,
    t_max: usize,
    t: usize,
}

impl CosineAnnealing {
    pub fn new(lr_max: f64, t_max: usize) -> Self {
        Self { lr_max, t_max, t: 0 }
    }

    /// The learning rate at the current step.
    pub fn lr(&self) -> f64 {
        0.5 * self.lr_max * (1.0 + (std::f64::consts::PI * self.t as f64 / self.t_max as f64).cos())
    }

    /// Advances the schedule and returns the new learning rate.
    pub fn step(&mut self) -> f64 {
        self.t += 1;
        self.lr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::DEFAULT_PARAMETERS;

    const EPSILON: f64 = 1e-10;

    // ==================== Adam ====================

    #[test]
    fn test_adam_moves_against_gradient() {
        let mut adam = Adam::new(0.04);
        let mut grads = [0.0; PARAMETER_COUNT];
        grads[0] = 1.0;
        grads[5] = -1.0;

        let updated = adam.update(DEFAULT_PARAMETERS, &grads);

        assert!(updated[0] < DEFAULT_PARAMETERS[0]);
        assert!(updated[5] > DEFAULT_PARAMETERS[5]);
    }

    #[test]
    fn test_adam_first_step_magnitude() {
        // With bias correction the first step is ~lr for any nonzero gradient.
        let mut adam = Adam::new(0.04);
        let mut grads = [0.0; PARAMETER_COUNT];
        grads[0] = 0.5;

        let updated = adam.update(DEFAULT_PARAMETERS, &grads);
        let delta = DEFAULT_PARAMETERS[0] - updated[0];
        assert!((delta - 0.04).abs() < 1e-6, "delta = {delta}");
    }

    #[test]
    fn test_adam_skips_zero_gradients() {
        let mut adam = Adam::new(0.04);
        let grads = [0.0; PARAMETER_COUNT];

        let updated = adam.update(DEFAULT_PARAMETERS, &grads);

        assert_eq!(updated, DEFAULT_PARAMETERS);
        assert_eq!(adam.m, [0.0; PARAMETER_COUNT]);
        assert_eq!(adam.v, [0.0; PARAMETER_COUNT]);
    }

    #[test]
    fn test_adam_partial_zero_gradients_leave_moments() {
        let mut adam = Adam::new(0.04);
        let mut grads = [0.0; PARAMETER_COUNT];
        grads[3] = 2.0;

        adam.update(DEFAULT_PARAMETERS, &grads);

        assert!(adam.m[3] != 0.0);
        for i in 0..PARAMETER_COUNT {
            if i != 3 {
                assert_eq!(adam.m[i], 0.0);
                assert_eq!(adam.v[i], 0.0);
            }
        }
    }

    #[test]
    fn test_adam_moment_accumulation() {
        let mut adam = Adam::new(0.01);
        let mut grads = [0.0; PARAMETER_COUNT];
        grads[0] = 1.0;

        adam.update(DEFAULT_PARAMETERS, &grads);
        assert!((adam.m[0] - 0.1).abs() < EPSILON); // (1-b1)*g
        assert!((adam.v[0] - 0.001).abs() < EPSILON); // (1-b2)*g^2

        adam.update(DEFAULT_PARAMETERS, &grads);
        assert!((adam.m[0] - (0.9 * 0.1 + 0.1)).abs() < EPSILON);
    }

    // ==================== Cosine Annealing ====================

    #[test]
    fn test_cosine_annealing_endpoints() {
        let ca = CosineAnnealing::new(0.04, 100);
        assert!((ca.lr() - 0.04).abs() < EPSILON);

        let mut ca = CosineAnnealing::new(0.04, 100);
        let mut last = 0.0;
        for _ in 0..100 {
            last = ca.step();
        }
        assert!(last.abs() < EPSILON, "lr at t_max = {last}");
    }

    #[test]
    fn test_cosine_annealing_midpoint() {
        let mut ca = CosineAnnealing::new(0.04, 100);
        let mut lr = 0.0;
        for _ in 0..50 {
            lr = ca.step();
        }
        assert!((lr - 0.02).abs() < EPSILON, "lr at t_max/2 = {lr}");
    }

    #[test]
    fn test_cosine_annealing_monotone_decreasing() {
        let mut ca = CosineAnnealing::new(0.04, 50);
        let mut prev = ca.lr();
        for _ in 0..50 {
            let lr = ca.step();
            assert!(lr <= prev, "lr increased: {lr} > {prev}");
            prev = lr;
        }
    }
}
