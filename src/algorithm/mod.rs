//! FSRS v6 Memory Model
//!
//! Core theory:
//! - Each card carries two latent variables: stability S (the number of days
//!   after which recall probability falls to 0.9) and difficulty D in [1, 10].
//! - Retrievability R models the probability of successful recall after a
//!   given elapsed time.
//! - Every review moves S and D through the update formulas below; the
//!   scheduled interval is the time at which R reaches the desired retention.
//!
//! Mathematical formulas (w = weight vector, G = rating grade 1..4):
//! - decay = -w[20], factor = 0.9^(1/decay) - 1
//! - Retrievability: R(t, S) = (1 + factor * t / S)^decay
//!   (R(0, S) = 1 and R(S, S) = 0.9 by construction)
//! - Initial stability: S0(G) = max(w[G-1], 0.001)
//! - Initial difficulty: D0(G) = w[4] - e^(w[5]*(G-1)) + 1
//! - Interval: I(r, S) = round((S / factor) * (r^(1/decay) - 1)), in [1, max]
//! - Short-term stability: S' = S * e^(w[17]*(G-3+w[18])) * S^(-w[19])
//! - Next difficulty: linear damping toward 10 plus mean reversion to
//!   D0(Easy)
//! - Recall stability: grows with (11-D), saturates in S, amplified by low R
//! - Forget stability: min of the long-term forget formula and the
//!   short-term floor S / e^(w[17]*w[18])
//!
//! The kernel performs no parameter validation; the scheduler validates
//! before constructing a model.

use crate::parameters::Weights;
use crate::types::Rating;

// ==================== Constants ====================

/// Stability floor applied after every update.
pub(crate) const MIN_STABILITY: f64 = 0.001;

/// Difficulty range.
pub(crate) const MIN_DIFFICULTY: f64 = 1.0;
pub(crate) const MAX_DIFFICULTY: f64 = 10.0;

/// Retention at t = S, fixed by the definition of stability.
const TARGET_RETENTION: f64 = 0.9;

// ==================== Memory Model ====================

/// The FSRS v6 update formulas with constants precomputed from the weights.
#[derive(Clone, Debug)]
pub(crate) struct MemoryModel {
    weights: Weights,
    decay: f64,
    factor: f64,
}

impl MemoryModel {
    /// Precomputes `decay` and `factor` from the weight vector.
    pub fn new(weights: Weights) -> Self {
        let decay = -weights[20];
        let factor = TARGET_RETENTION.powf(1.0 / decay) - 1.0;
        Self {
            weights,
            decay,
            factor,
        }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// R(t, S): probability of recall after `elapsed_days` at stability S.
    pub fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        (1.0 + self.factor * elapsed_days / stability).powf(self.decay)
    }

    /// S0(G): stability after the very first review.
    pub fn init_stability(&self, rating: Rating) -> f64 {
        clamp_stability(self.weights[rating as usize - 1])
    }

    /// D0(G): difficulty after the very first review.
    ///
    /// The unclamped form (`clamp = false`) is the mean-reversion target
    /// inside [`Self::next_difficulty`].
    pub fn init_difficulty(&self, rating: Rating, clamp: bool) -> f64 {
        let w = &self.weights;
        let d = w[4] - (w[5] * (rating.value() - 1.0)).exp() + 1.0;
        if clamp {
            clamp_difficulty(d)
        } else {
            d
        }
    }

    /// I(r, S): review interval in whole days for the desired retention,
    /// clamped to [1, max_interval].
    pub fn next_interval(&self, stability: f64, desired_retention: f64, max_interval: i64) -> i64 {
        let ivl = stability / self.factor * (desired_retention.powf(1.0 / self.decay) - 1.0);
        (ivl.round() as i64).clamp(1, max_interval)
    }

    /// Stability after a same-day review.
    ///
    /// For Good and Easy the increase factor is floored at 1 so stability
    /// never shrinks on a successful same-day recall.
    pub fn short_term_stability(&self, stability: f64, rating: Rating) -> f64 {
        let w = &self.weights;
        let mut inc = (w[17] * (rating.value() - 3.0 + w[18])).exp() * stability.powf(-w[19]);
        if matches!(rating, Rating::Good | Rating::Easy) {
            inc = inc.max(1.0);
        }
        clamp_stability(stability * inc)
    }

    /// Difficulty after any non-first review.
    ///
    /// dD = -w[6] * (G - 3), damped linearly toward 10, then mean-reverted
    /// toward the unclamped D0(Easy) with weight w[7].
    pub fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let w = &self.weights;
        let delta_d = -w[6] * (rating.value() - 3.0);
        let d_prime = difficulty + (MAX_DIFFICULTY - difficulty) * delta_d / 9.0;
        let d0_easy = self.init_difficulty(Rating::Easy, false);
        clamp_difficulty(w[7] * d0_easy + (1.0 - w[7]) * d_prime)
    }

    /// Stability after a cross-day review; dispatches on the rating.
    pub fn next_stability(
        &self,
        difficulty: f64,
        stability: f64,
        retrievability: f64,
        rating: Rating,
    ) -> f64 {
        if rating == Rating::Again {
            self.next_forget_stability(difficulty, stability, retrievability)
        } else {
            self.next_recall_stability(difficulty, stability, retrievability, rating)
        }
    }

    /// Stability after a successful cross-day recall (Hard/Good/Easy).
    pub fn next_recall_stability(
        &self,
        difficulty: f64,
        stability: f64,
        retrievability: f64,
        rating: Rating,
    ) -> f64 {
        let w = &self.weights;
        let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
        stability
            * (1.0
                + w[8].exp()
                    * (11.0 - difficulty)
                    * stability.powf(-w[9])
                    * (((1.0 - retrievability) * w[10]).exp() - 1.0)
                    * hard_penalty
                    * easy_bonus)
    }

    /// Stability after forgetting (Again).
    ///
    /// The short-term floor S / e^(w[17]*w[18]) keeps a lapse from erasing
    /// more stability than a same-day Again would.
    pub fn next_forget_stability(
        &self,
        difficulty: f64,
        stability: f64,
        retrievability: f64,
    ) -> f64 {
        let w = &self.weights;
        let long = w[11]
            * difficulty.powf(-w[12])
            * ((stability + 1.0).powf(w[13]) - 1.0)
            * ((1.0 - retrievability) * w[14]).exp();
        let short = stability / (w[17] * w[18]).exp();
        clamp_stability(long.min(short))
    }
}

// ==================== Clamp Helpers ====================

/// Clamps stability to its floor of 0.001.
pub(crate) fn clamp_stability(stability: f64) -> f64 {
    stability.max(MIN_STABILITY)
}

/// Clamps difficulty to [1, 10].
pub(crate) fn clamp_difficulty(difficulty: f64) -> f64 {
    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

// ==================== Unit Tests ====================
