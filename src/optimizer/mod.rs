//! Parameter Training
//!
//! Trains the 21 FSRS weights from historical review logs and searches for
//! the cheapest desired-retention target.
//!
//! Training is mini-batch gradient descent: numerical central-difference
//! gradients over the binary cross-entropy loss, an [`Adam`] optimizer, and
//! a [`CosineAnnealing`] learning-rate schedule. Every epoch shuffles the
//! cards with a fixed-seed RNG, so identical inputs produce identical
//! trained weights across runs.
//!
//! Long-running entry points take a [`CancelToken`]; cancellation is
//! cooperative and checked at coarse boundaries (epoch start, each
//! retention candidate). A cancelled training run still hands back the best
//! weights found so far.

mod adam;
mod dataset;
mod loss;
mod retention;

pub use adam::{Adam, CosineAnnealing};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::parameters::{clamp_parameters, Weights, DEFAULT_PARAMETERS};
use crate::types::ReviewLog;

use dataset::{count_cross_day_reviews, format_revlogs, TrainingData};
use loss::{compute_batch_loss, numerical_gradient};

/// Fixed seed for the epoch shuffle.
const TRAINING_SEED: u64 = 42;

// ==================== Errors ====================

/// Errors raised by parameter training and the retention search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    /// No review logs were provided.
    #[error("no review logs provided")]
    EmptyLogs,

    /// Fewer cross-day reviews than one mini-batch. The default weight
    /// vector is returned alongside so callers still have a usable model.
    #[error("insufficient cross-day reviews: {found} < {required}")]
    InsufficientData {
        found: usize,
        required: usize,
        fallback: Weights,
    },

    /// Too few logs for the retention search.
    #[error("at least {required} review logs required, got {found}")]
    InsufficientLogs { found: usize, required: usize },

    /// A log without a review duration was passed to the retention search.
    #[error("review log for card {card_id} is missing review_duration")]
    MissingDuration { card_id: i64 },

    /// The caller cancelled the run. `best` carries the best weights found
    /// before cancellation (the input weights if none were trained yet).
    #[error("optimization cancelled")]
    Cancelled { best: Weights },
}

// ==================== Cancellation ====================

/// Cooperative cancellation flag shared between the caller and a running
/// optimization.
///
/// Clone the token, hand one copy to the optimizer, and call
/// [`CancelToken::cancel`] from anywhere (any thread) to stop the run at
/// the next checkpoint.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ==================== Configuration ====================

/// Training hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizerConfig {
    /// Passes over the full dataset.
    pub epochs: usize,
    /// Cross-day reviews per gradient step.
    pub mini_batch_size: usize,
    /// Peak learning rate for Adam / cosine annealing.
    pub learning_rate: f64,
    /// Per-card review-history cap (earliest reviews are kept).
    pub max_seq_len: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            mini_batch_size: 512,
            learning_rate: 0.04,
            max_seq_len: 64,
        }
    }
}

// ==================== Optimizer ====================

/// Trains FSRS weights from review logs.
#[derive(Clone, Debug)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Trains a weight vector from review logs.
    ///
    /// Starts from [`DEFAULT_PARAMETERS`] and runs mini-batch descent with
    /// Adam and a cosine-annealed learning rate; gradients come from
    /// central differences, so no autodiff is involved. Returns the weights
    /// with the lowest full-dataset loss across epochs. Every returned
    /// weight lies within its bounds.
    ///
    /// Fails with [`OptimizeError::EmptyLogs`] on empty input and with
    /// [`OptimizeError::InsufficientData`] (carrying the default vector)
    /// when the logs hold fewer cross-day reviews than one mini-batch.
    pub fn compute_optimal_parameters(
        &self,
        cancel: &CancelToken,
        logs: &[ReviewLog],
    ) -> Result<Weights, OptimizeError> {
        if logs.is_empty() {
            return Err(OptimizeError::EmptyLogs);
        }

        let mut data = format_revlogs(logs);
        for reviews in data.values_mut() {
            reviews.truncate(self.config.max_seq_len);
        }

        let num_reviews = count_cross_day_reviews(&data);
        if num_reviews < self.config.mini_batch_size {
            return Err(OptimizeError::InsufficientData {
                found: num_reviews,
                required: self.config.mini_batch_size,
                fallback: DEFAULT_PARAMETERS,
            });
        }

        let mut weights = DEFAULT_PARAMETERS;
        let t_max = (num_reviews as f64 / self.config.mini_batch_size as f64).ceil() as usize
            * self.config.epochs;
        let mut adam = Adam::new(self.config.learning_rate);
        let mut annealer = CosineAnnealing::new(self.config.learning_rate, t_max);
        let mut rng = ChaCha8Rng::seed_from_u64(TRAINING_SEED);

        // BTreeMap keys are already ascending; the shuffle below is the only
        // source of ordering randomness and it is seeded.
        let mut card_ids: Vec<i64> = data.keys().copied().collect();

        let mut best_weights = weights;
        let mut best_loss = f64::INFINITY;

        for epoch in 0..self.config.epochs {
            if cancel.is_cancelled() {
                return Err(OptimizeError::Cancelled { best: best_weights });
            }

            card_ids.shuffle(&mut rng);

            let mut batch = TrainingData::new();
            let mut cross_day = 0;

            for &card_id in &card_ids {
                let reviews = &data[&card_id];
                cross_day += reviews.iter().filter(|r| r.elapsed_days >= 1.0).count();
                batch.insert(card_id, reviews.clone());

                if cross_day >= self.config.mini_batch_size {
                    weights = self.gradient_step(weights, &batch, &mut adam, &mut annealer);
                    batch.clear();
                    cross_day = 0;
                }
            }

            // Flush whatever is left of the epoch.
            if cross_day > 0 {
                weights = self.gradient_step(weights, &batch, &mut adam, &mut annealer);
            }

            let epoch_loss = compute_batch_loss(&weights, &data);
            tracing::debug!(epoch, loss = epoch_loss, "epoch finished");
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
                best_weights = weights;
                tracing::debug!(epoch, loss = best_loss, "best weights updated");
            }
        }

        Ok(best_weights)
    }

    fn gradient_step(
        &self,
        weights: Weights,
        batch: &TrainingData,
        adam: &mut Adam,
        annealer: &mut CosineAnnealing,
    ) -> Weights {
        let grads = numerical_gradient(&weights, batch);
        adam.set_lr(annealer.lr());
        let updated = clamp_parameters(adam.update(weights, &grads));
        annealer.step();
        updated
    }

    /// Average BCE loss of `weights` over all cross-day reviews in `logs`.
    ///
    /// Convenience wrapper around the internal loss used in training;
    /// useful for comparing trained against default weights.
    pub fn compute_batch_loss(&self, weights: &Weights, logs: &[ReviewLog]) -> f64 {
        let data = format_revlogs(logs);
        compute_batch_loss(weights, &data)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

// ==================== Tests ====================
