//! Review Scheduler
//!
//! Applies the FSRS v6 memory model and the Learning/Review/Relearning
//! state machine to individual cards:
//!
//! - [`Scheduler::review_card`] computes new stability/difficulty, walks the
//!   state machine, optionally fuzzes the interval, and returns a fresh card
//!   plus a [`ReviewLog`]. The input card is never mutated.
//! - [`Scheduler::preview_card`] shows the outcome for every rating.
//! - [`Scheduler::reschedule_card`] replays a review history.
//! - [`Scheduler::retrievability`] evaluates recall probability at a point
//!   in time.
//!
//! The scheduler owns the fuzz RNG. Construction validates the parameter
//! vector, the desired retention, and the maximum interval; zero-config
//! defaults come from [`SchedulerConfig::default`].

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::algorithm::MemoryModel;
use crate::card::{Card, MemoryState};
use crate::error::FsrsError;
use crate::fuzz::apply_fuzz;
use crate::parameters::{validate_parameters, Weights, DEFAULT_PARAMETERS};
use crate::types::{Rating, ReviewLog, State, ALL_RATINGS};

// ==================== Configuration ====================

/// Scheduler configuration.
///
/// `learning_steps`/`relearning_steps` distinguish "use the defaults"
/// (`None`, serialized as `null`) from "no step phase" (`Some(vec![])`,
/// serialized as `[]`). Steps serialize as nanosecond integers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// The 21 model weights.
    pub parameters: Weights,
    /// Target recall probability at due time, in (0, 1].
    pub desired_retention: f64,
    /// Learning-phase steps. `None` means the default `[1 min, 10 min]`.
    #[serde(with = "step_nanos")]
    pub learning_steps: Option<Vec<Duration>>,
    /// Relearning-phase steps. `None` means the default `[10 min]`.
    /// Empty means a lapsed card stays in Review.
    #[serde(with = "step_nanos")]
    pub relearning_steps: Option<Vec<Duration>>,
    /// Interval ceiling in days.
    pub maximum_interval: i64,
    /// Bypass the fuzz engine entirely.
    pub disable_fuzzing: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parameters: DEFAULT_PARAMETERS,
            desired_retention: 0.9,
            learning_steps: None,
            relearning_steps: None,
            maximum_interval: 36500,
            disable_fuzzing: false,
        }
    }
}

fn default_learning_steps() -> Vec<Duration> {
    vec![Duration::minutes(1), Duration::minutes(10)]
}

fn default_relearning_steps() -> Vec<Duration> {
    vec![Duration::minutes(10)]
}

/// Serde helper: optional step lists as arrays of nanosecond integers.
mod step_nanos {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        steps: &Option<Vec<Duration>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let nanos: Option<Vec<i64>> = steps.as_ref().map(|steps| {
            steps
                .iter()
                .map(|d| d.num_nanoseconds().unwrap_or(i64::MAX))
                .collect()
        });
        nanos.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<Duration>>, D::Error> {
        let nanos: Option<Vec<i64>> = Option::deserialize(deserializer)?;
        Ok(nanos.map(|nanos| nanos.into_iter().map(Duration::nanoseconds).collect()))
    }
}

// ==================== Scheduler ====================

/// FSRS v6 card scheduler.
///
/// Not thread-safe by design: the fuzz RNG mutates on fuzzed reviews, so
/// callers sharing one instance must serialise calls or clone it.
///
/// Serializes as its resolved configuration; deserialization rebuilds the
/// scheduler through validated construction and reseeds the fuzz RNG.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "SchedulerConfig", try_from = "SchedulerConfig")]
pub struct Scheduler {
    model: MemoryModel,
    desired_retention: f64,
    learning_steps: Vec<Duration>,
    relearning_steps: Vec<Duration>,
    maximum_interval: i64,
    disable_fuzzing: bool,
    rng: ChaCha8Rng,
}

impl Scheduler {
    /// Creates a scheduler, seeding the fuzz RNG from the system clock.
    pub fn new(config: SchedulerConfig) -> Result<Self, FsrsError> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42);
        Self::with_seed(config, seed)
    }

    /// Creates a scheduler with an explicit fuzz-RNG seed.
    ///
    /// Runs with the same seed and the same call sequence produce
    /// identical fuzzed intervals.
    pub fn with_seed(config: SchedulerConfig, seed: u64) -> Result<Self, FsrsError> {
        validate_parameters(&config.parameters)?;

        if config.desired_retention <= 0.0 || config.desired_retention > 1.0 {
            return Err(FsrsError::InvalidRetention(config.desired_retention));
        }
        if config.maximum_interval < 1 {
            return Err(FsrsError::InvalidMaximumInterval(config.maximum_interval));
        }

        Ok(Self {
            model: MemoryModel::new(config.parameters),
            desired_retention: config.desired_retention,
            learning_steps: config.learning_steps.unwrap_or_else(default_learning_steps),
            relearning_steps: config
                .relearning_steps
                .unwrap_or_else(default_relearning_steps),
            maximum_interval: config.maximum_interval,
            disable_fuzzing: config.disable_fuzzing,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// The resolved configuration of this scheduler.
    pub fn config(&self) -> SchedulerConfig {
        SchedulerConfig {
            parameters: *self.model.weights(),
            desired_retention: self.desired_retention,
            learning_steps: Some(self.learning_steps.clone()),
            relearning_steps: Some(self.relearning_steps.clone()),
            maximum_interval: self.maximum_interval,
            disable_fuzzing: self.disable_fuzzing,
        }
    }

    // ==================== Review ====================

    /// Processes one review of `card` at `now`.
    ///
    /// Returns the updated card and the corresponding review log. The input
    /// card is not modified.
    pub fn review_card(
        &mut self,
        card: &Card,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (Card, ReviewLog) {
        let mut card = card.clone();

        let elapsed_days = match card.last_review {
            Some(last) => days_between(last, now),
            None => 0.0,
        };

        let memory = self.next_memory(&card, rating, elapsed_days);
        card.memory = Some(memory);

        let interval = self.transition(&mut card, rating, memory.stability);

        let interval = if !self.disable_fuzzing && card.state == State::Review {
            self.fuzz_interval(interval)
        } else {
            interval
        };

        card.due = now + interval;
        card.last_review = Some(now);

        let log = ReviewLog {
            card_id: card.card_id,
            rating,
            review_datetime: now,
            review_duration: None,
        };

        (card, log)
    }

    /// Returns the outcome of reviewing `card` with every possible rating.
    ///
    /// Each entry is independent; the input card is not modified.
    pub fn preview_card(&mut self, card: &Card, now: DateTime<Utc>) -> HashMap<Rating, Card> {
        let mut result = HashMap::with_capacity(ALL_RATINGS.len());
        for rating in ALL_RATINGS {
            let (reviewed, _) = self.review_card(card, rating, now);
            result.insert(rating, reviewed);
        }
        result
    }

    /// Replays `logs` in order on top of `card` and returns the final card.
    ///
    /// Fails with [`FsrsError::CardIdMismatch`] if any log belongs to a
    /// different card.
    pub fn reschedule_card(&mut self, card: &Card, logs: &[ReviewLog]) -> Result<Card, FsrsError> {
        let mut card = card.clone();
        for log in logs {
            if log.card_id != card.card_id {
                return Err(FsrsError::CardIdMismatch {
                    expected: card.card_id,
                    found: log.card_id,
                });
            }
            let (next, _) = self.review_card(&card, log.rating, log.review_datetime);
            card = next;
        }
        Ok(card)
    }

    /// Probability of recall for `card` at `now`.
    ///
    /// Returns 0 for cards that have never been reviewed.
    pub fn retrievability(&self, card: &Card, now: DateTime<Utc>) -> f64 {
        match (card.last_review, card.memory) {
            (Some(last), Some(memory)) => {
                let elapsed = days_between(last, now);
                self.model.retrievability(elapsed, memory.stability)
            }
            _ => 0.0,
        }
    }

    // ==================== Memory Update ====================

    /// New stability/difficulty for the card after this review.
    ///
    /// First review initialises both; a same-day review (< 1 elapsed day)
    /// uses the short-term update; a cross-day review goes through full
    /// retrievability-conditioned update.
    fn next_memory(&self, card: &Card, rating: Rating, elapsed_days: f64) -> MemoryState {
        let Some(memory) = card.memory else {
            return MemoryState {
                stability: self.model.init_stability(rating),
                difficulty: self.model.init_difficulty(rating, true),
            };
        };

        let stability = if elapsed_days < 1.0 {
            self.model.short_term_stability(memory.stability, rating)
        } else {
            let r = self.model.retrievability(elapsed_days, memory.stability);
            self.model
                .next_stability(memory.difficulty, memory.stability, r, rating)
        };

        MemoryState {
            stability,
            difficulty: self.model.next_difficulty(memory.difficulty, rating),
        }
    }

    // ==================== State Machine ====================

    /// Applies the state machine and returns the raw scheduling interval.
    fn transition(&self, card: &mut Card, rating: Rating, stability: f64) -> Duration {
        match card.state {
            State::Learning => {
                self.transition_step_phase(card, rating, stability, &self.learning_steps)
            }
            State::Relearning => {
                self.transition_step_phase(card, rating, stability, &self.relearning_steps)
            }
            State::Review => self.transition_review(card, rating, stability),
        }
    }

    /// Learning and Relearning share the same step walk.
    fn transition_step_phase(
        &self,
        card: &mut Card,
        rating: Rating,
        stability: f64,
        steps: &[Duration],
    ) -> Duration {
        let step = card.step.unwrap_or(0);

        // No step phase, or the step index ran off the configured list.
        if steps.is_empty() || (step >= steps.len() && rating != Rating::Again) {
            return self.graduate(card, stability);
        }

        match rating {
            Rating::Again => {
                card.step = Some(0);
                steps[0]
            }
            Rating::Hard => {
                if step == 0 && steps.len() == 1 {
                    steps[0] * 3 / 2
                } else if step == 0 && steps.len() >= 2 {
                    (steps[0] + steps[1]) / 2
                } else {
                    steps[step]
                }
            }
            Rating::Good => {
                let next = step + 1;
                if next >= steps.len() {
                    self.graduate(card, stability)
                } else {
                    card.step = Some(next);
                    steps[next]
                }
            }
            Rating::Easy => self.graduate(card, stability),
        }
    }

    fn transition_review(&self, card: &mut Card, rating: Rating, stability: f64) -> Duration {
        if rating == Rating::Again {
            if let Some(first) = self.relearning_steps.first() {
                card.state = State::Relearning;
                card.step = Some(0);
                return *first;
            }
            // Empty relearning steps: the lapse stays in Review.
        }

        card.step = None;
        Duration::days(self.model.next_interval(
            stability,
            self.desired_retention,
            self.maximum_interval,
        ))
    }

    /// Moves the card into Review and schedules by desired retention.
    fn graduate(&self, card: &mut Card, stability: f64) -> Duration {
        card.state = State::Review;
        card.step = None;
        Duration::days(self.model.next_interval(
            stability,
            self.desired_retention,
            self.maximum_interval,
        ))
    }

    // ==================== Fuzz ====================

    /// Fuzzes whole-day Review intervals; shorter intervals pass through.
    fn fuzz_interval(&mut self, interval: Duration) -> Duration {
        let days = interval.num_days();
        if days >= 1 {
            Duration::days(apply_fuzz(days, self.maximum_interval, &mut self.rng))
        } else {
            interval
        }
    }
}

impl From<Scheduler> for SchedulerConfig {
    fn from(scheduler: Scheduler) -> Self {
        scheduler.config()
    }
}

impl TryFrom<SchedulerConfig> for Scheduler {
    type Error = FsrsError;

    fn try_from(config: SchedulerConfig) -> Result<Self, Self::Error> {
        Scheduler::new(config)
    }
}

/// Elapsed time between two instants as a fractional day count.
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 86_400_000.0
}

// ==================== Tests ====================
