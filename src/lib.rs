//! # fsrs-engine — FSRS v6 scheduling and training
//!
//! A pure-Rust implementation of the Free Spaced Repetition Scheduler
//! (FSRS) version 6: the scheduling state machine that decides when a
//! flashcard should next be reviewed, and the optimizer that trains the
//! 21 model weights from a user's review history.
//!
//! ## Core concepts
//!
//! - [`Card`] holds per-card scheduling state: stability, difficulty, due
//!   date, and learning step.
//! - [`Scheduler`] applies the FSRS v6 memory model and the
//!   Learning → Review → Relearning state machine to compute intervals.
//! - [`Rating`] (Again, Hard, Good, Easy) is the user's recall assessment.
//! - [`ReviewLog`] records each review event for later training.
//! - [`optimizer::Optimizer`] trains weights by mini-batch gradient descent
//!   (numerical gradients, Adam, cosine annealing) and searches for the
//!   cheapest desired-retention target by Monte-Carlo simulation.
//!
//! ## Scheduling
//!
//! ```
//! use chrono::Utc;
//! use fsrs_engine::{Card, Rating, Scheduler, SchedulerConfig};
//!
//! # fn main() -> Result<(), fsrs_engine::FsrsError> {
//! let mut scheduler = Scheduler::new(SchedulerConfig::default())?;
//!
//! let card = Card::new(1);
//! let (card, log) = scheduler.review_card(&card, Rating::Good, Utc::now());
//! assert!(card.due > log.review_datetime);
//!
//! // Recall probability at any point in time.
//! let r = scheduler.retrievability(&card, Utc::now());
//! assert!((0.0..=1.0).contains(&r));
//!
//! // Rebuild a card from its review history.
//! let rebuilt = scheduler.reschedule_card(&Card::new(1), &[log])?;
//! assert_eq!(rebuilt.state, card.state);
//! # Ok(())
//! # }
//! ```
//!
//! ## Training
//!
//! ```no_run
//! use fsrs_engine::optimizer::{CancelToken, Optimizer, OptimizerConfig};
//! # let logs: Vec<fsrs_engine::ReviewLog> = Vec::new();
//!
//! let optimizer = Optimizer::new(OptimizerConfig::default());
//! let cancel = CancelToken::new();
//! let weights = optimizer.compute_optimal_parameters(&cancel, &logs)?;
//! let retention = optimizer.compute_optimal_retention(&cancel, &weights, &logs)?;
//! # Ok::<(), fsrs_engine::optimizer::OptimizeError>(())
//! ```
//!
//! The scheduler is single-threaded by design (it owns the fuzz RNG);
//! clone it or serialise calls to share it. The optimizer seeds its RNGs
//! deterministically, so identical inputs give identical outputs.

mod algorithm;
pub mod card;
pub mod error;
mod fuzz;
pub mod optimizer;
pub mod parameters;
pub mod scheduler;
pub mod types;

pub use card::{Card, MemoryState};
pub use error::FsrsError;
pub use parameters::{
    clamp_parameters, validate_parameters, Weights, DEFAULT_PARAMETERS, LOWER_BOUNDS,
    PARAMETER_COUNT, UPPER_BOUNDS,
};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use types::{Rating, ReviewLog, State, ALL_RATINGS};
