//! Error types for the scheduling side of the crate.
//!
//! Optimizer-specific errors live in [`crate::optimizer::OptimizeError`].

use thiserror::Error;

/// Validation and data errors raised by the scheduler and its value types.
///
/// Every variant is a stable marker callers can match on. Validation errors
/// are raised at construction or parsing time and are never recoverable
/// in place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FsrsError {
    /// A numeric rating outside 1..=4.
    #[error("invalid rating: {0} (expected 1..=4)")]
    InvalidRating(i64),

    /// A numeric state outside 1..=3.
    #[error("invalid state: {0} (expected 1..=3)")]
    InvalidState(i64),

    /// A parameter outside its inclusive bounds.
    #[error("parameter w[{index}] = {value} outside bounds [{lower}, {upper}]")]
    InvalidParameters {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// Desired retention outside (0, 1].
    #[error("desired retention {0} out of range (0, 1]")]
    InvalidRetention(f64),

    /// Negative maximum interval.
    #[error("maximum interval {0} must be positive")]
    InvalidMaximumInterval(i64),

    /// A card record that violates the joint-presence invariant
    /// (stability, difficulty and last review appear together).
    #[error("invalid card: {0}")]
    InvalidCard(String),

    /// A review log whose card id does not match the card being replayed.
    #[error("card id mismatch: card {expected}, log {found}")]
    CardIdMismatch { expected: i64, found: i64 },
}
