//! Common Types
//!
//! Shared value types used across the scheduler and the optimizer:
//! the recall [`Rating`], the card [`State`], and the [`ReviewLog`]
//! record that feeds training.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FsrsError;

// ==================== Rating ====================

/// The user's assessment of recall quality.
///
/// Serializes as the variant name ("Again", "Hard", "Good", "Easy").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    /// Complete failure to recall.
    Again = 1,
    /// Recalled with significant difficulty.
    Hard = 2,
    /// Recalled with some effort.
    Good = 3,
    /// Recalled effortlessly.
    Easy = 4,
}

/// All ratings in ascending order.
pub const ALL_RATINGS: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

impl Rating {
    /// The numeric grade G used by the memory-model formulas.
    pub fn value(self) -> f64 {
        self as i64 as f64
    }
}

impl TryFrom<i64> for Rating {
    type Error = FsrsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            _ => Err(FsrsError::InvalidRating(value)),
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        };
        f.write_str(name)
    }
}

// ==================== State ====================

/// The learning stage of a card.
///
/// Serializes as the variant name ("Learning", "Review", "Relearning").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// New card, in initial learning steps.
    Learning = 1,
    /// Entered the long-term review cycle.
    Review = 2,
    /// Forgotten and relearning.
    Relearning = 3,
}

impl TryFrom<i64> for State {
    type Error = FsrsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(State::Learning),
            2 => Ok(State::Review),
            3 => Ok(State::Relearning),
            _ => Err(FsrsError::InvalidState(value)),
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Learning => "Learning",
            State::Review => "Review",
            State::Relearning => "Relearning",
        };
        f.write_str(name)
    }
}

// ==================== Review Log ====================

/// A single review event for a card.
///
/// Logs are emitted by [`crate::Scheduler::review_card`] and consumed by the
/// optimizer. `review_duration` (milliseconds) is optional and only required
/// for the optimal-retention search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub card_id: i64,
    pub rating: Rating,
    pub review_datetime: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_duration: Option<i64>,
}

// ==================== Tests ====================
