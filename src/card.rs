//! Card Record
//!
//! The mutable scheduling state of a single flashcard. Stability and
//! difficulty only exist after the first review, so they live together in
//! an optional [`MemoryState`]; the wire form stays flat
//! (`stability` / `difficulty` as nullable numbers) and the joint-presence
//! invariant is checked on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FsrsError;
use crate::types::State;

/// The latent memory variables of a reviewed card.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryState {
    /// Days until retrievability falls to 0.9. Always >= 0.001.
    pub stability: f64,
    /// Difficulty scalar in [1, 10].
    pub difficulty: f64,
}

/// A flashcard's scheduling record.
///
/// The scheduler never mutates a card in place; [`crate::Scheduler::review_card`]
/// returns a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "CardRepr", try_from = "CardRepr")]
pub struct Card {
    /// Caller-supplied identifier, opaque to the scheduler.
    pub card_id: i64,
    /// Current learning stage.
    pub state: State,
    /// Position within the learning/relearning steps.
    /// Present exactly when `state != Review`.
    pub step: Option<usize>,
    /// Stability and difficulty; absent before the first review.
    pub memory: Option<MemoryState>,
    /// When the next review is scheduled.
    pub due: DateTime<Utc>,
    /// When the card was last reviewed; absent before the first review.
    pub last_review: Option<DateTime<Utc>>,
}

impl Card {
    /// Creates a new card in the Learning state at step 0, due immediately.
    pub fn new(card_id: i64) -> Self {
        Self {
            card_id,
            state: State::Learning,
            step: Some(0),
            memory: None,
            due: Utc::now(),
            last_review: None,
        }
    }

    /// The card's stability, if it has been reviewed.
    pub fn stability(&self) -> Option<f64> {
        self.memory.map(|m| m.stability)
    }

    /// The card's difficulty, if it has been reviewed.
    pub fn difficulty(&self) -> Option<f64> {
        self.memory.map(|m| m.difficulty)
    }
}

// ==================== Wire Form ====================

/// Flat serialized form of a [`Card`].
#[derive(Serialize, Deserialize)]
struct CardRepr {
    card_id: i64,
    state: State,
    step: Option<usize>,
    stability: Option<f64>,
    difficulty: Option<f64>,
    due: DateTime<Utc>,
    last_review: Option<DateTime<Utc>>,
}

impl From<Card> for CardRepr {
    fn from(card: Card) -> Self {
        CardRepr {
            card_id: card.card_id,
            state: card.state,
            step: card.step,
            stability: card.stability(),
            difficulty: card.difficulty(),
            due: card.due,
            last_review: card.last_review,
        }
    }
}

impl TryFrom<CardRepr> for Card {
    type Error = FsrsError;

    fn try_from(repr: CardRepr) -> Result<Self, Self::Error> {
        let memory = match (repr.stability, repr.difficulty) {
            (Some(stability), Some(difficulty)) => Some(MemoryState {
                stability,
                difficulty,
            }),
            (None, None) => None,
            _ => {
                return Err(FsrsError::InvalidCard(
                    "stability and difficulty must be present together".into(),
                ))
            }
        };
        if memory.is_some() != repr.last_review.is_some() {
            return Err(FsrsError::InvalidCard(
                "last_review must be present exactly when stability is".into(),
            ));
        }
        if (repr.state == State::Review) == repr.step.is_some() {
            return Err(FsrsError::InvalidCard(
                "step must be present exactly when the card is not in Review".into(),
            ));
        }
        Ok(Card {
            card_id: repr.card_id,
            state: repr.state,
            step: repr.step,
            memory,
            due: repr.due,
            last_review: repr.last_review,
        })
    }
}

// ==================== Tests ====================
