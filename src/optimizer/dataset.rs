//! Training Dataset Preprocessing
//!
//! Turns a flat stream of review logs into per-card ordered sequences
//! annotated with elapsed days and binary recall labels. Sequences are held
//! in a `BTreeMap` keyed by card id so every downstream pass (loss
//! accumulation, batch assembly, epoch shuffles over the key list) iterates
//! in the same order on every run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{Rating, ReviewLog};

/// One review event in a card's training sequence.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TrainingReview {
    pub rating: Rating,
    /// Days since the previous review in this sequence; 0 for the first.
    pub elapsed_days: f64,
    /// 0 if the rating was Again, 1 otherwise.
    pub label: f64,
    pub reviewed_at: DateTime<Utc>,
}

/// Per-card training sequences, ordered by card id.
pub(crate) type TrainingData = BTreeMap<i64, Vec<TrainingReview>>;

/// Groups logs by card id, sorts each group by review time (stable under
/// equal timestamps), and annotates elapsed days and labels.
pub(crate) fn format_revlogs(logs: &[ReviewLog]) -> TrainingData {
    let mut groups: BTreeMap<i64, Vec<&ReviewLog>> = BTreeMap::new();
    for log in logs {
        groups.entry(log.card_id).or_default().push(log);
    }

    let mut data = TrainingData::new();
    for (card_id, mut card_logs) in groups {
        card_logs.sort_by_key(|log| log.review_datetime);

        let mut reviews = Vec::with_capacity(card_logs.len());
        let mut previous: Option<DateTime<Utc>> = None;
        for log in card_logs {
            let elapsed_days = match previous {
                Some(prev) => {
                    (log.review_datetime - prev).num_milliseconds() as f64 / 86_400_000.0
                }
                None => 0.0,
            };
            previous = Some(log.review_datetime);

            reviews.push(TrainingReview {
                rating: log.rating,
                elapsed_days,
                label: if log.rating == Rating::Again { 0.0 } else { 1.0 },
                reviewed_at: log.review_datetime,
            });
        }
        data.insert(card_id, reviews);
    }

    data
}

/// Counts reviews with elapsed days >= 1 across all cards.
///
/// This is the optimizer's effective training-set size; the first review of
/// a card never counts.
pub(crate) fn count_cross_day_reviews(data: &TrainingData) -> usize {
    data.values()
        .flat_map(|reviews| reviews.iter())
        .filter(|review| review.elapsed_days >= 1.0)
        .count()
}
