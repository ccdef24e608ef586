//! Loss and Numerical Gradient
//!
//! Training minimises binary cross-entropy between predicted retrievability
//! and the binary recall outcome, evaluated only on cross-day reviews (a
//! same-day prediction has no forgetting signal, and the first review of a
//! card has no prior to condition on).
//!
//! The gradient is computed by central differences over all 21 weights:
//! dL/dw[i] ~ (L(w[i]+h) - L(w[i]-h)) / (2h). Each gradient costs 42 full
//! batch-loss evaluations; the 21 differences are independent, so they run
//! in parallel, each branch replaying cards through its own scheduler.

use rayon::prelude::*;

use crate::card::Card;
use crate::parameters::{Weights, PARAMETER_COUNT};
use crate::scheduler::{Scheduler, SchedulerConfig};

use super::dataset::TrainingData;

/// Probability clamp for the BCE logarithms.
const BCE_CLAMP: f64 = 1e-7;

/// Central-difference step.
const GRAD_EPS: f64 = 1e-5;

/// Binary cross-entropy: -[y*ln(p) + (1-y)*ln(1-p)], with p clamped away
/// from 0 and 1.
pub(crate) fn bce_loss(prediction: f64, label: f64) -> f64 {
    let p = prediction.clamp(BCE_CLAMP, 1.0 - BCE_CLAMP);
    -(label * p.ln() + (1.0 - label) * (1.0 - p).ln())
}

/// Average BCE loss over all cross-day reviews in `data`.
///
/// Replays every card from scratch through a fuzz-disabled scheduler built
/// from `weights`, predicting retrievability before each review. Returns 0
/// when there are no cross-day reviews, and also when scheduler
/// construction fails: the only caller of the failure path is the gradient
/// routine, which must survive a perturbed weight briefly leaving its
/// bounds.
pub(crate) fn compute_batch_loss(weights: &Weights, data: &TrainingData) -> f64 {
    let config = SchedulerConfig {
        parameters: *weights,
        disable_fuzzing: true,
        ..Default::default()
    };
    let Ok(mut scheduler) = Scheduler::new(config) else {
        return 0.0;
    };

    let mut total_loss = 0.0;
    let mut count: usize = 0;

    for (&card_id, reviews) in data {
        let Some(first) = reviews.first() else {
            continue;
        };
        let mut card = Card::new(card_id);
        card.due = first.reviewed_at;

        for review in reviews {
            // Predict before the review mutates the card.
            let prediction = scheduler.retrievability(&card, review.reviewed_at);

            if card.last_review.is_some() && review.elapsed_days >= 1.0 {
                total_loss += bce_loss(prediction, review.label);
                count += 1;
            }

            let (next, _) = scheduler.review_card(&card, review.rating, review.reviewed_at);
            card = next;
        }
    }

    if count == 0 {
        0.0
    } else {
        total_loss / count as f64
    }
}

/// Gradient of the batch loss w.r.t. every weight, by central differences.
pub(crate) fn numerical_gradient(weights: &Weights, data: &TrainingData) -> Weights {
    let partials: Vec<f64> = (0..PARAMETER_COUNT)
        .into_par_iter()
        .map(|i| {
            let mut plus = *weights;
            plus[i] += GRAD_EPS;
            let mut minus = *weights;
            minus[i] -= GRAD_EPS;

            (compute_batch_loss(&plus, data) - compute_batch_loss(&minus, data))
                / (2.0 * GRAD_EPS)
        })
        .collect();

    let mut grads = [0.0; PARAMETER_COUNT];
    grads.copy_from_slice(&partials);
    grads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::dataset::format_revlogs;
    use crate::parameters::DEFAULT_PARAMETERS;
    use crate::types::{Rating, ReviewLog};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn log(card_id: i64, rating: Rating, at: DateTime<Utc>) -> ReviewLog {
        ReviewLog {
            card_id,
            rating,
            review_datetime: at,
            review_duration: None,
        }
    }

    /// A small but learnable history: several cards, multi-day spans,
    /// a mix of recalls and lapses.
    fn sample_data() -> TrainingData {
        let mut logs = Vec::new();
        for card_id in 1..=10 {
            let mut at = t0();
            logs.push(log(card_id, Rating::Good, at));
            for i in 0..6 {
                at += Duration::days(1 + (card_id + i) % 5);
                let rating = if (card_id + i) % 4 == 0 {
                    Rating::Again
                } else {
                    Rating::Good
                };
                logs.push(log(card_id, rating, at));
            }
        }
        format_revlogs(&logs)
    }

    // ==================== BCE ====================

    #[test]
    fn test_bce_loss_confident_correct_is_small() {
        assert!(bce_loss(0.99, 1.0) < 0.02);
        assert!(bce_loss(0.01, 0.0) < 0.02);
    }

    #[test]
    fn test_bce_loss_confident_wrong_is_large() {
        assert!(bce_loss(0.99, 0.0) > 4.0);
        assert!(bce_loss(0.01, 1.0) > 4.0);
    }

    #[test]
    fn test_bce_loss_clamps_extremes() {
        // Without the clamp these would be infinite.
        assert!(bce_loss(0.0, 1.0).is_finite());
        assert!(bce_loss(1.0, 0.0).is_finite());
        let want = -(BCE_CLAMP.ln());
        assert!((bce_loss(0.0, 1.0) - want).abs() < 1e-9);
    }

    #[test]
    fn test_bce_loss_symmetric() {
        let a = bce_loss(0.3, 1.0);
        let b = bce_loss(0.7, 0.0);
        assert!((a - b).abs() < 1e-12);
    }

    // ==================== Batch Loss ====================

    #[test]
    fn test_batch_loss_empty_data_is_zero() {
        let data = TrainingData::new();
        assert_eq!(compute_batch_loss(&DEFAULT_PARAMETERS, &data), 0.0);
    }

    #[test]
    fn test_batch_loss_positive_on_sample() {
        let loss = compute_batch_loss(&DEFAULT_PARAMETERS, &sample_data());
        assert!(loss > 0.0);
        assert!(loss.is_finite());
    }

    #[test]
    fn test_batch_loss_invalid_weights_is_zero() {
        let mut bad = DEFAULT_PARAMETERS;
        bad[0] = -10.0;
        assert_eq!(compute_batch_loss(&bad, &sample_data()), 0.0);
    }

    #[test]
    fn test_batch_loss_single_review_cards_contribute_nothing() {
        // Cards with one review have no cross-day signal at all.
        let logs: Vec<ReviewLog> = (1..=20)
            .map(|id| log(id, Rating::Good, t0()))
            .collect();
        let data = format_revlogs(&logs);
        assert_eq!(compute_batch_loss(&DEFAULT_PARAMETERS, &data), 0.0);
    }

    #[test]
    fn test_batch_loss_same_day_reviews_excluded() {
        let logs = vec![
            log(1, Rating::Good, t0()),
            log(1, Rating::Good, t0() + Duration::hours(2)),
            log(1, Rating::Again, t0() + Duration::hours(4)),
        ];
        let data = format_revlogs(&logs);
        assert_eq!(compute_batch_loss(&DEFAULT_PARAMETERS, &data), 0.0);
    }

    #[test]
    fn test_batch_loss_deterministic() {
        let data = sample_data();
        let a = compute_batch_loss(&DEFAULT_PARAMETERS, &data);
        let b = compute_batch_loss(&DEFAULT_PARAMETERS, &data);
        assert_eq!(a, b);
    }

    // ==================== Gradient ====================

    #[test]
    fn test_gradient_is_finite_and_nonzero() {
        let grads = numerical_gradient(&DEFAULT_PARAMETERS, &sample_data());
        assert!(grads.iter().all(|g| g.is_finite()));
        assert!(grads.iter().any(|g| *g != 0.0));
    }

    #[test]
    fn test_gradient_matches_sequential_differences() {
        let data = sample_data();
        let grads = numerical_gradient(&DEFAULT_PARAMETERS, &data);

        for i in [0, 8, 20] {
            let mut plus = DEFAULT_PARAMETERS;
            plus[i] += GRAD_EPS;
            let mut minus = DEFAULT_PARAMETERS;
            minus[i] -= GRAD_EPS;
            let want = (compute_batch_loss(&plus, &data) - compute_batch_loss(&minus, &data))
                / (2.0 * GRAD_EPS);
            assert!((grads[i] - want).abs() < 1e-12, "grad[{i}]");
        }
    }

    #[test]
    fn test_gradient_zero_on_empty_data() {
        let grads = numerical_gradient(&DEFAULT_PARAMETERS, &TrainingData::new());
        assert_eq!(grads, [0.0; PARAMETER_COUNT]);
    }
}
