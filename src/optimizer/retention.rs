//! Optimal-Retention Search
//!
//! Picks the desired-retention target that minimises simulated review cost.
//! Rating behaviour is estimated empirically from the user's review logs
//! (first reviews and later reviews behave differently, so they are
//! estimated separately), then each candidate retention is scored by a
//! Monte-Carlo simulation: 1000 synthetic cards reviewed over one calendar
//! year, with each review's rating drawn from the estimated categoricals
//! and its cost taken from the estimated durations.
//!
//! cost(retention) = total review time / (retention * cards)

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::card::Card;
use crate::parameters::Weights;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::types::{Rating, ReviewLog};

use super::{CancelToken, OptimizeError, Optimizer};

/// Candidate desired-retention values, searched in order.
const RETENTION_CANDIDATES: [f64; 6] = [0.70, 0.75, 0.80, 0.85, 0.90, 0.95];

/// Minimum number of review logs required for a meaningful estimate.
const MIN_RETENTION_LOGS: usize = 512;

/// Synthetic cards per simulation.
const SIMULATION_CARDS: usize = 1000;

/// Fixed RNG seed so identical inputs give identical search results.
const SIMULATION_SEED: u64 = 42;

// ==================== Empirical Estimates ====================

/// Rating probabilities and average review durations estimated from logs.
///
/// Arrays are indexed by `rating as usize - 1`. Durations are in
/// milliseconds; a rating never observed keeps an average of 0.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RatingEstimates {
    /// P(rating) over the first review of each card.
    pub first_probs: [f64; 4],
    /// Average duration of first reviews, per rating.
    pub first_durations: [f64; 4],
    /// P(rating | recalled) over non-first reviews, Hard/Good/Easy only
    /// (index 0 unused, kept for uniform indexing).
    pub recall_probs: [f64; 4],
    /// Average duration of non-first reviews, per rating.
    pub durations: [f64; 4],
}

/// Estimates rating behaviour from review logs.
///
/// Groups by card and sorts by time to split first reviews from the rest.
/// If no non-first review was ever recalled, the recall categorical falls
/// back to uniform 1/3 over Hard/Good/Easy.
pub(crate) fn estimate_from_logs(logs: &[ReviewLog]) -> RatingEstimates {
    let mut groups: BTreeMap<i64, Vec<&ReviewLog>> = BTreeMap::new();
    for log in logs {
        groups.entry(log.card_id).or_default().push(log);
    }

    let mut first_count = [0.0_f64; 4];
    let mut first_dur_sum = [0.0_f64; 4];
    let mut first_total = 0.0;

    let mut recall_count = [0.0_f64; 4];
    let mut recall_total = 0.0;
    let mut dur_sum = [0.0_f64; 4];
    let mut dur_count = [0.0_f64; 4];

    for (_, mut card_logs) in groups {
        card_logs.sort_by_key(|log| log.review_datetime);
        for (i, log) in card_logs.iter().enumerate() {
            let idx = log.rating as usize - 1;
            let duration = log.review_duration.unwrap_or(0) as f64;
            if i == 0 {
                first_total += 1.0;
                first_count[idx] += 1.0;
                first_dur_sum[idx] += duration;
            } else {
                dur_sum[idx] += duration;
                dur_count[idx] += 1.0;
                if log.rating != Rating::Again {
                    recall_total += 1.0;
                    recall_count[idx] += 1.0;
                }
            }
        }
    }

    let mut estimates = RatingEstimates {
        first_probs: [0.0; 4],
        first_durations: [0.0; 4],
        recall_probs: [0.0; 4],
        durations: [0.0; 4],
    };

    for idx in 0..4 {
        if first_total > 0.0 {
            estimates.first_probs[idx] = first_count[idx] / first_total;
        }
        if first_count[idx] > 0.0 {
            estimates.first_durations[idx] = first_dur_sum[idx] / first_count[idx];
        }
        if dur_count[idx] > 0.0 {
            estimates.durations[idx] = dur_sum[idx] / dur_count[idx];
        }
    }

    if recall_total > 0.0 {
        for idx in 1..4 {
            estimates.recall_probs[idx] = recall_count[idx] / recall_total;
        }
    } else {
        for idx in 1..4 {
            estimates.recall_probs[idx] = 1.0 / 3.0;
        }
    }

    estimates
}

// ==================== Simulation ====================

fn simulation_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn simulation_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn idx(rating: Rating) -> usize {
    rating as usize - 1
}

/// Draws a first-review rating from the estimated categorical.
fn sample_first_rating(rng: &mut ChaCha8Rng, estimates: &RatingEstimates) -> Rating {
    let p: f64 = rng.gen();
    let again = estimates.first_probs[idx(Rating::Again)];
    let hard = estimates.first_probs[idx(Rating::Hard)];
    let good = estimates.first_probs[idx(Rating::Good)];
    if p < again {
        Rating::Again
    } else if p < again + hard {
        Rating::Hard
    } else if p < again + hard + good {
        Rating::Good
    } else {
        Rating::Easy
    }
}

/// Draws a recalled rating (Hard/Good/Easy) from the estimated categorical.
fn sample_recall_rating(rng: &mut ChaCha8Rng, estimates: &RatingEstimates) -> Rating {
    let p: f64 = rng.gen();
    let hard = estimates.recall_probs[idx(Rating::Hard)];
    let good = estimates.recall_probs[idx(Rating::Good)];
    if p < hard {
        Rating::Hard
    } else if p < hard + good {
        Rating::Good
    } else {
        Rating::Easy
    }
}

/// Simulated review cost per retained card for one candidate retention.
///
/// Scheduler construction failure (a weight vector out of bounds) scores
/// the candidate at +inf, losing every comparison.
pub(crate) fn simulate_cost(
    retention: f64,
    weights: &Weights,
    estimates: &RatingEstimates,
) -> f64 {
    let config = SchedulerConfig {
        parameters: *weights,
        desired_retention: retention,
        disable_fuzzing: true,
        ..Default::default()
    };
    let Ok(mut scheduler) = Scheduler::new(config) else {
        return f64::INFINITY;
    };

    let mut rng = ChaCha8Rng::seed_from_u64(SIMULATION_SEED);
    let start = simulation_start();
    let end = simulation_end();

    let mut total_duration = 0.0;

    for i in 0..SIMULATION_CARDS {
        let mut card = Card::new((i + 1) as i64);
        card.due = start;
        let mut now = start;
        let mut is_first = true;

        while now <= end {
            let (rating, duration) = if is_first {
                is_first = false;
                let rating = sample_first_rating(&mut rng, estimates);
                (rating, estimates.first_durations[idx(rating)])
            } else if rng.gen::<f64>() < retention {
                let rating = sample_recall_rating(&mut rng, estimates);
                (rating, estimates.durations[idx(rating)])
            } else {
                (Rating::Again, estimates.durations[idx(Rating::Again)])
            };

            total_duration += duration;
            let (next, _) = scheduler.review_card(&card, rating, now);
            card = next;
            now = card.due;
        }
    }

    total_duration / (retention * SIMULATION_CARDS as f64)
}

// ==================== Search ====================

impl Optimizer {
    /// Finds the candidate desired retention with the smallest simulated
    /// cost (first wins on ties).
    ///
    /// Requires at least 512 logs, each carrying a review duration.
    /// Cancellation is checked before each candidate simulation.
    pub fn compute_optimal_retention(
        &self,
        cancel: &CancelToken,
        weights: &Weights,
        logs: &[ReviewLog],
    ) -> Result<f64, OptimizeError> {
        if logs.len() < MIN_RETENTION_LOGS {
            return Err(OptimizeError::InsufficientLogs {
                found: logs.len(),
                required: MIN_RETENTION_LOGS,
            });
        }
        if let Some(log) = logs.iter().find(|log| log.review_duration.is_none()) {
            return Err(OptimizeError::MissingDuration {
                card_id: log.card_id,
            });
        }

        let estimates = estimate_from_logs(logs);

        let mut best_retention = RETENTION_CANDIDATES[0];
        let mut best_cost = f64::INFINITY;

        for &candidate in &RETENTION_CANDIDATES {
            if cancel.is_cancelled() {
                return Err(OptimizeError::Cancelled { best: *weights });
            }
            let cost = simulate_cost(candidate, weights, &estimates);
            tracing::debug!(retention = candidate, cost, "retention candidate simulated");
            if cost < best_cost {
                best_cost = cost;
                best_retention = candidate;
            }
        }

        Ok(best_retention)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::OptimizerConfig;
    use crate::parameters::DEFAULT_PARAMETERS;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn log_with_duration(
        card_id: i64,
        rating: Rating,
        at: DateTime<Utc>,
        duration: i64,
    ) -> ReviewLog {
        ReviewLog {
            card_id,
            rating,
            review_datetime: at,
            review_duration: Some(duration),
        }
    }

    /// 600 logs across 100 cards, all with durations.
    fn sample_logs() -> Vec<ReviewLog> {
        let mut logs = Vec::new();
        for card_id in 1..=100_i64 {
            let mut at = t0();
            let first_rating = match card_id % 4 {
                0 => Rating::Again,
                1 => Rating::Hard,
                2 => Rating::Good,
                _ => Rating::Easy,
            };
            logs.push(log_with_duration(card_id, first_rating, at, 8000));
            for i in 0..5_i64 {
                at += Duration::days(2 + (card_id + i) % 4);
                let rating = match (card_id + i) % 5 {
                    0 => Rating::Again,
                    1 => Rating::Hard,
                    4 => Rating::Easy,
                    _ => Rating::Good,
                };
                logs.push(log_with_duration(card_id, rating, at, 4000 + 500 * (i + 1)));
            }
        }
        logs
    }

    // ==================== Estimates ====================

    #[test]
    fn test_estimates_first_probs_sum_to_one() {
        let estimates = estimate_from_logs(&sample_logs());
        let sum: f64 = estimates.first_probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimates_recall_probs_sum_to_one() {
        let estimates = estimate_from_logs(&sample_logs());
        let sum: f64 = estimates.recall_probs[1..].iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(estimates.recall_probs[0], 0.0);
    }

    #[test]
    fn test_estimates_first_probs_match_construction() {
        // sample_logs assigns first ratings round-robin over four values.
        let estimates = estimate_from_logs(&sample_logs());
        for idx in 0..4 {
            assert!((estimates.first_probs[idx] - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_estimates_uniform_fallback_without_recalls() {
        // Every non-first review is Again.
        let mut logs = Vec::new();
        for card_id in 1..=5_i64 {
            logs.push(log_with_duration(card_id, Rating::Good, t0(), 5000));
            logs.push(log_with_duration(
                card_id,
                Rating::Again,
                t0() + Duration::days(2),
                9000,
            ));
        }
        let estimates = estimate_from_logs(&logs);
        for idx in 1..4 {
            assert!((estimates.recall_probs[idx] - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_estimates_durations() {
        let logs = vec![
            log_with_duration(1, Rating::Good, t0(), 6000),
            log_with_duration(1, Rating::Good, t0() + Duration::days(2), 3000),
            log_with_duration(1, Rating::Good, t0() + Duration::days(5), 5000),
        ];
        let estimates = estimate_from_logs(&logs);
        assert_eq!(estimates.first_durations[idx(Rating::Good)], 6000.0);
        assert_eq!(estimates.durations[idx(Rating::Good)], 4000.0);
        // Never-observed ratings keep zero averages.
        assert_eq!(estimates.durations[idx(Rating::Again)], 0.0);
    }

    // ==================== Simulation ====================

    #[test]
    fn test_simulate_cost_positive_and_finite() {
        let estimates = estimate_from_logs(&sample_logs());
        let cost = simulate_cost(0.9, &DEFAULT_PARAMETERS, &estimates);
        assert!(cost.is_finite());
        assert!(cost > 0.0);
    }

    #[test]
    fn test_simulate_cost_deterministic() {
        let estimates = estimate_from_logs(&sample_logs());
        let a = simulate_cost(0.85, &DEFAULT_PARAMETERS, &estimates);
        let b = simulate_cost(0.85, &DEFAULT_PARAMETERS, &estimates);
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulate_cost_invalid_weights_is_infinite() {
        let estimates = estimate_from_logs(&sample_logs());
        let mut bad = DEFAULT_PARAMETERS;
        bad[0] = 1000.0;
        assert!(simulate_cost(0.9, &bad, &estimates).is_infinite());
    }

    #[test]
    fn test_higher_retention_means_more_reviews() {
        // At higher retention, intervals shrink, so total time grows.
        let estimates = estimate_from_logs(&sample_logs());
        let low = simulate_cost(0.70, &DEFAULT_PARAMETERS, &estimates) * 0.70;
        let high = simulate_cost(0.95, &DEFAULT_PARAMETERS, &estimates) * 0.95;
        assert!(high > low, "high = {high}, low = {low}");
    }

    // ==================== Search ====================

    #[test]
    fn test_optimal_retention_rejects_few_logs() {
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let logs = sample_logs()[..100].to_vec();
        let err = optimizer
            .compute_optimal_retention(&CancelToken::new(), &DEFAULT_PARAMETERS, &logs)
            .unwrap_err();
        assert!(matches!(
            err,
            OptimizeError::InsufficientLogs { found: 100, required: 512 }
        ));
    }

    #[test]
    fn test_optimal_retention_rejects_missing_duration() {
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let mut logs = sample_logs();
        logs[13].review_duration = None;
        let card_id = logs[13].card_id;
        let err = optimizer
            .compute_optimal_retention(&CancelToken::new(), &DEFAULT_PARAMETERS, &logs)
            .unwrap_err();
        assert_eq!(err, OptimizeError::MissingDuration { card_id });
    }

    #[test]
    fn test_optimal_retention_returns_candidate() {
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let retention = optimizer
            .compute_optimal_retention(&CancelToken::new(), &DEFAULT_PARAMETERS, &sample_logs())
            .unwrap();
        assert!(RETENTION_CANDIDATES.contains(&retention));
    }

    #[test]
    fn test_optimal_retention_deterministic() {
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let logs = sample_logs();
        let a = optimizer
            .compute_optimal_retention(&CancelToken::new(), &DEFAULT_PARAMETERS, &logs)
            .unwrap();
        let b = optimizer
            .compute_optimal_retention(&CancelToken::new(), &DEFAULT_PARAMETERS, &logs)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_optimal_retention_cancelled_immediately() {
        let optimizer = Optimizer::new(OptimizerConfig::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = optimizer
            .compute_optimal_retention(&cancel, &DEFAULT_PARAMETERS, &sample_logs())
            .unwrap_err();
        assert!(matches!(err, OptimizeError::Cancelled { .. }));
    }
}
