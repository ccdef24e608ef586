//! Interval Fuzzing
//!
//! Spreads review clusters apart by widening each scheduled interval with a
//! bounded pseudo-random delta. The delta grows piecewise-linearly with the
//! interval:
//!
//! | band (days)  | factor |
//! |--------------|--------|
//! | [2.5, 7)     | 0.15   |
//! | [7, 20)      | 0.10   |
//! | [20, inf)    | 0.05   |
//!
//! delta(ivl) = 1 + sum(factor * max(0, min(ivl, end) - start))
//!
//! Intervals below 2.5 days pass through unchanged. The RNG is owned by the
//! scheduler so seeded runs are reproducible.

use rand::Rng;

struct FuzzBand {
    start: f64,
    end: f64,
    factor: f64,
}

const FUZZ_BANDS: [FuzzBand; 3] = [
    FuzzBand {
        start: 2.5,
        end: 7.0,
        factor: 0.15,
    },
    FuzzBand {
        start: 7.0,
        end: 20.0,
        factor: 0.10,
    },
    FuzzBand {
        start: 20.0,
        end: f64::INFINITY,
        factor: 0.05,
    },
];

/// Half-width of the fuzz window for an interval, in days.
pub(crate) fn fuzz_delta(interval: f64) -> f64 {
    let mut delta = 1.0;
    for band in &FUZZ_BANDS {
        delta += band.factor * (interval.min(band.end) - band.start).max(0.0);
    }
    delta
}

/// Draws a fuzzed interval from `[min, max]` around `interval`.
///
/// The sample `round(u * (max - min + 1)) + min` can land on `max + 1`,
/// so the result is clamped to `max_interval` a final time.
pub(crate) fn apply_fuzz(interval: i64, max_interval: i64, rng: &mut impl Rng) -> i64 {
    if (interval as f64) < 2.5 {
        return interval;
    }

    let ivl = interval as f64;
    let delta = fuzz_delta(ivl);

    let min_ivl = ((ivl - delta).round() as i64).max(2);
    let max_ivl = ((ivl + delta).round() as i64).min(max_interval);
    let min_ivl = min_ivl.min(max_ivl);

    let u: f64 = rng.gen();
    let fuzzed = (u * (max_ivl - min_ivl + 1) as f64).round() as i64 + min_ivl;
    fuzzed.clamp(1, max_interval)
}
