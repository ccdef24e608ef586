//! Model Parameters
//!
//! The FSRS v6 model is a fixed vector of 21 trainable weights. This module
//! holds the published default vector, the per-index validity bounds, and
//! the validation/clamping helpers shared by the scheduler and the optimizer.

use crate::error::FsrsError;

/// Number of trainable weights in the FSRS v6 model.
pub const PARAMETER_COUNT: usize = 21;

/// A full FSRS v6 weight vector.
pub type Weights = [f64; PARAMETER_COUNT];

/// Published FSRS v6 default weights (py-fsrs / fsrs4anki wiki).
pub const DEFAULT_PARAMETERS: Weights = [
    0.212, 1.2931, 2.3065, 8.2956, // w[0..4)  initial stability S0(G)
    6.4133, 0.8334, 3.0194, 0.001, // w[4..8)  difficulty
    1.8722, 0.1666, 0.796, 1.4835, // w[8..12) recall stability
    0.0614, 0.2629, 1.6483, 0.6014, // w[12..16) forget stability, hard penalty
    1.8729, 0.5425, 0.0912, 0.0658, // w[16..20) easy bonus, short-term
    0.1542, // w[20] decay exponent
];

/// Minimum allowed value for each weight (inclusive).
pub const LOWER_BOUNDS: Weights = [
    0.001, 0.001, 0.001, 0.001, //
    1.0, 0.001, 0.001, 0.001, //
    0.0, 0.0, 0.001, 0.001, //
    0.001, 0.001, 0.0, 0.0, //
    1.0, 0.0, 0.0, 0.0, //
    0.1,
];

/// Maximum allowed value for each weight (inclusive).
pub const UPPER_BOUNDS: Weights = [
    100.0, 100.0, 100.0, 100.0, //
    10.0, 4.0, 4.0, 0.75, //
    4.5, 0.8, 3.5, 5.0, //
    0.25, 0.9, 4.0, 1.0, //
    6.0, 2.0, 2.0, 0.8, //
    0.8,
];

/// Checks that every weight lies within its inclusive bounds.
///
/// Returns the first out-of-range index as
/// [`FsrsError::InvalidParameters`].
pub fn validate_parameters(weights: &Weights) -> Result<(), FsrsError> {
    for i in 0..PARAMETER_COUNT {
        if weights[i] < LOWER_BOUNDS[i] || weights[i] > UPPER_BOUNDS[i] {
            return Err(FsrsError::InvalidParameters {
                index: i,
                value: weights[i],
                lower: LOWER_BOUNDS[i],
                upper: UPPER_BOUNDS[i],
            });
        }
    }
    Ok(())
}

/// Clamps every weight to its inclusive bounds.
///
/// Used by the optimizer after each gradient step; a silent correction,
/// not an error.
pub fn clamp_parameters(mut weights: Weights) -> Weights {
    for i in 0..PARAMETER_COUNT {
        weights[i] = weights[i].clamp(LOWER_BOUNDS[i], UPPER_BOUNDS[i]);
    }
    weights
}
