//! Error type shared by every map operation.
//!
//! Failures fall into three groups:
//!
//! - **validation**: an argument is outside its allowed domain (a prior or
//!   confidence level outside `[0, 1]`, a mixture with the wrong number of
//!   weights, a fixed-size vector of the wrong length). The offending value
//!   is carried in the error.
//! - **precondition**: the operation needs metadata the map does not carry,
//!   e.g. removing the occluded region of a map with no exclusion region.
//! - **numeric degeneracy**: a probability field that sums to zero, or a
//!   pixel count that is not `12 * nside^2` for a power-of-two `nside`.
//!
//! None of these are retried. An error never leaves a previously returned
//! map in a modified state since every transform builds a new map.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocalizationError {
    /// A probability-like argument (prior, confidence level) outside `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    /// Mixture widths and weights cannot be matched up.
    #[error("mixture has {widths} widths but {weights} weights (expected {widths} or {})", .widths.saturating_sub(1))]
    MixtureWeightCount { widths: usize, weights: usize },

    /// Mixture weights do not sum to one.
    #[error("mixture weights must sum to 1, got {sum}")]
    MixtureWeightSum { sum: f64 },

    /// A fixed-size vector (quaternion, spacecraft position) of the wrong length.
    #[error("{name} must have {expected} elements, got {actual}")]
    VectorLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two arrays that must be parallel have different lengths.
    #[error("{name} has {actual} elements, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A scalar parameter outside its domain.
    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("a polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },

    #[error("GRB class must be either 'long' or 'short', got '{0}'")]
    UnknownGrbClass(String),

    #[error("unknown detector '{0}'")]
    UnknownDetector(String),

    #[error("chi-squared grid contains no samples")]
    EmptyGrid,

    /// An exclusion region is required but none is attached or supplied.
    #[error("location of the exclusion region (geocenter) is not known")]
    MissingExclusion,

    /// Renormalization of a field with no positive, finite mass.
    #[error("probability map has no positive mass to normalize")]
    ZeroProbability,

    #[error("{npix} is not a valid HEALPix pixel count")]
    InvalidPixelCount { npix: usize },

    #[error("nside {nside} is not a power of two in [1, 2^14]")]
    InvalidNside { nside: u32 },
}

/// Convenience alias for `Result<T, LocalizationError>`.
pub type Result<T> = std::result::Result<T, LocalizationError>;

impl LocalizationError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// Check that `value` lies in `[0, 1]`.
pub(crate) fn check_unit_range(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(LocalizationError::OutOfUnitRange { name, value })
    }
}

/// Copy `values` into a fixed-size array, failing on any other length.
pub(crate) fn fixed_length<const N: usize>(
    name: &'static str,
    values: &[f64],
) -> Result<[f64; N]> {
    values.try_into().map_err(|_| LocalizationError::VectorLength {
        name,
        expected: N,
        actual: values.len(),
    })
}
