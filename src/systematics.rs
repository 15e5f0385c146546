//! Systematic-error kernels applied to localization maps by convolution.
//!
//! A kernel is a mixture of zero-mean Gaussians on the sphere, described by
//! its widths and mixture weights. Calibrated presets for the localization
//! pipelines in use are available through [`SystematicModel`].
//!
//! # Presets
//!
//! | Model | Widths | Weight of first |
//! |-------|--------|-----------------|
//! | [`SystematicModel::GbutsO3`] | 2.7° | 1 |
//! | [`SystematicModel::HumanInTheLoop`] | 4.17°, 15.3° or 2.31°, 13.2° | 0.918 or 0.884 |
//! | [`SystematicModel::GroundAutomated`] | 3.72°, 13.7° | 0.804 |
//! | [`SystematicModel::RoboBa`] | 1.86°, 4.14° (long) or 2.55°, 4.43° (short) | 0.579 or 0.39 |
//! | [`SystematicModel::UntargetedSearch`] | 5.53° | 1 |

use std::fmt;
use std::str::FromStr;

use crate::error::{LocalizationError, Result};

/// Allowed deviation of the mixture weight sum from one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ── Gaussian mixture ────────────────────────────────────────────────────────

/// Mixture of Gaussian kernels: widths in radians and weights summing to one.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    sigmas_rad: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussianMixture {
    /// Build a mixture from widths (radians) and weights.
    ///
    /// `weights` may have one element fewer than `sigmas_rad`, in which case the
    /// last weight is the remainder `1 - sum(weights)`.
    pub fn new(sigmas_rad: Vec<f64>, mut weights: Vec<f64>) -> Result<Self> {
        let n = sigmas_rad.len();
        if n == 0 {
            return Err(LocalizationError::MixtureWeightCount {
                widths: 0,
                weights: weights.len(),
            });
        }
        if weights.len() + 1 == n {
            let rest = 1.0 - weights.iter().sum::<f64>();
            weights.push(rest);
        } else if weights.len() != n {
            return Err(LocalizationError::MixtureWeightCount {
                widths: n,
                weights: weights.len(),
            });
        }

        if let Some(&s) = sigmas_rad.iter().find(|s| !(**s >= 0.0) || !s.is_finite()) {
            return Err(LocalizationError::invalid(
                "kernel width",
                s,
                "must be finite and non-negative",
            ));
        }
        if let Some(&w) = weights.iter().find(|w| !(**w >= 0.0)) {
            return Err(LocalizationError::invalid(
                "mixture weight",
                w,
                "must be non-negative",
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(LocalizationError::MixtureWeightSum { sum });
        }

        Ok(Self {
            sigmas_rad,
            weights,
        })
    }

    /// Single Gaussian of width `sigma_deg` degrees.
    pub fn single_deg(sigma_deg: f64) -> Result<Self> {
        Self::new(vec![sigma_deg.to_radians()], vec![1.0])
    }

    /// Two-component mixture; widths in degrees, `frac1` is the weight of the first.
    pub fn pair_deg(sigma1_deg: f64, sigma2_deg: f64, frac1: f64) -> Result<Self> {
        Self::new(
            vec![sigma1_deg.to_radians(), sigma2_deg.to_radians()],
            vec![frac1],
        )
    }

    pub fn sigmas_rad(&self) -> &[f64] {
        &self.sigmas_rad
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `(sigma_rad, weight)` pairs.
    pub fn components(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.sigmas_rad
            .iter()
            .copied()
            .zip(self.weights.iter().copied())
    }
}

// ── GRB duration class ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrbClass {
    Long,
    Short,
}

impl FromStr for GrbClass {
    type Err = LocalizationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "long" => Ok(GrbClass::Long),
            "short" => Ok(GrbClass::Short),
            other => Err(LocalizationError::UnknownGrbClass(other.to_string())),
        }
    }
}

impl fmt::Display for GrbClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrbClass::Long => f.write_str("long"),
            GrbClass::Short => f.write_str("short"),
        }
    }
}

// ── Presets ─────────────────────────────────────────────────────────────────

/// Calibrated systematic-error models, keyed by localization method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SystematicModel {
    /// Targeted search during O3: a 2.7° Gaussian (arXiv:1903.12597).
    GbutsO3,
    /// Human-in-the-loop localization (arXiv:1411.2685). The mixture depends
    /// on the spacecraft azimuth of the localization centroid.
    HumanInTheLoop { azimuth_deg: f64 },
    /// Ground-automated localization (arXiv:1411.2685).
    GroundAutomated,
    /// RoboBA localization (arXiv:1909.03006).
    RoboBa(GrbClass),
    /// Untargeted search: a 5.53° Gaussian.
    UntargetedSearch,
}

impl SystematicModel {
    /// The kernel of this model.
    pub fn mixture(&self) -> GaussianMixture {
        match *self {
            SystematicModel::GbutsO3 => preset(&[2.7], &[1.0]),
            SystematicModel::HumanInTheLoop { azimuth_deg: az } => {
                if az > 292.5 || az <= 67.5 || (az > 112.5 && az < 247.5) {
                    preset(&[4.17, 15.3], &[0.918, 1.0 - 0.918])
                } else {
                    preset(&[2.31, 13.2], &[0.884, 1.0 - 0.884])
                }
            }
            SystematicModel::GroundAutomated => preset(&[3.72, 13.7], &[0.804, 1.0 - 0.804]),
            SystematicModel::RoboBa(GrbClass::Long) => preset(&[1.86, 4.14], &[0.579, 1.0 - 0.579]),
            SystematicModel::RoboBa(GrbClass::Short) => preset(&[2.55, 4.43], &[0.39, 1.0 - 0.39]),
            SystematicModel::UntargetedSearch => preset(&[5.53], &[1.0]),
        }
    }
}

fn preset(sigmas_deg: &[f64], weights: &[f64]) -> GaussianMixture {
    GaussianMixture {
        sigmas_rad: sigmas_deg.iter().map(|s| s.to_radians()).collect(),
        weights: weights.to_vec(),
    }
}

impl From<SystematicModel> for GaussianMixture {
    fn from(model: SystematicModel) -> Self {
        model.mixture()
    }
}
