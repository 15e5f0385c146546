//! Map algebra: products, systematic-error convolution, and resampling.
//!
//! Every operation returns a new map whose significance is recomputed from
//! its own renormalized probability; nothing is blended from the inputs.

use tracing::debug;

use super::LocalizationMap;
use crate::error::Result;
use crate::grid::HealpixGrid;
use crate::systematics::{GaussianMixture, SystematicModel};

/// Which input of a binary operation the result takes its metadata from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Primary {
    #[default]
    A,
    B,
}

/// Options for [`LocalizationMap::multiply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplyConfig {
    /// Input whose trigger time and platform context the product inherits.
    pub primary: Primary,
    /// Resolution of the product.
    pub output_nside: u32,
}

impl Default for MultiplyConfig {
    fn default() -> Self {
        Self {
            primary: Primary::A,
            output_nside: 128,
        }
    }
}

impl LocalizationMap {
    /// Pointwise product of two maps.
    ///
    /// The lower-resolution input is first upgraded to the resolution of the
    /// other; the product is then resampled to `config.output_nside` and
    /// renormalized. Fails with [`ZeroProbability`](crate::LocalizationError::ZeroProbability)
    /// when the two maps do not overlap.
    pub fn multiply(a: &LocalizationMap, b: &LocalizationMap, config: &MultiplyConfig) -> Result<Self> {
        let out_grid = HealpixGrid::new(config.output_nside)?;
        let (common, pa, pb) = common_resolution(a, b)?;
        let product: Vec<f64> = pa.iter().zip(&pb).map(|(x, y)| x * y).collect();

        debug!(
            "multiply: nside {} x {} at {} -> {}",
            a.nside(),
            b.nside(),
            common.nside(),
            out_grid.nside()
        );
        let product = common.ud_grade(&product, out_grid.nside())?;
        let primary = match config.primary {
            Primary::A => a,
            Primary::B => b,
        };
        primary.derive(out_grid, product)
    }

    /// Convolve the probability with a Gaussian-mixture kernel.
    ///
    /// The result is `sum_i w_i * smooth(p, sigma_i)` at the resolution of
    /// this map.
    pub fn convolve(&self, kernel: &GaussianMixture) -> Result<Self> {
        let grid = self.grid();
        let mut out = vec![0.0; grid.npix()];
        for (sigma, weight) in kernel.components() {
            debug!(
                "convolve: sigma {:.3} deg, weight {:.3}, nside {}",
                sigma.to_degrees(),
                weight,
                grid.nside()
            );
            let smoothed = grid.smooth_gaussian(&self.probability, sigma);
            for (o, s) in out.iter_mut().zip(&smoothed) {
                *o += weight * s;
            }
        }
        self.derive(grid, out)
    }

    /// Convolve with the kernel of a calibrated systematic model.
    pub fn convolve_model(&self, model: SystematicModel) -> Result<Self> {
        self.convolve(&model.mixture())
    }

    /// Resample to `nside`, conserving total probability.
    pub fn resample_to(&self, nside: u32) -> Result<Self> {
        let grid = self.grid();
        let out = HealpixGrid::new(nside)?;
        if out.nside() == grid.nside() {
            return Ok(self.clone());
        }
        let resampled = grid.ud_grade(&self.probability, nside)?;
        self.derive(out, resampled)
    }
}

/// Bring two maps to the finer of their resolutions.
///
/// Returns the common grid and both probability arrays on it.
pub(crate) fn common_resolution(
    a: &LocalizationMap,
    b: &LocalizationMap,
) -> Result<(HealpixGrid, Vec<f64>, Vec<f64>)> {
    let (ga, gb) = (a.grid(), b.grid());
    if ga.nside() > gb.nside() {
        Ok((ga, a.probability.clone(), gb.ud_grade(&b.probability, ga.nside())?))
    } else if ga.nside() < gb.nside() {
        Ok((gb, ga.ud_grade(&a.probability, gb.nside())?, b.probability.clone()))
    } else {
        Ok((ga, a.probability.clone(), b.probability.clone()))
    }
}
