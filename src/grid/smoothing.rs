//! Gaussian smoothing of a per-pixel array in pixel space.
//!
//! Each source pixel spreads its value over the pixels within
//! [`KERNEL_TRUNCATION_SIGMAS`] of its center, with weights
//! `exp(-d^2 / 2 sigma^2)` normalized per source. Per-source normalization makes
//! the smoothing conserve the array total exactly, whatever the truncation.
//!
//! Cost grows as (number of non-zero pixels) x (pixels per kernel disc), i.e.
//! roughly with `nside^4 * sigma^2` for a dense map. When that exceeds
//! [`MAX_DIRECT_KERNEL_EVALUATIONS`], the array is degraded to the finest
//! coarser grid whose estimated work fits the budget, smoothed there, and
//! interpolated back to the original resolution. The budget always holds:
//! at `nside = 1` the work is at most 144 evaluations.

use std::f64::consts::PI;

use nalgebra::Vector3;
use tracing::debug;

use super::HealpixGrid;

/// Kernel support radius in units of sigma.
pub const KERNEL_TRUNCATION_SIGMAS: f64 = 5.0;

/// Work budget (kernel evaluations) for a single smoothing pass.
pub const MAX_DIRECT_KERNEL_EVALUATIONS: f64 = 2.0e7;

/// Largest grid whose pixel unit vectors are tabulated before a smoothing pass.
const MAX_CACHED_UNIT_VECTORS: usize = 12 * 256 * 256;

impl HealpixGrid {
    /// Smooth `values` with a Gaussian kernel of standard deviation `sigma_rad`.
    ///
    /// The total of the array is conserved. A non-positive `sigma_rad` returns
    /// the input unchanged.
    ///
    /// # Panics
    ///
    /// If `values.len() != self.npix()`.
    pub fn smooth_gaussian(&self, values: &[f64], sigma_rad: f64) -> Vec<f64> {
        assert_eq!(values.len(), self.npix, "array length does not match grid");
        if !(sigma_rad > 0.0) {
            return values.to_vec();
        }
        let radius = (KERNEL_TRUNCATION_SIGMAS * sigma_rad).min(PI);
        let sources = values.iter().filter(|v| **v != 0.0).count();

        let working = self.working_grid(sources, radius);
        if working.nside == self.nside {
            return self.smooth_direct(values, sigma_rad, radius);
        }

        debug!(
            "smoothing sigma={:.3} deg on working grid nside={} (map nside={}, direct work {:.2e})",
            sigma_rad.to_degrees(),
            working.nside,
            self.nside,
            self.kernel_work(sources, radius)
        );

        // Established: working.nside < self.nside, both valid
        let coarse = match self.ud_grade(values, working.nside) {
            Ok(c) => c,
            Err(_) => return self.smooth_direct(values, sigma_rad, radius),
        };
        let smoothed = working.smooth_direct(&coarse, sigma_rad, radius);

        let children = (self.npix / working.npix) as f64;
        let mut fine: Vec<f64> = (0..self.npix)
            .map(|pix| {
                let (theta, phi) = self.pix2ang(pix);
                working.interpolate(&smoothed, theta, phi).max(0.0) / children
            })
            .collect();

        let total_in: f64 = values.iter().sum();
        let total_out: f64 = fine.iter().sum();
        if total_out > 0.0 {
            let scale = total_in / total_out;
            fine.iter_mut().for_each(|v| *v *= scale);
        }
        fine
    }

    /// Estimated kernel evaluations for `sources` non-zero pixels on this grid.
    ///
    /// Degrading never increases the number of non-zero pixels, so
    /// `min(sources, npix)` bounds the count on a coarser grid.
    fn kernel_work(&self, sources: usize, radius: f64) -> f64 {
        let disc_pixels = (self.npix as f64 * 0.5 * (1.0 - radius.cos())).max(1.0);
        sources.min(self.npix) as f64 * disc_pixels
    }

    /// Finest grid, no finer than `self`, whose smoothing work fits the budget.
    pub(crate) fn working_grid(&self, sources: usize, radius: f64) -> HealpixGrid {
        (0..=self.order)
            .rev()
            .filter_map(|order| HealpixGrid::from_order(order).ok())
            .find(|g| g.kernel_work(sources, radius) <= MAX_DIRECT_KERNEL_EVALUATIONS)
            .unwrap_or(*self)
    }

    fn smooth_direct(&self, values: &[f64], sigma_rad: f64, radius: f64) -> Vec<f64> {
        let inv_two_sigma2 = 1.0 / (2.0 * sigma_rad * sigma_rad);
        let sources = values.iter().filter(|v| **v != 0.0).count();
        // Tabulate once each pixel is visited more than once on average
        let table: Option<Vec<Vector3<f64>>> = (self.npix <= MAX_CACHED_UNIT_VECTORS
            && self.kernel_work(sources, radius) > self.npix as f64)
            .then(|| (0..self.npix).map(|pix| self.pix2vec(pix)).collect());
        let unit = |pix: usize| table.as_ref().map_or_else(|| self.pix2vec(pix), |t| t[pix]);
        let mut out = vec![0.0; self.npix];
        let mut disc = Vec::new();
        let mut weights = Vec::new();

        for (src, &v) in values.iter().enumerate() {
            if v == 0.0 {
                continue;
            }
            let center = unit(src);
            self.query_disc_into(&center, radius, &mut disc);

            weights.clear();
            let mut norm = 0.0;
            for &pix in &disc {
                let d = center.dot(&unit(pix)).clamp(-1.0, 1.0).acos();
                let w = (-d * d * inv_two_sigma2).exp();
                weights.push(w);
                norm += w;
            }

            if norm <= 0.0 {
                out[src] += v;
                continue;
            }
            for (&pix, &w) in disc.iter().zip(&weights) {
                out[pix] += v * w / norm;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::SkyPosition;

    #[test]
    fn conserves_total_and_spreads() {
        let grid = HealpixGrid::new(32).unwrap();
        let mut values = vec![0.0; grid.npix()];
        let peak = grid.position_to_pixel(&SkyPosition::new(40.0, 10.0));
        values[peak] = 1.0;

        let smoothed = grid.smooth_gaussian(&values, 5f64.to_radians());
        let total: f64 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);

        // Peak stays the maximum; mass moved off the source pixel
        let (argmax, max) = smoothed
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(argmax, peak);
        assert!(max < 0.1);

        // Nothing beyond the truncation radius
        let far = grid.position_to_pixel(&SkyPosition::new(220.0, -10.0));
        assert_eq!(smoothed[far], 0.0);
    }

    #[test]
    fn width_matches_sigma() {
        // For a 2-D Gaussian, ~39.3% of the mass lies within 1 sigma
        let grid = HealpixGrid::new(64).unwrap();
        let center = SkyPosition::new(100.0, 0.0);
        let mut values = vec![0.0; grid.npix()];
        let peak = grid.position_to_pixel(&center);
        values[peak] = 1.0;
        let sigma = 6f64.to_radians();
        let smoothed = grid.smooth_gaussian(&values, sigma);

        let peak_center = grid.pixel_position(peak);
        let inside: f64 = grid
            .query_disc(&peak_center, sigma)
            .iter()
            .map(|&p| smoothed[p])
            .sum();
        assert!((inside - 0.393).abs() < 0.03, "mass within 1 sigma: {inside}");
    }

    #[test]
    fn zero_sigma_is_identity() {
        let grid = HealpixGrid::new(2).unwrap();
        let values: Vec<f64> = (0..grid.npix()).map(|i| i as f64).collect();
        assert_eq!(grid.smooth_gaussian(&values, 0.0), values);
    }

    #[test]
    fn dense_map_uses_working_grid() {
        // A uniform map at nside 128 is far over the direct budget for a wide
        // kernel. The coarse path must still conserve mass and stay uniform.
        let grid = HealpixGrid::new(128).unwrap();
        let n = grid.npix() as f64;
        let values = vec![1.0 / n; grid.npix()];
        let smoothed = grid.smooth_gaussian(&values, 10f64.to_radians());
        let total: f64 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        for pix in (0..grid.npix()).step_by(997) {
            assert!((smoothed[pix] * n - 1.0).abs() < 0.05, "pix {pix}");
        }
    }

    #[test]
    fn working_grid_respects_budget() {
        let grid = HealpixGrid::new(128).unwrap();
        let radius = KERNEL_TRUNCATION_SIGMAS * 2.7f64.to_radians();

        // Dense: nside 64 would still need ~3.3e7 evaluations
        let working = grid.working_grid(grid.npix(), radius);
        assert_eq!(working.nside(), 32);
        assert!(working.kernel_work(grid.npix(), radius) <= MAX_DIRECT_KERNEL_EVALUATIONS);

        // Sparse maps stay on their own grid
        assert_eq!(grid.working_grid(100, radius).nside(), 128);

        // Even the whole sky at the finest order fits at some resolution
        let fine = HealpixGrid::new(1 << 14).unwrap();
        let working = fine.working_grid(fine.npix(), PI);
        assert!(working.kernel_work(fine.npix(), PI) <= MAX_DIRECT_KERNEL_EVALUATIONS);
    }

    #[test]
    fn dense_map_with_narrow_kernel_conserves_and_broadens() {
        let grid = HealpixGrid::new(128).unwrap();
        let center = SkyPosition::new(200.0, -30.0);
        let values: Vec<f64> = (0..grid.npix())
            .map(|pix| {
                let d = grid.pixel_position(pix).separation_deg(&center) / 20.0;
                (-0.5 * d * d).exp() + 1e-6
            })
            .collect();
        let total_in: f64 = values.iter().sum();
        assert!(grid.kernel_work(grid.npix(), 13.5f64.to_radians()) > MAX_DIRECT_KERNEL_EVALUATIONS);

        let smoothed = grid.smooth_gaussian(&values, 2.7f64.to_radians());
        let total_out: f64 = smoothed.iter().sum();
        assert!((total_out / total_in - 1.0).abs() < 1e-12);
        assert!(smoothed.iter().all(|v| *v >= 0.0));

        // A 20 deg bump barely changes under a 2.7 deg kernel
        let peak = grid.position_to_pixel(&center);
        assert!(smoothed[peak] < values[peak]);
        assert!((smoothed[peak] / values[peak] - 1.0).abs() < 0.05);
    }
}
