//! Point, area, and grid queries on a localization map.

use std::f64::consts::{PI, TAU};

use nalgebra::DMatrix;

use super::LocalizationMap;
use crate::coords::SkyPosition;
use crate::error::{check_unit_range, Result};

/// Quantity sampled by [`LocalizationMap::grid_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleKind {
    /// Probability per pixel.
    Probability,
    /// Probability per square degree.
    #[default]
    Density,
    /// Significance (`1 - credible level`).
    Significance,
}

/// A map sampled on a regular RA/Dec grid.
///
/// `values[(i, j)]` is the sample at `dec_deg[i]`, `ra_deg[j]`. Rows run from
/// the south pole to the north pole; columns from RA 0° to 360° inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyGrid {
    pub values: DMatrix<f64>,
    pub ra_deg: Vec<f64>,
    pub dec_deg: Vec<f64>,
}

impl LocalizationMap {
    /// Probability at `pos`, interpolated between neighbouring pixel centers.
    ///
    /// With `per_pixel` the result is a per-pixel mass; otherwise it is a
    /// density in probability per square degree.
    pub fn probability_at(&self, pos: &SkyPosition, per_pixel: bool) -> f64 {
        let p = self
            .grid()
            .interpolate(&self.probability, pos.theta(), pos.phi());
        if per_pixel {
            p
        } else {
            p / self.pixel_area()
        }
    }

    /// Significance at `pos`, interpolated.
    ///
    /// Close to 1 at the peak of the localization and close to 0 far away
    /// from it.
    pub fn confidence_at(&self, pos: &SkyPosition) -> f64 {
        self.grid()
            .interpolate(&self.significance, pos.theta(), pos.phi())
    }

    /// Area (square degrees) of the smallest region holding `level` of the probability.
    ///
    /// Counts the pixels whose credible level `1 - significance` is at most `level`.
    pub fn area_within(&self, level: f64) -> Result<f64> {
        let level = check_unit_range("confidence level", level)?;
        let count = self
            .significance
            .iter()
            .filter(|&&s| 1.0 - s <= level)
            .count();
        Ok(count as f64 * self.pixel_area())
    }

    /// Position of the highest-probability pixel center.
    ///
    /// Ties resolve to the lowest pixel index.
    pub fn centroid(&self) -> SkyPosition {
        let mut best = 0;
        for (i, &p) in self.probability.iter().enumerate() {
            if p > self.probability[best] {
                best = i;
            }
        }
        self.grid().pixel_position(best)
    }

    /// Sample the map on an `n_dec x n_ra` RA/Dec grid (nearest pixel).
    pub fn grid_sample(&self, n_ra: usize, n_dec: usize, kind: SampleKind) -> SkyGrid {
        let grid = self.grid();
        let phi = linspace(0.0, TAU, n_ra);
        let theta = linspace(PI, 0.0, n_dec);

        let source: &[f64] = match kind {
            SampleKind::Significance => &self.significance,
            SampleKind::Probability | SampleKind::Density => &self.probability,
        };
        let scale = match kind {
            SampleKind::Density => 1.0 / self.pixel_area(),
            _ => 1.0,
        };

        let values = DMatrix::from_fn(n_dec, n_ra, |i, j| {
            source[grid.ang2pix(theta[i], phi[j])] * scale
        });
        SkyGrid {
            values,
            ra_deg: phi.iter().map(|p| p.to_degrees()).collect(),
            dec_deg: theta.iter().map(|t| 90.0 - t.to_degrees()).collect(),
        }
    }
}

/// `n` evenly spaced values from `start` to `stop` inclusive.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocalizationError;
    use crate::grid::HealpixGrid;

    fn spike_map(nside: u32, pos: &SkyPosition) -> LocalizationMap {
        let grid = HealpixGrid::new(nside).unwrap();
        let mut p = vec![1e-6; grid.npix()];
        p[grid.position_to_pixel(pos)] = 1.0;
        LocalizationMap::from_probability(p).unwrap()
    }

    #[test]
    fn uniform_map_density() {
        let map = LocalizationMap::from_probability(vec![1.0; 3072]).unwrap();
        let pos = SkyPosition::new(33.0, -12.0);
        let per_pixel = map.probability_at(&pos, true);
        assert!((per_pixel - 1.0 / 3072.0).abs() < 1e-15);
        let density = map.probability_at(&pos, false);
        assert!((density - 1.0 / 41252.96125).abs() < 1e-12);
    }

    #[test]
    fn area_within_bounds() {
        let map = spike_map(16, &SkyPosition::new(200.0, 40.0));
        let full = map.area_within(1.0).unwrap();
        assert!((full - 41252.96125).abs() < 1e-3);
        // The spike alone holds ~99.7%; no smaller region exists
        assert_eq!(map.area_within(0.5).unwrap(), 0.0);
        let peak = map.grid().position_to_pixel(&SkyPosition::new(200.0, 40.0));
        let one_pixel = map.area_within(map.probability()[peak] + 1e-9).unwrap();
        assert!((one_pixel - map.pixel_area()).abs() < 1e-12);
        assert_eq!(
            map.area_within(1.2),
            Err(LocalizationError::OutOfUnitRange {
                name: "confidence level",
                value: 1.2
            })
        );
    }

    fn bump_map(nside: u32, pos: &SkyPosition, sigma_deg: f64) -> LocalizationMap {
        let grid = HealpixGrid::new(nside).unwrap();
        let p = (0..grid.npix())
            .map(|i| {
                let d = grid.pixel_position(i).separation_deg(pos) / sigma_deg;
                (-0.5 * d * d).exp()
            })
            .collect();
        LocalizationMap::from_probability(p).unwrap()
    }

    #[test]
    fn centroid_is_peak_pixel() {
        let pos = SkyPosition::new(77.0, -30.0);
        let map = spike_map(32, &pos);
        assert!(map.centroid().separation_deg(&pos) < map.grid().resolution_deg());
    }

    #[test]
    fn confidence_peaks_at_center() {
        let pos = SkyPosition::new(10.0, 10.0);
        let map = bump_map(16, &pos, 10.0);
        let peak = map.grid().pixel_position(map.grid().position_to_pixel(&pos));
        assert!(map.confidence_at(&peak) > 0.9);
        assert!(map.confidence_at(&pos.antipode()) < 0.1);
    }

    #[test]
    fn grid_sample_axes_and_values() {
        let map = LocalizationMap::from_probability(vec![1.0; 768]).unwrap();
        let sky = map.grid_sample(37, 19, SampleKind::Density);
        assert_eq!(sky.values.shape(), (19, 37));
        assert_eq!(sky.ra_deg.first().copied(), Some(0.0));
        assert!((sky.ra_deg[36] - 360.0).abs() < 1e-9);
        assert!((sky.dec_deg[0] + 90.0).abs() < 1e-9);
        assert!((sky.dec_deg[18] - 90.0).abs() < 1e-9);
        let expected = 1.0 / 768.0 / map.pixel_area();
        assert!(sky.values.iter().all(|v| (v - expected).abs() < 1e-15));

        let sig = map.grid_sample(4, 3, SampleKind::Significance);
        assert!(sig.values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
