//! The localization map: a normalized probability field on a HEALPix grid.
//!
//! A [`LocalizationMap`] owns two per-pixel arrays in RING order:
//!
//! - **probability**: per-pixel probability mass, non-negative, summing to 1.
//! - **significance**: `1 - credible level` of each pixel, in `[0, 1]`.
//!
//! Both arrays always have `12 * nside^2` elements. Every constructor and
//! transform builds a new map and re-establishes both invariants before
//! returning; there is no way to mutate the arrays of an existing map.
//!
//! Observation metadata (trigger time and an optional [`PlatformContext`])
//! rides along unchanged through the transforms.

mod algebra;
mod io;
mod query;

pub(crate) use algebra::common_resolution;
pub use algebra::{MultiplyConfig, Primary};
pub use query::{SampleKind, SkyGrid};

use rkyv::{Archive, Deserialize, Serialize};

use crate::credible;
use crate::error::{LocalizationError, Result};
use crate::grid::HealpixGrid;
use crate::platform::{ExclusionRegion, PlatformContext};

/// A probability distribution of a source position over the sky.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct LocalizationMap {
    nside: u32,
    probability: Vec<f64>,
    significance: Vec<f64>,
    /// Time the localization refers to (0 when unknown).
    trigtime: f64,
    platform: Option<PlatformContext>,
}

impl LocalizationMap {
    // ── Construction ────────────────────────────────────────────────────────

    /// Build a map from a per-pixel probability array.
    ///
    /// Negative entries are clipped to zero and the array is renormalized; the
    /// significance is derived from the result. The length must be a valid
    /// HEALPix pixel count.
    pub fn from_probability(probability: Vec<f64>) -> Result<Self> {
        let grid = HealpixGrid::from_npix(probability.len())?;
        Self::from_grid_probability(grid, probability)
    }

    /// Build a map from probability and an externally computed significance.
    ///
    /// Probability is clipped and renormalized as in
    /// [`from_probability`](Self::from_probability); significance is clamped
    /// to `[0, 1]` but otherwise taken as given.
    pub fn from_parts(probability: Vec<f64>, significance: Vec<f64>) -> Result<Self> {
        let grid = HealpixGrid::from_npix(probability.len())?;
        if significance.len() != probability.len() {
            return Err(LocalizationError::LengthMismatch {
                name: "significance",
                expected: probability.len(),
                actual: significance.len(),
            });
        }
        let probability = normalized(probability)?;
        let significance = significance
            .into_iter()
            .map(|s| if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) })
            .collect();
        Ok(Self {
            nside: grid.nside(),
            probability,
            significance,
            trigtime: 0.0,
            platform: None,
        })
    }

    /// Normalize `probability` on `grid` and derive its significance.
    pub(crate) fn from_grid_probability(grid: HealpixGrid, probability: Vec<f64>) -> Result<Self> {
        debug_assert_eq!(probability.len(), grid.npix());
        let probability = normalized(probability)?;
        let significance = credible::significance(&probability);
        Ok(Self {
            nside: grid.nside(),
            probability,
            significance,
            trigtime: 0.0,
            platform: None,
        })
    }

    /// A new map over `probability` carrying this map's metadata.
    pub(crate) fn derive(&self, grid: HealpixGrid, probability: Vec<f64>) -> Result<Self> {
        Ok(Self::from_grid_probability(grid, probability)?.with_metadata_of(self))
    }

    pub fn with_trigtime(mut self, trigtime: f64) -> Self {
        self.trigtime = trigtime;
        self
    }

    pub fn with_platform(mut self, platform: PlatformContext) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Copy trigger time and platform context from `other`.
    pub(crate) fn with_metadata_of(mut self, other: &LocalizationMap) -> Self {
        self.trigtime = other.trigtime;
        self.platform = other.platform.clone();
        self
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn npix(&self) -> usize {
        self.probability.len()
    }

    /// Grid geometry of this map.
    pub fn grid(&self) -> HealpixGrid {
        match HealpixGrid::new(self.nside) {
            Ok(grid) => grid,
            // nside is validated by every constructor and by snapshot loading
            Err(_) => unreachable!("map holds an invalid nside {}", self.nside),
        }
    }

    /// Area of one pixel in square degrees.
    pub fn pixel_area(&self) -> f64 {
        4.0 * 180.0 * 180.0 / (std::f64::consts::PI * self.npix() as f64)
    }

    pub fn probability(&self) -> &[f64] {
        &self.probability
    }

    pub fn significance(&self) -> &[f64] {
        &self.significance
    }

    pub fn trigtime(&self) -> f64 {
        self.trigtime
    }

    pub fn platform(&self) -> Option<&PlatformContext> {
        self.platform.as_ref()
    }

    /// The exclusion region of the attached platform context, if known.
    pub fn exclusion(&self) -> Option<&ExclusionRegion> {
        self.platform.as_ref().and_then(|p| p.exclusion.as_ref())
    }
}

/// Clip negatives to zero and scale `p` to unit sum.
///
/// Fails when nothing positive and finite remains to normalize.
pub(crate) fn normalized(mut p: Vec<f64>) -> Result<Vec<f64>> {
    for v in p.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
    let total: f64 = p.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(LocalizationError::ZeroProbability);
    }
    p.iter_mut().for_each(|v| *v /= total);
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(nside: u32) -> Vec<f64> {
        let npix = HealpixGrid::new(nside).unwrap().npix();
        (0..npix).map(|i| (i % 7) as f64).collect()
    }

    #[test]
    fn from_probability_normalizes() {
        let map = LocalizationMap::from_probability(ramp(4)).unwrap();
        assert_eq!(map.nside(), 4);
        assert_eq!(map.npix(), 192);
        let total: f64 = map.probability().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(map
            .significance()
            .iter()
            .all(|s| (0.0..=1.0).contains(s)));
        assert_eq!(map.trigtime(), 0.0);
        assert!(map.platform().is_none());
    }

    #[test]
    fn clips_negative_probability() {
        let mut p = vec![1.0; 12];
        p[3] = -5.0;
        let map = LocalizationMap::from_probability(p).unwrap();
        assert_eq!(map.probability()[3], 0.0);
        assert!((map.probability()[0] - 1.0 / 11.0).abs() < 1e-15);
        assert!(map.significance()[3] < 1e-12);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert_eq!(
            LocalizationMap::from_probability(vec![0.0; 48]),
            Err(LocalizationError::ZeroProbability)
        );
        assert_eq!(
            LocalizationMap::from_probability(vec![1.0; 50]),
            Err(LocalizationError::InvalidPixelCount { npix: 50 })
        );
        let mut p = vec![1.0; 12];
        p[0] = f64::INFINITY;
        assert!(LocalizationMap::from_probability(p).is_err());
    }

    #[test]
    fn from_parts_clamps_significance() {
        let sig: Vec<f64> = (0..12).map(|i| i as f64 * 0.2 - 0.5).collect();
        let map = LocalizationMap::from_parts(vec![2.0; 12], sig).unwrap();
        assert_eq!(map.significance()[0], 0.0);
        assert_eq!(map.significance()[11], 1.0);
        assert!((map.significance()[4] - 0.3).abs() < 1e-12);
        assert!(matches!(
            LocalizationMap::from_parts(vec![1.0; 12], vec![0.0; 48]),
            Err(LocalizationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn pixel_area_and_grid_agree() {
        let map = LocalizationMap::from_probability(vec![1.0; 768]).unwrap();
        assert_eq!(map.grid().nside(), 8);
        assert!((map.pixel_area() - map.grid().pixel_area_deg2()).abs() < 1e-12);
    }

    #[test]
    fn metadata_builders() {
        let geo = crate::coords::SkyPosition::new(10.0, -20.0);
        let ctx = PlatformContext::new().with_geocenter(geo, Some(60.0)).unwrap();
        let map = LocalizationMap::from_probability(vec![1.0; 12])
            .unwrap()
            .with_trigtime(5.5e8)
            .with_platform(ctx);
        assert_eq!(map.trigtime(), 5.5e8);
        assert_eq!(map.exclusion().unwrap().radius_deg, 60.0);
    }
}
