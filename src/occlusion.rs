//! Earth occultation: which part of a localization the instrument could not see.
//!
//! Only pixels with non-zero probability are classified. A pixel is occluded
//! when the great-circle distance from its center to the exclusion center is
//! at most the exclusion radius, and visible otherwise. Zero-probability
//! pixels belong to neither set.

use tracing::debug;

use crate::error::{LocalizationError, Result};
use crate::map::LocalizationMap;
use crate::platform::ExclusionRegion;

/// Partition of a map's non-zero pixels into occluded and visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcclusionMask {
    occluded: Vec<bool>,
    visible: Vec<bool>,
}

impl OcclusionMask {
    /// Classify the non-zero pixels of `map` against `region`.
    pub fn compute(map: &LocalizationMap, region: &ExclusionRegion) -> Self {
        let grid = map.grid();
        let mut occluded = vec![false; map.npix()];
        let mut visible = vec![false; map.npix()];
        for (pix, &p) in map.probability().iter().enumerate() {
            if p <= 0.0 {
                continue;
            }
            if region.contains(&grid.pixel_position(pix)) {
                occluded[pix] = true;
            } else {
                visible[pix] = true;
            }
        }
        Self { occluded, visible }
    }

    /// `true` for non-zero pixels inside the exclusion region.
    pub fn occluded(&self) -> &[bool] {
        &self.occluded
    }

    /// `true` for non-zero pixels outside the exclusion region.
    pub fn visible(&self) -> &[bool] {
        &self.visible
    }

    /// Total of `values` over the occluded pixels.
    pub fn occluded_sum(&self, values: &[f64]) -> f64 {
        masked_sum(&self.occluded, values)
    }

    /// Total of `values` over the visible pixels.
    pub fn visible_sum(&self, values: &[f64]) -> f64 {
        masked_sum(&self.visible, values)
    }
}

fn masked_sum(mask: &[bool], values: &[f64]) -> f64 {
    mask.iter()
        .zip(values)
        .filter(|(m, _)| **m)
        .map(|(_, v)| v)
        .sum()
}

impl LocalizationMap {
    /// The exclusion region to use: `region` if given, else the attached one.
    pub(crate) fn resolve_exclusion(&self, region: Option<&ExclusionRegion>) -> Result<ExclusionRegion> {
        region
            .or_else(|| self.exclusion())
            .copied()
            .ok_or(LocalizationError::MissingExclusion)
    }

    /// Occlusion mask of this map against `region`, or the attached exclusion region.
    pub fn occlusion_mask(&self, region: Option<&ExclusionRegion>) -> Result<OcclusionMask> {
        let region = self.resolve_exclusion(region)?;
        Ok(OcclusionMask::compute(self, &region))
    }

    /// A copy of this map with the occluded probability removed.
    ///
    /// Occluded pixels are zeroed and the remainder renormalized. Uses `region`
    /// when given, otherwise the attached exclusion region; fails with
    /// [`MissingExclusion`](LocalizationError::MissingExclusion) when neither
    /// exists and with [`ZeroProbability`](LocalizationError::ZeroProbability)
    /// when everything is occluded.
    pub fn remove_exclusion(&self, region: Option<&ExclusionRegion>) -> Result<LocalizationMap> {
        let mask = self.occlusion_mask(region)?;
        let removed = mask.occluded_sum(self.probability());
        debug!("removing {:.4} of the probability behind the exclusion region", removed);

        let probability = self
            .probability()
            .iter()
            .zip(mask.occluded())
            .map(|(&p, &occ)| if occ { 0.0 } else { p })
            .collect();
        self.derive(self.grid(), probability)
    }

    /// Probability mass inside the attached exclusion region, if one is known.
    pub fn occluded_probability(&self) -> Option<f64> {
        let region = self.exclusion()?;
        Some(OcclusionMask::compute(self, region).occluded_sum(self.probability()))
    }

    /// Fraction of `other`'s probability outside this map's exclusion region.
    pub fn observable_fraction(&self, other: &LocalizationMap) -> Result<f64> {
        let region = self.resolve_exclusion(None)?;
        let grid = other.grid();
        let visible: f64 = other
            .probability()
            .iter()
            .enumerate()
            .filter(|&(pix, &p)| {
                p > 0.0 && region.center.separation_deg(&grid.pixel_position(pix)) > region.radius_deg
            })
            .map(|(_, &p)| p)
            .sum();
        let total: f64 = other.probability().iter().sum();
        Ok(visible / total)
    }
}
