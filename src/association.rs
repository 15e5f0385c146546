//! Bayesian spatial association of a localization with a point or another map.
//!
//! Two hypotheses are compared: the localization belongs to the candidate
//! (`A`), or it comes from an unrelated source equally likely to lie anywhere
//! on the sky (`¬A`). With prior `P(A)`:
//!
//! ```text
//! P(A | I) = P(I | A) P(A) / (P(I | A) P(A) + P(I | ¬A) (1 - P(A)))
//! ```
//!
//! Both evidence terms are per-pixel probabilities at a single resolution: the
//! uniform-sky term is `1 / npix` of the grid on which the association
//! evidence is evaluated.

use crate::coords::SkyPosition;
use crate::error::{check_unit_range, Result};
use crate::map::{common_resolution, LocalizationMap};

/// Posterior probability of association.
///
/// Returns 0 when both evidence terms vanish under the prior.
pub fn posterior(evidence_assoc: f64, evidence_null: f64, prior: f64) -> f64 {
    let assoc = evidence_assoc * prior;
    let denom = assoc + evidence_null * (1.0 - prior);
    if denom > 0.0 {
        assoc / denom
    } else {
        0.0
    }
}

impl LocalizationMap {
    /// Probability that this localization is associated with a source at `pos`.
    ///
    /// The association evidence is the interpolated per-pixel probability at
    /// `pos`. With `exclude_occluded`, the occluded region is removed from the
    /// map first and a point inside the exclusion region has zero evidence;
    /// this requires a known exclusion region.
    pub fn point_association(&self, pos: &SkyPosition, prior: f64, exclude_occluded: bool) -> Result<f64> {
        let prior = check_unit_range("prior", prior)?;
        let uniform = 1.0 / self.npix() as f64;

        let p = if exclude_occluded {
            let region = self.resolve_exclusion(None)?;
            if region.contains(pos) {
                0.0
            } else {
                self.remove_exclusion(Some(&region))?
                    .probability_at(pos, true)
            }
        } else {
            self.probability_at(pos, true)
        };

        Ok(posterior(p, uniform, prior))
    }

    /// Probability that this localization and `other` share a source.
    ///
    /// Both maps are brought to the finer of their resolutions. The association
    /// evidence is the overlap `sum(p_self * p_other)`; the null evidence is the
    /// overlap of this map with a uniform sky. With `exclude_occluded`, the
    /// occluded region of this map (never of `other`) is removed first.
    pub fn region_association(
        &self,
        other: &LocalizationMap,
        prior: f64,
        exclude_occluded: bool,
    ) -> Result<f64> {
        let prior = check_unit_range("prior", prior)?;

        let this = if exclude_occluded {
            self.remove_exclusion(None)?
        } else {
            self.clone()
        };

        let (common, pa, pb) = common_resolution(&this, other)?;
        let uniform = 1.0 / common.npix() as f64;
        let alt: f64 = pa.iter().zip(&pb).map(|(a, b)| a * b).sum();
        let null: f64 = pa.iter().map(|a| a * uniform).sum();
        Ok(posterior(alt, null, prior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocalizationError;
    use crate::grid::HealpixGrid;
    use crate::platform::{ExclusionRegion, PlatformContext};

    fn bump(nside: u32, center: SkyPosition, sigma_deg: f64) -> LocalizationMap {
        let grid = HealpixGrid::new(nside).unwrap();
        let p = (0..grid.npix())
            .map(|i| {
                let d = grid.pixel_position(i).separation_deg(&center) / sigma_deg;
                (-0.5 * d * d).exp()
            })
            .collect();
        LocalizationMap::from_probability(p).unwrap()
    }

    #[test]
    fn posterior_formula() {
        assert_eq!(posterior(2.0, 2.0, 0.5), 0.5);
        assert_eq!(posterior(0.0, 0.0, 0.5), 0.0);
        assert_eq!(posterior(0.0, 1.0, 1.0), 0.0);
        assert_eq!(posterior(1.0, 3.0, 0.5), 0.25);
        assert_eq!(posterior(1.0, 3.0, 0.0), 0.0);
    }

    #[test]
    fn uniform_map_gives_back_the_prior() {
        let map = LocalizationMap::from_probability(vec![1.0; 768]).unwrap();
        let pos = SkyPosition::new(12.0, 34.0);
        let prob = map.point_association(&pos, 0.5, false).unwrap();
        assert!((prob - 0.5).abs() < 1e-12);
        let prob = map.point_association(&pos, 0.2, false).unwrap();
        assert!((prob - 0.2).abs() < 1e-12);
    }

    #[test]
    fn prior_is_validated() {
        let map = LocalizationMap::from_probability(vec![1.0; 12]).unwrap();
        let pos = SkyPosition::new(0.0, 0.0);
        assert_eq!(
            map.point_association(&pos, -0.1, false),
            Err(LocalizationError::OutOfUnitRange {
                name: "prior",
                value: -0.1
            })
        );
        assert!(map.region_association(&map, 1.5, false).is_err());
    }

    #[test]
    fn point_near_peak_is_associated() {
        let center = SkyPosition::new(150.0, 20.0);
        let map = bump(32, center, 5.0);
        assert!(map.point_association(&center, 0.5, false).unwrap() > 0.95);
        let far = SkyPosition::new(330.0, -20.0);
        assert!(map.point_association(&far, 0.5, false).unwrap() < 0.01);
    }

    #[test]
    fn occluded_point_has_no_association() {
        let center = SkyPosition::new(150.0, 20.0);
        let ctx = PlatformContext::new()
            .with_geocenter(SkyPosition::new(150.0, 40.0), Some(10.0))
            .unwrap();
        let map = bump(32, center, 10.0).with_platform(ctx);

        let behind = SkyPosition::new(150.0, 38.0);
        assert_eq!(map.point_association(&behind, 0.5, true).unwrap(), 0.0);
        assert!(map.point_association(&behind, 0.5, false).unwrap() > 0.5);

        // Removing the occluded part boosts the visible peak
        let with = map.point_association(&center, 0.5, true).unwrap();
        let without = map.point_association(&center, 0.5, false).unwrap();
        assert!(with >= without);

        let bare = bump(8, center, 10.0);
        assert_eq!(
            bare.point_association(&center, 0.5, true),
            Err(LocalizationError::MissingExclusion)
        );
    }

    #[test]
    fn point_on_exclusion_boundary_is_occluded() {
        let center = SkyPosition::new(150.0, 20.0);
        let geocenter = SkyPosition::new(150.0, 40.0);
        let edge = SkyPosition::new(153.0, 31.0);
        let region = ExclusionRegion::new(geocenter, geocenter.separation_deg(&edge)).unwrap();
        assert!(region.contains(&edge));

        let ctx = PlatformContext::new().with_exclusion(region);
        let map = bump(32, center, 10.0).with_platform(ctx);
        assert!(map.point_association(&edge, 0.5, false).unwrap() > 0.5);
        assert_eq!(map.point_association(&edge, 0.5, true).unwrap(), 0.0);

        // The mask agrees on the pixel under the boundary point
        let pix = map.grid().position_to_pixel(&edge);
        let mask = map.occlusion_mask(None).unwrap();
        assert_eq!(mask.occluded()[pix], region.contains(&map.grid().pixel_position(pix)));
    }

    #[test]
    fn region_self_association() {
        let map = bump(32, SkyPosition::new(45.0, -45.0), 4.0);
        assert!(map.region_association(&map, 0.5, false).unwrap() > 0.99);
    }

    #[test]
    fn region_association_across_resolutions() {
        let a = bump(16, SkyPosition::new(80.0, 0.0), 6.0);
        let b = bump(64, SkyPosition::new(82.0, 1.0), 3.0);
        let ab = a.region_association(&b, 0.5, false).unwrap();
        let ba = b.region_association(&a, 0.5, false).unwrap();
        assert!(ab > 0.9 && ba > 0.9);

        let far = bump(16, SkyPosition::new(260.0, 0.0), 6.0);
        assert!(a.region_association(&far, 0.5, false).unwrap() < 1e-6);
    }

    #[test]
    fn region_exclusion_applies_to_this_map_only() {
        let ctx = PlatformContext::new()
            .with_geocenter(SkyPosition::new(80.0, 0.0), Some(20.0))
            .unwrap();
        let a = bump(16, SkyPosition::new(80.0, 0.0), 6.0).with_platform(ctx);
        let b = bump(16, SkyPosition::new(80.0, 0.0), 6.0);

        // Only the faint wings of a survive the exclusion
        let with = a.region_association(&b, 0.5, true).unwrap();
        let without = a.region_association(&b, 0.5, false).unwrap();
        assert!(without > 0.9);
        assert!(with < 0.6);

        // b carries no exclusion region of its own
        assert_eq!(
            b.region_association(&a, 0.5, true),
            Err(LocalizationError::MissingExclusion)
        );
        assert!((b.region_association(&a, 0.5, false).unwrap() - without).abs() < 1e-12);
    }
}
