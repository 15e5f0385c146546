//! Sky positions and angular separations.
//!
//! Positions are equatorial (RA, Dec) in degrees. The pixel grid works in
//! co-latitude `theta` and longitude `phi`, both in radians:
//!
//! ```text
//! phi   = ra
//! theta = 90° - dec
//! ```
//!
//! Both directions of the conversion are exact up to floating point rounding.

use std::f64::consts::FRAC_PI_2;

use nalgebra::Vector3;
use rkyv::{Archive, Deserialize, Serialize};

/// An equatorial sky position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    /// Build a position from grid co-latitude and longitude (radians).
    pub fn from_grid_angles(theta: f64, phi: f64) -> Self {
        Self {
            ra_deg: phi.to_degrees(),
            dec_deg: (FRAC_PI_2 - theta).to_degrees(),
        }
    }

    /// Co-latitude in radians, `0` at the north celestial pole.
    pub fn theta(&self) -> f64 {
        (90.0 - self.dec_deg).to_radians()
    }

    /// Longitude in radians.
    pub fn phi(&self) -> f64 {
        self.ra_deg.to_radians()
    }

    /// Unit vector pointing at this position.
    pub fn uvec(&self) -> Vector3<f64> {
        let (sin_ra, cos_ra) = self.ra_deg.to_radians().sin_cos();
        let (sin_dec, cos_dec) = self.dec_deg.to_radians().sin_cos();
        Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
    }

    /// Position of a (possibly non-unit) direction vector.
    ///
    /// RA is wrapped into `[0, 360)`.
    pub fn from_uvec(v: &Vector3<f64>) -> Self {
        let r = v.norm();
        let dec = (v.z / r).clamp(-1.0, 1.0).asin();
        let ra = v.y.atan2(v.x).to_degrees().rem_euclid(360.0);
        Self {
            ra_deg: ra,
            dec_deg: dec.to_degrees(),
        }
    }

    /// Great-circle distance to `other` in degrees.
    pub fn separation_deg(&self, other: &SkyPosition) -> f64 {
        haversine_deg(self.ra_deg, self.dec_deg, other.ra_deg, other.dec_deg)
    }

    /// The point on the opposite side of the sphere.
    pub fn antipode(&self) -> Self {
        Self {
            ra_deg: (self.ra_deg + 180.0).rem_euclid(360.0),
            dec_deg: -self.dec_deg,
        }
    }
}

impl From<(f64, f64)> for SkyPosition {
    fn from((ra_deg, dec_deg): (f64, f64)) -> Self {
        Self::new(ra_deg, dec_deg)
    }
}

/// Angular separation between two (RA, Dec) points, in degrees.
///
/// Haversine formula; well conditioned for small separations.
pub fn haversine_deg(ra1_deg: f64, dec1_deg: f64, ra2_deg: f64, dec2_deg: f64) -> f64 {
    let dec1 = dec1_deg.to_radians();
    let dec2 = dec2_deg.to_radians();
    let half_ddec = 0.5 * (dec2 - dec1);
    let half_dra = 0.5 * (ra2_deg - ra1_deg).to_radians();
    let h = half_ddec.sin().powi(2) + dec1.cos() * dec2.cos() * half_dra.sin().powi(2);
    (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
}
