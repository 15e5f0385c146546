//! Disc queries: all pixels whose centers lie within an angular radius.
//!
//! Only rings whose latitude band can intersect the disc are visited. On each
//! ring the admissible longitude interval follows from the spherical law of
//! cosines, so the cost is proportional to the number of pixels returned plus
//! the number of rings spanned.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;

use super::HealpixGrid;
use crate::coords::SkyPosition;

impl HealpixGrid {
    /// Pixels whose centers lie within `radius_rad` of `center`, in ring order.
    pub fn query_disc(&self, center: &SkyPosition, radius_rad: f64) -> Vec<usize> {
        let mut out = Vec::new();
        self.query_disc_into(&center.uvec(), radius_rad, &mut out);
        out
    }

    /// Same as [`query_disc`](Self::query_disc) around a direction vector, reusing `out`.
    pub(crate) fn query_disc_into(&self, dir: &Vector3<f64>, radius_rad: f64, out: &mut Vec<usize>) {
        out.clear();
        if radius_rad < 0.0 {
            return;
        }
        if radius_rad >= PI {
            out.extend(0..self.npix);
            return;
        }

        let dir = dir.normalize();
        let z0 = dir.z.clamp(-1.0, 1.0);
        let theta0 = z0.acos();
        let sin0 = (1.0 - z0 * z0).max(0.0).sqrt();
        let phi0 = dir.y.atan2(dir.x);
        let cos_radius = radius_rad.cos();

        let nrings = self.nrings() as i64;
        let theta_lo = theta0 - radius_rad;
        let theta_hi = theta0 + radius_rad;
        let first = if theta_lo <= 0.0 {
            1
        } else {
            self.ring_above(theta_lo.cos()).max(1)
        };
        let last = if theta_hi >= PI {
            nrings
        } else {
            (self.ring_above(theta_hi.cos()) + 1).min(nrings)
        };

        for ring in first..=last {
            let info = self.ring_info(ring);
            let (sin_r, cos_r) = info.theta.sin_cos();
            let len = info.len as i64;
            let denom = sin_r * sin0;

            if denom < 1e-12 {
                // Disc centered on a pole: test the ring pixel by pixel
                for pix in info.start..info.start + info.len {
                    if dir.dot(&self.pix2vec(pix)) >= cos_radius {
                        out.push(pix);
                    }
                }
                continue;
            }

            let x = (cos_radius - cos_r * z0) / denom;
            if x > 1.0 {
                continue;
            }
            if x <= -1.0 {
                out.extend(info.start..info.start + info.len);
                continue;
            }

            let dphi = x.acos();
            let step = TAU / info.len as f64;
            let shift = if info.shifted { 0.5 } else { 0.0 };
            let lo = ((phi0 - dphi) / step - shift).ceil() as i64;
            let hi = ((phi0 + dphi) / step - shift).floor() as i64;
            if hi < lo {
                continue;
            }
            if hi - lo + 1 >= len {
                out.extend(info.start..info.start + info.len);
                continue;
            }
            let ring_start = out.len();
            out.extend((lo..=hi).map(|k| info.start + k.rem_euclid(len) as usize));
            out[ring_start..].sort_unstable();
        }
    }
}
