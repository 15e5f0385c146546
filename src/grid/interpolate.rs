//! Bilinear interpolation of a per-pixel array at an arbitrary point.
//!
//! The point is bracketed by the two rings immediately north and south of it;
//! on each ring the two pixels bracketing its longitude are weighted linearly
//! in longitude, and the two rings are weighted linearly in co-latitude. Above
//! the first ring (or below the last) the missing ring is replaced by the pole,
//! whose value is the mean of the four pixels of the nearest ring.

use std::f64::consts::{PI, TAU};

use super::{wrap_phi, HealpixGrid, RingInfo};

impl HealpixGrid {
    /// The four pixels and weights used to interpolate at (`theta`, `phi`).
    ///
    /// Weights are non-negative and sum to one.
    pub fn interpolation_weights(&self, theta: f64, phi: f64) -> ([usize; 4], [f64; 4]) {
        let theta = theta.clamp(0.0, PI);
        let phi = wrap_phi(phi);
        let last_ring = 4 * self.nside as i64;
        let npix = self.npix;

        let ir1 = self.ring_above(theta.cos());
        let ir2 = ir1 + 1;

        let mut pix = [0usize; 4];
        let mut wgt = [0.0f64; 4];
        let mut theta1 = 0.0;
        let mut theta2 = 0.0;

        if ir1 > 0 {
            let info = self.ring_info(ir1);
            theta1 = info.theta;
            let (p0, p1, w) = bracket_in_ring(&info, phi);
            pix[0] = p0;
            pix[1] = p1;
            wgt[0] = 1.0 - w;
            wgt[1] = w;
        }
        if ir2 < last_ring {
            let info = self.ring_info(ir2);
            theta2 = info.theta;
            let (p2, p3, w) = bracket_in_ring(&info, phi);
            pix[2] = p2;
            pix[3] = p3;
            wgt[2] = 1.0 - w;
            wgt[3] = w;
        }

        if ir1 == 0 {
            // North of the first ring
            let wtheta = theta / theta2;
            wgt[2] *= wtheta;
            wgt[3] *= wtheta;
            let fac = (1.0 - wtheta) * 0.25;
            wgt[0] = fac;
            wgt[1] = fac;
            wgt[2] += fac;
            wgt[3] += fac;
            pix[0] = (pix[2] + 2) & 3;
            pix[1] = (pix[3] + 2) & 3;
        } else if ir2 == last_ring {
            // South of the last ring
            let wtheta = (theta - theta1) / (PI - theta1);
            wgt[0] *= 1.0 - wtheta;
            wgt[1] *= 1.0 - wtheta;
            let fac = wtheta * 0.25;
            wgt[0] += fac;
            wgt[1] += fac;
            wgt[2] = fac;
            wgt[3] = fac;
            pix[2] = ((pix[0] + 2) & 3) + npix - 4;
            pix[3] = ((pix[1] + 2) & 3) + npix - 4;
        } else {
            let wtheta = (theta - theta1) / (theta2 - theta1);
            wgt[0] *= 1.0 - wtheta;
            wgt[1] *= 1.0 - wtheta;
            wgt[2] *= wtheta;
            wgt[3] *= wtheta;
        }

        (pix, wgt)
    }

    /// Interpolated value of `values` at (`theta`, `phi`).
    ///
    /// # Panics
    ///
    /// If `values.len() != self.npix()`.
    pub fn interpolate(&self, values: &[f64], theta: f64, phi: f64) -> f64 {
        assert_eq!(values.len(), self.npix, "array length does not match grid");
        let (pix, wgt) = self.interpolation_weights(theta, phi);
        pix.iter().zip(wgt.iter()).map(|(&p, &w)| values[p] * w).sum()
    }
}

/// The two pixels of a ring bracketing longitude `phi`, and the weight of the second.
fn bracket_in_ring(info: &RingInfo, phi: f64) -> (usize, usize, f64) {
    let len = info.len as i64;
    let dphi = TAU / info.len as f64;
    let shift = if info.shifted { 0.5 } else { 0.0 };
    let tmp = phi / dphi - shift;
    let mut i1 = if tmp < 0.0 { tmp as i64 - 1 } else { tmp as i64 };
    let w = (phi - (i1 as f64 + shift) * dphi) / dphi;
    let mut i2 = i1 + 1;
    if i2 >= len {
        i2 -= len;
    }
    if i1 < 0 {
        i1 += len;
    }
    (info.start + i1 as usize, info.start + i2 as usize, w)
}
