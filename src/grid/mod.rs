//! Equal-area HEALPix pixelization of the sphere (RING ordering).
//!
//! A grid of resolution `nside` (a power of two) has `12 * nside^2` pixels of
//! identical solid angle, arranged on `4 * nside - 1` iso-latitude rings.
//! Pixels are numbered ring by ring from the north pole, which is also the
//! ordering of every probability array in this crate.
//!
//! The grid provides:
//!
//! 1. Index/angle conversion ([`HealpixGrid::pix2ang`], [`HealpixGrid::ang2pix`]).
//! 2. Bilinear interpolation of a per-pixel array ([`interpolate`](HealpixGrid::interpolate)).
//! 3. Disc queries ([`query_disc`](HealpixGrid::query_disc)).
//! 4. Probability-conserving resolution change ([`ud_grade`](HealpixGrid::ud_grade)),
//!    via the NESTED hierarchy.
//! 5. Gaussian smoothing of a per-pixel array ([`smooth_gaussian`](HealpixGrid::smooth_gaussian)).
//!
//! Reference: K. M. Górski et al., "HEALPix: A Framework for High-Resolution
//! Discretization and Fast Analysis of Data Distributed on the Sphere",
//! ApJ 622, 759 (2005).

mod interpolate;
mod nest;
mod query;
mod smoothing;

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::Vector3;

use crate::coords::SkyPosition;
use crate::error::{LocalizationError, Result};

/// Finest supported resolution order (`nside = 2^14`).
pub const MAX_ORDER: u32 = 14;

// ── Grid ────────────────────────────────────────────────────────────────────

/// Geometry of a HEALPix grid at one resolution.
///
/// Cheap to copy; holds no per-pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealpixGrid {
    nside: u32,
    order: u32,
    npix: usize,
    /// Number of pixels in the north polar cap.
    ncap: usize,
}

/// Location and layout of one iso-latitude ring.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RingInfo {
    /// Index of the first pixel in the ring.
    pub start: usize,
    /// Number of pixels in the ring.
    pub len: usize,
    /// Co-latitude of the ring (radians).
    pub theta: f64,
    /// `true` when the first pixel center sits half a pixel east of `phi = 0`.
    pub shifted: bool,
}

impl HealpixGrid {
    /// Grid of resolution `nside`, which must be a power of two up to `2^14`.
    pub fn new(nside: u32) -> Result<Self> {
        if nside == 0 || !nside.is_power_of_two() || nside > (1 << MAX_ORDER) {
            return Err(LocalizationError::InvalidNside { nside });
        }
        let n = nside as usize;
        Ok(Self {
            nside,
            order: nside.trailing_zeros(),
            npix: 12 * n * n,
            ncap: 2 * n * (n - 1),
        })
    }

    /// Grid of resolution `nside = 2^order`.
    pub fn from_order(order: u32) -> Result<Self> {
        Self::new(1u32.checked_shl(order).unwrap_or(0))
    }

    /// Grid whose pixel count is `npix`.
    pub fn from_npix(npix: usize) -> Result<Self> {
        let bad = LocalizationError::InvalidPixelCount { npix };
        if npix == 0 || npix % 12 != 0 {
            return Err(bad);
        }
        let n2 = (npix / 12) as i64;
        let n = isqrt(n2);
        if n * n != n2 || n > u32::MAX as i64 {
            return Err(bad);
        }
        Self::new(n as u32).map_err(|_| bad)
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    /// `log2(nside)`.
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn npix(&self) -> usize {
        self.npix
    }

    /// Number of iso-latitude rings.
    pub fn nrings(&self) -> usize {
        4 * self.nside as usize - 1
    }

    /// Solid angle of one pixel in steradians.
    pub fn pixel_area_sr(&self) -> f64 {
        4.0 * PI / self.npix as f64
    }

    /// Solid angle of one pixel in square degrees.
    pub fn pixel_area_deg2(&self) -> f64 {
        4.0 * 180.0 * 180.0 / (PI * self.npix as f64)
    }

    /// Mean pixel size (square root of the pixel solid angle) in radians.
    pub fn resolution_rad(&self) -> f64 {
        self.pixel_area_sr().sqrt()
    }

    /// Mean pixel size in degrees.
    pub fn resolution_deg(&self) -> f64 {
        self.resolution_rad().to_degrees()
    }

    /// The `nside` in `2^0 ..= 2^14` whose mean pixel size is closest to `target_deg`.
    ///
    /// Ties resolve to the coarser grid.
    pub fn nside_for_resolution(target_deg: f64) -> u32 {
        (0..=MAX_ORDER)
            .map(|order| 1u32 << order)
            .map(|nside| {
                let npix = 12.0 * (nside as f64).powi(2);
                let res_deg = (4.0 * PI / npix).sqrt().to_degrees();
                (nside, (res_deg - target_deg).abs())
            })
            .fold((1u32, f64::INFINITY), |best, cand| {
                if cand.1 < best.1 {
                    cand
                } else {
                    best
                }
            })
            .0
    }

    // ── Pixel <-> angle ─────────────────────────────────────────────────────

    /// Co-latitude and longitude (radians) of the center of pixel `pix`.
    ///
    /// `phi` lies in `[0, 2π)`.
    pub fn pix2ang(&self, pix: usize) -> (f64, f64) {
        assert!(pix < self.npix, "pixel {pix} out of range for npix {}", self.npix);
        let nside = self.nside as i64;
        let npix = self.npix as i64;
        let ncap = self.ncap as i64;
        let p = pix as i64;
        let fact2 = 4.0 / self.npix as f64;

        if p < ncap {
            // North polar cap
            let iring = (1 + isqrt(1 + 2 * p)) >> 1;
            let iphi = p + 1 - 2 * iring * (iring - 1);
            let tmp = (iring * iring) as f64 * fact2;
            let z = 1.0 - tmp;
            let sth = (tmp * (2.0 - tmp)).sqrt();
            let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
            (sth.atan2(z), phi)
        } else if p < npix - ncap {
            // Equatorial belt
            let nl4 = 4 * nside;
            let ip = p - ncap;
            let tmp = ip / nl4;
            let iring = tmp + nside;
            let iphi = ip - nl4 * tmp + 1;
            let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
            let z = (2 * nside - iring) as f64 * 2.0 / (3.0 * nside as f64);
            let phi = (iphi as f64 - fodd) * PI / (2.0 * nside as f64);
            (z.clamp(-1.0, 1.0).acos(), phi)
        } else {
            // South polar cap
            let ip = npix - p;
            let iring = (1 + isqrt(2 * ip - 1)) >> 1;
            let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
            let tmp = (iring * iring) as f64 * fact2;
            let z = tmp - 1.0;
            let sth = (tmp * (2.0 - tmp)).sqrt();
            let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
            (sth.atan2(z), phi)
        }
    }

    /// Index of the pixel containing co-latitude `theta` and longitude `phi` (radians).
    ///
    /// `phi` may take any value; it is wrapped into `[0, 2π)`.
    pub fn ang2pix(&self, theta: f64, phi: f64) -> usize {
        let nside = self.nside as i64;
        let nside_f = self.nside as f64;
        let z = theta.cos();
        let za = z.abs();
        let mut tt = (phi / FRAC_PI_2).rem_euclid(4.0);
        if tt >= 4.0 {
            tt = 0.0;
        }

        if za <= 2.0 / 3.0 {
            let nl4 = 4 * nside;
            let temp1 = nside_f * (0.5 + tt);
            let temp2 = nside_f * z * 0.75;
            let jp = (temp1 - temp2) as i64;
            let jm = (temp1 + temp2) as i64;
            // ring number counted from z = 2/3, in [1, 2 nside + 1]
            let ir = nside + 1 + jp - jm;
            let kshift = 1 - (ir & 1);
            let t1 = jp + jm - nside + kshift + 1 + nl4 + nl4;
            let ip = (t1 >> 1) & (nl4 - 1);
            self.ncap + ((ir - 1) * nl4 + ip) as usize
        } else {
            let tp = tt - tt.floor();
            let tmp = nside_f * theta.sin().abs() / ((1.0 + za) / 3.0).sqrt();
            let jp = ((tp * tmp) as i64).min(nside - 1);
            let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);
            let ir = jp + jm + 1;
            let ip = ((tt * ir as f64) as i64).rem_euclid(4 * ir);
            if z > 0.0 {
                (2 * ir * (ir - 1) + ip) as usize
            } else {
                self.npix - (2 * ir * (ir + 1)) as usize + ip as usize
            }
        }
    }

    /// Unit vector to the center of pixel `pix`.
    pub fn pix2vec(&self, pix: usize) -> Vector3<f64> {
        let (theta, phi) = self.pix2ang(pix);
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_p, cos_p) = phi.sin_cos();
        Vector3::new(sin_t * cos_p, sin_t * sin_p, cos_t)
    }

    /// Index of the pixel containing the (possibly non-unit) direction `v`.
    pub fn vec2pix(&self, v: &Vector3<f64>) -> usize {
        let theta = v.x.hypot(v.y).atan2(v.z);
        let phi = v.y.atan2(v.x);
        self.ang2pix(theta, phi)
    }

    /// Sky position of the center of pixel `pix`.
    pub fn pixel_position(&self, pix: usize) -> SkyPosition {
        let (theta, phi) = self.pix2ang(pix);
        SkyPosition::from_grid_angles(theta, phi)
    }

    /// Index of the pixel containing `pos`.
    pub fn position_to_pixel(&self, pos: &SkyPosition) -> usize {
        self.ang2pix(pos.theta(), pos.phi())
    }

    // ── Ring geometry ───────────────────────────────────────────────────────

    /// Layout of ring `ring` (1-based, `1 ..= 4 nside - 1`).
    pub(crate) fn ring_info(&self, ring: i64) -> RingInfo {
        let nside = self.nside as i64;
        let northring = if ring > 2 * nside { 4 * nside - ring } else { ring };
        let fact2 = 4.0 / self.npix as f64;

        let (mut start, len, mut theta, shifted) = if northring < nside {
            let tmp = (northring * northring) as f64 * fact2;
            let cos_t = 1.0 - tmp;
            let sin_t = (tmp * (2.0 - tmp)).sqrt();
            (
                (2 * northring * (northring - 1)) as usize,
                (4 * northring) as usize,
                sin_t.atan2(cos_t),
                true,
            )
        } else {
            let len = 4 * nside;
            let z = (2 * nside - northring) as f64 * 2.0 / (3.0 * nside as f64);
            (
                self.ncap + ((northring - nside) * len) as usize,
                len as usize,
                z.clamp(-1.0, 1.0).acos(),
                (northring - nside) & 1 == 0,
            )
        };

        if northring != ring {
            theta = PI - theta;
            start = self.npix - start - len;
        }
        RingInfo {
            start,
            len,
            theta,
            shifted,
        }
    }

    /// Number of the ring immediately north of (or at) `z = cos(theta)`.
    ///
    /// Returns 0 when `z` lies north of the first ring.
    pub(crate) fn ring_above(&self, z: f64) -> i64 {
        let nside_f = self.nside as f64;
        let az = z.abs();
        if az <= 2.0 / 3.0 {
            return (nside_f * (2.0 - 1.5 * z)) as i64;
        }
        let iring = (nside_f * (3.0 * (1.0 - az)).sqrt()) as i64;
        if z > 0.0 {
            iring
        } else {
            4 * self.nside as i64 - iring - 1
        }
    }
}

/// Longitude wrapped into `[0, 2π)`.
pub(crate) fn wrap_phi(phi: f64) -> f64 {
    let p = phi.rem_euclid(TAU);
    if p >= TAU {
        0.0
    } else {
        p
    }
}

/// Integer square root (floor).
pub(crate) fn isqrt(v: i64) -> i64 {
    let mut r = (v as f64).sqrt() as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_nside() {
        assert!(HealpixGrid::new(0).is_err());
        assert!(HealpixGrid::new(3).is_err());
        assert!(HealpixGrid::new(1 << 15).is_err());
        assert_eq!(HealpixGrid::new(64).unwrap().npix(), 49152);
    }

    #[test]
    fn npix_roundtrip() {
        for order in 0..=10 {
            let grid = HealpixGrid::from_order(order).unwrap();
            let back = HealpixGrid::from_npix(grid.npix()).unwrap();
            assert_eq!(back, grid);
        }
        assert_eq!(
            HealpixGrid::from_npix(100),
            Err(LocalizationError::InvalidPixelCount { npix: 100 })
        );
        // 12 * 9 is a square count but nside = 3 is not a power of two
        assert!(HealpixGrid::from_npix(108).is_err());
    }

    #[test]
    fn pixel_area_matches_full_sky() {
        let grid = HealpixGrid::new(16).unwrap();
        let total = grid.pixel_area_deg2() * grid.npix() as f64;
        assert!((total - 41252.96125).abs() < 1e-3);
    }

    #[test]
    fn pix2ang_ang2pix_roundtrip() {
        for nside in [1, 2, 4, 8, 32] {
            let grid = HealpixGrid::new(nside).unwrap();
            for pix in 0..grid.npix() {
                let (theta, phi) = grid.pix2ang(pix);
                assert!((0.0..=PI).contains(&theta));
                assert!((0.0..TAU).contains(&phi));
                assert_eq!(grid.ang2pix(theta, phi), pix, "nside {nside} pix {pix}");
            }
        }
    }

    #[test]
    fn known_pixel_centers() {
        let grid = HealpixGrid::new(1).unwrap();
        let (theta, phi) = grid.pix2ang(0);
        assert!((theta - (2.0f64 / 3.0).acos()).abs() < 1e-12);
        assert!((phi - PI / 4.0).abs() < 1e-12);
        let (theta, phi) = grid.pix2ang(4);
        assert!((theta - FRAC_PI_2).abs() < 1e-12);
        assert!(phi.abs() < 1e-12);
        // The poles fall in the first / last pixel
        assert_eq!(grid.ang2pix(0.0, 0.0), 0);
        assert_eq!(grid.ang2pix(PI, 0.0), 8);
    }

    #[test]
    fn ring_info_covers_all_pixels() {
        let grid = HealpixGrid::new(8).unwrap();
        let mut next = 0;
        let mut last_theta = 0.0;
        for ring in 1..=grid.nrings() as i64 {
            let info = grid.ring_info(ring);
            assert_eq!(info.start, next);
            assert!(info.theta > last_theta);
            let (theta, _) = grid.pix2ang(info.start);
            assert!((theta - info.theta).abs() < 1e-12);
            next += info.len;
            last_theta = info.theta;
        }
        assert_eq!(next, grid.npix());
    }

    #[test]
    fn ring_above_brackets_ring_latitudes() {
        let grid = HealpixGrid::new(4).unwrap();
        for ring in 1..grid.nrings() as i64 {
            let a = grid.ring_info(ring);
            let b = grid.ring_info(ring + 1);
            let mid = 0.5 * (a.theta + b.theta);
            assert_eq!(grid.ring_above(mid.cos()), ring);
        }
        assert_eq!(grid.ring_above(1.0), 0);
    }

    #[test]
    fn nside_for_resolution_picks_closest() {
        // nside 128 has a mean pixel size of ~0.458 deg
        assert_eq!(HealpixGrid::nside_for_resolution(0.5), 128);
        assert_eq!(HealpixGrid::nside_for_resolution(0.2), 256);
        assert_eq!(HealpixGrid::nside_for_resolution(100.0), 1);
    }

    #[test]
    fn vec2pix_matches_ang2pix() {
        let grid = HealpixGrid::new(32).unwrap();
        let pos = SkyPosition::new(250.0, -33.0);
        assert_eq!(grid.vec2pix(&pos.uvec()), grid.position_to_pixel(&pos));
        let center = grid.pixel_position(grid.position_to_pixel(&pos));
        assert!(center.separation_deg(&pos) < grid.resolution_deg());
    }
}
