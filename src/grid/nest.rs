//! NESTED hierarchy and probability-conserving resolution changes.
//!
//! Every pixel of a grid at `nside` has exactly four children at `2 * nside`.
//! The RING ordering used for storage does not expose that hierarchy, so
//! resolution changes go through the NESTED index: pixels are mapped to
//! (face, x, y) coordinates within one of the 12 base faces, and the NESTED
//! index interleaves the bits of `x` and `y`. A parent's NESTED index is then
//! its child's index shifted right by two bits per level.

use super::{isqrt, HealpixGrid};
use crate::error::Result;

/// Ring number (in units of `nside`) of the southern vertex of each base face.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude of the center of each base face, in units of `pi/4`.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

impl HealpixGrid {
    /// Convert a RING index to the NESTED index of the same pixel.
    pub fn ring_to_nest(&self, pix: usize) -> usize {
        let (ix, iy, face) = self.ring2xyf(pix);
        self.xyf2nest(ix, iy, face)
    }

    /// Convert a NESTED index to the RING index of the same pixel.
    pub fn nest_to_ring(&self, pix: usize) -> usize {
        let (ix, iy, face) = self.nest2xyf(pix);
        self.xyf2ring(ix, iy, face)
    }

    /// Resample a per-pixel array to `nside_out`, conserving its total.
    ///
    /// Upgrading splits each pixel's value equally among its `4^k` children;
    /// degrading sums the children into their parent. Values are interpreted as
    /// per-pixel mass (probability), not density.
    ///
    /// # Panics
    ///
    /// If `values.len() != self.npix()`.
    pub fn ud_grade(&self, values: &[f64], nside_out: u32) -> Result<Vec<f64>> {
        assert_eq!(values.len(), self.npix, "array length does not match grid");
        let out = HealpixGrid::new(nside_out)?;

        if out.order == self.order {
            return Ok(values.to_vec());
        }

        if out.order > self.order {
            let shift = 2 * (out.order - self.order);
            let children = (1usize << shift) as f64;
            Ok((0..out.npix)
                .map(|q| {
                    let parent = out.ring_to_nest(q) >> shift;
                    values[self.nest_to_ring(parent)] / children
                })
                .collect())
        } else {
            let shift = 2 * (self.order - out.order);
            let mut summed = vec![0.0; out.npix];
            for (p, &v) in values.iter().enumerate() {
                let parent = self.ring_to_nest(p) >> shift;
                summed[out.nest_to_ring(parent)] += v;
            }
            Ok(summed)
        }
    }

    // ── (x, y, face) coordinates ────────────────────────────────────────────

    fn ring2xyf(&self, pix: usize) -> (i64, i64, usize) {
        let nside = self.nside as i64;
        let nl2 = 2 * nside;
        let npix = self.npix as i64;
        let ncap = self.ncap as i64;
        let p = pix as i64;

        let (iring, iphi, kshift, nr, face) = if p < ncap {
            let iring = (1 + isqrt(1 + 2 * p)) >> 1;
            let iphi = p + 1 - 2 * iring * (iring - 1);
            (iring, iphi, 0, iring, (iphi - 1) / iring)
        } else if p < npix - ncap {
            let ip = p - ncap;
            let tmp = ip / (4 * nside);
            let iring = tmp + nside;
            let iphi = ip - tmp * 4 * nside + 1;
            let kshift = (iring + nside) & 1;
            let ire = tmp + 1;
            let irm = nl2 + 2 - ire;
            let ifm = (iphi - (ire >> 1) + nside - 1) / nside;
            let ifp = (iphi - (irm >> 1) + nside - 1) / nside;
            let face = if ifp == ifm {
                ifp | 4
            } else if ifp < ifm {
                ifp
            } else {
                ifm + 8
            };
            (iring, iphi, kshift, nside, face)
        } else {
            let ip = npix - p;
            let ring_from_south = (1 + isqrt(2 * ip - 1)) >> 1;
            let iphi = 4 * ring_from_south + 1 - (ip - 2 * ring_from_south * (ring_from_south - 1));
            (
                2 * nl2 - ring_from_south,
                iphi,
                0,
                ring_from_south,
                8 + (iphi - 1) / ring_from_south,
            )
        };

        let face = face as usize;
        let irt = iring - JRLL[face] * nside + 1;
        let mut ipt = 2 * iphi - JPLL[face] * nr - kshift - 1;
        if ipt >= nl2 {
            ipt -= 8 * nside;
        }
        ((ipt - irt) >> 1, (-ipt - irt) >> 1, face)
    }

    fn xyf2ring(&self, ix: i64, iy: i64, face: usize) -> usize {
        let nside = self.nside as i64;
        let nl4 = 4 * nside;
        let jr = JRLL[face] * nside - ix - iy - 1;

        let (nr, n_before, kshift) = if jr < nside {
            (jr, 2 * jr * (jr - 1), 0)
        } else if jr > 3 * nside {
            let nr = nl4 - jr;
            (nr, self.npix as i64 - 2 * (nr + 1) * nr, 0)
        } else {
            (nside, self.ncap as i64 + (jr - nside) * nl4, (jr - nside) & 1)
        };

        let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
        if jp > nl4 {
            jp -= nl4;
        } else if jp < 1 {
            jp += nl4;
        }
        (n_before + jp - 1) as usize
    }

    fn nest2xyf(&self, pix: usize) -> (i64, i64, usize) {
        let face_bits = 2 * self.order;
        let face = pix >> face_bits;
        let within = pix & ((1usize << face_bits) - 1);
        (
            compress_bits(within) as i64,
            compress_bits(within >> 1) as i64,
            face,
        )
    }

    fn xyf2nest(&self, ix: i64, iy: i64, face: usize) -> usize {
        (face << (2 * self.order)) + spread_bits(ix as usize) + (spread_bits(iy as usize) << 1)
    }
}

/// Move bit `i` of `v` to bit `2i`.
fn spread_bits(v: usize) -> usize {
    let mut out = 0;
    let mut i = 0;
    while (v >> i) != 0 {
        out |= ((v >> i) & 1) << (2 * i);
        i += 1;
    }
    out
}

/// Gather the even bits of `v` (inverse of [`spread_bits`]).
fn compress_bits(v: usize) -> usize {
    let mut out = 0;
    let mut i = 0;
    while (v >> (2 * i)) != 0 {
        out |= ((v >> (2 * i)) & 1) << i;
        i += 1;
    }
    out
}
