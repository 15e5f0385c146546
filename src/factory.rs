//! Construction of localization maps from parametric sky distributions and
//! from chi-squared grids.
//!
//! Resolution is the cost knob of every constructor here: memory grows as
//! `nside^2` and the credible-level sort as `nside^2 log nside`. When no
//! `nside` is given, the Gaussian and annulus constructors pick the grid
//! whose mean pixel size is closest to a fixed fraction of `sigma`.

use std::f64::consts::PI;

use nalgebra::{Rotation3, Vector3};
use tracing::debug;

use crate::chi2grid::Chi2Grid;
use crate::coords::SkyPosition;
use crate::error::{LocalizationError, Result};
use crate::grid::HealpixGrid;
use crate::map::LocalizationMap;
use crate::platform::PlatformContext;

/// Pixels per sigma targeted by [`LocalizationMap::from_gaussian`].
const GAUSSIAN_PIXELS_PER_SIGMA: f64 = 10.0;

/// Pixels per sigma targeted by [`LocalizationMap::from_annulus`].
const ANNULUS_PIXELS_PER_SIGMA: f64 = 5.0;

/// Annulus radii whose profile amplitude falls below this fraction of the
/// peak are not rasterized.
const AMPLITUDE_THRESHOLD: f64 = 1e-10;

/// Circle points per resolution element of arc length.
const CIRCLE_OVERSAMPLING: usize = 10;

/// Default resolution of [`LocalizationMap::from_vertices`].
pub const VERTICES_DEFAULT_NSIDE: u32 = 64;

/// Default resolution of [`LocalizationMap::from_chisq_grid`].
pub const CHISQ_DEFAULT_NSIDE: u32 = 128;

/// Resolution on which chi-squared samples are binned before interpolation.
pub const CHISQ_LORES_NSIDE: u32 = 64;

impl LocalizationMap {
    /// A circular Gaussian of standard deviation `sigma_deg` about `center`.
    ///
    /// A unit spike at the pixel nearest `center` is smoothed with the grid's
    /// Gaussian kernel.
    pub fn from_gaussian(center: SkyPosition, sigma_deg: f64, nside: Option<u32>) -> Result<Self> {
        check_sigma(sigma_deg)?;
        let grid = resolve_grid(nside, sigma_deg / GAUSSIAN_PIXELS_PER_SIGMA)?;

        let mut spike = vec![0.0; grid.npix()];
        spike[grid.position_to_pixel(&center)] = 1.0;
        let probability = grid.smooth_gaussian(&spike, sigma_deg.to_radians());
        Self::from_grid_probability(grid, probability)
    }

    /// An annulus of angular radius `radius_deg` about `center` with a
    /// Gaussian radial profile of width `sigma_deg`.
    ///
    /// The radial profile is sampled on `0..π` and each sampled radius is
    /// drawn as a circle of points dense enough to touch every pixel it
    /// crosses. A pixel touched by several radii is averaged with each new
    /// amplitude rather than summed.
    pub fn from_annulus(
        center: SkyPosition,
        radius_deg: f64,
        sigma_deg: f64,
        nside: Option<u32>,
    ) -> Result<Self> {
        check_sigma(sigma_deg)?;
        if !(0.0..=180.0).contains(&radius_deg) {
            return Err(LocalizationError::invalid(
                "radius",
                radius_deg,
                "annulus radius must lie within [0, 180] degrees",
            ));
        }
        let grid = resolve_grid(nside, sigma_deg / ANNULUS_PIXELS_PER_SIGMA)?;
        let res = grid.resolution_rad();
        let (mu, sigma) = (radius_deg.to_radians(), sigma_deg.to_radians());

        let n = ((10.0 * PI / res) as usize).max(2);
        let radii: Vec<f64> = (0..n).map(|i| PI * i as f64 / (n - 1) as f64).collect();
        let pdf: Vec<f64> = radii.iter().map(|&x| normal_pdf(x, mu, sigma)).collect();
        let peak = pdf.iter().copied().fold(0.0, f64::max);

        let to_sky = Rotation3::from_axis_angle(&Vector3::z_axis(), center.phi())
            * Rotation3::from_axis_angle(&Vector3::y_axis(), center.theta());

        let mut probability = vec![0.0; grid.npix()];
        let mut touched = Vec::new();
        for (&x, &amp) in radii.iter().zip(&pdf) {
            if !(amp / peak >= AMPLITUDE_THRESHOLD) {
                continue;
            }
            let numpts = ((2.0 * PI * x / res).ceil() as usize * CIRCLE_OVERSAMPLING).max(1);
            let (sin_x, cos_x) = x.sin_cos();

            touched.clear();
            touched.extend((0..numpts).map(|k| {
                let (sin_p, cos_p) = (2.0 * PI * k as f64 / numpts as f64).sin_cos();
                let v = to_sky * Vector3::new(sin_x * cos_p, sin_x * sin_p, cos_x);
                grid.vec2pix(&v)
            }));
            accumulate_ring(&mut probability, &mut touched, amp);
        }

        debug!(
            "annulus r={:.2} deg sigma={:.2} deg: {} radii on nside {}",
            radius_deg,
            sigma_deg,
            n,
            grid.nside()
        );
        Self::from_grid_probability(grid, probability)
    }

    /// Uniform probability inside the polygon with the given vertices (degrees).
    ///
    /// The containment test is planar in (RA, Dec) and applied to pixel
    /// centers, so polygons should not straddle RA = 0 or enclose a pole.
    pub fn from_vertices(ra_deg: &[f64], dec_deg: &[f64], nside: Option<u32>) -> Result<Self> {
        if ra_deg.len() != dec_deg.len() {
            return Err(LocalizationError::LengthMismatch {
                name: "dec",
                expected: ra_deg.len(),
                actual: dec_deg.len(),
            });
        }
        if ra_deg.len() < 3 {
            return Err(LocalizationError::TooFewVertices { count: ra_deg.len() });
        }
        let grid = HealpixGrid::new(nside.unwrap_or(VERTICES_DEFAULT_NSIDE))?;
        let vertices: Vec<(f64, f64)> = ra_deg.iter().copied().zip(dec_deg.iter().copied()).collect();

        let probability = (0..grid.npix())
            .map(|pix| {
                let pos = grid.pixel_position(pix);
                if polygon_contains(&vertices, pos.ra_deg, pos.dec_deg) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        Self::from_grid_probability(grid, probability)
    }

    /// Build a map from a chi-squared grid.
    ///
    /// Samples are binned onto a grid of nside [`CHISQ_LORES_NSIDE`] (a later
    /// sample overwrites an earlier one in the same pixel) and both the
    /// significance and the relative likelihood are interpolated up to
    /// `nside` (default [`CHISQ_DEFAULT_NSIDE`]). The grid's trigger time,
    /// quaternion, and spacecraft position carry over, the latter also
    /// fixing the exclusion region.
    pub fn from_chisq_grid(chi2: &Chi2Grid, nside: Option<u32>) -> Result<Self> {
        let lores = HealpixGrid::new(CHISQ_LORES_NSIDE)?;
        let hires = HealpixGrid::new(nside.unwrap_or(CHISQ_DEFAULT_NSIDE))?;

        let mut lores_sig = vec![0.0; lores.npix()];
        let mut lores_prob = vec![0.0; lores.npix()];
        let samples = chi2
            .ra()
            .iter()
            .zip(chi2.dec())
            .zip(chi2.significance().into_iter().zip(chi2.relative_likelihood()));
        for ((&ra, &dec), (sig, like)) in samples {
            let pix = lores.position_to_pixel(&SkyPosition::new(ra, dec));
            lores_sig[pix] = sig;
            lores_prob[pix] = like;
        }

        let (probability, significance): (Vec<f64>, Vec<f64>) = (0..hires.npix())
            .map(|pix| {
                let (theta, phi) = hires.pix2ang(pix);
                (
                    lores.interpolate(&lores_prob, theta, phi).max(0.0),
                    lores.interpolate(&lores_sig, theta, phi).max(0.0),
                )
            })
            .unzip();
        debug!(
            "chi2grid: {} samples on nside {} interpolated to nside {}",
            chi2.numpts(),
            lores.nside(),
            hires.nside()
        );

        let mut map = Self::from_parts(probability, significance)?;
        if let Some(t) = chi2.trigtime() {
            map = map.with_trigtime(t);
        }
        if chi2.quaternion().is_some() || chi2.scpos().is_some() {
            let mut ctx = PlatformContext::new();
            if let Some(q) = chi2.quaternion() {
                ctx = ctx.with_quaternion(&q)?;
            }
            if let Some(s) = chi2.scpos() {
                ctx = ctx.with_scpos(&s)?;
            }
            map = map.with_platform(ctx);
        }
        Ok(map)
    }
}

fn check_sigma(sigma_deg: f64) -> Result<()> {
    if sigma_deg > 0.0 && sigma_deg.is_finite() {
        Ok(())
    } else {
        Err(LocalizationError::invalid(
            "sigma",
            sigma_deg,
            "width must be positive and finite",
        ))
    }
}

/// The grid for an explicit `nside`, else the one closest to `target_res_deg`.
fn resolve_grid(nside: Option<u32>, target_res_deg: f64) -> Result<HealpixGrid> {
    match nside {
        Some(nside) => HealpixGrid::new(nside),
        None => {
            let nside = HealpixGrid::nside_for_resolution(target_res_deg);
            debug!(
                "auto-selected nside {} for {:.4} deg pixels",
                nside, target_res_deg
            );
            HealpixGrid::new(nside)
        }
    }
}

/// Write one sampled radius into the annulus array.
///
/// Each pixel of `ring` is written once, however many circle points hit it.
/// A pixel already holding a positive value takes the mean of that value and
/// `amp`; any other pixel takes `amp`.
fn accumulate_ring(probability: &mut [f64], ring: &mut Vec<usize>, amp: f64) {
    ring.sort_unstable();
    ring.dedup();
    for &pix in ring.iter() {
        let p = &mut probability[pix];
        *p = if *p > 0.0 { 0.5 * (*p + amp) } else { amp };
    }
}

fn normal_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Even-odd containment of `(x, y)` in a closed polygon.
fn polygon_contains(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for (i, &(xi, yi)) in vertices.iter().enumerate() {
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
