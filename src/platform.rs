//! Observing-platform context attached to a localization map.
//!
//! A map produced by an orbiting instrument carries extra knowledge about the
//! observation: where the Earth was (the exclusion region that occludes part
//! of the sky), where the Sun was, where each detector pointed, and the raw
//! attitude quaternion and spacecraft position it was derived from. None of
//! it affects the probability arithmetic; it only enables the occlusion-aware
//! operations (`remove_exclusion`, exclusion-aware association) and travels
//! with the map through map algebra.
//!
//! Converting an attitude quaternion to detector pointings is outside this
//! crate. Pointings are supplied already resolved to sky positions.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use rkyv::{Archive, Deserialize, Serialize};

use crate::coords::SkyPosition;
use crate::error::{fixed_length, LocalizationError, Result};

/// Apparent angular radius of the Earth assumed when only the geocenter is known.
pub const DEFAULT_EARTH_RADIUS_DEG: f64 = 67.5;

/// Mean Earth radius in meters (spherical Earth).
pub const EARTH_RADIUS_M: f64 = 6371.0 * 1000.0;

// ── Exclusion region ────────────────────────────────────────────────────────

/// A spherical cap of sky hidden from the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct ExclusionRegion {
    pub center: SkyPosition,
    /// Angular radius of the cap in degrees, within `[0, 180]`.
    pub radius_deg: f64,
}

impl ExclusionRegion {
    pub fn new(center: SkyPosition, radius_deg: f64) -> Result<Self> {
        if !(0.0..=180.0).contains(&radius_deg) {
            return Err(LocalizationError::invalid(
                "exclusion radius",
                radius_deg,
                "must be within [0, 180] degrees",
            ));
        }
        Ok(Self { center, radius_deg })
    }

    /// Exclusion region centered on `center` with the default Earth radius.
    pub fn geocenter(center: SkyPosition) -> Self {
        Self {
            center,
            radius_deg: DEFAULT_EARTH_RADIUS_DEG,
        }
    }

    /// The Earth as seen from a spacecraft at `scpos` (meters, Earth-centered inertial).
    ///
    /// The geocenter lies along `-scpos`; the apparent radius is
    /// `asin(R_earth / |scpos|)` for a spherical Earth.
    pub fn from_spacecraft_position(scpos: &[f64]) -> Result<Self> {
        let v = Vector3::from(fixed_length::<3>("scpos", scpos)?);
        let distance = v.norm();
        if !(distance > EARTH_RADIUS_M) {
            return Err(LocalizationError::invalid(
                "spacecraft distance",
                distance,
                "must lie outside the Earth",
            ));
        }
        let radius_deg = (EARTH_RADIUS_M / distance).asin().to_degrees();
        Ok(Self {
            center: SkyPosition::from_uvec(&(-v)),
            radius_deg,
        })
    }

    /// `true` if `pos` lies within the cap (boundary included).
    pub fn contains(&self, pos: &SkyPosition) -> bool {
        self.center.separation_deg(pos) <= self.radius_deg
    }
}

// ── Detectors ───────────────────────────────────────────────────────────────

/// The 12 NaI and 2 BGO detectors of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    N0,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    N8,
    N9,
    NA,
    NB,
    B0,
    B1,
}

impl Detector {
    pub const ALL: [Detector; 14] = [
        Detector::N0,
        Detector::N1,
        Detector::N2,
        Detector::N3,
        Detector::N4,
        Detector::N5,
        Detector::N6,
        Detector::N7,
        Detector::N8,
        Detector::N9,
        Detector::NA,
        Detector::NB,
        Detector::B0,
        Detector::B1,
    ];

    /// Position of this detector in [`Detector::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Detector::N0 => "n0",
            Detector::N1 => "n1",
            Detector::N2 => "n2",
            Detector::N3 => "n3",
            Detector::N4 => "n4",
            Detector::N5 => "n5",
            Detector::N6 => "n6",
            Detector::N7 => "n7",
            Detector::N8 => "n8",
            Detector::N9 => "n9",
            Detector::NA => "na",
            Detector::NB => "nb",
            Detector::B0 => "b0",
            Detector::B1 => "b1",
        }
    }

    pub fn is_nai(self) -> bool {
        !matches!(self, Detector::B0 | Detector::B1)
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Detector {
    type Err = LocalizationError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Detector::ALL
            .into_iter()
            .find(|d| d.short_name() == lower)
            .ok_or_else(|| LocalizationError::UnknownDetector(s.to_string()))
    }
}

/// Sky pointing of each detector, indexed by [`Detector`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct DetectorPointings([Option<SkyPosition>; 14]);

impl DetectorPointings {
    pub fn get(&self, det: Detector) -> Option<SkyPosition> {
        self.0[det.index()]
    }

    pub fn set(&mut self, det: Detector, pointing: SkyPosition) {
        self.0[det.index()] = Some(pointing);
    }

    /// Detectors with a known pointing, in detector order.
    pub fn iter(&self) -> impl Iterator<Item = (Detector, SkyPosition)> + '_ {
        Detector::ALL
            .into_iter()
            .filter_map(|d| self.get(d).map(|p| (d, p)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

// ── Platform context ────────────────────────────────────────────────────────

/// Observation metadata optionally attached to a map.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct PlatformContext {
    /// Sky region occluded by the Earth.
    pub exclusion: Option<ExclusionRegion>,
    /// Position of the Sun at the trigger time.
    pub sun: Option<SkyPosition>,
    pub detectors: DetectorPointings,
    /// Spacecraft attitude quaternion.
    pub quaternion: Option<[f64; 4]>,
    /// Spacecraft position in Earth-centered inertial coordinates (meters).
    pub scpos: Option<[f64; 3]>,
}

impl PlatformContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclusion(mut self, exclusion: ExclusionRegion) -> Self {
        self.exclusion = Some(exclusion);
        self
    }

    /// Attach a geocenter; the radius defaults to [`DEFAULT_EARTH_RADIUS_DEG`].
    pub fn with_geocenter(self, center: SkyPosition, radius_deg: Option<f64>) -> Result<Self> {
        let radius = radius_deg.unwrap_or(DEFAULT_EARTH_RADIUS_DEG);
        Ok(self.with_exclusion(ExclusionRegion::new(center, radius)?))
    }

    pub fn with_sun(mut self, sun: SkyPosition) -> Self {
        self.sun = Some(sun);
        self
    }

    pub fn with_pointing(mut self, det: Detector, pointing: SkyPosition) -> Self {
        self.detectors.set(det, pointing);
        self
    }

    /// Attach the attitude quaternion; `quaternion` must have 4 elements.
    pub fn with_quaternion(mut self, quaternion: &[f64]) -> Result<Self> {
        self.quaternion = Some(fixed_length("quaternion", quaternion)?);
        Ok(self)
    }

    /// Attach the spacecraft position; `scpos` must have 3 elements.
    ///
    /// When no exclusion region is attached yet, the Earth as seen from
    /// `scpos` becomes the exclusion region.
    pub fn with_scpos(mut self, scpos: &[f64]) -> Result<Self> {
        let v = fixed_length("scpos", scpos)?;
        if self.exclusion.is_none() {
            self.exclusion = Some(ExclusionRegion::from_spacecraft_position(scpos)?);
        }
        self.scpos = Some(v);
        Ok(self)
    }

    /// Exclusion radius in effect, if a geocenter is known.
    pub fn exclusion_radius_deg(&self) -> Option<f64> {
        self.exclusion.map(|e| e.radius_deg)
    }
}
