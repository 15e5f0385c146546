//! # burstmap
//!
//! Probabilistic sky localizations of **gamma-ray bursts** on a HEALPix grid.
//!
//! A [`LocalizationMap`] is a normalized probability distribution of a source
//! position over the celestial sphere, stored per pixel alongside a derived
//! per-pixel significance (`1 - credible level`). On top of it the crate
//! provides credible regions, map algebra, Earth-occultation masking, and
//! Bayesian scoring of spatial association with a point or another map.
//!
//! ## Features
//!
//! - **Credible regions**: greedy descending-probability credible levels
//! - **Map factories**: Gaussian, annulus, polygon, and chi-squared-grid maps
//! - **Map algebra**: products of maps at mixed resolutions, convolution
//!   with calibrated systematic-error models, probability-conserving resampling
//! - **Occultation**: remove the part of a map hidden behind the Earth
//! - **Association**: posterior probability that a localization and a point
//!   or another localization share a source
//! - **Snapshots**: maps serialize with [rkyv](https://docs.rs/rkyv)
//!
//! ## Example
//!
//! ```no_run
//! use burstmap::{LocalizationMap, SkyPosition, SystematicModel};
//!
//! // A 5-degree statistical error circle, widened by the systematic model
//! let stat = LocalizationMap::from_gaussian(SkyPosition::new(180.0, 0.0), 5.0, None).unwrap();
//! let map = stat.convolve_model(SystematicModel::GbutsO3).unwrap();
//!
//! println!("90% region: {:.1} sq deg", map.area_within(0.9).unwrap());
//!
//! // Chance that a candidate counterpart at (182, 1) is the same source
//! let p = map
//!     .point_association(&SkyPosition::new(182.0, 1.0), 0.5, false)
//!     .unwrap();
//! println!("P(assoc) = {p:.3}");
//!
//! map.save_to_file("grb_map.rkyv").unwrap();
//! let map = LocalizationMap::load_from_file("grb_map.rkyv").unwrap();
//! ```
//!
//! ## Pixelization
//!
//! The grid is the HEALPix RING scheme with `nside` a power of two up to
//! `2^14`. Every map array has `12 * nside^2` entries. Resolution is the cost
//! knob of the whole crate: memory grows as `nside^2`, credible-level sorting
//! as `nside^2 log nside`, and direct Gaussian smoothing as
//! `nside^4 sigma^2` until it switches to a coarser working grid.

pub mod association;
pub mod chi2grid;
pub mod coords;
pub mod credible;
pub mod error;
mod factory;
pub mod grid;
pub mod map;
pub mod occlusion;
pub mod platform;
pub mod systematics;

pub use association::posterior;
pub use chi2grid::Chi2Grid;
pub use coords::SkyPosition;
pub use error::{LocalizationError, Result};
pub use factory::{CHISQ_DEFAULT_NSIDE, CHISQ_LORES_NSIDE, VERTICES_DEFAULT_NSIDE};
pub use grid::HealpixGrid;
pub use map::{LocalizationMap, MultiplyConfig, Primary, SampleKind, SkyGrid};
pub use occlusion::OcclusionMask;
pub use platform::{Detector, DetectorPointings, ExclusionRegion, PlatformContext};
pub use systematics::{GaussianMixture, GrbClass, SystematicModel};
