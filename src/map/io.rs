//! rkyv snapshots of localization maps.
//!
//! A snapshot holds the two pixel arrays and the metadata verbatim. Loading
//! does not trust the bytes: the pixel count, array lengths, and
//! normalization are checked again before a map is returned.

use anyhow::Context;
use tracing::info;

use super::{normalized, LocalizationMap};
use crate::error::LocalizationError;
use crate::grid::HealpixGrid;

/// Largest tolerated deviation of a loaded probability total from one.
const LOAD_NORMALIZATION_TOLERANCE: f64 = 1e-6;

impl LocalizationMap {
    /// Serialize the map to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {}", e))?;
        Ok(bytes.to_vec())
    }

    /// Deserialize and validate a map from rkyv bytes.
    pub fn from_rkyv_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let map = rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;
        Ok(map.validated()?)
    }

    /// Save the map to a file using rkyv.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let bytes = self.to_rkyv_bytes()?;
        std::fs::write(path, &bytes).with_context(|| format!("writing {}", path))?;
        info!("Saved localization map to {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    /// Load a map from an rkyv file.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path))?;
        let map = Self::from_rkyv_bytes(&bytes).with_context(|| format!("loading {}", path))?;
        info!(
            "Loaded localization map: nside={}, trigtime={}",
            map.nside, map.trigtime
        );
        Ok(map)
    }

    /// Check the invariants of a map whose fields did not come from a constructor.
    fn validated(mut self) -> Result<Self, LocalizationError> {
        let grid = HealpixGrid::new(self.nside)?;
        if self.probability.len() != grid.npix() {
            return Err(LocalizationError::LengthMismatch {
                name: "probability",
                expected: grid.npix(),
                actual: self.probability.len(),
            });
        }
        if self.significance.len() != grid.npix() {
            return Err(LocalizationError::LengthMismatch {
                name: "significance",
                expected: grid.npix(),
                actual: self.significance.len(),
            });
        }
        if let Some(&p) = self.probability.iter().find(|p| !(**p >= 0.0)) {
            return Err(LocalizationError::invalid(
                "probability",
                p,
                "pixel probabilities must be non-negative",
            ));
        }
        let total: f64 = self.probability.iter().sum();
        if (total - 1.0).abs() > LOAD_NORMALIZATION_TOLERANCE {
            return Err(LocalizationError::invalid(
                "probability total",
                total,
                "must sum to 1",
            ));
        }
        if let Some(&s) = self.significance.iter().find(|s| !(0.0..=1.0).contains(*s)) {
            return Err(LocalizationError::invalid(
                "significance",
                s,
                "must lie within [0, 1]",
            ));
        }
        self.probability = normalized(self.probability)?;
        Ok(self)
    }
}
