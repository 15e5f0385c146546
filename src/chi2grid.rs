//! Chi-squared sky grids produced by the localization fit.
//!
//! The fit evaluates a chi-squared statistic on an irregular set of sky
//! points, each known both in spacecraft coordinates (azimuth, zenith) and in
//! equatorial coordinates (RA, Dec). [`LocalizationMap::from_chisq_grid`](crate::LocalizationMap::from_chisq_grid)
//! turns such a grid into a map.
//!
//! # Text format
//!
//! The first line holds the number of points. Each following line holds at
//! least six whitespace-separated columns:
//!
//! ```text
//! azimuth  zenith  chisq  <unused>  ra  dec
//! ```

use anyhow::Context;

use crate::error::{fixed_length, LocalizationError, Result};

/// Chi-squared values on an irregular grid of sky points (degrees).
#[derive(Debug, Clone, PartialEq)]
pub struct Chi2Grid {
    azimuth: Vec<f64>,
    zenith: Vec<f64>,
    ra: Vec<f64>,
    dec: Vec<f64>,
    chisq: Vec<f64>,
    trigtime: Option<f64>,
    quaternion: Option<[f64; 4]>,
    scpos: Option<[f64; 3]>,
}

impl Chi2Grid {
    /// Build a grid from parallel arrays, which must be non-empty and of equal length.
    pub fn from_data(
        azimuth: Vec<f64>,
        zenith: Vec<f64>,
        ra: Vec<f64>,
        dec: Vec<f64>,
        chisq: Vec<f64>,
    ) -> Result<Self> {
        let n = azimuth.len();
        if n == 0 {
            return Err(LocalizationError::EmptyGrid);
        }
        for (name, len) in [
            ("zenith", zenith.len()),
            ("ra", ra.len()),
            ("dec", dec.len()),
            ("chisq", chisq.len()),
        ] {
            if len != n {
                return Err(LocalizationError::LengthMismatch {
                    name,
                    expected: n,
                    actual: len,
                });
            }
        }
        Ok(Self {
            azimuth,
            zenith,
            ra,
            dec,
            chisq,
            trigtime: None,
            quaternion: None,
            scpos: None,
        })
    }

    /// Parse the text format described in the module docs.
    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let mut lines = data.lines().filter(|l| !l.trim().is_empty());
        let numpts: usize = lines
            .next()
            .context("chi2grid is empty")?
            .trim()
            .parse()
            .context("chi2grid header is not a point count")?;

        let mut cols: [Vec<f64>; 5] = Default::default();
        for (i, line) in lines.take(numpts).enumerate() {
            let fields: Vec<f64> = line
                .split_whitespace()
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("chi2grid line {}: non-numeric field", i + 2))?;
            anyhow::ensure!(
                fields.len() >= 6,
                "chi2grid line {}: expected 6 columns, got {}",
                i + 2,
                fields.len()
            );
            // az, zen, chisq, ra, dec
            for (col, idx) in cols.iter_mut().zip([0, 1, 2, 4, 5]) {
                col.push(fields[idx]);
            }
        }
        anyhow::ensure!(
            cols[0].len() == numpts,
            "chi2grid declares {} points but holds {}",
            numpts,
            cols[0].len()
        );

        let [az, zen, chisq, ra, dec] = cols;
        Ok(Self::from_data(az, zen, ra, dec, chisq)?)
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn with_trigtime(mut self, trigtime: f64) -> Self {
        self.trigtime = Some(trigtime);
        self
    }

    /// Attach the attitude quaternion; must have 4 elements.
    pub fn with_quaternion(mut self, quaternion: &[f64]) -> Result<Self> {
        self.quaternion = Some(fixed_length("quaternion", quaternion)?);
        Ok(self)
    }

    /// Attach the spacecraft position (meters); must have 3 elements.
    pub fn with_scpos(mut self, scpos: &[f64]) -> Result<Self> {
        self.scpos = Some(fixed_length("scpos", scpos)?);
        Ok(self)
    }

    pub fn numpts(&self) -> usize {
        self.azimuth.len()
    }

    pub fn azimuth(&self) -> &[f64] {
        &self.azimuth
    }

    pub fn zenith(&self) -> &[f64] {
        &self.zenith
    }

    pub fn ra(&self) -> &[f64] {
        &self.ra
    }

    pub fn dec(&self) -> &[f64] {
        &self.dec
    }

    pub fn chisq(&self) -> &[f64] {
        &self.chisq
    }

    pub fn trigtime(&self) -> Option<f64> {
        self.trigtime
    }

    pub fn quaternion(&self) -> Option<[f64; 4]> {
        self.quaternion
    }

    pub fn scpos(&self) -> Option<[f64; 3]> {
        self.scpos
    }

    /// Significance of each point: `1 - CDF(Δχ², 2 dof)` with `Δχ²` relative
    /// to the grid minimum.
    ///
    /// For two degrees of freedom the survival function is `exp(-Δχ²/2)`.
    pub fn significance(&self) -> Vec<f64> {
        let min = self.min_chisq();
        self.chisq.iter().map(|c| (-(c - min) / 2.0).exp()).collect()
    }

    /// Likelihood of each point scaled so the best point is 1.
    pub fn relative_likelihood(&self) -> Vec<f64> {
        let loglike: Vec<f64> = self.chisq.iter().map(|c| -c / 2.0).collect();
        let max = loglike.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        loglike.iter().map(|l| (l - max).exp()).collect()
    }

    fn min_chisq(&self) -> f64 {
        self.chisq.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "3
  10.0  20.0  105.0  0.0  120.0  -5.0
  15.0  25.0  100.0  0.0  125.0  -10.0
  20.0  30.0  108.0  0.0  130.0  -15.0
";

    #[test]
    fn parse_columns() {
        let grid = Chi2Grid::parse(SAMPLE).unwrap();
        assert_eq!(grid.numpts(), 3);
        assert_eq!(grid.azimuth(), &[10.0, 15.0, 20.0]);
        assert_eq!(grid.chisq(), &[105.0, 100.0, 108.0]);
        assert_eq!(grid.ra(), &[120.0, 125.0, 130.0]);
        assert_eq!(grid.dec(), &[-5.0, -10.0, -15.0]);
        assert_eq!(grid.trigtime(), None);
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!(Chi2Grid::parse("").is_err());
        assert!(Chi2Grid::parse("2\n1 2 3 4 5 6\n").is_err());
        assert!(Chi2Grid::parse("1\n1 2 3 4 5\n").is_err());
        assert!(Chi2Grid::parse("1\n1 2 x 4 5 6\n").is_err());
        assert!(Chi2Grid::parse("0\n").is_err());
    }

    #[test]
    fn significance_is_relative_to_minimum() {
        let grid = Chi2Grid::parse(SAMPLE).unwrap();
        let sig = grid.significance();
        assert_eq!(sig[1], 1.0);
        assert!((sig[0] - (-2.5f64).exp()).abs() < 1e-15);
        assert!((sig[2] - (-4.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn validates_lengths_and_vectors() {
        assert_eq!(
            Chi2Grid::from_data(vec![], vec![], vec![], vec![], vec![]),
            Err(LocalizationError::EmptyGrid)
        );
        assert!(matches!(
            Chi2Grid::from_data(vec![1.0], vec![1.0], vec![1.0, 2.0], vec![1.0], vec![1.0]),
            Err(LocalizationError::LengthMismatch { name: "ra", .. })
        ));
        let grid = Chi2Grid::parse(SAMPLE).unwrap();
        assert!(matches!(
            grid.clone().with_quaternion(&[1.0, 0.0]),
            Err(LocalizationError::VectorLength { name: "quaternion", expected: 4, actual: 2 })
        ));
        assert!(matches!(
            grid.clone().with_scpos(&[1.0, 0.0, 0.0, 0.0]),
            Err(LocalizationError::VectorLength { name: "scpos", expected: 3, actual: 4 })
        ));
        let grid = grid
            .with_trigtime(1.5)
            .with_scpos(&[7.0e6, 0.0, 0.0])
            .unwrap();
        assert_eq!(grid.scpos(), Some([7.0e6, 0.0, 0.0]));
        assert_eq!(grid.trigtime(), Some(1.5));
    }
}
