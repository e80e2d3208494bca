//! Multi-band rasters

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};

/// An ordered set of `f64` bands that share one grid.
///
/// Every band is checked against the first with [`Raster::ensure_aligned`]
/// on construction, so consumers can index pixels across bands freely.
#[derive(Debug, Clone)]
pub struct BandStack {
    bands: Vec<Raster<f64>>,
    names: Vec<String>,
}

impl BandStack {
    /// Build a stack from bands; names default to `band_1`, `band_2`, ...
    pub fn new(bands: Vec<Raster<f64>>) -> Result<Self> {
        let names = (1..=bands.len()).map(|i| format!("band_{}", i)).collect();
        Self::with_names(bands, names)
    }

    /// Build a stack with explicit band names
    pub fn with_names(bands: Vec<Raster<f64>>, names: Vec<String>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::BandCount {
                expected: 1,
                actual: 0,
            });
        }
        if names.len() != bands.len() {
            return Err(Error::InvalidParameter {
                name: "names",
                value: names.len().to_string(),
                reason: format!("stack has {} bands", bands.len()),
            });
        }

        let first = &bands[0];
        for band in &bands[1..] {
            first.ensure_aligned(band)?;
        }

        Ok(Self { bands, names })
    }

    /// Number of bands
    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    /// Band by zero-based position
    pub fn band(&self, index: usize) -> Result<&Raster<f64>> {
        self.bands.get(index).ok_or(Error::BandCount {
            expected: index + 1,
            actual: self.bands.len(),
        })
    }

    /// Band by name
    pub fn band_named(&self, name: &str) -> Option<&Raster<f64>> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| &self.bands[i])
    }

    /// Band names in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All bands in order
    pub fn bands(&self) -> &[Raster<f64>] {
        &self.bands
    }

    /// Consume the stack and return its bands
    pub fn into_bands(self) -> Vec<Raster<f64>> {
        self.bands
    }

    /// Fail with [`Error::BandCount`] unless the stack has at least `expected` bands
    pub fn require_bands(&self, expected: usize) -> Result<()> {
        if self.bands.len() < expected {
            return Err(Error::BandCount {
                expected,
                actual: self.bands.len(),
            });
        }
        Ok(())
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].shape()
    }

    /// Shared geotransform
    pub fn transform(&self) -> &GeoTransform {
        self.bands[0].transform()
    }

    /// Shared CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.bands[0].crs()
    }

    /// First band, carrying the stack's grid metadata
    pub fn template(&self) -> &Raster<f64> {
        &self.bands[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(3, 3, value);
        r.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        r
    }

    #[test]
    fn test_stack_access() {
        let stack = BandStack::with_names(
            vec![band(1.0), band(2.0)],
            vec!["NDVI".into(), "NDBI".into()],
        )
        .unwrap();

        assert_eq!(stack.num_bands(), 2);
        assert_eq!(stack.band(1).unwrap().get(0, 0).unwrap(), 2.0);
        assert_eq!(stack.band_named("ndbi").unwrap().get(0, 0).unwrap(), 2.0);
        assert!(stack.band(2).is_err());
        assert!(stack.require_bands(6).is_err());
    }

    #[test]
    fn test_stack_rejects_misaligned_band() {
        let mut shifted = band(1.0);
        shifted.set_transform(GeoTransform::new(10.0, 30.0, 10.0, -10.0));

        let result = BandStack::new(vec![band(1.0), shifted]);
        assert!(matches!(result, Err(Error::GridMismatch(_))));
    }

    #[test]
    fn test_empty_stack_rejected() {
        assert!(BandStack::new(Vec::new()).is_err());
    }
}
