//! Spectral indices for land-cover change
//!
//! Normalized-difference indices computed from Sentinel-2 surface
//! reflectance. All functions operate on single-band rasters aligned on the
//! same grid and return a `Raster<f64>` with NaN as no-data. Negative
//! reflectance is not a physical observation and yields NaN, so every
//! valid output lies in [-1, 1].

use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::Result;
use std::fmt;
use std::str::FromStr;

/// Denominators smaller than this are treated as zero
const ZERO_DENOMINATOR: f64 = 1e-10;

/// Enumeration of the indices computed per acquisition year.
///
/// The declaration order is the band order of an index raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpectralIndex {
    /// Vegetation: NIR against red
    NDVI,
    /// Normalized Difference Built-up Index
    NDBI,
    /// Open water: green against NIR
    NDWI,
    /// Bare Soil Index
    BSI,
}

impl SpectralIndex {
    /// All indices in band order
    pub const ALL: [SpectralIndex; 4] = [
        SpectralIndex::NDVI,
        SpectralIndex::NDBI,
        SpectralIndex::NDWI,
        SpectralIndex::BSI,
    ];

    /// Zero-based band position in an index raster
    pub fn band_index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SpectralIndex::NDVI => "NDVI",
            SpectralIndex::NDBI => "NDBI",
            SpectralIndex::NDWI => "NDWI",
            SpectralIndex::BSI => "BSI",
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SpectralIndex::ALL
            .into_iter()
            .find(|index| index.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown spectral index '{}' (expected NDVI, NDBI, NDWI or BSI)", s))
    }
}

/// Apply `f` to the co-located reflectance samples of `N` aligned bands.
///
/// A cell is NaN when any input is no-data or negative, otherwise whatever
/// `f` returns. The output inherits the first band's grid.
fn per_pixel<const N: usize, F>(bands: [&Raster<f64>; N], f: F) -> Result<Raster<f64>>
where
    F: Fn([f64; N]) -> f64 + Sync,
{
    let first = bands[0];
    for other in &bands[1..] {
        first.ensure_aligned(*other)?;
    }

    let (rows, cols) = first.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let mut px = [0.0; N];
                    for (slot, band) in px.iter_mut().zip(bands) {
                        let v = band.data()[[row, col]];
                        if band.is_nodata(v) || v < 0.0 {
                            return f64::NAN;
                        }
                        *slot = v;
                    }
                    f(px)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    first.with_data(data, Some(f64::NAN))
}

/// `(a - b) / (a + b)`; NaN when the sum vanishes or the ratio leaves
/// [-1, 1]
#[inline]
fn nd_ratio(a: f64, b: f64) -> f64 {
    let sum = a + b;
    if sum.abs() < ZERO_DENOMINATOR {
        return f64::NAN;
    }
    let r = (a - b) / sum;
    if r.is_finite() && r.abs() <= 1.0 {
        r
    } else {
        f64::NAN
    }
}

/// `(a - b) / (a + b)` per cell, always in [-1, 1].
///
/// Cells where either band is no-data or negative, or the sum is zero, are
/// NaN.
pub fn normalized_difference(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<f64>> {
    per_pixel([a, b], |[a, b]| nd_ratio(a, b))
}

/// `(NIR - Red) / (NIR + Red)`. Dense vegetation sits around 0.6-0.9,
/// built-up and bare ground near 0.1-0.2, water below zero.
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// `(SWIR1 - NIR) / (SWIR1 + NIR)`, after Zha et al. (2003); rises when
/// vegetation gives way to impervious surface.
pub fn ndbi(swir1: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(swir1, nir)
}

/// McFeeters (1996) water index, `(Green - NIR) / (Green + NIR)`
pub fn ndwi(green: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(green, nir)
}

/// Bare soil index: `((SWIR1 + Red) - (NIR + Blue))` over their sum
pub fn bsi(swir1: &Raster<f64>, red: &Raster<f64>, nir: &Raster<f64>, blue: &Raster<f64>) -> Result<Raster<f64>> {
    per_pixel([swir1, red, nir, blue], |[sw, r, n, b]| nd_ratio(sw + r, n + b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landshift_core::GeoTransform;

    /// 3x3 band of constant reflectance on a 10 m grid
    fn band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(3, 3, value);
        r.set_transform(GeoTransform::new(260_000.0, 6_345_000.0, 10.0, -10.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_vegetation_has_high_ndvi() {
        let v = ndvi(&band(0.5), &band(0.1)).unwrap().get(1, 1).unwrap();
        assert_relative_eq!(v, 0.4 / 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_water_has_negative_ndvi_and_positive_ndwi() {
        let (green, red, nir) = (band(0.08), band(0.05), band(0.02));
        assert!(ndvi(&nir, &red).unwrap().get(0, 0).unwrap() < 0.0);
        assert!(ndwi(&green, &nir).unwrap().get(0, 0).unwrap() > 0.0);
    }

    #[test]
    fn test_built_up_has_positive_ndbi() {
        let v = ndbi(&band(0.35), &band(0.25)).unwrap().get(2, 0).unwrap();
        assert_relative_eq!(v, 0.1 / 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_bsi_combines_four_bands() {
        let v = bsi(&band(0.4), &band(0.3), &band(0.2), &band(0.1)).unwrap().get(0, 2).unwrap();
        // (0.7 - 0.3) / (0.7 + 0.3)
        assert_relative_eq!(v, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_sum_gives_nan_not_infinity() {
        let out = normalized_difference(&band(0.0), &band(0.0)).unwrap();
        assert!(out.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_missing_input_cell_is_missing_output() {
        let mut nir = band(0.5);
        nir.set_nodata(Some(-9999.0));
        nir.set(0, 1, -9999.0).unwrap();
        let mut blue = band(0.1);
        blue.set(2, 2, f64::NAN).unwrap();

        let v = ndvi(&nir, &band(0.1)).unwrap();
        assert!(v.get(0, 1).unwrap().is_nan());
        assert!(!v.get(0, 0).unwrap().is_nan());

        let soil = bsi(&band(0.4), &band(0.3), &band(0.2), &blue).unwrap();
        assert!(soil.get(2, 2).unwrap().is_nan());
    }

    #[test]
    fn test_negative_reflectance_is_missing() {
        // red slightly below zero after atmospheric correction
        let v = ndvi(&band(0.02), &band(-0.01)).unwrap();
        assert!(v.data().iter().all(|x| x.is_nan()));

        let soil = bsi(&band(0.03), &band(-0.01), &band(0.02), &band(0.01)).unwrap();
        assert!(soil.get(1, 1).unwrap().is_nan());

        assert!(nd_ratio(0.03, -0.02).is_nan());
        assert_relative_eq!(nd_ratio(0.3, 0.0), 1.0);
    }

    #[test]
    fn test_misaligned_bands_are_rejected() {
        let wide = Raster::filled(3, 6, 0.2);
        assert!(normalized_difference(&band(0.2), &wide).is_err());
    }

    #[test]
    fn test_index_names_parse_case_insensitively() {
        assert_eq!("ndvi".parse::<SpectralIndex>().unwrap(), SpectralIndex::NDVI);
        assert_eq!(" Bsi ".parse::<SpectralIndex>().unwrap(), SpectralIndex::BSI);
        assert_eq!(SpectralIndex::BSI.band_index(), 3);
        assert!("EVI".parse::<SpectralIndex>().is_err());
    }
}
