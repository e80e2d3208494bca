//! Per-year index computation from a Sentinel-2 reflectance composite
//!
//! A reflectance composite is a [`BandStack`] with bands ordered Blue,
//! Green, Red, NIR, SWIR1, SWIR2. The result is an [`IndexStack`] holding
//! NDVI, NDBI, NDWI and BSI on the composite's grid.

use crate::imagery::indices::{bsi, ndbi, ndvi, ndwi, SpectralIndex};
use crate::maybe_rayon::*;
use landshift_core::raster::{BandStack, Raster, RasterStatistics};
use landshift_core::{Error, Result};

/// Band positions in a reflectance composite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectanceBand {
    Blue = 0,
    Green = 1,
    Red = 2,
    Nir = 3,
    Swir1 = 4,
    Swir2 = 5,
}

/// Number of bands a reflectance composite must carry
pub const REFLECTANCE_BANDS: usize = 6;

/// Integer L2A products store reflectance multiplied by this factor
pub const L2A_SCALE: f64 = 10_000.0;

/// How raw band values map to reflectance
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ReflectanceScale {
    /// Divide by [`L2A_SCALE`] when the first band's top-left 10x10 window
    /// holds a value above 1.5, otherwise keep values as-is
    #[default]
    Auto,
    /// Divide every band by a fixed factor
    Fixed(f64),
}

impl ReflectanceScale {
    /// Resolve the division factor for a composite
    pub fn factor(self, stack: &BandStack) -> Result<f64> {
        match self {
            ReflectanceScale::Fixed(f) if f > 0.0 && f.is_finite() => Ok(f),
            ReflectanceScale::Fixed(f) => Err(Error::InvalidParameter {
                name: "reflectance_scale",
                value: f.to_string(),
                reason: "must be a positive finite number".to_string(),
            }),
            ReflectanceScale::Auto => {
                let first = stack.band(0)?;
                let (rows, cols) = first.shape();
                let sample_max = first
                    .data()
                    .slice(ndarray::s![..rows.min(10), ..cols.min(10)])
                    .iter()
                    .copied()
                    .filter(|v| v.is_finite())
                    .fold(f64::NEG_INFINITY, f64::max);

                Ok(if sample_max > 1.5 { L2A_SCALE } else { 1.0 })
            }
        }
    }
}

/// Parameters for index computation
#[derive(Debug, Clone)]
pub struct IndexParams {
    pub scale: ReflectanceScale,
    /// Treat pixels whose Blue..SWIR1 values sum to zero as outside the
    /// acquisition footprint
    pub mask_zero_fill: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            scale: ReflectanceScale::Auto,
            mask_zero_fill: true,
        }
    }
}

/// The four spectral indices of one acquisition, on one grid
#[derive(Debug, Clone)]
pub struct IndexStack {
    stack: BandStack,
    /// Factor raw values were divided by (1 when already reflectance)
    pub scale_factor: f64,
    /// Pixels dropped as zero fill
    pub masked_pixels: usize,
}

impl IndexStack {
    /// Wrap four aligned index rasters in band order
    pub fn new(ndvi: Raster<f64>, ndbi: Raster<f64>, ndwi: Raster<f64>, bsi: Raster<f64>) -> Result<Self> {
        let names = SpectralIndex::ALL.iter().map(|i| i.name().to_string()).collect();
        Ok(Self {
            stack: BandStack::with_names(vec![ndvi, ndbi, ndwi, bsi], names)?,
            scale_factor: 1.0,
            masked_pixels: 0,
        })
    }

    /// Interpret a stack read back from disk.
    ///
    /// Bands are matched by name when every index name is present,
    /// otherwise by position (the first four bands).
    pub fn from_band_stack(stack: BandStack) -> Result<Self> {
        stack.require_bands(SpectralIndex::ALL.len())?;

        let by_name: Option<Vec<Raster<f64>>> = SpectralIndex::ALL
            .iter()
            .map(|i| stack.band_named(i.name()).cloned())
            .collect();

        let mut bands = match by_name {
            Some(bands) => bands,
            None => stack.into_bands().into_iter().take(SpectralIndex::ALL.len()).collect(),
        };

        for band in &mut bands {
            band.set_nodata(Some(f64::NAN));
        }

        let mut it = bands.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(a), Some(b), Some(c), Some(d)) => Self::new(a, b, c, d),
            _ => Err(Error::BandCount {
                expected: SpectralIndex::ALL.len(),
                actual: 0,
            }),
        }
    }

    pub fn get(&self, index: SpectralIndex) -> &Raster<f64> {
        &self.stack.bands()[index.band_index()]
    }

    pub fn ndvi(&self) -> &Raster<f64> {
        self.get(SpectralIndex::NDVI)
    }

    pub fn ndbi(&self) -> &Raster<f64> {
        self.get(SpectralIndex::NDBI)
    }

    pub fn ndwi(&self) -> &Raster<f64> {
        self.get(SpectralIndex::NDWI)
    }

    pub fn bsi(&self) -> &Raster<f64> {
        self.get(SpectralIndex::BSI)
    }

    /// The underlying named band stack (for writing)
    pub fn as_band_stack(&self) -> &BandStack {
        &self.stack
    }

    pub fn shape(&self) -> (usize, usize) {
        self.stack.shape()
    }

    /// Check that another acquisition lies on the same grid
    pub fn ensure_aligned(&self, other: &IndexStack) -> Result<()> {
        self.stack.template().ensure_aligned(other.stack.template())
    }
}

/// Compute NDVI, NDBI, NDWI and BSI from a reflectance composite
///
/// Bands beyond the sixth are ignored; fewer than six is an error. No-data
/// in any input band, zero fill and zero denominators all become NaN.
pub fn compute_indices(reflectance: &BandStack, params: &IndexParams) -> Result<IndexStack> {
    reflectance.require_bands(REFLECTANCE_BANDS)?;

    let factor = params.scale.factor(reflectance)?;
    let fill = if params.mask_zero_fill {
        zero_fill_mask(reflectance)?
    } else {
        vec![false; reflectance.template().len()]
    };
    let masked_pixels = fill.iter().filter(|&&m| m).count();

    let band = |b: ReflectanceBand| -> Result<Raster<f64>> {
        to_reflectance(reflectance.band(b as usize)?, factor, &fill)
    };
    let blue = band(ReflectanceBand::Blue)?;
    let green = band(ReflectanceBand::Green)?;
    let red = band(ReflectanceBand::Red)?;
    let nir = band(ReflectanceBand::Nir)?;
    let swir1 = band(ReflectanceBand::Swir1)?;

    let mut stack = IndexStack::new(
        ndvi(&nir, &red)?,
        ndbi(&swir1, &nir)?,
        ndwi(&green, &nir)?,
        bsi(&swir1, &red, &nir, &blue)?,
    )?;
    stack.scale_factor = factor;
    stack.masked_pixels = masked_pixels;
    Ok(stack)
}

/// Row-major mask of pixels whose Blue..SWIR1 values sum to exactly zero
pub fn zero_fill_mask(reflectance: &BandStack) -> Result<Vec<bool>> {
    reflectance.require_bands(ReflectanceBand::Swir1 as usize + 1)?;

    let (rows, cols) = reflectance.shape();
    let bands: Vec<_> = reflectance.bands()[..=ReflectanceBand::Swir1 as usize]
        .iter()
        .map(|b| b.data())
        .collect();

    let mask = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| bands.iter().map(|b| b[[row, col]]).sum::<f64>() == 0.0)
                .collect::<Vec<bool>>()
        })
        .collect();

    Ok(mask)
}

fn to_reflectance(band: &Raster<f64>, factor: f64, fill: &[bool]) -> Result<Raster<f64>> {
    let (rows, cols) = band.shape();
    let src = band.data();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let v = src[[row, col]];
                    if fill[row * cols + col] || band.is_nodata(v) {
                        f64::NAN
                    } else {
                        v / factor
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    band.with_data(data, Some(f64::NAN))
}

/// Summary statistics of one index band
#[derive(Debug, Clone, PartialEq)]
pub struct BandSummary {
    pub index: SpectralIndex,
    pub stats: RasterStatistics,
}

/// Min, max, mean, population std and valid/no-data counts per index
pub fn band_summary(stack: &IndexStack) -> Vec<BandSummary> {
    SpectralIndex::ALL
        .iter()
        .map(|&index| BandSummary {
            index,
            stats: stack.get(index).statistics(),
        })
        .collect()
}
