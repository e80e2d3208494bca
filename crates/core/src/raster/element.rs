//! Cell types a raster can hold

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// How cells of a type are stored in a GeoTIFF page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    I8,
    I32,
    F32,
}

/// A value stored in a raster cell.
///
/// Reflectance, index and z-score rasters are floating point and mark
/// missing cells with NaN. Class rasters are small integers whose missing
/// sentinel sits at the far end of the range from every class code: 255
/// for the `u8` urban classes, -128 for the `i8` trend codes. Rasterized
/// zone ids are `i32`.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// On-disk sample type; class codes stay integers
    const SAMPLE_FORMAT: SampleFormat;

    /// Sentinel written into cells that hold no observation
    fn default_nodata() -> Self;

    /// Whether `self` marks a missing cell, given the raster's declared
    /// no-data value
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    fn as_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Lossless-enough conversion; `None` outside the type's range
    fn try_from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

impl RasterElement for u8 {
    const SAMPLE_FORMAT: SampleFormat = SampleFormat::U8;

    fn default_nodata() -> Self {
        u8::MAX
    }

    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        nodata == Some(*self)
    }
}

impl RasterElement for i8 {
    const SAMPLE_FORMAT: SampleFormat = SampleFormat::I8;

    fn default_nodata() -> Self {
        i8::MIN
    }

    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        nodata == Some(*self)
    }
}

impl RasterElement for i32 {
    const SAMPLE_FORMAT: SampleFormat = SampleFormat::I32;

    fn default_nodata() -> Self {
        i32::MIN
    }

    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        nodata == Some(*self)
    }
}

macro_rules! float_element {
    ($t:ty) => {
        impl RasterElement for $t {
            const SAMPLE_FORMAT: SampleFormat = SampleFormat::F32;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                self.is_nan() || nodata.is_some_and(|nd| (self - nd).abs() < <$t>::EPSILON * 100.0)
            }
        }
    };
}

float_element!(f32);
float_element!(f64);
