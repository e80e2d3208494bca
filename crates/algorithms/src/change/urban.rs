//! Rule-based urban-change classification
//!
//! Combines the NDVI, NDBI and NDWI deltas between two acquisitions into
//! one of five mutually exclusive classes. Rules are evaluated in order and
//! the first match wins:
//!
//! | code | class              | rule                                             |
//! |------|--------------------|--------------------------------------------------|
//! | 1    | New urbanization   | ΔNDBI > builtup_gain and ΔNDVI < vegetation_loss |
//! | 2    | Vegetation loss    | ΔNDVI < vegetation_loss                          |
//! | 3    | Vegetation gain    | ΔNDVI > vegetation_gain                          |
//! | 4    | New water body     | NDWI₂ > water_presence and NDWI₁ ≤ no_water      |
//! | 0    | No change          | otherwise                                        |
//!
//! Pixels where any of the six inputs is not finite get [`URBAN_NODATA`].

use crate::imagery::IndexStack;
use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::Result;
use std::fmt;

/// No-data code of the classification raster
pub const URBAN_NODATA: u8 = 255;

/// Urban-change classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum UrbanChangeClass {
    NoChange = 0,
    NewUrbanization = 1,
    VegetationLoss = 2,
    VegetationGain = 3,
    NewWater = 4,
}

impl UrbanChangeClass {
    pub const ALL: [UrbanChangeClass; 5] = [
        UrbanChangeClass::NoChange,
        UrbanChangeClass::NewUrbanization,
        UrbanChangeClass::VegetationLoss,
        UrbanChangeClass::VegetationGain,
        UrbanChangeClass::NewWater,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Column-friendly name used in reports
    pub fn key(self) -> &'static str {
        match self {
            UrbanChangeClass::NoChange => "no_change",
            UrbanChangeClass::NewUrbanization => "urbanization",
            UrbanChangeClass::VegetationLoss => "vegetation_loss",
            UrbanChangeClass::VegetationGain => "vegetation_gain",
            UrbanChangeClass::NewWater => "new_water",
        }
    }
}

impl fmt::Display for UrbanChangeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UrbanChangeClass::NoChange => "No change",
            UrbanChangeClass::NewUrbanization => "New urbanization",
            UrbanChangeClass::VegetationLoss => "Vegetation loss",
            UrbanChangeClass::VegetationGain => "Vegetation gain",
            UrbanChangeClass::NewWater => "New water body",
        };
        f.write_str(label)
    }
}

/// Decision thresholds of the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct UrbanChangeThresholds {
    /// ΔNDBI must exceed this for new urbanization
    pub builtup_gain: f64,
    /// ΔNDVI below this is vegetation loss (negative)
    pub vegetation_loss: f64,
    /// ΔNDVI above this is vegetation gain
    pub vegetation_gain: f64,
    /// NDWI at T2 above this means water is present
    pub water_presence: f64,
    /// NDWI at T1 at or below this means there was no water
    pub no_water: f64,
    /// When set, rules 1 and 2 also require NDVI at T1 above this
    pub prior_vegetation: Option<f64>,
    /// When set, rule 3 also requires NDVI at T2 above this
    pub vegetated_after: Option<f64>,
}

impl Default for UrbanChangeThresholds {
    fn default() -> Self {
        Self {
            builtup_gain: 0.1,
            vegetation_loss: -0.1,
            vegetation_gain: 0.1,
            water_presence: 0.0,
            no_water: 0.0,
            prior_vegetation: None,
            vegetated_after: None,
        }
    }
}

/// Index values of one pixel at one date
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexSample {
    pub ndvi: f64,
    pub ndbi: f64,
    pub ndwi: f64,
}

impl IndexSample {
    fn is_valid(&self) -> bool {
        self.ndvi.is_finite() && self.ndbi.is_finite() && self.ndwi.is_finite()
    }
}

/// Classify one pixel; `None` when any input is not finite
pub fn classify_pixel(
    t1: IndexSample,
    t2: IndexSample,
    thresholds: &UrbanChangeThresholds,
) -> Option<UrbanChangeClass> {
    if !t1.is_valid() || !t2.is_valid() {
        return None;
    }

    let d_ndvi = t2.ndvi - t1.ndvi;
    let d_ndbi = t2.ndbi - t1.ndbi;

    let was_vegetated = thresholds.prior_vegetation.map_or(true, |min| t1.ndvi > min);
    let is_vegetated = thresholds.vegetated_after.map_or(true, |min| t2.ndvi > min);

    let class = if was_vegetated && d_ndbi > thresholds.builtup_gain && d_ndvi < thresholds.vegetation_loss {
        UrbanChangeClass::NewUrbanization
    } else if was_vegetated && d_ndvi < thresholds.vegetation_loss {
        UrbanChangeClass::VegetationLoss
    } else if is_vegetated && d_ndvi > thresholds.vegetation_gain {
        UrbanChangeClass::VegetationGain
    } else if t2.ndwi > thresholds.water_presence && t1.ndwi <= thresholds.no_water {
        UrbanChangeClass::NewWater
    } else {
        UrbanChangeClass::NoChange
    };

    Some(class)
}

/// Classify every pixel of two aligned acquisitions
///
/// Output is a `Raster<u8>` with codes 0-4 and [`URBAN_NODATA`] as no-data.
pub fn urban_change_classification(
    t1: &IndexStack,
    t2: &IndexStack,
    thresholds: &UrbanChangeThresholds,
) -> Result<Raster<u8>> {
    t1.ensure_aligned(t2)?;

    let (rows, cols) = t1.shape();
    let (v1, b1, w1) = (t1.ndvi().data(), t1.ndbi().data(), t1.ndwi().data());
    let (v2, b2, w2) = (t2.ndvi().data(), t2.ndbi().data(), t2.ndwi().data());

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![URBAN_NODATA; cols];
            for col in 0..cols {
                let before = IndexSample {
                    ndvi: v1[[row, col]],
                    ndbi: b1[[row, col]],
                    ndwi: w1[[row, col]],
                };
                let after = IndexSample {
                    ndvi: v2[[row, col]],
                    ndbi: b2[[row, col]],
                    ndwi: w2[[row, col]],
                };

                if let Some(class) = classify_pixel(before, after, thresholds) {
                    row_data[col] = class.code();
                }
            }
            row_data
        })
        .collect();

    t1.ndvi().with_data(data, Some(URBAN_NODATA))
}

/// Pixel counts per class code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassHistogram {
    pub counts: [usize; 5],
    pub nodata: usize,
}

impl ClassHistogram {
    pub fn count(&self, class: UrbanChangeClass) -> usize {
        self.counts[class.code() as usize]
    }

    pub fn valid(&self) -> usize {
        self.counts.iter().sum()
    }
}

pub fn class_histogram(classes: &Raster<u8>) -> ClassHistogram {
    classes.data().iter().fold(ClassHistogram::default(), |mut acc, &code| {
        match UrbanChangeClass::from_code(code) {
            Some(class) => acc.counts[class.code() as usize] += 1,
            None => acc.nodata += 1,
        }
        acc
    })
}
