//! # landshift algorithms
//!
//! Pure raster algorithms of the land-cover change pipeline.
//!
//! ## Algorithm Categories
//!
//! - **imagery**: NDVI, NDBI, NDWI, BSI and per-year index stacks
//! - **change**: difference with gain/loss trend, urban-change classifier, temporal anomaly
//! - **statistics**: zone rasterization, zonal class counts and continuous zonal statistics
//!
//! Row-wise work runs on rayon when the `parallel` feature is enabled.

pub mod change;
pub mod imagery;
mod maybe_rayon;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{
        index_difference, raster_difference, temporal_anomaly, urban_change_classification,
        AnomalyParams, DifferenceParams, DifferenceResult, UrbanChangeClass, UrbanChangeThresholds,
    };
    pub use crate::imagery::{
        band_summary, compute_indices, normalized_difference, IndexParams, IndexStack,
        ReflectanceScale, SpectralIndex,
    };
    pub use crate::statistics::{
        pixel_area_hectares, rasterize_zones, summarize_changes, zonal_class_counts,
        zonal_statistics_by_zone, ChangeSummary, ClassScheme, ZoneChangeRecord, ZoneStatisticsRecord,
    };
    pub use landshift_core::prelude::*;
}
