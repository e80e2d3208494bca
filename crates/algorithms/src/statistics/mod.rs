//! Zonal aggregation of change rasters
//!
//! - **rasterize**: burn zone polygons onto a raster grid
//! - **zonal**: continuous statistics per zone (count, mean, std, min, max, median)
//! - **change_area**: class counts, hectares and percentages per zone

mod change_area;
mod rasterize;
mod zonal;

pub use change_area::{
    pixel_area_hectares, summarize_changes, zonal_class_counts, ChangeSummary, ClassScheme,
    SchemeClass, ZoneChangeRecord, M2_PER_HECTARE,
};
pub use rasterize::{rasterize_zones, OUTSIDE_ZONES};
pub use zonal::{zonal_statistics_by_zone, ZoneStatisticsRecord};
