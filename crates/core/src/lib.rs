//! # landshift core
//!
//! Core types and I/O for the landshift land-cover change pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced single-band grid
//! - `BandStack`: ordered set of aligned bands sharing one grid
//! - `GeoTransform` and `CRS`: georeferencing
//! - `ZoneLayer`: identified polygons used for zonal aggregation
//! - GeoTIFF (single and multi-band) and GeoJSON readers/writers

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BandStack, GeoTransform, Raster, RasterElement};
pub use vector::{Zone, ZoneLayer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandStack, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{Zone, ZoneLayer};
}
