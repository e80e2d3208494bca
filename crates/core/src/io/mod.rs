//! I/O operations for reading and writing geospatial data

mod native;

pub use native::{read_geotiff, read_geotiff_bands, write_geotiff, write_geotiff_bands, GeoTiffOptions};
