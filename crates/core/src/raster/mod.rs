//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod stack;

pub use element::{RasterElement, SampleFormat};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics, GRID_TOLERANCE};
pub use stack::BandStack;
