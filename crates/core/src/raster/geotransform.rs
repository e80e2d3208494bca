//! North-up pixel grid placement

use serde::{Deserialize, Serialize};

/// Placement of a north-up raster grid in its CRS.
///
/// Cell `(row, col)` spans `origin_x + col * pixel_width` to
/// `origin_x + (col + 1) * pixel_width` horizontally and likewise with
/// `pixel_height` (negative for north-up) vertically. Composites exported
/// for the pipeline never carry rotation terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Easting of the upper-left corner
    pub origin_x: f64,
    /// Northing of the upper-left corner
    pub origin_y: f64,
    /// Signed cell extent along columns
    pub pixel_width: f64,
    /// Signed cell extent along rows
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Map position of a fractional pixel offset
    fn offset(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Map coordinates of the centre of cell `(row, col)`.
    ///
    /// Zones are burned by testing these centres, so a cell belongs to a
    /// polygon exactly when its centre does.
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.offset(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Horizontal cell size
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Ground area of one cell in squared CRS units
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// Whether both transforms place cells at the same positions, allowing
    /// `tolerance` CRS units of drift per coefficient.
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        [
            self.origin_x - other.origin_x,
            self.origin_y - other.origin_y,
            self.pixel_width - other.pixel_width,
            self.pixel_height - other.pixel_height,
        ]
        .iter()
        .all(|d| d.abs() <= tolerance)
    }

    /// Extent `(min_x, min_y, max_x, max_y)` covered by `cols` x `rows` cells
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (ax, ay) = self.offset(0.0, 0.0);
        let (bx, by) = self.offset(cols as f64, rows as f64);
        (ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
