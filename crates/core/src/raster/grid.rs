//! The georeferenced single-band grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// Allowed drift, in CRS units, between the transforms of rasters that are
/// meant to share a grid. Float round-trips through GeoTIFF tags move the
/// origin by far less than this.
pub const GRID_TOLERANCE: f64 = 1e-6;

/// One band of cells laid out row-major on a north-up grid.
///
/// ```ignore
/// use landshift_core::Raster;
///
/// let mut ndvi: Raster<f64> = Raster::filled(2, 2, f64::NAN);
/// ndvi.set(0, 1, 0.42)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster on the unit grid
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::zero())
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Raster over row-major `data`, which must hold `rows * cols` cells
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), data).map_err(|_| Error::InvalidDimensions {
            width: cols,
            height: rows,
        })?;
        Ok(Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// Raster of another cell type placed on this raster's grid.
    ///
    /// Derived products (indices, deltas, class codes) are built this way
    /// so they inherit the transform and CRS of their inputs.
    pub fn with_data<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let mut out = Raster::from_vec(data, self.rows(), self.cols())?;
        out.transform = self.transform;
        out.crs = self.crs;
        out.nodata = nodata;
        Ok(out)
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or_else(|| self.out_of_bounds(row, col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(self.out_of_bounds(row, col));
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Extent `(min_x, min_y, max_x, max_y)` in CRS units
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of the centre of cell `(row, col)`
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Whether `value` is missing under this raster's no-data convention
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Fail unless `other` has the same shape and transform and, when both
    /// declare one, the same CRS.
    pub fn ensure_aligned<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if other.shape() != self.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }

        let (a, b) = (&self.transform, &other.transform);
        if !a.approx_eq(b, GRID_TOLERANCE) {
            return Err(Error::GridMismatch(format!(
                "origin ({}, {}) step ({}, {}) against origin ({}, {}) step ({}, {})",
                a.origin_x, a.origin_y, a.pixel_width, a.pixel_height,
                b.origin_x, b.origin_y, b.pixel_width, b.pixel_height,
            )));
        }

        match (self.crs, other.crs) {
            (Some(a), Some(b)) if !a.is_equivalent(&b) => Err(Error::CrsMismatch(a.identifier(), b.identifier())),
            _ => Ok(()),
        }
    }

    /// Min, max, mean and population standard deviation of the valid cells.
    ///
    /// NaN and infinite values are skipped along with declared no-data.
    pub fn statistics(&self) -> RasterStatistics {
        let valid = self
            .data
            .iter()
            .filter(|&&v| !self.is_nodata(v))
            .filter_map(|&v| v.as_f64())
            .filter(|v| v.is_finite());

        let mut acc = Moments::default();
        for v in valid {
            acc.push(v);
        }
        acc.finish(self.len())
    }
}

#[derive(Default)]
struct Moments {
    n: usize,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn push(&mut self, v: f64) {
        if self.n == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.n += 1;
        let delta = v - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (v - self.mean);
    }

    fn finish(self, cells: usize) -> RasterStatistics {
        if self.n == 0 {
            return RasterStatistics {
                min: None,
                max: None,
                mean: None,
                std_dev: None,
                valid_count: 0,
                nodata_count: cells,
            };
        }
        let variance = self.m2 / self.n as f64;
        RasterStatistics {
            min: Some(self.min),
            max: Some(self.max),
            mean: Some(self.mean),
            std_dev: Some(variance.sqrt()),
            valid_count: self.n,
            nodata_count: cells - self.n,
        }
    }
}

/// Summary of a raster's valid cells, in f64
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_vec_checks_cell_count() {
        let r = Raster::from_vec(vec![0u8; 6], 2, 3).unwrap();
        assert_eq!(r.shape(), (2, 3));
        assert!(matches!(
            Raster::from_vec(vec![0u8; 5], 2, 3),
            Err(Error::InvalidDimensions { width: 3, height: 2 })
        ));
    }

    #[test]
    fn test_out_of_range_access_is_an_error() {
        let mut r: Raster<f64> = Raster::new(2, 2);
        r.set(1, 1, 0.42).unwrap();
        assert_eq!(r.get(1, 1).unwrap(), 0.42);
        assert!(r.get(2, 0).is_err());
        assert!(matches!(r.set(0, 2, 1.0), Err(Error::IndexOutOfBounds { col: 2, .. })));
    }

    #[test]
    fn test_statistics_skip_nan() {
        let values: Vec<f64> = (0..100u8).map(f64::from).collect();
        let mut r = Raster::from_vec(values, 10, 10).unwrap();
        r.set(0, 0, f64::NAN).unwrap();

        let stats = r.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
        assert_relative_eq!(stats.mean.unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_statistics_spread_of_large_values() {
        let r = Raster::from_vec(vec![1e9 + 0.1, 1e9 + 0.3, 1e9 + 0.1, 1e9 + 0.3], 2, 2).unwrap();
        let stats = r.statistics();
        assert_relative_eq!(stats.std_dev.unwrap(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_statistics_of_empty_coverage() {
        let stats = Raster::filled(3, 3, f64::NAN).statistics();
        assert_eq!(stats.valid_count, 0);
        assert_eq!(stats.nodata_count, 9);
        assert!(stats.mean.is_none());
        assert!(stats.std_dev.is_none());
    }

    #[test]
    fn test_class_sentinel_excluded_from_statistics() {
        let mut r: Raster<u8> = Raster::filled(2, 2, 1);
        r.set_nodata(Some(255));
        r.set(0, 0, 255).unwrap();
        let stats = r.statistics();
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.max, Some(1.0));
    }

    #[test]
    fn test_derived_raster_keeps_grid() {
        let mut ndvi: Raster<f64> = Raster::new(2, 2);
        ndvi.set_transform(GeoTransform::new(260_000.0, 6_345_000.0, 10.0, -10.0));
        ndvi.set_crs(Some(CRS::utm_19s()));

        let classes = ndvi.with_data(vec![0u8, 1, 2, 255], Some(255)).unwrap();
        assert_eq!(classes.transform(), ndvi.transform());
        assert_eq!(classes.crs(), Some(&CRS::utm_19s()));
        assert!(classes.is_nodata(255));
        assert!(ndvi.with_data(vec![0u8; 3], None).is_err());
    }

    #[test]
    fn test_alignment_checks_shape_grid_and_crs() {
        let mut a: Raster<f64> = Raster::new(4, 4);
        a.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        a.set_crs(Some(CRS::utm_19s()));

        let mut b: Raster<u8> = a.with_data(vec![0u8; 16], None).unwrap();
        assert!(a.ensure_aligned(&b).is_ok());

        b.set_crs(Some(CRS::wgs84()));
        assert!(matches!(a.ensure_aligned(&b), Err(Error::CrsMismatch(_, _))));

        b.set_crs(None);
        b.set_transform(GeoTransform::new(10.0, 40.0, 10.0, -10.0));
        assert!(matches!(a.ensure_aligned(&b), Err(Error::GridMismatch(_))));

        let c: Raster<f64> = Raster::new(3, 4);
        assert!(matches!(a.ensure_aligned(&c), Err(Error::SizeMismatch { .. })));
    }
}
