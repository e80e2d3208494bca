//! Errors raised by raster, zone and algorithm code

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid raster shape {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("cell ({row}, {col}) outside a {rows}x{cols} raster")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("expected a {er}x{ec} raster, got {ar}x{ac}")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// Same shape, different placement
    #[error("rasters are not on the same grid: {0}")]
    GridMismatch(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("expected at least {expected} bands, found {actual}")]
    BandCount { expected: usize, actual: usize },

    #[error("GeoTIFF error: {0}")]
    Tiff(String),

    /// Zone layer could not be read or is malformed
    #[error("zone layer: {0}")]
    Vector(String),

    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
