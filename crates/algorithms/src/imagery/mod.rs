//! Imagery analysis algorithms
//!
//! - Spectral indices: NDVI, NDBI, NDWI, BSI
//! - Normalized difference: generic two-band index
//! - Index stacks: all four indices from a Sentinel-2 reflectance composite

mod index_stack;
mod indices;

pub use index_stack::{
    band_summary, compute_indices, zero_fill_mask, BandSummary, IndexParams, IndexStack,
    ReflectanceBand, ReflectanceScale, L2A_SCALE, REFLECTANCE_BANDS,
};
pub use indices::{bsi, ndbi, ndvi, ndwi, normalized_difference, SpectralIndex};
