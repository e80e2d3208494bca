//! Change detection between acquisitions
//!
//! - **difference**: per-pixel index delta plus a gain/loss trend raster
//! - **urban**: rule-based urban-change classification (codes 0-4)
//! - **anomaly**: z-score of one year against the rest of the series

mod anomaly;
mod difference;
mod urban;

pub use anomaly::{anomaly_counts, temporal_anomaly, AnomalyCounts, AnomalyParams};
pub use difference::{
    index_difference, raster_difference, trend_counts, DifferenceParams, DifferenceResult,
    TrendCounts, TREND_GAIN, TREND_LOSS, TREND_NODATA, TREND_STABLE,
};
pub use urban::{
    classify_pixel, class_histogram, urban_change_classification, ClassHistogram, IndexSample,
    UrbanChangeClass, UrbanChangeThresholds, URBAN_NODATA,
};
