//! Stage 2: change rasters from pairs (or series) of index rasters

use super::{Pipeline, Stage};
use crate::error::{PipelineError, Result, StageReport};
use crate::layout::require;
use crate::method::ChangeMethod;
use landshift_algorithms::change::{
    anomaly_counts, class_histogram, index_difference, temporal_anomaly, trend_counts,
    urban_change_classification, UrbanChangeClass,
};
use landshift_algorithms::imagery::IndexStack;
use landshift_core::io::{read_geotiff_bands, write_geotiff, GeoTiffOptions};
use landshift_core::Raster;
use tracing::{debug, info, warn};

pub(super) fn run(p: &Pipeline, t1: i32, t2: i32, method: ChangeMethod) -> Result<StageReport> {
    p.config.years.check_pair(t1, t2)?;
    p.layout.ensure_output_dirs()?;
    info!(t1, t2, method = %method, "detecting changes");

    let mut report = StageReport::new(Stage::Detect);
    for m in method.expand() {
        let outcome = match m {
            ChangeMethod::Difference => difference(p, t1, t2),
            ChangeMethod::UrbanClassification => urban(p, t1, t2),
            ChangeMethod::Anomaly => anomaly(p, t2),
            ChangeMethod::All => Err(PipelineError::UnknownMethod(m.to_string())),
        };
        report.record(m.name(), outcome);
    }
    Ok(report)
}

/// Index raster of `year` written by the indices stage
fn load_indices(p: &Pipeline, year: i32) -> Result<IndexStack> {
    let path = require(p.layout.indices(year), Stage::Detect, Stage::Indices)?;
    let stack = read_geotiff_bands(&path)?;
    debug!(year, "read {}", path.display());
    Ok(IndexStack::from_band_stack(stack)?)
}

fn difference(p: &Pipeline, t1: i32, t2: i32) -> Result<()> {
    let params = p.config.difference.params()?;
    let before = load_indices(p, t1)?;
    let after = load_indices(p, t2)?;

    let result = index_difference(&before, &after, &params)?;
    let counts = trend_counts(&result.trend);
    info!(
        index = %result.index,
        threshold = params.threshold,
        gain = counts.gain,
        loss = counts.loss,
        stable = counts.stable,
        nodata = counts.nodata,
        "difference {} -> {}",
        t1,
        t2
    );

    let delta_path = p.layout.difference(t1, t2);
    write_geotiff(
        &result.delta,
        &delta_path,
        Some(GeoTiffOptions::with_description(format!("delta {} {}-{}", result.index, t1, t2))),
    )?;
    let trend_path = p.layout.trend(t1, t2);
    write_geotiff(
        &result.trend,
        &trend_path,
        Some(GeoTiffOptions::with_description(format!("trend {} {}-{}", result.index, t1, t2))),
    )?;
    debug!("wrote {} and {}", delta_path.display(), trend_path.display());
    Ok(())
}

fn urban(p: &Pipeline, t1: i32, t2: i32) -> Result<()> {
    let thresholds = p.config.urban.thresholds();
    let before = load_indices(p, t1)?;
    let after = load_indices(p, t2)?;

    let classes = urban_change_classification(&before, &after, &thresholds)?;
    let histogram = class_histogram(&classes);
    for class in UrbanChangeClass::ALL {
        info!(code = class.code(), pixels = histogram.count(class), "{}", class);
    }
    if histogram.valid() == 0 {
        warn!("no valid pixels in the urban classification {} -> {}", t1, t2);
    }

    let path = p.layout.urban(t1, t2);
    write_geotiff(
        &classes,
        &path,
        Some(GeoTiffOptions::with_description(format!("urban change {}-{}", t1, t2))),
    )?;
    info!(nodata = histogram.nodata, "urban classification written to {}", path.display());
    Ok(())
}

/// Z-score of `target` against every other available year
fn anomaly(p: &Pipeline, target: i32) -> Result<()> {
    let (index, params) = p.config.anomaly.params()?;
    let current = load_indices(p, target)?.get(index).clone();

    let history_years: Vec<i32> = p
        .layout
        .index_years(&p.config.years)?
        .into_iter()
        .filter(|&y| y != target)
        .collect();
    if history_years.len() < params.min_observations {
        warn!(
            available = history_years.len(),
            required = params.min_observations,
            "too few historical years, anomaly will be empty"
        );
    }

    let history = history_years
        .iter()
        .map(|&year| Ok(load_indices(p, year)?.get(index).clone()))
        .collect::<Result<Vec<Raster<f64>>>>()?;
    let refs: Vec<&Raster<f64>> = history.iter().collect();

    let z = temporal_anomaly(&current, &refs, &params)?;
    let counts = anomaly_counts(&z, params.significance);
    info!(
        index = %index,
        history = ?history_years,
        positive = counts.positive,
        negative = counts.negative,
        valid = counts.valid,
        nodata = counts.nodata,
        "anomaly {} (|z| > {})",
        target,
        params.significance
    );

    let path = p.layout.anomaly(target);
    write_geotiff(
        &z,
        &path,
        Some(GeoTiffOptions::with_description(format!("z-score {} {}", index, target))),
    )?;
    debug!("wrote {}", path.display());
    Ok(())
}
