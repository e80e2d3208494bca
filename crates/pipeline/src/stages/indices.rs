//! Stage 1: reflectance composites to index rasters

use super::{Pipeline, Stage};
use crate::error::{Result, StageReport};
use crate::layout::{require, Layout};
use crate::reports::{update_index_statistics, IndexStatisticsRow};
use landshift_algorithms::imagery::{band_summary, compute_indices, BandSummary, IndexParams};
use landshift_core::io::{read_geotiff_bands, write_geotiff_bands};
use tracing::{debug, info, warn};

pub(super) fn run(p: &Pipeline, years: &[i32]) -> Result<StageReport> {
    for &year in years {
        p.config.years.check_year(year)?;
    }
    let years = if years.is_empty() {
        p.layout.reflectance_years(&p.config.years)?
    } else {
        years.to_vec()
    };
    if years.is_empty() {
        warn!("no reflectance composites found");
    }

    p.layout.ensure_output_dirs()?;
    let params = p.config.indices.params();
    info!(years = ?years, mode = ?p.mode, "computing spectral indices");

    let outcomes = p.mode.map(&years, |&year| index_year(&p.layout, year, &params))?;

    let mut report = StageReport::new(Stage::Indices);
    let mut rows = Vec::new();
    for (&year, outcome) in years.iter().zip(outcomes) {
        let outcome = outcome.map(|summaries| {
            rows.extend(summaries.iter().map(|s| IndexStatisticsRow::new(year, s)));
        });
        report.record(year.to_string(), outcome);
    }

    if !rows.is_empty() {
        let path = p.layout.index_statistics_report();
        update_index_statistics(&path, &rows)?;
        debug!("index statistics written to {}", path.display());
    }
    Ok(report)
}

fn index_year(layout: &Layout, year: i32, params: &IndexParams) -> Result<Vec<BandSummary>> {
    let input = require(layout.reflectance(year), Stage::Indices, Stage::Acquisition)?;
    let reflectance = read_geotiff_bands(&input)?;
    let (rows, cols) = reflectance.shape();
    debug!(year, bands = reflectance.num_bands(), rows, cols, "read {}", input.display());

    let indices = compute_indices(&reflectance, params)?;
    if indices.masked_pixels > 0 {
        debug!(year, pixels = indices.masked_pixels, "masked zero-fill pixels");
    }

    let output = layout.indices(year);
    write_geotiff_bands(indices.as_band_stack(), &output)?;

    let summaries = band_summary(&indices);
    for s in &summaries {
        info!(
            year,
            index = %s.index,
            min = ?s.stats.min,
            max = ?s.stats.max,
            mean = ?s.stats.mean,
            std = ?s.stats.std_dev,
            nodata = s.stats.nodata_count,
            "index statistics"
        );
    }
    info!(year, scale = indices.scale_factor, "indices written to {}", output.display());
    Ok(summaries)
}
