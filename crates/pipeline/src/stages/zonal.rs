//! Stage 3: change rasters aggregated per zone

use super::{Pipeline, Stage};
use crate::error::{Result, StageReport};
use crate::layout::require;
use crate::method::ChangeMethod;
use crate::reports::{write_change_summaries, write_zone_changes, write_zone_statistics};
use landshift_algorithms::statistics::{
    pixel_area_hectares, rasterize_zones, summarize_changes, zonal_class_counts, zonal_statistics_by_zone,
    ChangeSummary, ClassScheme,
};
use landshift_core::io::read_geotiff;
use landshift_core::vector::read_zones_geojson;
use landshift_core::{Raster, RasterElement, ZoneLayer};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub(super) fn run(p: &Pipeline, t1: i32, t2: i32, methods: &[ChangeMethod]) -> Result<StageReport> {
    p.config.years.check_pair(t1, t2)?;
    p.layout.ensure_output_dirs()?;

    let zones_path = require(p.layout.zones().to_path_buf(), Stage::Zonal, Stage::Acquisition)?;
    let layer = read_zones_geojson(&zones_path, &p.config.zonal.id_field)?;
    info!(zones = layer.len(), "zones read from {}", zones_path.display());

    let wants = |m: ChangeMethod| methods.iter().any(|&selected| selected.includes(m));

    let mut report = StageReport::new(Stage::Zonal);
    let mut summaries = Vec::new();

    if wants(ChangeMethod::UrbanClassification) {
        let table = ClassTable {
            raster: p.layout.urban(t1, t2),
            report: p.layout.zonal_changes_report(t1, t2),
            scheme: ClassScheme::urban(),
        };
        let outcome = class_table::<u8>(p, &layer, table, t1, t2).map(|s| summaries.push(s));
        report.record("urban", outcome);
    }

    if wants(ChangeMethod::Difference) {
        let table = ClassTable {
            raster: p.layout.trend(t1, t2),
            report: p.layout.zonal_trend_report(t1, t2),
            scheme: ClassScheme::trend(),
        };
        let outcome = class_table::<i8>(p, &layer, table, t1, t2).map(|s| summaries.push(s));
        report.record("trend", outcome);
    }

    if wants(ChangeMethod::Anomaly) {
        report.record("anomaly", anomaly_table(p, &layer, t2));
    }

    if !summaries.is_empty() {
        let path = p.layout.summary_report(t1, t2);
        write_change_summaries(&path, &summaries)?;
        info!("change summary written to {}", path.display());
    }
    Ok(report)
}

struct ClassTable {
    raster: PathBuf,
    report: PathBuf,
    scheme: ClassScheme,
}

fn class_table<T: RasterElement>(
    p: &Pipeline,
    layer: &ZoneLayer,
    table: ClassTable,
    t1: i32,
    t2: i32,
) -> Result<ChangeSummary> {
    let path = require(table.raster, Stage::Zonal, Stage::Detect)?;
    let classes: Raster<T> = read_geotiff(&path, None)?;
    let zone_raster = rasterize_zones(layer, &classes)?;

    let pixel_area = match p.config.zonal.pixel_area_ha {
        Some(area) => area,
        None => pixel_area_hectares(classes.transform()),
    };
    debug!(pixel_area_ha = pixel_area, "rasterized zones onto {}", path.display());

    let companion = companion_delta(p, t1, t2)?;
    let companion_name = companion.as_ref().map(|_| {
        format!("delta_{}", p.config.difference.index.to_lowercase())
    });

    let records = zonal_class_counts(
        &classes,
        &zone_raster,
        layer,
        &table.scheme,
        pixel_area,
        companion.as_ref(),
    )?;

    let unclassified: usize = records.iter().map(|r| r.unclassified_pixels).sum();
    if unclassified > 0 {
        warn!(
            scheme = table.scheme.name,
            pixels = unclassified,
            "pixels hold codes outside the scheme"
        );
    }

    write_zone_changes(&table.report, &records, &table.scheme, companion_name.as_deref())?;

    let summary = summarize_changes(&records, &table.scheme);
    log_summary(&summary, t1, t2);
    info!("zonal table written to {}", table.report.display());
    Ok(summary)
}

/// The difference raster of the pair, when enabled and already produced
fn companion_delta(p: &Pipeline, t1: i32, t2: i32) -> Result<Option<Raster<f64>>> {
    if !p.config.zonal.companion_delta {
        return Ok(None);
    }
    let path = p.layout.difference(t1, t2);
    if !path.is_file() {
        debug!("no difference raster at {}, tables carry no delta columns", path.display());
        return Ok(None);
    }
    Ok(Some(read_geotiff(&path, None)?))
}

fn anomaly_table(p: &Pipeline, layer: &ZoneLayer, target: i32) -> Result<()> {
    let path = require(p.layout.anomaly(target), Stage::Zonal, Stage::Detect)?;
    let z: Raster<f64> = read_geotiff(&path, None)?;

    let records = zonal_statistics_by_zone(&z, layer)?;
    let empty = records.iter().filter(|r| r.count == 0).count();
    if empty > 0 {
        debug!(zones = empty, "zones without valid z-scores");
    }

    let report = p.layout.zonal_anomaly_report(target);
    write_zone_statistics(&report, &records)?;
    info!("zonal anomaly statistics written to {}", report.display());
    Ok(())
}

fn log_summary(summary: &ChangeSummary, t1: i32, t2: i32) {
    info!(
        scheme = summary.scheme,
        analysed_ha = summary.analysed_ha,
        changed_ha = summary.changed_ha,
        changed_pct = ?summary.changed_percent,
        net_vegetation_ha = summary.net_vegetation_ha,
        dominant = summary.dominant_change.unwrap_or("none"),
        "change summary {} -> {}",
        t1,
        t2
    );
    for (key, ha) in &summary.class_hectares {
        debug!(scheme = summary.scheme, class = *key, hectares = *ha, "class area");
    }
}
