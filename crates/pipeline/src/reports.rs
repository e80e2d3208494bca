//! CSV reports
//!
//! Missing values (undefined percentages, statistics of empty zones) are
//! written as empty fields.

use crate::error::Result;
use landshift_algorithms::imagery::BandSummary;
use landshift_algorithms::statistics::{ChangeSummary, ClassScheme, ZoneChangeRecord, ZoneStatisticsRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of `index_statistics.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatisticsRow {
    pub year: i32,
    pub index: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_pixels: usize,
    pub nodata_pixels: usize,
}

impl IndexStatisticsRow {
    pub fn new(year: i32, summary: &BandSummary) -> Self {
        Self {
            year,
            index: summary.index.name().to_string(),
            min: summary.stats.min,
            max: summary.stats.max,
            mean: summary.stats.mean,
            std_dev: summary.stats.std_dev,
            valid_pixels: summary.stats.valid_count,
            nodata_pixels: summary.stats.nodata_count,
        }
    }
}

/// Merge `rows` into the index statistics file.
///
/// Rows already on disk for the years in `rows` are replaced; other years
/// are kept. The file is ordered by year.
pub fn update_index_statistics(path: &Path, rows: &[IndexStatisticsRow]) -> Result<()> {
    let mut merged: Vec<IndexStatisticsRow> = Vec::new();
    if path.is_file() {
        let mut reader = csv::Reader::from_path(path)?;
        for row in reader.deserialize::<IndexStatisticsRow>() {
            let row = row?;
            if !rows.iter().any(|r| r.year == row.year) {
                merged.push(row);
            }
        }
    }
    merged.extend(rows.iter().cloned());
    merged.sort_by_key(|r| r.year);

    let mut writer = csv::Writer::from_path(path)?;
    for row in &merged {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write per-zone class counts: pixels, hectares and percentage per class
///
/// `companion` names the continuous raster whose mean/std the records
/// carry; those columns are omitted when it is `None`.
pub fn write_zone_changes(
    path: &Path,
    records: &[ZoneChangeRecord],
    scheme: &ClassScheme,
    companion: Option<&str>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        "zone_id".to_string(),
        "valid_pixels".to_string(),
        "nodata_pixels".to_string(),
        "unclassified_pixels".to_string(),
        "valid_ha".to_string(),
    ];
    for key in scheme.keys() {
        header.push(format!("{}_px", key));
        header.push(format!("{}_ha", key));
        header.push(format!("{}_pct", key));
    }
    if let Some(name) = companion {
        header.push(format!("{}_mean", name));
        header.push(format!("{}_std", name));
    }
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.zone_id.clone(),
            record.valid_pixels.to_string(),
            record.nodata_pixels.to_string(),
            record.unclassified_pixels.to_string(),
            fmt_f64(record.valid_hectares()),
        ];
        for i in 0..scheme.classes.len() {
            row.push(record.counts[i].to_string());
            row.push(fmt_f64(record.hectares[i]));
            row.push(fmt_opt(record.percentages[i]));
        }
        if companion.is_some() {
            row.push(fmt_opt(record.companion_mean));
            row.push(fmt_opt(record.companion_std));
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// One row of the long-format change summary
#[derive(Debug, Clone, PartialEq, Serialize)]
struct SummaryRow<'a> {
    scheme: &'a str,
    metric: &'a str,
    class: &'a str,
    value: Option<f64>,
}

/// Write territory totals as `scheme,metric,class,value` rows
pub fn write_change_summaries(path: &Path, summaries: &[ChangeSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for s in summaries {
        let row = |metric: &'static str, class: &'static str, value: Option<f64>| SummaryRow {
            scheme: s.scheme,
            metric,
            class,
            value,
        };

        for (key, ha) in &s.class_hectares {
            writer.serialize(row("class_ha", *key, Some(*ha)))?;
        }
        for (key, pct) in &s.mean_zone_percent {
            writer.serialize(row("mean_zone_pct", *key, *pct))?;
        }
        writer.serialize(row("analysed_ha", "", Some(s.analysed_ha)))?;
        writer.serialize(row("changed_ha", "", Some(s.changed_ha)))?;
        writer.serialize(row("changed_pct", "", s.changed_percent))?;
        writer.serialize(row("net_vegetation_ha", "", Some(s.net_vegetation_ha)))?;
        writer.serialize(row("dominant_change", s.dominant_change.unwrap_or(""), None))?;
        writer.serialize(row("unclassified_pixels", "", Some(s.unclassified_pixels as f64)))?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ZoneStatisticsRow<'a> {
    zone_id: &'a str,
    count: usize,
    nodata_count: usize,
    mean: Option<f64>,
    std_dev: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    median: Option<f64>,
}

/// Write continuous per-zone statistics
pub fn write_zone_statistics(path: &Path, records: &[ZoneStatisticsRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in records {
        writer.serialize(ZoneStatisticsRow {
            zone_id: &r.zone_id,
            count: r.count,
            nodata_count: r.nodata_count,
            mean: r.mean,
            std_dev: r.std_dev,
            min: r.min,
            max: r.max,
            median: r.median,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn fmt_f64(v: f64) -> String {
    format!("{:.6}", v)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_f64).unwrap_or_default()
}
