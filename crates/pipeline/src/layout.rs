//! File layout of inputs, intermediate rasters and reports

use crate::config::{PathsConfig, YearsConfig};
use crate::error::{PipelineError, Result};
use crate::stages::Stage;
use std::path::{Path, PathBuf};

const REFLECTANCE_PREFIX: &str = "sentinel2_";
const INDICES_PREFIX: &str = "indices_";

/// Paths of every artefact the pipeline reads or writes
#[derive(Debug, Clone)]
pub struct Layout {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    reports_dir: PathBuf,
    zones: PathBuf,
}

impl Layout {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            raw_dir: paths.raw_dir.clone(),
            processed_dir: paths.processed_dir.clone(),
            reports_dir: paths.reports_dir.clone(),
            zones: paths.zones.clone(),
        }
    }

    /// Resolve every relative directory against `root`
    pub fn rooted_at(paths: &PathsConfig, root: &Path) -> Self {
        Self {
            raw_dir: root.join(&paths.raw_dir),
            processed_dir: root.join(&paths.processed_dir),
            reports_dir: root.join(&paths.reports_dir),
            zones: root.join(&paths.zones),
        }
    }

    pub fn reflectance(&self, year: i32) -> PathBuf {
        self.raw_dir.join(format!("{}{}.tif", REFLECTANCE_PREFIX, year))
    }

    pub fn indices(&self, year: i32) -> PathBuf {
        self.processed_dir.join(format!("{}{}.tif", INDICES_PREFIX, year))
    }

    pub fn difference(&self, t1: i32, t2: i32) -> PathBuf {
        self.processed_dir.join(format!("change_difference_{}_{}.tif", t1, t2))
    }

    pub fn trend(&self, t1: i32, t2: i32) -> PathBuf {
        self.processed_dir.join(format!("change_trend_{}_{}.tif", t1, t2))
    }

    pub fn urban(&self, t1: i32, t2: i32) -> PathBuf {
        self.processed_dir.join(format!("change_urban_{}_{}.tif", t1, t2))
    }

    pub fn anomaly(&self, year: i32) -> PathBuf {
        self.processed_dir.join(format!("anomaly_{}.tif", year))
    }

    pub fn zones(&self) -> &Path {
        &self.zones
    }

    pub fn zonal_changes_report(&self, t1: i32, t2: i32) -> PathBuf {
        self.reports_dir.join(format!("zonal_changes_{}_{}.csv", t1, t2))
    }

    pub fn zonal_trend_report(&self, t1: i32, t2: i32) -> PathBuf {
        self.reports_dir.join(format!("zonal_trend_{}_{}.csv", t1, t2))
    }

    pub fn summary_report(&self, t1: i32, t2: i32) -> PathBuf {
        self.reports_dir.join(format!("summary_{}_{}.csv", t1, t2))
    }

    pub fn zonal_anomaly_report(&self, year: i32) -> PathBuf {
        self.reports_dir.join(format!("zonal_anomaly_{}.csv", year))
    }

    pub fn index_statistics_report(&self) -> PathBuf {
        self.reports_dir.join("index_statistics.csv")
    }

    /// Create the processed and reports directories
    pub fn ensure_output_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.processed_dir)?;
        std::fs::create_dir_all(&self.reports_dir)?;
        Ok(())
    }

    /// Years with a reflectance composite in the raw directory, ascending
    pub fn reflectance_years(&self, range: &YearsConfig) -> Result<Vec<i32>> {
        years_in(&self.raw_dir, REFLECTANCE_PREFIX, range)
    }

    /// Years with an index raster in the processed directory, ascending
    pub fn index_years(&self, range: &YearsConfig) -> Result<Vec<i32>> {
        years_in(&self.processed_dir, INDICES_PREFIX, range)
    }
}

/// `path` if it exists, otherwise a [`PipelineError::MissingInput`]
pub fn require(path: PathBuf, stage: Stage, producer: Stage) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PipelineError::MissingInput { path, stage, producer })
    }
}

fn years_in(dir: &Path, prefix: &str, range: &YearsConfig) -> Result<Vec<i32>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut years: Vec<i32> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            name.strip_prefix(prefix)?.strip_suffix(".tif")?.parse::<i32>().ok()
        })
        .filter(|&year| range.contains(year))
        .collect();

    years.sort_unstable();
    years.dedup();
    Ok(years)
}
