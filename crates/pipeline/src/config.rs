//! Pipeline configuration loaded from TOML
//!
//! Every section and field is optional; missing values take the defaults
//! of the lab pipeline (10 m Sentinel-2 composites, study period 2019-2025).
//!
//! ```toml
//! [paths]
//! raw_dir = "data/raw"
//!
//! [years]
//! min = 2019
//! max = 2025
//!
//! [urban]
//! builtup_gain = 0.12
//! ```

use crate::error::{PipelineError, Result};
use crate::executor::ProcessingMode;
use landshift_algorithms::change::{AnomalyParams, DifferenceParams, UrbanChangeThresholds};
use landshift_algorithms::imagery::{IndexParams, ReflectanceScale, SpectralIndex};
use landshift_core::vector::DEFAULT_ID_FIELD;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub years: YearsConfig,
    pub indices: IndicesConfig,
    pub difference: DifferenceConfig,
    pub urban: UrbanConfig,
    pub anomaly: AnomalyConfig,
    pub zonal: ZonalConfig,
    pub execution: ExecutionConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<()> {
        if self.years.min > self.years.max {
            return Err(PipelineError::Config(format!(
                "years.min ({}) is after years.max ({})",
                self.years.min, self.years.max
            )));
        }
        if let Some(scale) = self.indices.reflectance_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(PipelineError::Config(format!(
                    "indices.reflectance_scale must be positive, got {}",
                    scale
                )));
            }
        }
        if let Some(area) = self.zonal.pixel_area_ha {
            if !(area.is_finite() && area > 0.0) {
                return Err(PipelineError::Config(format!(
                    "zonal.pixel_area_ha must be positive, got {}",
                    area
                )));
            }
        }
        if self.zonal.id_field.trim().is_empty() {
            return Err(PipelineError::Config("zonal.id_field is empty".into()));
        }
        self.difference.params()?;
        self.anomaly.params()?;
        Ok(())
    }
}

/// Directory layout, relative to the working directory unless absolute
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub zones: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            reports_dir: PathBuf::from("reports"),
            zones: PathBuf::from("data/vector/zones.geojson"),
        }
    }
}

/// Inclusive range of acquisition years the pipeline accepts
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YearsConfig {
    pub min: i32,
    pub max: i32,
}

impl Default for YearsConfig {
    fn default() -> Self {
        Self { min: 2019, max: 2025 }
    }
}

impl YearsConfig {
    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }

    pub fn check_year(&self, year: i32) -> Result<()> {
        if self.contains(year) {
            Ok(())
        } else {
            Err(PipelineError::InvalidYearRange(format!(
                "year {} is outside {}-{}",
                year, self.min, self.max
            )))
        }
    }

    /// Both years in range and `t1` strictly before `t2`
    pub fn check_pair(&self, t1: i32, t2: i32) -> Result<()> {
        self.check_year(t1)?;
        self.check_year(t2)?;
        if t1 >= t2 {
            return Err(PipelineError::InvalidYearRange(format!(
                "base year {} must be before target year {}",
                t1, t2
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicesConfig {
    /// Fixed divisor for raw band values; automatic detection when unset
    pub reflectance_scale: Option<f64>,
    pub mask_zero_fill: bool,
}

impl Default for IndicesConfig {
    fn default() -> Self {
        Self {
            reflectance_scale: None,
            mask_zero_fill: true,
        }
    }
}

impl IndicesConfig {
    pub fn params(&self) -> IndexParams {
        IndexParams {
            scale: self.reflectance_scale.map_or(ReflectanceScale::Auto, ReflectanceScale::Fixed),
            mask_zero_fill: self.mask_zero_fill,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DifferenceConfig {
    pub index: String,
    pub threshold: f64,
}

impl Default for DifferenceConfig {
    fn default() -> Self {
        let params = DifferenceParams::default();
        Self {
            index: params.index.name().to_string(),
            threshold: params.threshold,
        }
    }
}

impl DifferenceConfig {
    pub fn params(&self) -> Result<DifferenceParams> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(PipelineError::Config(format!(
                "difference.threshold must be non-negative, got {}",
                self.threshold
            )));
        }
        Ok(DifferenceParams {
            index: parse_index(&self.index)?,
            threshold: self.threshold,
        })
    }
}

/// Urban-change rule thresholds; see [`UrbanChangeThresholds`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrbanConfig {
    pub builtup_gain: f64,
    pub vegetation_loss: f64,
    pub vegetation_gain: f64,
    pub water_presence: f64,
    pub no_water: f64,
    pub prior_vegetation: Option<f64>,
    pub vegetated_after: Option<f64>,
}

impl Default for UrbanConfig {
    fn default() -> Self {
        let t = UrbanChangeThresholds::default();
        Self {
            builtup_gain: t.builtup_gain,
            vegetation_loss: t.vegetation_loss,
            vegetation_gain: t.vegetation_gain,
            water_presence: t.water_presence,
            no_water: t.no_water,
            prior_vegetation: t.prior_vegetation,
            vegetated_after: t.vegetated_after,
        }
    }
}

impl UrbanConfig {
    pub fn thresholds(&self) -> UrbanChangeThresholds {
        UrbanChangeThresholds {
            builtup_gain: self.builtup_gain,
            vegetation_loss: self.vegetation_loss,
            vegetation_gain: self.vegetation_gain,
            water_presence: self.water_presence,
            no_water: self.no_water,
            prior_vegetation: self.prior_vegetation,
            vegetated_after: self.vegetated_after,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalyConfig {
    /// Index band the z-score is computed on
    pub index: String,
    pub min_observations: usize,
    pub std_epsilon: f64,
    pub significance: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        let params = AnomalyParams::default();
        Self {
            index: SpectralIndex::NDVI.name().to_string(),
            min_observations: params.min_observations,
            std_epsilon: params.std_epsilon,
            significance: params.significance,
        }
    }
}

impl AnomalyConfig {
    pub fn params(&self) -> Result<(SpectralIndex, AnomalyParams)> {
        if self.min_observations == 0 {
            return Err(PipelineError::Config("anomaly.min_observations must be at least 1".into()));
        }
        Ok((
            parse_index(&self.index)?,
            AnomalyParams {
                min_observations: self.min_observations,
                std_epsilon: self.std_epsilon,
                significance: self.significance,
            },
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZonalConfig {
    /// GeoJSON property holding the zone identifier
    pub id_field: String,
    /// Overrides the pixel area derived from the raster transform
    pub pixel_area_ha: Option<f64>,
    /// Add mean/std of the index delta to the class tables
    pub companion_delta: bool,
}

impl Default for ZonalConfig {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            pixel_area_ha: None,
            companion_delta: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Worker threads for per-year work; all cores when unset
    pub jobs: Option<usize>,
}

impl ExecutionConfig {
    pub fn mode(&self) -> ProcessingMode {
        ProcessingMode::from_jobs(self.jobs)
    }
}

fn parse_index(name: &str) -> Result<SpectralIndex> {
    name.parse::<SpectralIndex>().map_err(PipelineError::Config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.years.min, 2019);
        assert_eq!(config.years.max, 2025);
        assert_eq!(config.paths.processed_dir, PathBuf::from("data/processed"));
        assert_eq!(config.zonal.id_field, "zone_id");
        assert_eq!(config.difference.params().unwrap().index, SpectralIndex::NDVI);
        assert!((config.urban.thresholds().builtup_gain - 0.1).abs() < 1e-12);
        assert_eq!(config.execution.mode(), ProcessingMode::Parallel);
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [urban]
            builtup_gain = 0.2
            prior_vegetation = 0.3

            [difference]
            index = "ndbi"

            [execution]
            jobs = 1
            "#,
        )
        .unwrap();

        let t = config.urban.thresholds();
        assert!((t.builtup_gain - 0.2).abs() < 1e-12);
        assert!((t.vegetation_loss + 0.1).abs() < 1e-12);
        assert_eq!(t.prior_vegetation, Some(0.3));
        assert_eq!(config.difference.params().unwrap().index, SpectralIndex::NDBI);
        assert_eq!(config.execution.mode(), ProcessingMode::Sequential);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PipelineConfig::from_toml_str("[years]\nmin = 2025\nmax = 2019").is_err());
        assert!(PipelineConfig::from_toml_str("[difference]\nindex = \"EVI\"").is_err());
        assert!(PipelineConfig::from_toml_str("[zonal]\npixel_area_ha = 0.0").is_err());
        assert!(PipelineConfig::from_toml_str("[anomaly]\nmin_observations = 0").is_err());
        assert!(PipelineConfig::from_toml_str("[paths]\nunknown = 1").is_err());
    }

    #[test]
    fn test_year_pair() {
        let years = YearsConfig::default();
        assert!(years.check_pair(2019, 2025).is_ok());
        assert!(matches!(years.check_pair(2025, 2019), Err(PipelineError::InvalidYearRange(_))));
        assert!(matches!(years.check_pair(2020, 2020), Err(PipelineError::InvalidYearRange(_))));
        assert!(matches!(years.check_pair(2018, 2020), Err(PipelineError::InvalidYearRange(_))));
    }
}
