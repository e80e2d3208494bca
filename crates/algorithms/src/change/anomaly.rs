//! Temporal anomaly (z-score) of one acquisition against a series

use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::{Error, Result};

/// Parameters for the anomaly method
#[derive(Debug, Clone)]
pub struct AnomalyParams {
    /// Minimum finite historical values a pixel needs
    pub min_observations: usize,
    /// Historical std at or below this gives no-data
    pub std_epsilon: f64,
    /// |z| above this counts as a significant anomaly
    pub significance: f64,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            min_observations: 2,
            std_epsilon: 1e-12,
            significance: 2.0,
        }
    }
}

/// Per-pixel z-score of `current` against `history`.
///
/// `z = (current - mean(history)) / std(history)`, with mean and population
/// std over the finite historical values at each pixel. The output is NaN
/// where `current` is no-data, where fewer than `min_observations`
/// historical values exist, or where std ≤ `std_epsilon`.
pub fn temporal_anomaly(
    current: &Raster<f64>,
    history: &[&Raster<f64>],
    params: &AnomalyParams,
) -> Result<Raster<f64>> {
    if params.min_observations == 0 {
        return Err(Error::InvalidParameter {
            name: "min_observations",
            value: "0".to_string(),
            reason: "at least one historical value is needed".to_string(),
        });
    }
    for raster in history {
        current.ensure_aligned(*raster)?;
    }

    let (rows, cols) = current.shape();
    let cur = current.data();
    let hist: Vec<(&Raster<f64>, _)> = history.iter().map(|r| (*r, r.data())).collect();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut series = Vec::with_capacity(hist.len());
            for col in 0..cols {
                let value = cur[[row, col]];
                if current.is_nodata(value) || !value.is_finite() {
                    continue;
                }

                series.clear();
                series.extend(
                    hist.iter()
                        .map(|(raster, data)| (raster, data[[row, col]]))
                        .filter(|(raster, v)| !raster.is_nodata(*v) && v.is_finite())
                        .map(|(_, v)| v),
                );
                if series.len() < params.min_observations {
                    continue;
                }

                let n = series.len() as f64;
                let mean = series.iter().sum::<f64>() / n;
                let var = series.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                let std = var.sqrt();
                if std <= params.std_epsilon {
                    continue;
                }

                row_data[col] = (value - mean) / std;
            }
            row_data
        })
        .collect();

    current.with_data(data, Some(f64::NAN))
}

/// Summary of a z-score raster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyCounts {
    /// z > significance
    pub positive: usize,
    /// z < -significance
    pub negative: usize,
    pub valid: usize,
    pub nodata: usize,
}

pub fn anomaly_counts(z: &Raster<f64>, significance: f64) -> AnomalyCounts {
    z.data().iter().fold(AnomalyCounts::default(), |mut acc, &v| {
        if !v.is_finite() {
            acc.nodata += 1;
            return acc;
        }
        acc.valid += 1;
        if v > significance {
            acc.positive += 1;
        } else if v < -significance {
            acc.negative += 1;
        }
        acc
    })
}
