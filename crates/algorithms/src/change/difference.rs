//! Raster difference with gain/loss thresholds

use crate::imagery::{IndexStack, SpectralIndex};
use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::{Error, Result};

/// Trend codes of the gain/loss raster
pub const TREND_LOSS: i8 = -1;
pub const TREND_STABLE: i8 = 0;
pub const TREND_GAIN: i8 = 1;
pub const TREND_NODATA: i8 = i8::MIN;

/// Parameters for the difference method
#[derive(Debug, Clone)]
pub struct DifferenceParams {
    /// Index band whose change is measured
    pub index: SpectralIndex,
    /// |delta| above which a pixel counts as gain or loss
    pub threshold: f64,
}

impl Default for DifferenceParams {
    fn default() -> Self {
        Self {
            index: SpectralIndex::NDVI,
            threshold: 0.15,
        }
    }
}

/// Continuous delta and its gain/loss classification
#[derive(Debug, Clone)]
pub struct DifferenceResult {
    pub index: SpectralIndex,
    pub delta: Raster<f64>,
    pub trend: Raster<i8>,
}

/// Compute raster difference with trend codes.
///
/// `delta = after - before`
///
/// Trend codes:
/// - `TREND_GAIN` (1) where delta > threshold
/// - `TREND_LOSS` (-1) where delta < -threshold
/// - `TREND_STABLE` (0) otherwise
///
/// No-data in either input gives NaN delta and `TREND_NODATA`.
///
/// # Returns
/// Tuple of (difference raster, trend raster)
pub fn raster_difference(
    before: &Raster<f64>,
    after: &Raster<f64>,
    threshold: f64,
) -> Result<(Raster<f64>, Raster<i8>)> {
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must be a non-negative finite number".to_string(),
        });
    }
    before.ensure_aligned(after)?;

    let (rows, cols) = before.shape();
    let (b_data, a_data) = (before.data(), after.data());

    let (diff_data, trend_data): (Vec<f64>, Vec<i8>) = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut cells = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = b_data[[row, col]];
                let a = a_data[[row, col]];

                if before.is_nodata(b) || after.is_nodata(a) || !b.is_finite() || !a.is_finite() {
                    cells.push((f64::NAN, TREND_NODATA));
                    continue;
                }

                let d = a - b;
                let trend = if d > threshold {
                    TREND_GAIN
                } else if d < -threshold {
                    TREND_LOSS
                } else {
                    TREND_STABLE
                };
                cells.push((d, trend));
            }
            cells
        })
        .unzip();

    let diff = before.with_data(diff_data, Some(f64::NAN))?;
    let trend = before.with_data(trend_data, Some(TREND_NODATA))?;
    Ok((diff, trend))
}

/// Difference of one index band between two acquisitions
pub fn index_difference(
    t1: &IndexStack,
    t2: &IndexStack,
    params: &DifferenceParams,
) -> Result<DifferenceResult> {
    let (delta, trend) = raster_difference(t1.get(params.index), t2.get(params.index), params.threshold)?;
    Ok(DifferenceResult {
        index: params.index,
        delta,
        trend,
    })
}

/// Pixel counts per trend code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrendCounts {
    pub gain: usize,
    pub loss: usize,
    pub stable: usize,
    pub nodata: usize,
}

impl TrendCounts {
    pub fn valid(&self) -> usize {
        self.gain + self.loss + self.stable
    }
}

pub fn trend_counts(trend: &Raster<i8>) -> TrendCounts {
    trend.data().iter().fold(TrendCounts::default(), |mut acc, &code| {
        match code {
            TREND_GAIN => acc.gain += 1,
            TREND_LOSS => acc.loss += 1,
            TREND_STABLE => acc.stable += 1,
            _ => acc.nodata += 1,
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landshift_core::GeoTransform;

    fn make_band(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_raster_difference() {
        let before = make_band(vec![0.6, 0.6, 0.2, f64::NAN]);
        let after = make_band(vec![0.3, 0.65, 0.5, 0.4]);

        let (diff, trend) = raster_difference(&before, &after, 0.15).unwrap();

        assert_relative_eq!(diff.get(0, 0).unwrap(), -0.3, epsilon = 1e-12);
        assert_eq!(trend.get(0, 0).unwrap(), TREND_LOSS);
        assert_eq!(trend.get(0, 1).unwrap(), TREND_STABLE);
        assert_eq!(trend.get(1, 0).unwrap(), TREND_GAIN);
        assert!(diff.get(1, 1).unwrap().is_nan());
        assert_eq!(trend.get(1, 1).unwrap(), TREND_NODATA);

        let counts = trend_counts(&trend);
        assert_eq!(counts, TrendCounts { gain: 1, loss: 1, stable: 1, nodata: 1 });
        assert_eq!(counts.valid(), 3);
    }

    #[test]
    fn test_identical_inputs_zero_delta() {
        let band = make_band(vec![0.1, -0.4, 0.9, 0.0]);
        let (diff, trend) = raster_difference(&band, &band, 0.15).unwrap();

        assert!(diff.data().iter().all(|&d| d == 0.0));
        assert!(trend.data().iter().all(|&t| t == TREND_STABLE));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let band = make_band(vec![0.0; 4]);
        assert!(raster_difference(&band, &band, -0.1).is_err());
    }

    #[test]
    fn test_misaligned_inputs() {
        let before = make_band(vec![0.0; 4]);
        let mut after = make_band(vec![0.0; 4]);
        after.set_transform(GeoTransform::new(10.0, 20.0, 10.0, -10.0));
        assert!(matches!(
            raster_difference(&before, &after, 0.15),
            Err(Error::GridMismatch(_))
        ));
    }
}
