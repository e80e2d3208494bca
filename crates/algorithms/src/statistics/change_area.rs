//! Per-zone change areas of class-coded rasters
//!
//! Counts the pixels of each class inside each zone and converts them to
//! hectares and to percentages of the zone's classified pixels.

use super::rasterize::OUTSIDE_ZONES;
use crate::change::{UrbanChangeClass, TREND_GAIN, TREND_LOSS, TREND_STABLE};
use landshift_core::raster::{GeoTransform, Raster, RasterElement};
use landshift_core::vector::ZoneLayer;
use landshift_core::{Error, Result};

/// Square metres per hectare
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// Area of one pixel in hectares, assuming a projected CRS in metres
pub fn pixel_area_hectares(transform: &GeoTransform) -> f64 {
    transform.pixel_area() / M2_PER_HECTARE
}

/// One class of a [`ClassScheme`]
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeClass {
    pub code: i32,
    /// Column-friendly name
    pub key: &'static str,
    /// Whether pixels of this class count as changed
    pub is_change: bool,
}

/// The set of codes a class raster may hold
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScheme {
    pub name: &'static str,
    pub classes: Vec<SchemeClass>,
    /// Codes counted as vegetation gain in the net vegetation balance
    pub vegetation_gain: Vec<i32>,
    /// Codes counted as vegetation loss in the net vegetation balance
    pub vegetation_loss: Vec<i32>,
}

impl ClassScheme {
    /// Urban-change codes 0-4
    pub fn urban() -> Self {
        let classes = UrbanChangeClass::ALL
            .iter()
            .map(|&class| SchemeClass {
                code: i32::from(class.code()),
                key: class.key(),
                is_change: class != UrbanChangeClass::NoChange,
            })
            .collect();

        Self {
            name: "urban",
            classes,
            vegetation_gain: vec![i32::from(UrbanChangeClass::VegetationGain.code())],
            vegetation_loss: vec![i32::from(UrbanChangeClass::VegetationLoss.code())],
        }
    }

    /// Gain/loss trend codes -1/0/1
    pub fn trend() -> Self {
        Self {
            name: "trend",
            classes: vec![
                SchemeClass {
                    code: i32::from(TREND_LOSS),
                    key: "loss",
                    is_change: true,
                },
                SchemeClass {
                    code: i32::from(TREND_STABLE),
                    key: "stable",
                    is_change: false,
                },
                SchemeClass {
                    code: i32::from(TREND_GAIN),
                    key: "gain",
                    is_change: true,
                },
            ],
            vegetation_gain: vec![i32::from(TREND_GAIN)],
            vegetation_loss: vec![i32::from(TREND_LOSS)],
        }
    }

    /// Position of `code` in the scheme
    pub fn position(&self, code: i32) -> Option<usize> {
        self.classes.iter().position(|c| c.code == code)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.classes.iter().map(|c| c.key)
    }
}

/// Class counts, areas and percentages of one zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChangeRecord {
    pub zone_id: String,
    /// Pixels holding a code of the scheme
    pub valid_pixels: usize,
    pub nodata_pixels: usize,
    /// Pixels holding a code outside the scheme
    pub unclassified_pixels: usize,
    /// Pixel count per scheme class, in scheme order
    pub counts: Vec<usize>,
    /// Hectares per scheme class
    pub hectares: Vec<f64>,
    /// Share of valid pixels per class in percent; `None` without valid pixels
    pub percentages: Vec<Option<f64>>,
    /// Mean of the companion raster over the zone's valid pixels
    pub companion_mean: Option<f64>,
    /// Population std of the companion raster over the zone's valid pixels
    pub companion_std: Option<f64>,
}

impl ZoneChangeRecord {
    /// Every zone pixel, including no-data and unclassified
    pub fn total_pixels(&self) -> usize {
        self.valid_pixels + self.nodata_pixels + self.unclassified_pixels
    }

    pub fn valid_hectares(&self) -> f64 {
        self.hectares.iter().sum()
    }
}

#[derive(Default)]
struct ZoneAccumulator {
    counts: Vec<usize>,
    nodata: usize,
    unclassified: usize,
    companion: RunningMoments,
}

/// Welford's running mean and variance
#[derive(Default)]
struct RunningMoments {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    fn push(&mut self, v: f64) {
        self.n += 1;
        let delta = v - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (v - self.mean);
    }

    /// Mean and population standard deviation
    fn finish(&self) -> (Option<f64>, Option<f64>) {
        if self.n == 0 {
            return (None, None);
        }
        (Some(self.mean), Some((self.m2 / self.n as f64).sqrt()))
    }
}

/// Count class pixels per zone.
///
/// `zone_raster` comes from [`rasterize_zones`](super::rasterize_zones) on
/// the same `layer`. The optional `companion` raster (the NDVI delta of the
/// same pair, for instance) contributes mean and std over each zone's valid
/// pixels. Records are returned in the layer's identifier order, one per
/// zone, zones without pixels included.
pub fn zonal_class_counts<T: RasterElement>(
    classes: &Raster<T>,
    zone_raster: &Raster<i32>,
    layer: &ZoneLayer,
    scheme: &ClassScheme,
    pixel_area_ha: f64,
    companion: Option<&Raster<f64>>,
) -> Result<Vec<ZoneChangeRecord>> {
    if !(pixel_area_ha.is_finite() && pixel_area_ha > 0.0) {
        return Err(Error::InvalidParameter {
            name: "pixel_area_ha",
            value: pixel_area_ha.to_string(),
            reason: "must be a positive finite number".to_string(),
        });
    }
    classes.ensure_aligned(zone_raster)?;
    if let Some(c) = companion {
        classes.ensure_aligned(c)?;
    }

    let mut acc: Vec<ZoneAccumulator> = (0..layer.len())
        .map(|_| ZoneAccumulator {
            counts: vec![0; scheme.classes.len()],
            ..ZoneAccumulator::default()
        })
        .collect();

    let (rows, cols) = classes.shape();
    let class_data = classes.data();
    let zone_data = zone_raster.data();

    for row in 0..rows {
        for col in 0..cols {
            let zone = zone_data[[row, col]];
            if zone == OUTSIDE_ZONES {
                continue;
            }
            let slot = usize::try_from(zone - 1)
                .ok()
                .and_then(|i| acc.get_mut(i))
                .ok_or_else(|| {
                    Error::Algorithm(format!("zone raster value {} has no zone in the layer", zone))
                })?;

            let value = class_data[[row, col]];
            if classes.is_nodata(value) {
                slot.nodata += 1;
                continue;
            }

            let position = value
                .as_f64()
                .filter(|v| v.fract() == 0.0)
                .and_then(|v| scheme.position(v as i32));
            let Some(position) = position else {
                slot.unclassified += 1;
                continue;
            };
            slot.counts[position] += 1;

            if let Some(c) = companion {
                let v = c.data()[[row, col]];
                if !c.is_nodata(v) && v.is_finite() {
                    slot.companion.push(v);
                }
            }
        }
    }

    let records = layer
        .iter()
        .zip(acc)
        .map(|(zone, a)| {
            let valid: usize = a.counts.iter().sum();
            let hectares = a.counts.iter().map(|&n| n as f64 * pixel_area_ha).collect();
            let percentages = a
                .counts
                .iter()
                .map(|&n| (valid > 0).then(|| n as f64 / valid as f64 * 100.0))
                .collect();

            let (companion_mean, companion_std) = a.companion.finish();

            ZoneChangeRecord {
                zone_id: zone.id.clone(),
                valid_pixels: valid,
                nodata_pixels: a.nodata,
                unclassified_pixels: a.unclassified,
                counts: a.counts,
                hectares,
                percentages,
                companion_mean,
                companion_std,
            }
        })
        .collect();

    Ok(records)
}

/// Territory-wide totals over all zones
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSummary {
    pub scheme: &'static str,
    /// (class key, hectares) in scheme order
    pub class_hectares: Vec<(&'static str, f64)>,
    /// (class key, mean of the per-zone percentages) over zones with valid pixels
    pub mean_zone_percent: Vec<(&'static str, Option<f64>)>,
    pub analysed_ha: f64,
    pub changed_ha: f64,
    /// `None` when nothing was analysed
    pub changed_percent: Option<f64>,
    /// Vegetation gain minus vegetation loss, hectares
    pub net_vegetation_ha: f64,
    /// Change class with the largest area; `None` when no change was found
    pub dominant_change: Option<&'static str>,
    pub unclassified_pixels: usize,
}

/// Aggregate zone records of one scheme into a [`ChangeSummary`]
pub fn summarize_changes(records: &[ZoneChangeRecord], scheme: &ClassScheme) -> ChangeSummary {
    let class_hectares: Vec<(&'static str, f64)> = scheme
        .classes
        .iter()
        .enumerate()
        .map(|(i, class)| (class.key, records.iter().map(|r| r.hectares[i]).sum()))
        .collect();

    let mean_zone_percent = scheme
        .classes
        .iter()
        .enumerate()
        .map(|(i, class)| {
            let pcts: Vec<f64> = records.iter().filter_map(|r| r.percentages[i]).collect();
            let mean = (!pcts.is_empty()).then(|| pcts.iter().sum::<f64>() / pcts.len() as f64);
            (class.key, mean)
        })
        .collect();

    let analysed_ha: f64 = class_hectares.iter().map(|(_, ha)| ha).sum();
    let changed_ha: f64 = scheme
        .classes
        .iter()
        .zip(&class_hectares)
        .filter(|(class, _)| class.is_change)
        .map(|(_, (_, ha))| ha)
        .sum();

    let area_of = |codes: &[i32]| -> f64 {
        scheme
            .classes
            .iter()
            .zip(&class_hectares)
            .filter(|(class, _)| codes.contains(&class.code))
            .map(|(_, (_, ha))| ha)
            .sum()
    };

    let dominant_change = scheme
        .classes
        .iter()
        .zip(&class_hectares)
        .filter(|(class, (_, ha))| class.is_change && *ha > 0.0)
        .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
        .map(|(class, _)| class.key);

    let net_vegetation_ha = area_of(&scheme.vegetation_gain) - area_of(&scheme.vegetation_loss);

    ChangeSummary {
        scheme: scheme.name,
        class_hectares,
        mean_zone_percent,
        analysed_ha,
        changed_ha,
        changed_percent: (analysed_ha > 0.0).then(|| changed_ha / analysed_ha * 100.0),
        net_vegetation_ha,
        dominant_change,
        unclassified_pixels: records.iter().map(|r| r.unclassified_pixels).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::URBAN_NODATA;
    use crate::statistics::rasterize_zones;
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};
    use landshift_core::vector::Zone;

    fn strip(x0: f64, x1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: 0.0), (x: x1, y: 0.0), (x: x1, y: 20.0), (x: x0, y: 20.0), (x: x0, y: 0.0),
        ]])
    }

    /// 2 rows x 4 cols of 10 m pixels; zone "A" is the left half, "B" the right
    fn setup(codes: Vec<u8>) -> (Raster<u8>, Raster<i32>, ZoneLayer) {
        let mut classes = Raster::from_vec(codes, 2, 4).unwrap();
        classes.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        classes.set_nodata(Some(URBAN_NODATA));

        let layer = ZoneLayer::new(vec![
            Zone::new("B", strip(20.0, 40.0)),
            Zone::new("A", strip(0.0, 20.0)),
            Zone::new("C", strip(100.0, 120.0)),
        ])
        .unwrap();
        let zones = rasterize_zones(&layer, &classes).unwrap();
        (classes, zones, layer)
    }

    #[test]
    fn test_pixel_area_from_transform() {
        assert_relative_eq!(pixel_area_hectares(&GeoTransform::new(0.0, 0.0, 10.0, -10.0)), 0.01);
    }

    #[test]
    fn test_counts_hectares_percentages() {
        // A: 1 1 / 0 255    B: 2 3 / 4 9
        let (classes, zones, layer) = setup(vec![1, 1, 2, 3, 0, 255, 4, 9]);
        let scheme = ClassScheme::urban();

        let records = zonal_class_counts(&classes, &zones, &layer, &scheme, 0.01, None).unwrap();
        assert_eq!(records.len(), 3);

        let a = &records[0];
        assert_eq!(a.zone_id, "A");
        assert_eq!(a.counts, vec![1, 2, 0, 0, 0]);
        assert_eq!(a.valid_pixels, 3);
        assert_eq!(a.nodata_pixels, 1);
        assert_relative_eq!(a.hectares[1], 0.02);
        assert_relative_eq!(a.percentages[1].unwrap(), 200.0 / 3.0, epsilon = 1e-9);
        let total: f64 = a.percentages.iter().flatten().sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);

        let b = &records[1];
        assert_eq!(b.counts, vec![0, 0, 1, 1, 1]);
        assert_eq!(b.unclassified_pixels, 1);
        assert_eq!(b.total_pixels(), 4);

        let c = &records[2];
        assert_eq!(c.zone_id, "C");
        assert_eq!(c.valid_pixels, 0);
        assert!(c.percentages.iter().all(Option::is_none));
        assert!(c.hectares.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_companion_statistics() {
        let (classes, zones, layer) = setup(vec![0; 8]);
        let mut delta = Raster::from_vec(vec![0.1, 0.3, 0.0, 0.0, 0.1, 0.3, 0.0, f64::NAN], 2, 4).unwrap();
        delta.set_transform(*classes.transform());
        delta.set_nodata(Some(f64::NAN));

        let records =
            zonal_class_counts(&classes, &zones, &layer, &ClassScheme::urban(), 0.01, Some(&delta)).unwrap();

        assert_relative_eq!(records[0].companion_mean.unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(records[0].companion_std.unwrap(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(records[1].companion_mean.unwrap(), 0.0);
        assert_eq!(records[2].companion_mean, None);
    }

    #[test]
    fn test_companion_std_keeps_precision_far_from_zero() {
        let mut m = RunningMoments::default();
        for v in [1e9 + 0.1, 1e9 + 0.3, 1e9 + 0.1, 1e9 + 0.3] {
            m.push(v);
        }
        let (mean, std) = m.finish();
        assert_relative_eq!(mean.unwrap(), 1e9 + 0.2, epsilon = 1e-6);
        assert_relative_eq!(std.unwrap(), 0.1, epsilon = 1e-6);
        assert_eq!(RunningMoments::default().finish(), (None, None));
    }

    #[test]
    fn test_trend_scheme_on_i8() {
        let mut trend: Raster<i8> = Raster::from_vec(vec![1, -1, 0, 0, 1, i8::MIN, 0, 1], 2, 4).unwrap();
        trend.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        trend.set_nodata(Some(i8::MIN));
        let (_, zones, layer) = setup(vec![0; 8]);

        let records = zonal_class_counts(&trend, &zones, &layer, &ClassScheme::trend(), 0.01, None).unwrap();
        // scheme order: loss, stable, gain
        assert_eq!(records[0].counts, vec![1, 0, 2]);
        assert_eq!(records[0].nodata_pixels, 1);
        assert_eq!(records[1].counts, vec![0, 3, 1]);
    }

    #[test]
    fn test_invalid_pixel_area() {
        let (classes, zones, layer) = setup(vec![0; 8]);
        assert!(zonal_class_counts(&classes, &zones, &layer, &ClassScheme::urban(), 0.0, None).is_err());
    }

    #[test]
    fn test_summary() {
        let (classes, zones, layer) = setup(vec![1, 1, 2, 3, 0, 255, 4, 9]);
        let scheme = ClassScheme::urban();
        let records = zonal_class_counts(&classes, &zones, &layer, &scheme, 0.01, None).unwrap();

        let summary = summarize_changes(&records, &scheme);
        assert_relative_eq!(summary.analysed_ha, 0.06, epsilon = 1e-12);
        assert_relative_eq!(summary.changed_ha, 0.05, epsilon = 1e-12);
        assert_relative_eq!(summary.changed_percent.unwrap(), 0.05 / 0.06 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(summary.net_vegetation_ha, 0.0, epsilon = 1e-12);
        assert_eq!(summary.dominant_change, Some("urbanization"));
        assert_eq!(summary.unclassified_pixels, 1);

        // zone A 66.7 % urbanization, zone B 0 %, zone C has no pixels
        let (key, mean) = summary.mean_zone_percent[1];
        assert_eq!(key, "urbanization");
        assert_relative_eq!(mean.unwrap(), 100.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let scheme = ClassScheme::trend();
        let summary = summarize_changes(&[], &scheme);
        assert_eq!(summary.changed_percent, None);
        assert_eq!(summary.dominant_change, None);
    }
}
