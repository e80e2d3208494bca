//! Continuous statistics per zone, used for anomaly z-scores

use super::rasterize::{rasterize_zones, OUTSIDE_ZONES};
use landshift_core::raster::Raster;
use landshift_core::vector::ZoneLayer;
use landshift_core::Result;

/// Continuous statistics of one named zone; statistics are `None` when the
/// zone has no valid pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStatisticsRecord {
    pub zone_id: String,
    pub count: usize,
    pub nodata_count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
}

#[derive(Default)]
struct ZoneSamples {
    values: Vec<f64>,
    missing: usize,
}

impl ZoneSamples {
    fn into_record(mut self, zone_id: String) -> ZoneStatisticsRecord {
        let n = self.values.len();
        let mut record = ZoneStatisticsRecord {
            zone_id,
            count: n,
            nodata_count: self.missing,
            mean: None,
            std_dev: None,
            min: None,
            max: None,
            median: None,
        };
        if n == 0 {
            return record;
        }

        self.values.sort_by(f64::total_cmp);
        let v = &self.values;
        let mean = v.iter().sum::<f64>() / n as f64;
        let variance = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        let mid = n / 2;

        record.mean = Some(mean);
        record.std_dev = Some(variance.sqrt());
        record.min = v.first().copied();
        record.max = v.last().copied();
        record.median = Some(if n % 2 == 1 { v[mid] } else { 0.5 * (v[mid - 1] + v[mid]) });
        record
    }
}

/// Statistics of `values` for every zone of `layer`, in identifier order.
///
/// Pixels are assigned to zones by [`rasterize_zones`]. Each zone gets a
/// record, including zones that cover no pixel. Standard deviations are
/// population values; NaN and non-finite cells count as no-data.
pub fn zonal_statistics_by_zone(values: &Raster<f64>, layer: &ZoneLayer) -> Result<Vec<ZoneStatisticsRecord>> {
    let zone_raster = rasterize_zones(layer, values)?;

    let mut samples: Vec<ZoneSamples> = (0..layer.len()).map(|_| ZoneSamples::default()).collect();
    for (&zone, &v) in zone_raster.data().iter().zip(values.data()) {
        if zone == OUTSIDE_ZONES {
            continue;
        }
        let Some(acc) = usize::try_from(zone - 1).ok().and_then(|i| samples.get_mut(i)) else {
            continue;
        };
        if values.is_nodata(v) || !v.is_finite() {
            acc.missing += 1;
        } else {
            acc.values.push(v);
        }
    }

    Ok(layer
        .iter()
        .zip(samples)
        .map(|(zone, acc)| acc.into_record(zone.id.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};
    use landshift_core::vector::Zone;
    use landshift_core::GeoTransform;

    fn grid(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 4, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    fn strip(x0: f64, x1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: 0.0), (x: x1, y: 0.0), (x: x1, y: 4.0), (x: x0, y: 4.0), (x: x0, y: 0.0),
        ]])
    }

    #[test]
    fn test_halves_get_their_own_statistics() {
        let values = grid((0..16u8).map(f64::from).collect());
        let layer = ZoneLayer::new(vec![Zone::new("west", strip(0.0, 2.0)), Zone::new("east", strip(2.0, 4.0))]).unwrap();

        let records = zonal_statistics_by_zone(&values, &layer).unwrap();
        assert_eq!(records[0].zone_id, "east");
        let west = &records[1];
        assert_eq!(west.count, 8);
        // 0,1,4,5,8,9,12,13
        assert_relative_eq!(west.mean.unwrap(), 6.5);
        assert_relative_eq!(west.median.unwrap(), 6.5);
        assert_eq!(west.min, Some(0.0));
        assert_eq!(west.max, Some(13.0));
    }

    #[test]
    fn test_constant_zone_has_zero_spread() {
        let values = grid(vec![-1.5; 16]);
        let layer = ZoneLayer::new(vec![Zone::new("all", strip(0.0, 4.0))]).unwrap();

        let all = &zonal_statistics_by_zone(&values, &layer).unwrap()[0];
        assert_eq!(all.count, 16);
        assert_relative_eq!(all.mean.unwrap(), -1.5);
        assert_relative_eq!(all.std_dev.unwrap(), 0.0);
    }

    #[test]
    fn test_every_zone_reported_even_when_empty() {
        let mut cells = vec![0.5; 16];
        for row in 0..4 {
            cells[row * 4 + 3] = f64::NAN;
        }
        let values = grid(cells);
        let layer = ZoneLayer::new(vec![
            Zone::new("far", strip(100.0, 101.0)),
            Zone::new("east", strip(3.0, 4.0)),
            Zone::new("west", strip(0.0, 3.0)),
        ])
        .unwrap();

        let records = zonal_statistics_by_zone(&values, &layer).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.zone_id.as_str()).collect();
        assert_eq!(ids, vec!["east", "far", "west"]);

        assert_eq!(records[0].count, 0);
        assert_eq!(records[0].nodata_count, 4);
        assert_eq!(records[0].mean, None);

        assert_eq!(records[1].count, 0);
        assert_eq!(records[1].nodata_count, 0);

        assert_eq!(records[2].count, 12);
        assert_relative_eq!(records[2].mean.unwrap(), 0.5);
    }
}
