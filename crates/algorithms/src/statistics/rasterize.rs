//! Burn zone polygons onto a raster grid

use crate::maybe_rayon::*;
use geo::{BoundingRect, Contains, Point, Rect};
use landshift_core::raster::{Raster, RasterElement};
use landshift_core::vector::ZoneLayer;
use landshift_core::{Error, Result};

/// Zone raster value for pixels outside every zone
pub const OUTSIDE_ZONES: i32 = 0;

/// Rasterize `zones` onto the grid of `template`.
///
/// Pixel values are 1-based positions in the layer's identifier order; a
/// pixel belongs to the first zone whose polygon strictly contains the
/// pixel centre. Pixels outside every zone are [`OUTSIDE_ZONES`].
///
/// Zones are not reprojected. A non-empty layer that claims no pixel at all
/// is an error, since it almost always means the zone coordinates are in a
/// different CRS from the raster.
pub fn rasterize_zones<T: RasterElement>(zones: &ZoneLayer, template: &Raster<T>) -> Result<Raster<i32>> {
    let (rows, cols) = template.shape();
    let transform = *template.transform();

    let envelopes: Vec<Option<Rect<f64>>> = zones.iter().map(|z| z.geometry.bounding_rect()).collect();

    let data: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![OUTSIDE_ZONES; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                let (x, y) = transform.pixel_to_geo(col, row);
                let centre = Point::new(x, y);

                let hit = zones.iter().zip(&envelopes).position(|(zone, env)| {
                    env.is_some_and(|r| {
                        x >= r.min().x && x <= r.max().x && y >= r.min().y && y <= r.max().y
                    }) && zone.geometry.contains(&centre)
                });

                if let Some(i) = hit {
                    *cell = i as i32 + 1;
                }
            }
            row_data
        })
        .collect();

    if !zones.is_empty() && data.iter().all(|&z| z == OUTSIDE_ZONES) {
        return Err(no_coverage(&envelopes, template));
    }

    template.with_data(data, Some(OUTSIDE_ZONES))
}

fn no_coverage<T: RasterElement>(envelopes: &[Option<Rect<f64>>], template: &Raster<T>) -> Error {
    let zone_extent = envelopes
        .iter()
        .flatten()
        .fold(None::<(f64, f64, f64, f64)>, |acc, r| {
            let (x0, y0, x1, y1) = (r.min().x, r.min().y, r.max().x, r.max().y);
            Some(match acc {
                None => (x0, y0, x1, y1),
                Some((a0, b0, a1, b1)) => (a0.min(x0), b0.min(y0), a1.max(x1), b1.max(y1)),
            })
        });
    let zone_extent = match zone_extent {
        Some((x0, y0, x1, y1)) => format!("({:.3}, {:.3}, {:.3}, {:.3})", x0, y0, x1, y1),
        None => "empty".to_string(),
    };
    let (x0, y0, x1, y1) = template.bounds();
    let crs = template
        .crs()
        .map(|c| c.identifier())
        .unwrap_or_else(|| "an undeclared CRS".to_string());

    Error::Vector(format!(
        "no raster pixel falls inside any zone: zones span {} but the raster covers \
         ({:.3}, {:.3}, {:.3}, {:.3}) in {}; zone coordinates are probably not in the raster CRS",
        zone_extent, x0, y0, x1, y1, crs
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use landshift_core::vector::Zone;
    use landshift_core::{GeoTransform, CRS};

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]])
    }

    fn grid() -> Raster<f64> {
        // 4x4 pixels of 10 m, covering x 0..40, y 0..40
        let mut r = Raster::filled(4, 4, 0.0);
        r.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        r
    }

    #[test]
    fn test_zone_index_follows_id_order() {
        let layer = ZoneLayer::new(vec![
            Zone::new("B", square(20.0, 0.0, 40.0, 40.0)),
            Zone::new("A", square(0.0, 0.0, 20.0, 40.0)),
        ])
        .unwrap();

        let zones = rasterize_zones(&layer, &grid()).unwrap();
        assert_eq!(zones.get(0, 0).unwrap(), 1); // A
        assert_eq!(zones.get(3, 3).unwrap(), 2); // B
    }

    #[test]
    fn test_overlap_goes_to_first_zone() {
        let layer = ZoneLayer::new(vec![
            Zone::new("2", square(0.0, 0.0, 40.0, 40.0)),
            Zone::new("1", square(0.0, 20.0, 40.0, 40.0)),
        ])
        .unwrap();

        let zones = rasterize_zones(&layer, &grid()).unwrap();
        // top half belongs to both; "1" sorts first
        assert_eq!(zones.get(0, 2).unwrap(), 1);
        assert_eq!(zones.get(3, 2).unwrap(), 2);
    }

    #[test]
    fn test_pixels_outside_zones() {
        let layer = ZoneLayer::new(vec![Zone::new("A", square(0.0, 30.0, 10.0, 40.0))]).unwrap();

        let zones = rasterize_zones(&layer, &grid()).unwrap();
        assert_eq!(zones.get(0, 0).unwrap(), 1);
        assert_eq!(zones.data().iter().filter(|&&z| z == OUTSIDE_ZONES).count(), 15);
    }

    #[test]
    fn test_geographic_zones_over_utm_grid_are_rejected() {
        let mut utm = Raster::filled(4, 4, 0.0);
        utm.set_transform(GeoTransform::new(260_000.0, 6_345_040.0, 10.0, -10.0));
        utm.set_crs(Some(CRS::utm_19s()));
        let lonlat = ZoneLayer::new(vec![Zone::new("A", square(-71.6, -33.1, -71.5, -33.0))]).unwrap();

        let err = rasterize_zones(&lonlat, &utm).unwrap_err();
        match err {
            Error::Vector(msg) => {
                assert!(msg.contains("CRS"), "{}", msg);
                assert!(msg.contains(&CRS::utm_19s().identifier()), "{}", msg);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_layer_leaves_every_pixel_outside() {
        let zones = rasterize_zones(&ZoneLayer::new(vec![]).unwrap(), &grid()).unwrap();
        assert!(zones.data().iter().all(|&z| z == OUTSIDE_ZONES));
    }
}
