//! Zone polygons for zonal aggregation
//!
//! Zones come from a GeoJSON FeatureCollection whose features carry a
//! polygonal geometry and an identifier attribute. Coordinates are taken
//! as-is: they must already be in the CRS of the rasters they are burned
//! onto.

use crate::error::{Error, Result};
use geo_types::{Geometry, MultiPolygon};
use geojson::{FeatureCollection, GeoJson, JsonValue};
use std::fs;
use std::path::Path;

/// Attribute used for zone identifiers when none is configured
pub const DEFAULT_ID_FIELD: &str = "zone_id";

/// An identified polygonal zone (a census block, a district, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}

impl Zone {
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
        }
    }
}

/// Zones sorted by identifier (byte-wise), identifiers unique
#[derive(Debug, Clone, Default)]
pub struct ZoneLayer {
    zones: Vec<Zone>,
}

impl ZoneLayer {
    /// Build a layer, sorting by identifier and rejecting duplicates
    pub fn new(mut zones: Vec<Zone>) -> Result<Self> {
        zones.sort_by(|a, b| a.id.cmp(&b.id));

        if let Some(pair) = zones.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(Error::Vector(format!("duplicate zone id '{}'", pair[0].id)));
        }

        Ok(Self { zones })
    }

    /// Parse a GeoJSON FeatureCollection, reading identifiers from `id_field`
    ///
    /// Features must have a Polygon or MultiPolygon geometry and a string or
    /// numeric `id_field` property.
    pub fn from_geojson_str(text: &str, id_field: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse()?;
        let collection = FeatureCollection::try_from(geojson)?;

        let mut zones = Vec::with_capacity(collection.features.len());
        for (i, feature) in collection.features.into_iter().enumerate() {
            let id = match feature.property(id_field) {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Number(n)) => n
                    .as_i64()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| n.to_string()),
                Some(other) => {
                    return Err(Error::Vector(format!(
                        "feature {}: '{}' must be a string or number, got {}",
                        i, id_field, other
                    )))
                }
                None => {
                    return Err(Error::Vector(format!(
                        "feature {}: missing '{}' attribute",
                        i, id_field
                    )))
                }
            };

            let geometry = feature
                .geometry
                .ok_or_else(|| Error::Vector(format!("zone '{}' has no geometry", id)))?;
            let geometry = Geometry::<f64>::try_from(geometry)?;

            let polygons = match geometry {
                Geometry::MultiPolygon(mp) => mp,
                Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                _ => {
                    return Err(Error::Vector(format!(
                        "zone '{}' is not a Polygon or MultiPolygon",
                        id
                    )))
                }
            };

            zones.push(Zone::new(id, polygons));
        }

        Self::new(zones)
    }

    /// Zones in identifier order
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone by identifier
    pub fn get(&self, id: &str) -> Option<&Zone> {
        self.zones
            .binary_search_by(|z| z.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.zones[i])
    }

    /// Identifiers in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|z| z.id.as_str())
    }
}

impl<'a> IntoIterator for &'a ZoneLayer {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.zones.iter()
    }
}

/// Read zones from a GeoJSON file
pub fn read_zones_geojson<P: AsRef<Path>>(path: P, id_field: &str) -> Result<ZoneLayer> {
    let text = fs::read_to_string(path.as_ref())?;
    ZoneLayer::from_geojson_str(&text, id_field)
}
