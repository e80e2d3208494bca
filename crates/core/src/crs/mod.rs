//! EPSG-coded reference systems

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference system of a raster, identified by its EPSG code.
///
/// GeoTIFFs written by the pipeline carry only GeoKey EPSG codes, so that
/// is all a grid needs to remember.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// Geographic WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// WGS 84 / UTM zone 19S (EPSG:32719), the projection of the Viña del
    /// Mar composites
    pub fn utm_19s() -> Self {
        Self::from_epsg(32719)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Angular (degree) coordinates; the EPSG geographic 2D block 4000-4999
    pub fn is_geographic(&self) -> bool {
        (4000..5000).contains(&self.epsg)
    }

    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.epsg == other.epsg
    }

    /// `EPSG:<code>`
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utm_zone_is_projected() {
        let crs = CRS::utm_19s();
        assert_eq!(crs.epsg(), 32719);
        assert_eq!(crs.to_string(), "EPSG:32719");
        assert!(!crs.is_geographic());
        assert!(CRS::wgs84().is_geographic());
    }

    #[test]
    fn test_equivalence_follows_code() {
        assert!(CRS::from_epsg(32719).is_equivalent(&CRS::utm_19s()));
        assert!(!CRS::utm_19s().is_equivalent(&CRS::wgs84()));
    }
}
