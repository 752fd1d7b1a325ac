//! Region-of-interest check for portal coordinates

use crate::config::GeofenceConfig;

/// Inclusive latitude/longitude box in micro-degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geofence {
    pub min_lat_e6: i64,
    pub max_lat_e6: i64,
    pub min_lng_e6: i64,
    pub max_lng_e6: i64,
}

impl Geofence {
    pub fn new(config: &GeofenceConfig) -> Self {
        Self {
            min_lat_e6: config.min_lat_e6,
            max_lat_e6: config.max_lat_e6,
            min_lng_e6: config.min_lng_e6,
            max_lng_e6: config.max_lng_e6,
        }
    }

    pub fn within_range(&self, lat_e6: i64, lng_e6: i64) -> bool {
        (self.min_lat_e6..=self.max_lat_e6).contains(&lat_e6)
            && (self.min_lng_e6..=self.max_lng_e6).contains(&lng_e6)
    }
}

impl Default for Geofence {
    fn default() -> Self {
        Self::new(&GeofenceConfig::default())
    }
}
