use std::fmt;

use serde::Deserialize;

/// Mean Earth radius in meters, for the spherical helpers.
const EARTH_RADIUS: f64 = 6371000.0;

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}°, {:.6}°)", self.latitude, self.longitude)
    }
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite, with latitude in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }

    /// Initial great-circle heading from this position to another.
    /// Returns degrees in [0, 360), 0 is North.
    pub fn heading_to(&self, other: &Position) -> f64 {
        let lat_from = self.latitude.to_radians();
        let lat_to = other.latitude.to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let y = delta_lon.sin() * lat_to.cos();
        let x = lat_from.cos() * lat_to.sin() - lat_from.sin() * lat_to.cos() * delta_lon.cos();

        crate::compass::normalize(y.atan2(x).to_degrees())
    }

    /// Great-circle distance in meters (haversine formula).
    pub fn distance_to(&self, other: &Position) -> f64 {
        let lat_from = self.latitude.to_radians();
        let lat_to = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat_from.cos() * lat_to.cos() * (delta_lon / 2.0).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS * c
    }
}
