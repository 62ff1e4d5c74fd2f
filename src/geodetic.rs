use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::compass::normalize;
use crate::error::PointingError;
use crate::orientation::Orientation;
use crate::position::Position;
use crate::projection::TransverseMercator;

/// Offset between sensor yaw and true bearing, in degrees.
///
/// Clones share one cell, and every `set` is a single atomic store, so a
/// reader never observes a half-written value.
#[derive(Clone, Debug)]
pub struct Declination(Arc<AtomicU64>);

impl Declination {
    pub fn new(degrees: f64) -> Self {
        Self(Arc::new(AtomicU64::new(degrees.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// NaN and infinities are rejected and leave the current value in place.
    pub fn set(&self, degrees: f64) -> Result<(), PointingError> {
        if !degrees.is_finite() {
            return Err(PointingError::InvalidDeclination(degrees));
        }
        self.0.store(degrees.to_bits(), Ordering::Release);
        Ok(())
    }
}

/// Converts geographic targets into look angles relative to a stored origin.
#[derive(Clone, Debug)]
pub struct GeodeticProjector {
    origin: Option<Position>,
    declination: Declination,
}

impl GeodeticProjector {
    pub fn new(declination: Declination) -> Self {
        Self {
            origin: None,
            declination,
        }
    }

    pub fn set_origin(&mut self, lat: f64, lon: f64) -> Result<(), PointingError> {
        let origin = checked_position(lat, lon)?;
        debug!("Origin set to {}", origin);
        self.origin = Some(origin);
        Ok(())
    }

    pub fn origin(&self) -> Option<Position> {
        self.origin
    }

    pub fn declination(&self) -> &Declination {
        &self.declination
    }

    /// `(northing, easting)` of a point from the origin, in meters, on a
    /// transverse Mercator plane centred on the origin.
    pub fn relative_offset(&self, lat: f64, lon: f64) -> Result<(f64, f64), PointingError> {
        let origin = self.origin.ok_or(PointingError::OriginUnset)?;
        let target = checked_position(lat, lon)?;

        let projection = TransverseMercator::new(origin.longitude);
        let (origin_north, origin_east) = projection.forward(origin);
        let (target_north, target_east) = projection.forward(target);

        Ok((target_north - origin_north, target_east - origin_east))
    }

    /// Look angles for a point at the given offset from the gimbal.
    ///
    /// Returns `(azimuth, pitch)`: azimuth in the sensor's yaw frame (true
    /// bearing minus declination), pitch from the straight-line range. With no
    /// elevation, or when an angle is undefined because the offset is zero,
    /// the `current` attitude is reused so that axis does not move.
    pub fn bearing_elevation(
        &self,
        northing: f64,
        easting: f64,
        elevation: Option<f64>,
        current: Option<&Orientation>,
    ) -> Result<(f64, f64), PointingError> {
        if !(northing.is_finite() && easting.is_finite() && elevation.is_none_or(f64::is_finite)) {
            return Err(PointingError::InvalidOffset {
                northing,
                easting,
                elevation,
            });
        }
        let azimuth = match true_azimuth(northing, easting) {
            Some(bearing) => normalize(bearing - self.declination.get()),
            None => current.ok_or(PointingError::NoOrientation)?.yaw,
        };

        let pitch = match elevation.and_then(|el| look_elevation(northing, easting, el)) {
            Some(pitch) => pitch,
            None => current.ok_or(PointingError::NoOrientation)?.pitch,
        };

        Ok((normalize(azimuth), pitch))
    }

    /// Sensor yaw corrected to a true bearing.
    pub fn get_bearing(&self, orientation: &Orientation) -> f64 {
        self.true_bearing(orientation.yaw)
    }

    /// True bearing in `[0, 360)` of a yaw in the sensor frame.
    pub fn true_bearing(&self, yaw: f64) -> f64 {
        normalize(normalize(yaw) + self.declination.get())
    }
}

/// Bearing of an offset from north, clockwise, before declination.
/// `None` when the horizontal offset is zero.
pub fn true_azimuth(northing: f64, easting: f64) -> Option<f64> {
    if northing == 0.0 && easting == 0.0 {
        return None;
    }
    Some(normalize(easting.atan2(northing).to_degrees()))
}

/// Elevation angle of the straight line to an offset. `None` at zero range.
pub fn look_elevation(northing: f64, easting: f64, elevation: f64) -> Option<f64> {
    let range = (northing * northing + easting * easting + elevation * elevation).sqrt();
    if range == 0.0 {
        return None;
    }
    Some((elevation / range).asin().to_degrees())
}

fn checked_position(lat: f64, lon: f64) -> Result<Position, PointingError> {
    let position = Position::new(lat, lon);
    if position.is_valid() {
        Ok(position)
    } else {
        Err(PointingError::InvalidCoordinate { lat, lon })
    }
}
