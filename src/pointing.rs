use log::info;

use crate::actuator::ActuatorBank;
use crate::compass::Direction;
use crate::controller::{AttitudeController, Convergence};
use crate::deadzone::TravelEnvelope;
use crate::error::{CalibrationError, ControlError, PointingError};
use crate::geodetic::{Declination, GeodeticProjector};
use crate::orientation::{Orientation, OrientationSource};
use crate::position::Position;

/// Front door of the engine: accepts targets as angles, offsets or
/// coordinates and turns them into moves of the attitude controller.
pub struct Pointer<S: OrientationSource, A: ActuatorBank> {
    controller: AttitudeController<S, A>,
    projector: GeodeticProjector,
}

impl<S: OrientationSource, A: ActuatorBank> Pointer<S, A> {
    pub fn new(controller: AttitudeController<S, A>, declination: Declination) -> Self {
        Self {
            controller,
            projector: GeodeticProjector::new(declination),
        }
    }

    pub fn controller(&self) -> &AttitudeController<S, A> {
        &self.controller
    }

    pub fn projector(&self) -> &GeodeticProjector {
        &self.projector
    }

    pub fn initialize(&mut self) -> Result<TravelEnvelope, CalibrationError> {
        self.controller.initialize()
    }

    pub fn goto(&mut self, yaw: f64, pitch: f64) -> Result<Convergence, ControlError> {
        self.controller.goto(yaw, pitch)
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    pub fn set_origin(&mut self, lat: f64, lon: f64) -> Result<(), PointingError> {
        self.projector.set_origin(lat, lon)?;
        info!("Origin set to {}", Position::new(lat, lon));
        Ok(())
    }

    pub fn origin(&self) -> Option<Position> {
        self.projector.origin()
    }

    /// Applies to every target resolved afterwards. A NaN or infinite value is
    /// rejected and the previous declination stays.
    pub fn set_declination(&self, degrees: f64) -> Result<(), PointingError> {
        self.projector.declination().set(degrees)?;
        info!("Declination set to {:.2}°", degrees);
        Ok(())
    }

    pub fn declination(&self) -> f64 {
        self.projector.declination().get()
    }

    /// True bearing the head is pointing at, if the sensor is live.
    pub fn get_bearing(&self) -> Option<f64> {
        self.controller
            .live_orientation()
            .map(|o| self.projector.get_bearing(&o))
    }

    pub fn get_orientation(&self) -> Option<Orientation> {
        self.controller.get_orientation()
    }

    /// Point at a spot `northing`/`easting` meters from the gimbal and
    /// `elevation` meters above it. Without an elevation pitch is held.
    pub fn point_at_relative(
        &mut self,
        northing: f64,
        easting: f64,
        elevation: Option<f64>,
    ) -> Result<Convergence, PointingError> {
        let current = self.controller.live_orientation();
        let (yaw, pitch) =
            self.projector
                .bearing_elevation(northing, easting, elevation, current.as_ref())?;

        let true_bearing = self.projector.true_bearing(yaw);
        info!(
            "Target {:.1} m N, {:.1} m E: bearing {:.1}° ({}), yaw {:.1}°, pitch {:.1}°",
            northing,
            easting,
            true_bearing,
            Direction::from_heading(true_bearing),
            yaw,
            pitch
        );

        Ok(self.controller.goto(yaw, pitch)?)
    }

    /// Point at a coordinate on the ground plane of the origin.
    pub fn point_at_absolute(&mut self, lat: f64, lon: f64) -> Result<Convergence, PointingError> {
        let (northing, easting) = self.projector.relative_offset(lat, lon)?;
        self.point_at_relative(northing, easting, Some(0.0))
    }
}
