pub mod actuator;
pub mod compass;
pub mod config;
pub mod controller;
pub mod deadzone;
pub mod error;
pub mod geodetic;
pub mod gps;
pub mod imu;
pub mod orientation;
pub mod pointing;
pub mod position;
pub mod projection;
pub mod relay;
pub mod signal;
pub mod sim;

// Re-export commonly used types
pub use actuator::{ActuatorBank, Channel};
pub use config::GimbalConfig;
pub use controller::{AttitudeController, CancelToken, Convergence};
pub use deadzone::TravelEnvelope;
pub use error::GimbalError;
pub use geodetic::Declination;
pub use orientation::{Orientation, OrientationSource};
pub use pointing::Pointer;
pub use position::Position;

#[cfg(test)]
pub(crate) mod mocks;
