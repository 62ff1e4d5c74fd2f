use thiserror::Error;

use crate::controller::ControlState;

/// Why a `goto` returned without converging.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error(
        "Setpoint not reached after {ticks} ticks (yaw: {yaw:?}, pitch: {pitch:?}, yaw target in deadzone: {yaw_in_deadzone})"
    )]
    DidNotConverge {
        ticks: u64,
        yaw: ControlState,
        pitch: ControlState,
        yaw_in_deadzone: bool,
    },

    #[error("Setpoint must be finite, got yaw {yaw} pitch {pitch}")]
    InvalidSetpoint { yaw: f64, pitch: f64 },

    #[error("Move cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("No orientation data while recording {limit}")]
    NoOrientation { limit: &'static str },

    #[error("Calibration cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PointingError {
    #[error("Origin has not been set")]
    OriginUnset,

    #[error("Invalid coordinate: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Target offset must be finite, got ({northing}, {easting}, {elevation:?})")]
    InvalidOffset {
        northing: f64,
        easting: f64,
        elevation: Option<f64>,
    },

    #[error("Declination must be finite, got {0}")]
    InvalidDeclination(f64),

    #[error("No orientation data available to resolve the target")]
    NoOrientation,

    #[error(transparent)]
    Control(#[from] ControlError),
}

/// Crate-level error for hardware bring-up, configuration and the binaries.
#[derive(Debug, Error)]
pub enum GimbalError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Pointing(#[from] PointingError),
}
