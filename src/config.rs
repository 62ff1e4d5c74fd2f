use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::GimbalError;
use crate::position::Position;

// ** CONTROL CONFIGURATION ** //

/// Error below which an axis counts as on target (degrees).
pub const DEADBAND_DEGREES: f64 = 2.0;
/// Delay between control ticks.
pub const POLL_INTERVAL_SECS: f64 = 0.5;

// ** CALIBRATION CONFIGURATION ** //
// Sized for a Bescor MP-101 head. Slower or faster motors need other values.

/// Time to hold a pitch relay to reach the tilt stop.
pub const PITCH_SWEEP_SECS: f64 = 20.0;
/// Time to hold a yaw relay to reach the pan stop. Full pan travel is longer than tilt.
pub const YAW_SWEEP_SECS: f64 = 50.0;

// ** GEODETIC CONFIGURATION ** //

/// Magnetic declination of the home site (degrees east). No geomagnetic model is applied.
pub const DECLINATION_DEGREES: f64 = 13.0;

// ** GPIO CONFIGURATION ** //
// BCM numbering. Relay 4 Zero shield on physical pins 31, 33, 35, 37.
// The first relay of each pair runs the head back toward lower angles.

pub const RELAY_YAW_NEG_PIN: u8 = 6;
pub const RELAY_YAW_POS_PIN: u8 = 13;
pub const RELAY_PITCH_DOWN_PIN: u8 = 19;
pub const RELAY_PITCH_UP_PIN: u8 = 26;

// ** IMU CONFIGURATION ** //

/// WitMotion BWT901CL paired over Bluetooth serial.
pub const IMU_DEVICE_PATH: &str = "/dev/rfcomm0";
pub const IMU_BAUD_RATE: u32 = 115200;
/// Acceleration older than this marks the sensor as not live.
pub const IMU_STALE_AFTER_MS: u64 = 2000;

/// Full runtime configuration. Every field may be omitted from the TOML file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GimbalConfig {
    pub control: ControlConfig,
    pub calibration: CalibrationConfig,
    pub geodetic: GeodeticConfig,
    pub relays: RelayPins,
    pub imu: ImuConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub deadband_deg: f64,
    pub poll_interval_secs: f64,
    /// Give up a move after this many ticks. Unbounded when unset.
    pub max_ticks: Option<u64>,
    /// Give up a move after this long. Unbounded when unset.
    pub timeout_secs: Option<f64>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            deadband_deg: DEADBAND_DEGREES,
            poll_interval_secs: POLL_INTERVAL_SECS,
            max_ticks: None,
            timeout_secs: None,
        }
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub pitch_sweep_secs: f64,
    pub yaw_sweep_secs: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pitch_sweep_secs: PITCH_SWEEP_SECS,
            yaw_sweep_secs: YAW_SWEEP_SECS,
        }
    }
}

impl CalibrationConfig {
    pub fn pitch_sweep(&self) -> Duration {
        secs(self.pitch_sweep_secs)
    }

    pub fn yaw_sweep(&self) -> Duration {
        secs(self.yaw_sweep_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeodeticConfig {
    pub declination_deg: f64,
    pub origin: Option<Position>,
}

impl Default for GeodeticConfig {
    fn default() -> Self {
        Self {
            declination_deg: DECLINATION_DEGREES,
            origin: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayPins {
    pub yaw_pos: u8,
    pub yaw_neg: u8,
    pub pitch_up: u8,
    pub pitch_down: u8,
    /// The relay board energizes on a low output.
    pub active_low: bool,
}

impl Default for RelayPins {
    fn default() -> Self {
        Self {
            yaw_pos: RELAY_YAW_POS_PIN,
            yaw_neg: RELAY_YAW_NEG_PIN,
            pitch_up: RELAY_PITCH_UP_PIN,
            pitch_down: RELAY_PITCH_DOWN_PIN,
            active_low: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImuConfig {
    pub path: String,
    pub baud: u32,
    pub stale_after_ms: u64,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            path: IMU_DEVICE_PATH.to_string(),
            baud: IMU_BAUD_RATE,
            stale_after_ms: IMU_STALE_AFTER_MS,
        }
    }
}

impl ImuConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl GimbalConfig {
    pub fn from_toml(text: &str) -> Result<Self, GimbalError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, GimbalError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), GimbalError> {
        let durations = [
            ("control.poll_interval_secs", Some(self.control.poll_interval_secs)),
            ("control.timeout_secs", self.control.timeout_secs),
            ("calibration.pitch_sweep_secs", Some(self.calibration.pitch_sweep_secs)),
            ("calibration.yaw_sweep_secs", Some(self.calibration.yaw_sweep_secs)),
        ];
        for (name, value) in durations {
            if let Some(v) = value
                && !(v.is_finite() && v >= 0.0)
            {
                return Err(GimbalError::InvalidSetting(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, v
                )));
            }
        }

        if !(self.control.deadband_deg.is_finite() && self.control.deadband_deg >= 0.0) {
            return Err(GimbalError::InvalidSetting(format!(
                "control.deadband_deg must be non-negative, got {}",
                self.control.deadband_deg
            )));
        }

        if self.imu.baud == 0 {
            return Err(GimbalError::InvalidSetting(
                "imu.baud must be positive".to_string(),
            ));
        }

        if !self.geodetic.declination_deg.is_finite() {
            return Err(GimbalError::InvalidSetting(
                "geodetic.declination_deg must be finite".to_string(),
            ));
        }

        if let Some(origin) = self.geodetic.origin
            && !origin.is_valid()
        {
            return Err(GimbalError::InvalidSetting(format!(
                "geodetic.origin {} is not a valid coordinate",
                origin
            )));
        }

        Ok(())
    }
}

/// Values too large for a `Duration` saturate. Negative or NaN values
/// collapse to zero, but `validate` rejects them first.
fn secs(value: f64) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) => duration,
        Err(_) if value > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GimbalConfig::default();
        assert_eq!(config.control.deadband_deg, 2.0);
        assert_eq!(config.control.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.calibration.pitch_sweep(), Duration::from_secs(20));
        assert_eq!(config.calibration.yaw_sweep(), Duration::from_secs(50));
        assert_eq!(config.geodetic.declination_deg, DECLINATION_DEGREES);
        assert!(config.geodetic.origin.is_none());
        assert_eq!(config.relays.pitch_down, 19);
        assert_eq!(config.relays.yaw_neg, 6);
        assert_eq!(config.control.timeout(), None);
        assert_eq!(config.imu.baud, 115200);
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = GimbalConfig::from_toml("[control]\ntimeout_secs = 1e30\n").unwrap();
        assert_eq!(config.control.timeout(), Some(Duration::MAX));

        let config = GimbalConfig::from_toml("[control]\ntimeout_secs = inf\n");
        assert!(matches!(config, Err(GimbalError::InvalidSetting(_))));
    }

    #[test]
    fn test_rejects_zero_baud() {
        let result = GimbalConfig::from_toml("[imu]\nbaud = 0\n");
        assert!(matches!(result, Err(GimbalError::InvalidSetting(_))));
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(GimbalConfig::from_toml("").unwrap(), GimbalConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = GimbalConfig::from_toml(
            r#"
            [control]
            deadband_deg = 1.5
            max_ticks = 400

            [calibration]
            yaw_sweep_secs = 35.0

            [geodetic]
            declination_deg = -4.25
            origin = { latitude = 36.9517, longitude = -122.0261 }
            "#,
        )
        .unwrap();

        assert_eq!(config.control.deadband_deg, 1.5);
        assert_eq!(config.control.max_ticks, Some(400));
        assert_eq!(config.control.poll_interval_secs, POLL_INTERVAL_SECS);
        assert_eq!(config.calibration.yaw_sweep(), Duration::from_secs(35));
        assert_eq!(config.calibration.pitch_sweep_secs, PITCH_SWEEP_SECS);
        assert_eq!(config.geodetic.declination_deg, -4.25);
        assert_eq!(
            config.geodetic.origin,
            Some(Position::new(36.9517, -122.0261))
        );
    }

    #[test]
    fn test_rejects_negative_durations() {
        let result = GimbalConfig::from_toml("[calibration]\npitch_sweep_secs = -1.0\n");
        assert!(matches!(result, Err(GimbalError::InvalidSetting(_))));
    }

    #[test]
    fn test_rejects_out_of_range_origin() {
        let result = GimbalConfig::from_toml(
            "[geodetic]\norigin = { latitude = 91.0, longitude = 0.0 }\n",
        );
        assert!(matches!(result, Err(GimbalError::InvalidSetting(_))));
    }

    #[test]
    fn test_rejects_unknown_types() {
        let result = GimbalConfig::from_toml("[control]\ndeadband_deg = \"wide\"\n");
        assert!(matches!(result, Err(GimbalError::Config(_))));
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "[imu]\npath = \"/dev/ttyUSB0\"\nbaud = 9600\nstale_after_ms = 500"
        )?;

        let config = GimbalConfig::load(file.path())?;
        assert_eq!(config.imu.path, "/dev/ttyUSB0");
        assert_eq!(config.imu.baud, 9600);
        assert_eq!(config.imu.stale_after(), Duration::from_millis(500));

        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let result = GimbalConfig::load(Path::new("/nonexistent/gimbal.toml"));
        assert!(matches!(result, Err(GimbalError::Io(_))));
    }
}
