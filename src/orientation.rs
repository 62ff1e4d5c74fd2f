use std::fmt;

use crate::compass::normalize;

/// One attitude sample from the inertial sensor, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Orientation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// The sensor has reported acceleration recently. Used as the liveness flag.
    pub accel_present: bool,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "yaw {:.1}°, pitch {:.1}°, roll {:.1}°",
            self.yaw, self.pitch, self.roll
        )
    }
}

impl Orientation {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self {
            yaw: normalize(yaw),
            pitch,
            roll,
            accel_present: true,
        }
    }

    pub fn is_live(&self) -> bool {
        self.accel_present
    }
}

/// Anything that can report the gimbal's latest attitude.
///
/// `read` must not block. It returns `None` while the sensor has produced no
/// angles yet, and may return stale data; callers check [`Orientation::is_live`].
pub trait OrientationSource {
    fn read(&self) -> Option<Orientation>;
}

impl<S: OrientationSource + ?Sized> OrientationSource for &S {
    fn read(&self) -> Option<Orientation> {
        (**self).read()
    }
}

/// A sample that is present and live, with yaw normalized.
pub(crate) fn live_sample<S: OrientationSource + ?Sized>(source: &S) -> Option<Orientation> {
    source
        .read()
        .filter(Orientation::is_live)
        .map(|o| Orientation {
            yaw: normalize(o.yaw),
            ..o
        })
}
