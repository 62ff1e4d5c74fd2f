//! Mechanical travel limits of the head and the sweep that measures them.
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::actuator::{ActuatorBank, Channel, Interlock};
use crate::compass::normalize;
use crate::config::CalibrationConfig;
use crate::controller::CancelToken;
use crate::error::CalibrationError;
use crate::orientation::{Orientation, OrientationSource, live_sample};

/// Reads attempted after releasing a relay before a limit is given up on.
const RECORD_ATTEMPTS: u32 = 5;

/// Bearings at the mechanical stops, captured by [`sweep`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TravelEnvelope {
    pub yaw_cw_limit: f64,
    pub yaw_ccw_limit: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
}

impl fmt::Display for TravelEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "yaw cw {:.1}° / ccw {:.1}°, pitch {:.1}° to {:.1}°",
            self.yaw_cw_limit, self.yaw_ccw_limit, self.pitch_min, self.pitch_max
        )
    }
}

impl TravelEnvelope {
    pub fn new(yaw_cw_limit: f64, yaw_ccw_limit: f64, pitch_min: f64, pitch_max: f64) -> Self {
        Self {
            yaw_cw_limit: normalize(yaw_cw_limit),
            yaw_ccw_limit: normalize(yaw_ccw_limit),
            pitch_min,
            pitch_max,
        }
    }

    /// True when a yaw bearing cannot be reached.
    ///
    /// With `cw < ccw` the reachable arc is the open interval `(cw, ccw)`.
    /// Otherwise the blocked arc straddles north and covers everything above
    /// `cw` or below `ccw`.
    pub fn is_in_deadzone(&self, angle: f64) -> bool {
        let angle = normalize(angle);
        if self.yaw_cw_limit < self.yaw_ccw_limit {
            !(angle > self.yaw_cw_limit && angle < self.yaw_ccw_limit)
        } else {
            angle > self.yaw_cw_limit || angle < self.yaw_ccw_limit
        }
    }

    pub fn pitch_in_range(&self, pitch: f64) -> bool {
        (self.pitch_min..=self.pitch_max).contains(&pitch)
    }
}

/// Open-loop sweep into each mechanical stop: pitch down, pitch up, yaw
/// clockwise, yaw counter-clockwise. Blocks for the sum of the configured
/// sweep times. All relays are off when this returns, whatever the outcome.
pub fn sweep<S, A>(
    source: &S,
    actuators: &mut Interlock<A>,
    timings: &CalibrationConfig,
    poll_interval: Duration,
    cancel: &CancelToken,
) -> Result<TravelEnvelope, CalibrationError>
where
    S: OrientationSource + ?Sized,
    A: ActuatorBank,
{
    let mut run = Sweep {
        source,
        actuators: &mut *actuators,
        poll_interval,
        cancel,
    };
    let result = run.all_stops(timings);

    actuators.release_all();
    match &result {
        Ok(envelope) => info!("Calibration complete: {}", envelope),
        Err(e) => warn!("Calibration aborted: {}", e),
    }
    result
}

struct Sweep<'a, S: ?Sized, A: ActuatorBank> {
    source: &'a S,
    actuators: &'a mut Interlock<A>,
    poll_interval: Duration,
    cancel: &'a CancelToken,
}

impl<S: OrientationSource + ?Sized, A: ActuatorBank> Sweep<'_, S, A> {
    fn all_stops(&mut self, timings: &CalibrationConfig) -> Result<TravelEnvelope, CalibrationError> {
        let pitch_min = self.to_stop(Channel::PitchDown, timings.pitch_sweep(), "pitch_min")?.pitch;
        let pitch_max = self.to_stop(Channel::PitchUp, timings.pitch_sweep(), "pitch_max")?.pitch;
        let yaw_cw = self.to_stop(Channel::YawPos, timings.yaw_sweep(), "yaw_cw_limit")?.yaw;
        let yaw_ccw = self.to_stop(Channel::YawNeg, timings.yaw_sweep(), "yaw_ccw_limit")?.yaw;

        Ok(TravelEnvelope::new(yaw_cw, yaw_ccw, pitch_min, pitch_max))
    }

    /// Hold one relay for `duration`, release it, and record where the head stopped.
    fn to_stop(
        &mut self,
        channel: Channel,
        duration: Duration,
        limit: &'static str,
    ) -> Result<Orientation, CalibrationError> {
        info!("Calibrating {}: driving {:?} for {:?}", limit, channel, duration);
        self.actuators.set(channel, true);

        let start = Instant::now();
        while start.elapsed() < duration {
            if self.cancel.take() {
                return Err(CalibrationError::Cancelled);
            }
            let remaining = duration.saturating_sub(start.elapsed());
            thread::sleep(self.poll_interval.min(remaining));
            if let Some(sample) = live_sample(self.source) {
                debug!("  {:?} held, {}", channel, sample);
            }
        }

        self.actuators.set(channel, false);

        for attempt in 1..=RECORD_ATTEMPTS {
            if let Some(sample) = live_sample(self.source) {
                info!("  {} recorded at {}", limit, sample);
                return Ok(sample);
            }
            warn!(
                "  No IMU data for {} (attempt {}/{})",
                limit, attempt, RECORD_ATTEMPTS
            );
            thread::sleep(self.poll_interval);
        }

        Err(CalibrationError::NoOrientation { limit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimGimbal;

    fn fast_timings() -> CalibrationConfig {
        CalibrationConfig {
            pitch_sweep_secs: 0.02,
            yaw_sweep_secs: 0.02,
        }
    }

    // region: classification
    #[test]
    fn test_wraparound_deadzone() {
        let envelope = TravelEnvelope::new(350.0, 10.0, -30.0, 60.0);

        assert!(envelope.is_in_deadzone(355.0));
        assert!(envelope.is_in_deadzone(5.0));
        assert!(!envelope.is_in_deadzone(180.0));
        assert!(!envelope.is_in_deadzone(20.0));
    }

    #[test]
    fn test_non_wraparound_deadzone() {
        // cw < ccw: the open interval between them is reachable
        let envelope = TravelEnvelope::new(10.0, 350.0, -30.0, 60.0);

        assert!(!envelope.is_in_deadzone(20.0));
        assert!(!envelope.is_in_deadzone(180.0));
        assert!(envelope.is_in_deadzone(5.0));
        assert!(envelope.is_in_deadzone(355.0));
    }

    #[test]
    fn test_limits_are_boundaries() {
        let wrapped = TravelEnvelope::new(350.0, 10.0, 0.0, 0.0);
        assert!(!wrapped.is_in_deadzone(350.0));
        assert!(!wrapped.is_in_deadzone(10.0));

        let open = TravelEnvelope::new(10.0, 350.0, 0.0, 0.0);
        assert!(open.is_in_deadzone(10.0));
        assert!(open.is_in_deadzone(350.0));
    }

    #[test]
    fn test_equal_limits_take_wraparound_branch() {
        let envelope = TravelEnvelope::new(90.0, 90.0, 0.0, 0.0);
        assert!(envelope.is_in_deadzone(91.0));
        assert!(envelope.is_in_deadzone(89.0));
        assert!(!envelope.is_in_deadzone(90.0));
    }

    #[test]
    fn test_query_angle_is_normalized() {
        let envelope = TravelEnvelope::new(350.0, 10.0, 0.0, 0.0);
        assert!(envelope.is_in_deadzone(-5.0));
        assert!(envelope.is_in_deadzone(365.0));
        assert!(!envelope.is_in_deadzone(-180.0));
    }

    #[test]
    fn test_limits_stored_normalized() {
        let envelope = TravelEnvelope::new(-10.0, 370.0, -30.0, 60.0);
        assert_eq!(envelope.yaw_cw_limit, 350.0);
        assert_eq!(envelope.yaw_ccw_limit, 10.0);
        assert!(envelope.pitch_in_range(0.0));
        assert!(!envelope.pitch_in_range(61.0));
    }
    // endregion: classification

    // region: sweep
    #[test]
    fn test_sweep_finds_stops() {
        let sim = SimGimbal::new(180.0, 0.0)
            .with_yaw_stops(10.0, 350.0)
            .with_pitch_stops(-30.0, 60.0)
            .with_steps(1000.0, 1000.0);
        let mut actuators = Interlock::new(sim.clone());

        let envelope = sweep(
            &sim,
            &mut actuators,
            &fast_timings(),
            Duration::from_millis(1),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(envelope, TravelEnvelope::new(350.0, 10.0, -30.0, 60.0));
        assert!(!sim.any_on());
        assert_eq!(sim.overlaps(), 0);
    }

    #[test]
    fn test_sweep_tolerates_brief_dropouts() {
        let sim = SimGimbal::new(180.0, 0.0)
            .with_yaw_stops(10.0, 350.0)
            .with_pitch_stops(-30.0, 60.0)
            .with_steps(1000.0, 1000.0);
        let mut actuators = Interlock::new(sim.clone());
        // Zero sweep time: the only reads are the recording ones
        let timings = CalibrationConfig {
            pitch_sweep_secs: 0.0,
            yaw_sweep_secs: 0.0,
        };
        sim.drop_next_reads(RECORD_ATTEMPTS - 1);

        let envelope = sweep(&sim, &mut actuators, &timings, Duration::ZERO, &CancelToken::new());

        assert!(envelope.is_ok());
    }

    #[test]
    fn test_sweep_fails_without_orientation() {
        let sim = SimGimbal::new(180.0, 0.0);
        let mut actuators = Interlock::new(sim.clone());
        sim.drop_next_reads(u32::MAX);

        let result = sweep(
            &sim,
            &mut actuators,
            &fast_timings(),
            Duration::ZERO,
            &CancelToken::new(),
        );

        assert_eq!(
            result,
            Err(CalibrationError::NoOrientation { limit: "pitch_min" })
        );
        assert!(!sim.any_on());
    }

    #[test]
    fn test_sweep_can_be_cancelled() {
        let sim = SimGimbal::new(180.0, 0.0);
        let mut actuators = Interlock::new(sim.clone());
        let cancel = CancelToken::new();
        cancel.cancel();

        let timings = CalibrationConfig {
            pitch_sweep_secs: 60.0,
            yaw_sweep_secs: 60.0,
        };
        let result = sweep(&sim, &mut actuators, &timings, Duration::from_millis(1), &cancel);

        assert_eq!(result, Err(CalibrationError::Cancelled));
        assert!(!sim.any_on());
        assert!(!cancel.is_cancelled());
    }
    // endregion: sweep
}
