//! Bang-bang attitude control for a relay-driven pan/tilt head.
//!
//! Each tick compares one orientation sample against the setpoint and, per
//! axis, either energizes the single relay that reduces the error or releases
//! both relays once the error is inside the deadband.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};

use crate::actuator::{ActuatorBank, Axis, Channel, Drive, Interlock};
use crate::compass::normalize;
use crate::config::{CalibrationConfig, ControlConfig};
use crate::deadzone::{self, TravelEnvelope};
use crate::error::{CalibrationError, ControlError};
use crate::orientation::{Orientation, OrientationSource, live_sample};

/// Per-axis progress of a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    Seeking,
    Reached,
}

/// Successful end of a `goto`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Convergence {
    pub ticks: u64,
}

/// Asks a running `goto` or calibration sweep to stop at its next tick.
///
/// A cancellation is consumed by the loop that observes it. One requested
/// while nothing is running stops the next move immediately.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the request and reports whether there was one.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

pub struct AttitudeController<S: OrientationSource, A: ActuatorBank> {
    source: S,
    actuators: Interlock<A>,
    config: ControlConfig,
    calibration: CalibrationConfig,
    envelope: Option<TravelEnvelope>,
    yaw_state: ControlState,
    pitch_state: ControlState,
    cancel: CancelToken,
}

impl<S: OrientationSource, A: ActuatorBank> AttitudeController<S, A> {
    /// All relays are forced off before the controller is returned.
    pub fn new(source: S, bank: A, config: ControlConfig, calibration: CalibrationConfig) -> Self {
        Self {
            source,
            actuators: Interlock::new(bank),
            config,
            calibration,
            envelope: None,
            yaw_state: ControlState::Reached,
            pitch_state: ControlState::Reached,
            cancel: CancelToken::new(),
        }
    }

    /// Use limits measured earlier on the same head instead of sweeping.
    pub fn with_envelope(mut self, envelope: TravelEnvelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn envelope(&self) -> Option<TravelEnvelope> {
        self.envelope
    }

    pub fn states(&self) -> (ControlState, ControlState) {
        (self.yaw_state, self.pitch_state)
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        self.actuators.is_on(channel)
    }

    /// Latest sample with yaw normalized, live or not.
    pub fn get_orientation(&self) -> Option<Orientation> {
        self.source.read().map(|o| Orientation {
            yaw: normalize(o.yaw),
            ..o
        })
    }

    /// Latest sample only if the sensor is live.
    pub fn live_orientation(&self) -> Option<Orientation> {
        live_sample(&self.source)
    }

    /// Uncalibrated heads have no deadzone.
    pub fn is_in_deadzone(&self, angle: f64) -> bool {
        self.envelope.is_some_and(|e| e.is_in_deadzone(angle))
    }

    /// Sweep into every mechanical stop and keep the result as the travel
    /// envelope. The previous envelope is kept if the sweep fails.
    pub fn initialize(&mut self) -> Result<TravelEnvelope, CalibrationError> {
        let envelope = deadzone::sweep(
            &self.source,
            &mut self.actuators,
            &self.calibration,
            self.config.poll_interval(),
            &self.cancel,
        )?;
        self.envelope = Some(envelope);
        Ok(envelope)
    }

    /// One control tick. Returns the sample it acted on, or `None` with every
    /// relay released when the sensor has no live data or the setpoint is not finite.
    pub fn control(&mut self, desired_yaw: f64, desired_pitch: f64) -> Option<Orientation> {
        if !is_finite_setpoint(desired_yaw, desired_pitch) {
            warn!("Ignoring setpoint yaw:{} pitch:{}", desired_yaw, desired_pitch);
            self.actuators.release_all();
            return None;
        }
        match live_sample(&self.source) {
            Some(sample) => {
                self.regulate_yaw(&sample, normalize(desired_yaw));
                self.regulate_pitch(&sample, desired_pitch);
                Some(sample)
            }
            None => {
                self.actuators.release_all();
                None
            }
        }
    }

    /// Drive both axes to the setpoint, blocking until both are inside the deadband.
    ///
    /// Bounded only by `max_ticks`/`timeout_secs` in the config and by the
    /// cancel token. A yaw target in the deadzone is never commanded, so such a
    /// move can only end through one of those. Every relay is off on return.
    /// A NaN or infinite setpoint is rejected before anything moves.
    pub fn goto(&mut self, desired_yaw: f64, desired_pitch: f64) -> Result<Convergence, ControlError> {
        if !is_finite_setpoint(desired_yaw, desired_pitch) {
            self.stop();
            let error = ControlError::InvalidSetpoint {
                yaw: desired_yaw,
                pitch: desired_pitch,
            };
            warn!("{}", error);
            return Err(error);
        }
        let desired_yaw = normalize(desired_yaw);
        self.yaw_state = ControlState::Seeking;
        self.pitch_state = ControlState::Seeking;

        info!("Going to yaw:{:.1} pitch:{:.1}", desired_yaw, desired_pitch);

        let yaw_in_deadzone = self.is_in_deadzone(desired_yaw);
        if yaw_in_deadzone {
            warn!("Yaw {:.1}° is inside the deadzone, yaw will not be commanded", desired_yaw);
        }
        if let Some(envelope) = self.envelope
            && !envelope.pitch_in_range(desired_pitch)
        {
            warn!(
                "Pitch {:.1}° is outside the calibrated range {:.1}° to {:.1}°",
                desired_pitch, envelope.pitch_min, envelope.pitch_max
            );
        }

        let poll_interval = self.config.poll_interval();
        let timeout = self.config.timeout();
        let start = Instant::now();
        let mut ticks: u64 = 0;

        let result = loop {
            if self.cancel.take() {
                info!("Move cancelled after {} ticks", ticks);
                break Err(ControlError::Cancelled);
            }
            ticks += 1;

            match live_sample(&self.source) {
                None => {
                    warn!("No IMU data, holding all relays off");
                    self.actuators.release_all();
                }
                Some(sample) if yaw_in_deadzone => {
                    debug!("Yaw target in deadzone, skipping yaw this tick");
                    self.actuators.release(Axis::Yaw);
                    self.regulate_pitch(&sample, desired_pitch);
                }
                Some(sample) => {
                    self.regulate_yaw(&sample, desired_yaw);
                    self.regulate_pitch(&sample, desired_pitch);
                }
            }

            if self.yaw_state == ControlState::Reached && self.pitch_state == ControlState::Reached {
                info!("Setpoint reached after {} ticks", ticks);
                break Ok(Convergence { ticks });
            }

            let out_of_ticks = self.config.max_ticks.is_some_and(|max| ticks >= max);
            let out_of_time = timeout.is_some_and(|t| start.elapsed() >= t);
            if out_of_ticks || out_of_time {
                let error = ControlError::DidNotConverge {
                    ticks,
                    yaw: self.yaw_state,
                    pitch: self.pitch_state,
                    yaw_in_deadzone,
                };
                warn!("{}", error);
                break Err(error);
            }

            thread::sleep(poll_interval);
        };

        self.stop();
        result
    }

    /// Release all four relays. Safe at any time.
    pub fn stop(&mut self) {
        self.actuators.release_all();
        debug!("All relays released");
    }

    fn regulate_yaw(&mut self, sample: &Orientation, desired_yaw: f64) {
        let error = normalize(sample.yaw) - desired_yaw;
        if self.regulate(Axis::Yaw, error) {
            self.yaw_state = ControlState::Reached;
        }
    }

    fn regulate_pitch(&mut self, sample: &Orientation, desired_pitch: f64) {
        let error = sample.pitch - desired_pitch;
        if self.regulate(Axis::Pitch, error) {
            self.pitch_state = ControlState::Reached;
        }
    }

    /// Returns true when the error is inside the deadband.
    fn regulate(&mut self, axis: Axis, error: f64) -> bool {
        if error.abs() > self.config.deadband_deg {
            // A positive error means the head is past the target: run it back
            let drive = if error > 0.0 {
                Drive::Negative
            } else {
                Drive::Positive
            };
            debug!("{:?} error {:.2}, moving {:?}", axis, error, drive);
            self.actuators.drive(axis, Some(drive));
            false
        } else {
            debug!("{:?} error {:.2}, within deadband", axis, error);
            self.actuators.drive(axis, None);
            true
        }
    }
}

fn is_finite_setpoint(yaw: f64, pitch: f64) -> bool {
    yaw.is_finite() && pitch.is_finite()
}
