//! Simulated pan/tilt head for tests and `--simulate` dry runs.
//!
//! One [`SimGimbal`] handle is both the orientation source and the actuator
//! bank. Time is counted in reads: every `read()` first moves each axis by a
//! fixed step per energized relay, clamped at the mechanical stops.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actuator::{ActuatorBank, Channel};
use crate::compass::normalize;
use crate::orientation::{Orientation, OrientationSource};

#[derive(Debug)]
struct SimState {
    /// Unwrapped yaw so the stops can straddle north.
    yaw: f64,
    pitch: f64,
    yaw_stops: (f64, f64),
    pitch_stops: (f64, f64),
    yaw_step: f64,
    pitch_step: f64,
    relays: [bool; 4],
    overlaps: usize,
    dropouts: u32,
    reads: u64,
}

#[derive(Clone, Debug)]
pub struct SimGimbal {
    state: Arc<Mutex<SimState>>,
}

impl SimGimbal {
    /// Starts at the given attitude with no stops and 1° of travel per read.
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                yaw,
                pitch,
                yaw_stops: (f64::NEG_INFINITY, f64::INFINITY),
                pitch_stops: (f64::NEG_INFINITY, f64::INFINITY),
                yaw_step: 1.0,
                pitch_step: 1.0,
                relays: [false; 4],
                overlaps: 0,
                dropouts: 0,
                reads: 0,
            })),
        }
    }

    /// Mechanical yaw stops as unwrapped angles, e.g. `(10.0, 350.0)` blocks the arc through north.
    pub fn with_yaw_stops(self, ccw_stop: f64, cw_stop: f64) -> Self {
        self.lock().yaw_stops = (ccw_stop, cw_stop);
        self
    }

    pub fn with_pitch_stops(self, min: f64, max: f64) -> Self {
        self.lock().pitch_stops = (min, max);
        self
    }

    /// Degrees travelled per read while a relay is held.
    pub fn with_steps(self, yaw_step: f64, pitch_step: f64) -> Self {
        {
            let mut state = self.lock();
            state.yaw_step = yaw_step;
            state.pitch_step = pitch_step;
        }
        self
    }

    /// The next `count` reads report no data. The motors keep moving meanwhile.
    pub fn drop_next_reads(&self, count: u32) {
        self.lock().dropouts = count;
    }

    pub fn yaw(&self) -> f64 {
        normalize(self.lock().yaw)
    }

    pub fn pitch(&self) -> f64 {
        self.lock().pitch
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        self.lock().relays[channel_index(channel)]
    }

    pub fn any_on(&self) -> bool {
        self.lock().relays.iter().any(|on| *on)
    }

    /// How many writes left both relays of one axis energized.
    pub fn overlaps(&self) -> usize {
        self.lock().overlaps
    }

    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn channel_index(channel: Channel) -> usize {
    Channel::ALL
        .iter()
        .position(|c| *c == channel)
        .unwrap_or_default()
}

impl OrientationSource for SimGimbal {
    fn read(&self) -> Option<Orientation> {
        let mut state = self.lock();
        state.reads += 1;

        let yaw_rate = rate(&state.relays, Channel::YawPos, Channel::YawNeg) * state.yaw_step;
        let pitch_rate = rate(&state.relays, Channel::PitchUp, Channel::PitchDown) * state.pitch_step;
        state.yaw = (state.yaw + yaw_rate).clamp(state.yaw_stops.0, state.yaw_stops.1);
        state.pitch = (state.pitch + pitch_rate).clamp(state.pitch_stops.0, state.pitch_stops.1);

        if state.dropouts > 0 {
            state.dropouts -= 1;
            return None;
        }

        Some(Orientation::new(state.yaw, state.pitch, 0.0))
    }
}

fn rate(relays: &[bool; 4], positive: Channel, negative: Channel) -> f64 {
    let mut rate = 0.0;
    if relays[channel_index(positive)] {
        rate += 1.0;
    }
    if relays[channel_index(negative)] {
        rate -= 1.0;
    }
    rate
}

impl ActuatorBank for SimGimbal {
    fn set(&mut self, channel: Channel, on: bool) {
        let mut state = self.lock();
        state.relays[channel_index(channel)] = on;
        let r = state.relays;
        if (r[0] && r[1]) || (r[2] && r[3]) {
            state.overlaps += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_only_while_relay_held() {
        let mut sim = SimGimbal::new(100.0, 0.0).with_steps(2.0, 1.0);

        assert_eq!(sim.read().map(|o| o.yaw), Some(100.0));

        sim.set(Channel::YawNeg, true);
        assert_eq!(sim.read().map(|o| o.yaw), Some(98.0));
        assert_eq!(sim.read().map(|o| o.yaw), Some(96.0));

        sim.set(Channel::YawNeg, false);
        assert_eq!(sim.read().map(|o| o.yaw), Some(96.0));
    }

    #[test]
    fn test_stops_clamp_travel() {
        let mut sim = SimGimbal::new(180.0, 0.0)
            .with_yaw_stops(10.0, 350.0)
            .with_pitch_stops(-30.0, 60.0)
            .with_steps(100.0, 100.0);

        sim.set(Channel::YawPos, true);
        sim.set(Channel::PitchDown, true);
        sim.read();
        let o = sim.read().unwrap();

        assert_eq!(o.yaw, 350.0);
        assert_eq!(o.pitch, -30.0);
    }

    #[test]
    fn test_yaw_wraps_through_north() {
        let mut sim = SimGimbal::new(359.0, 0.0).with_steps(2.0, 1.0);
        sim.set(Channel::YawPos, true);

        assert_eq!(sim.read().map(|o| o.yaw), Some(1.0));
    }

    #[test]
    fn test_dropouts_report_no_data() {
        let sim = SimGimbal::new(0.0, 0.0);
        sim.drop_next_reads(2);

        assert!(sim.read().is_none());
        assert!(sim.read().is_none());
        assert!(sim.read().is_some());
        assert_eq!(sim.reads(), 3);
    }

    #[test]
    fn test_overlap_is_counted() {
        let mut sim = SimGimbal::new(0.0, 0.0);
        sim.set(Channel::PitchUp, true);
        sim.set(Channel::PitchDown, true);

        assert_eq!(sim.overlaps(), 1);
    }
}
