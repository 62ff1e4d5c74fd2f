//! WitMotion (WT901 / BWT901CL) serial IMU.
//!
//! The sensor streams 11-byte frames: `0x55`, a type byte, four little-endian
//! i16 values, and a checksum that is the low byte of the sum of the first ten
//! bytes. Only acceleration (`0x51`) and angle (`0x53`) frames are used.
use std::io::{ErrorKind, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::compass::normalize;
use crate::config::ImuConfig;
use crate::error::GimbalError;
use crate::orientation::{Orientation, OrientationSource};

/// Read timeout of the serial port. Timeouts only mean the sensor is quiet.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

const FRAME_HEADER: u8 = 0x55;
const FRAME_LEN: usize = 11;
const KIND_ACCEL: u8 = 0x51;
const KIND_ANGLE: u8 = 0x53;

/// Full-scale range of the accelerometer (g).
const ACCEL_RANGE_G: f64 = 16.0;
/// Full-scale range of the angle outputs (degrees).
const ANGLE_RANGE_DEG: f64 = 180.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WitFrame {
    /// Acceleration in g.
    Accel { x: f64, y: f64, z: f64 },
    /// Euler angles in degrees, each in [-180, 180).
    Angle { roll: f64, pitch: f64, yaw: f64 },
    /// Any other frame type (gyro, magnetometer, time...).
    Other(u8),
}

/// Reassembles frames from an arbitrary chunking of the byte stream.
#[derive(Debug, Default)]
pub struct WitDecoder {
    buffer: Vec<u8>,
    rejected: u64,
}

impl WitDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes discarded while hunting for a valid frame.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<WitFrame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            match self.buffer.iter().position(|b| *b == FRAME_HEADER) {
                Some(0) => {}
                Some(start) => {
                    self.rejected += start as u64;
                    self.buffer.drain(..start);
                }
                None => {
                    self.rejected += self.buffer.len() as u64;
                    self.buffer.clear();
                    break;
                }
            }

            if self.buffer.len() < FRAME_LEN {
                break;
            }

            let frame = &self.buffer[..FRAME_LEN];
            if checksum(&frame[..FRAME_LEN - 1]) != frame[FRAME_LEN - 1] {
                // Not a real header, resync on the next 0x55
                self.rejected += 1;
                self.buffer.drain(..1);
                continue;
            }

            frames.push(parse_frame(frame));
            self.buffer.drain(..FRAME_LEN);
        }

        frames
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

fn parse_frame(frame: &[u8]) -> WitFrame {
    let value = |i: usize| i16::from_le_bytes([frame[2 + 2 * i], frame[3 + 2 * i]]) as f64 / 32768.0;

    match frame[1] {
        KIND_ACCEL => WitFrame::Accel {
            x: value(0) * ACCEL_RANGE_G,
            y: value(1) * ACCEL_RANGE_G,
            z: value(2) * ACCEL_RANGE_G,
        },
        KIND_ANGLE => WitFrame::Angle {
            roll: value(0) * ANGLE_RANGE_DEG,
            pitch: value(1) * ANGLE_RANGE_DEG,
            yaw: value(2) * ANGLE_RANGE_DEG,
        },
        other => WitFrame::Other(other),
    }
}

#[derive(Debug, Default)]
struct ImuState {
    /// (roll, pitch, yaw)
    angles: Option<(f64, f64, f64)>,
    last_accel: Option<Instant>,
}

/// Latest attitude from a WitMotion IMU, decoded on a background thread.
#[derive(Clone, Debug)]
pub struct WitImu {
    state: Arc<Mutex<ImuState>>,
    stale_after: Duration,
}

impl WitImu {
    /// Opens the serial device named in the config in raw mode and starts decoding.
    pub fn open(config: &ImuConfig) -> Result<Self, GimbalError> {
        info!("Opening IMU serial port: {} at {} bps", config.path, config.baud);
        let port = serialport::new(config.path.as_str(), config.baud)
            .timeout(SERIAL_TIMEOUT)
            .open()?;
        info!("✓ IMU stream opened on {}", config.path);
        Ok(Self::from_reader(port, config.stale_after()))
    }

    /// Decodes any byte stream. The thread ends at end of stream or on a read
    /// error, after which the data goes stale.
    pub fn from_reader<R: Read + Send + 'static>(mut reader: R, stale_after: Duration) -> Self {
        let state = Arc::new(Mutex::new(ImuState::default()));
        let shared = Arc::clone(&state);

        thread::spawn(move || {
            let mut decoder = WitDecoder::new();
            let mut buf = [0u8; 256];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        info!("IMU stream closed");
                        break;
                    }
                    Ok(n) => {
                        let frames = decoder.push(&buf[..n]);
                        let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                        for frame in frames {
                            apply(&mut state, frame);
                        }
                    }
                    Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut) => {
                        continue;
                    }
                    Err(e) => {
                        warn!("IMU read error: {}", e);
                        break;
                    }
                }
            }
            debug!("IMU decoder rejected {} bytes", decoder.rejected());
        });

        Self { state, stale_after }
    }

    fn lock(&self) -> MutexGuard<'_, ImuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply(state: &mut ImuState, frame: WitFrame) {
    match frame {
        WitFrame::Accel { .. } => state.last_accel = Some(Instant::now()),
        WitFrame::Angle { roll, pitch, yaw } => state.angles = Some((roll, pitch, yaw)),
        WitFrame::Other(_) => {}
    }
}

impl OrientationSource for WitImu {
    fn read(&self) -> Option<Orientation> {
        let state = self.lock();
        let (roll, pitch, yaw) = state.angles?;
        let accel_present = state
            .last_accel
            .is_some_and(|t| t.elapsed() < self.stale_after);

        Some(Orientation {
            yaw: normalize(yaw),
            pitch,
            roll,
            accel_present,
        })
    }
}
