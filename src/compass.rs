//! Heading arithmetic shared by the controller, calibrator and projector.
use std::fmt;

/// Wraps any finite angle into the [0, 360) range.
pub fn normalize(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// 8-point compass rose, used when reporting bearings to an operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abbreviation = match self {
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
        };
        f.write_str(abbreviation)
    }
}

impl Direction {
    /// Each direction covers 45 degrees centred on its cardinal/ordinal bearing.
    pub fn from_heading(heading: f64) -> Self {
        match normalize(heading) {
            h if h < 22.5 => Direction::N,
            h if h < 67.5 => Direction::NE,
            h if h < 112.5 => Direction::E,
            h if h < 157.5 => Direction::SE,
            h if h < 202.5 => Direction::S,
            h if h < 247.5 => Direction::SW,
            h if h < 292.5 => Direction::W,
            h if h < 337.5 => Direction::NW,
            _ => Direction::N,
        }
    }
}
