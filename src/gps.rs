use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::Path;

use log::{debug, info};
use nmea::Nmea;

use crate::position::Position;

/// Streams position fixes out of NMEA 0183 text, one per change of position.
///
/// Sentences without a position (GSV, GSA...) only update the parser state.
/// Lines that are not UTF-8 or fail to parse are logged and skipped, so line
/// noise from a receiver coming up does not end the stream.
pub struct FixReader<R> {
    reader: R,
    line: Vec<u8>,
    nmea: Nmea,
    last_fix: Option<Position>,
}

impl<R: BufRead> FixReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            nmea: Nmea::default(),
            last_fix: None,
        }
    }

    /// Satellites used in the most recent fix, if reported.
    pub fn num_satellites(&self) -> Option<u32> {
        self.nmea.num_of_fix_satellites
    }
}

impl FixReader<BufReader<File>> {
    /// Opens a serial device or a recorded log.
    pub fn open(path: &Path) -> io::Result<Self> {
        info!("Reading NMEA from {}", path.display());
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for FixReader<R> {
    type Item = io::Result<Position>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }

            let sentence = match std::str::from_utf8(&self.line) {
                Ok(text) => text.trim(),
                Err(e) => {
                    debug!("Skipping non-UTF-8 NMEA line ({} bytes): {}", self.line.len(), e);
                    continue;
                }
            };
            if sentence.is_empty() {
                continue;
            }

            if let Err(e) = self.nmea.parse(sentence) {
                debug!("Skipping NMEA line '{}': {}", sentence, e);
                continue;
            }

            if let (Some(lat), Some(lon)) = (self.nmea.latitude, self.nmea.longitude) {
                let fix = Position::new(lat, lon);
                if self.last_fix != Some(fix) {
                    self.last_fix = Some(fix);
                    return Some(Ok(fix));
                }
            }
        }
    }
}
