use crate::error::{CodecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

impl Note {
    /// Create a note, checking that pitch and velocity are 7-bit values and
    /// that the interval is finite and not reversed.
    pub fn new(pitch: u8, velocity: u8, start: f64, end: f64) -> Result<Self> {
        if pitch > 127 || velocity > 127 {
            return Err(CodecError::InvalidNote(format!(
                "pitch {pitch} / velocity {velocity} out of 0..=127"
            )));
        }
        if !start.is_finite() || !end.is_finite() || end < start {
            return Err(CodecError::InvalidNote(format!(
                "interval [{start}, {end}] is not a valid time span"
            )));
        }

        Ok(Note {
            pitch,
            velocity,
            start,
            end,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pedal {
    pub start: f64,
    pub end: f64,
}

impl Pedal {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || end < start {
            return Err(CodecError::InvalidNote(format!(
                "pedal [{start}, {end}] is not a valid time span"
            )));
        }
        Ok(Pedal { start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlChange {
    pub controller: u8,
    pub value: u8,
    pub time: f64,
}

/// Anything with a start and end time that can be placed on a segment.
pub trait Interval {
    fn start(&self) -> f64;
    fn end(&self) -> f64;
}

impl Interval for Note {
    fn start(&self) -> f64 {
        self.start
    }

    fn end(&self) -> f64 {
        self.end
    }
}

impl Interval for Pedal {
    fn start(&self) -> f64 {
        self.start
    }

    fn end(&self) -> f64 {
        self.end
    }
}
