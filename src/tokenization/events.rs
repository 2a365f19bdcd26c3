use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;

/// Event kinds. Variants are declared in the alphabetical order of their
/// names so the derived ordering matches sorting by name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventName {
    Beat,
    Downbeat,
    NoteOff,
    NoteOn,
    NoteSustain,
    PedalOff,
    PedalOn,
    PedalSustain,
}

impl EventName {
    pub const ALL: [EventName; 8] = [
        EventName::NoteOn,
        EventName::NoteOff,
        EventName::NoteSustain,
        EventName::PedalOn,
        EventName::PedalOff,
        EventName::PedalSustain,
        EventName::Beat,
        EventName::Downbeat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Beat => "beat",
            EventName::Downbeat => "downbeat",
            EventName::NoteOff => "note_off",
            EventName::NoteOn => "note_on",
            EventName::NoteSustain => "note_sustain",
            EventName::PedalOff => "pedal_off",
            EventName::PedalOn => "pedal_on",
            EventName::PedalSustain => "pedal_sustain",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CodecError::UnknownEventName(s.to_string()))
    }
}

/// A symbolic event inside a segment. Times are seconds from the segment
/// start.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NoteOn {
        time: f64,
        label: Option<String>,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        time: f64,
        label: Option<String>,
        pitch: u8,
    },
    NoteSustain {
        time: f64,
        label: Option<String>,
        pitch: u8,
        velocity: u8,
    },
    PedalOn {
        time: f64,
        label: Option<String>,
    },
    PedalOff {
        time: f64,
        label: Option<String>,
    },
    PedalSustain {
        time: f64,
        label: Option<String>,
    },
    Beat {
        time: f64,
    },
    Downbeat {
        time: f64,
    },
}

impl Event {
    pub fn name(&self) -> EventName {
        match self {
            Event::NoteOn { .. } => EventName::NoteOn,
            Event::NoteOff { .. } => EventName::NoteOff,
            Event::NoteSustain { .. } => EventName::NoteSustain,
            Event::PedalOn { .. } => EventName::PedalOn,
            Event::PedalOff { .. } => EventName::PedalOff,
            Event::PedalSustain { .. } => EventName::PedalSustain,
            Event::Beat { .. } => EventName::Beat,
            Event::Downbeat { .. } => EventName::Downbeat,
        }
    }

    pub fn time(&self) -> f64 {
        match *self {
            Event::NoteOn { time, .. }
            | Event::NoteOff { time, .. }
            | Event::NoteSustain { time, .. }
            | Event::PedalOn { time, .. }
            | Event::PedalOff { time, .. }
            | Event::PedalSustain { time, .. }
            | Event::Beat { time }
            | Event::Downbeat { time } => time,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Event::NoteOn { label, .. }
            | Event::NoteOff { label, .. }
            | Event::NoteSustain { label, .. }
            | Event::PedalOn { label, .. }
            | Event::PedalOff { label, .. }
            | Event::PedalSustain { label, .. } => label.as_deref(),
            Event::Beat { .. } | Event::Downbeat { .. } => None,
        }
    }

    pub fn pitch(&self) -> Option<u8> {
        match *self {
            Event::NoteOn { pitch, .. }
            | Event::NoteOff { pitch, .. }
            | Event::NoteSustain { pitch, .. } => Some(pitch),
            _ => None,
        }
    }

    pub fn velocity(&self) -> Option<u8> {
        match *self {
            Event::NoteOn { velocity, .. } | Event::NoteSustain { velocity, .. } => Some(velocity),
            _ => None,
        }
    }
}

/// Canonical encoder order: `(time, name, label, pitch)`.
pub fn cmp_events(a: &Event, b: &Event) -> Ordering {
    a.time()
        .total_cmp(&b.time())
        .then_with(|| a.name().cmp(&b.name()))
        .then_with(|| a.label().cmp(&b.label()))
        .then_with(|| a.pitch().cmp(&b.pitch()))
}

/// Decoder order: `(time, name, pitch)`.
pub fn cmp_decoded_events(a: &Event, b: &Event) -> Ordering {
    a.time()
        .total_cmp(&b.time())
        .then_with(|| a.name().cmp(&b.name()))
        .then_with(|| a.pitch().cmp(&b.pitch()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_order_is_alphabetical() {
        let mut names = EventName::ALL.to_vec();
        names.sort();
        let strings: Vec<&str> = names.iter().map(|name| name.as_str()).collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted);
    }

    #[test]
    fn parses_names() {
        assert_eq!("pedal_sustain".parse::<EventName>().unwrap(), EventName::PedalSustain);
        assert!("note_bend".parse::<EventName>().is_err());
    }

    #[test]
    fn offsets_sort_before_onsets_at_same_time() {
        let on = Event::NoteOn {
            time: 1.0,
            label: None,
            pitch: 60,
            velocity: 90,
        };
        let off = Event::NoteOff {
            time: 1.0,
            label: None,
            pitch: 60,
        };
        let mut events = vec![on.clone(), off.clone()];
        events.sort_by(cmp_events);
        assert_eq!(events, vec![off, on]);
    }

    #[test]
    fn ties_break_on_label_then_pitch() {
        let event = |label: &str, pitch| Event::NoteOff {
            time: 0.5,
            label: Some(label.to_string()),
            pitch,
        };
        let mut events = vec![event("b", 10), event("a", 70), event("a", 20)];
        events.sort_by(cmp_events);
        assert_eq!(events, vec![event("a", 20), event("a", 70), event("b", 10)]);
    }
}
