use serde::Deserialize;
use tracing::warn;

use crate::constants::{DEFAULT_NOTE_DURATION, DEFAULT_VELOCITY};
use crate::error::{CodecError, Result};
use crate::preprocessing::time_grid::format_time;

use super::events::{cmp_decoded_events, Event, EventName};

pub const PAD: &str = "<pad>";
pub const SOS: &str = "<sos>";
pub const EOS: &str = "<eos>";
pub const UNK: &str = "<unk>";

/// Chooses which events and fields are written when events become strings,
/// and how missing fields are filled back in when strings become events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StringProcessor {
    pub label: bool,
    pub onset: bool,
    pub offset: bool,
    pub sustain: bool,
    pub velocity: bool,
    pub pedal_onset: bool,
    pub pedal_offset: bool,
    pub pedal_sustain: bool,
    pub beat: bool,
    pub downbeat: bool,
    pub default_velocity: u8,
    pub default_note_duration: f64,
}

impl Default for StringProcessor {
    fn default() -> Self {
        StringProcessor {
            label: false,
            onset: true,
            offset: false,
            sustain: false,
            velocity: false,
            pedal_onset: false,
            pedal_offset: false,
            pedal_sustain: false,
            beat: false,
            downbeat: false,
            default_velocity: DEFAULT_VELOCITY,
            default_note_duration: DEFAULT_NOTE_DURATION,
        }
    }
}

impl StringProcessor {
    fn enabled(&self, name: EventName) -> bool {
        match name {
            EventName::NoteOn => self.onset,
            EventName::NoteOff => self.offset,
            EventName::NoteSustain => self.sustain,
            EventName::PedalOn => self.pedal_onset,
            EventName::PedalOff => self.pedal_offset,
            EventName::PedalSustain => self.pedal_sustain,
            EventName::Beat => self.beat,
            EventName::Downbeat => self.downbeat,
        }
    }

    /// Render events as `key=value` strings wrapped in `<sos>` / `<eos>`.
    ///
    /// # Arguments
    ///
    /// * `events` - Events in canonical order.
    ///
    /// # Returns
    ///
    /// * One `name=`, `time=` pair per enabled event, followed by its
    ///   optional label and its pitch / velocity fields.
    pub fn events_to_strings(&self, events: &[Event]) -> Vec<String> {
        let mut strings = vec![SOS.to_string()];

        for event in events.iter().filter(|event| self.enabled(event.name())) {
            strings.push(format!("name={}", event.name()));
            strings.push(format!("time={}", format_time(event.time())));

            if self.label {
                if let Some(label) = event.label() {
                    strings.push(format!("label={label}"));
                }
            }

            if let Some(pitch) = event.pitch() {
                strings.push(format!("pitch={pitch}"));
            }

            if let Event::NoteOn { velocity, .. } = event {
                if self.velocity {
                    strings.push(format!("velocity={velocity}"));
                }
            }
        }

        strings.push(EOS.to_string());
        strings
    }

    /// Parse `key=value` strings back into events.
    ///
    /// A `name=` string opens a new event; the fields after it belong to that
    /// event until the next `name=` or `<eos>`. Events whose required fields
    /// are missing are dropped. Onsets get the default velocity when
    /// velocities are not serialized, and a default-length offset when
    /// offsets are not serialized.
    pub fn strings_to_events<S: AsRef<str>>(&self, strings: &[S]) -> Result<Vec<Event>> {
        let mut records: Vec<EventRecord> = vec![];
        let mut current: Option<EventRecord> = None;

        for string in strings.iter().map(|s| s.as_ref()) {
            if string == EOS {
                break;
            }

            let Some((key, value)) = string.split_once('=') else {
                continue;
            };

            if key == "name" {
                records.extend(current.take());
                current = Some(EventRecord::new(value.parse()?));
                continue;
            }

            let Some(record) = current.as_mut() else {
                continue;
            };

            match key {
                "time" => record.time = Some(parse_value(key, value)?),
                "label" => record.label = Some(value.to_string()),
                "pitch" => record.pitch = Some(parse_seven_bit(key, value)?),
                "velocity" => record.velocity = Some(parse_seven_bit(key, value)?),
                "task" | "beat_index" => {}
                _ => return Err(CodecError::UnknownField(key.to_string())),
            }
        }
        records.extend(current);

        let mut events = vec![];
        for record in records {
            let name = record.name;
            let Some(event) = record.into_event(self.default_velocity) else {
                warn!(name = %name, "Dropping event with missing fields");
                continue;
            };

            match event {
                Event::NoteOn {
                    time,
                    label,
                    pitch,
                    velocity,
                } => {
                    let velocity = if self.velocity {
                        velocity
                    } else {
                        self.default_velocity
                    };
                    events.push(Event::NoteOn {
                        time,
                        label,
                        pitch,
                        velocity,
                    });

                    if !self.offset {
                        events.push(Event::NoteOff {
                            time: time + self.default_note_duration,
                            label: None,
                            pitch,
                        });
                    }
                }
                event => events.push(event),
            }
        }

        events.sort_by(cmp_decoded_events);
        Ok(events)
    }
}

#[derive(Debug)]
struct EventRecord {
    name: EventName,
    time: Option<f64>,
    label: Option<String>,
    pitch: Option<u8>,
    velocity: Option<u8>,
}

impl EventRecord {
    fn new(name: EventName) -> Self {
        EventRecord {
            name,
            time: None,
            label: None,
            pitch: None,
            velocity: None,
        }
    }

    fn into_event(self, default_velocity: u8) -> Option<Event> {
        let time = self.time?;
        let label = self.label;
        let velocity = self.velocity.unwrap_or(default_velocity);

        let event = match self.name {
            EventName::NoteOn => Event::NoteOn {
                time,
                label,
                pitch: self.pitch?,
                velocity,
            },
            EventName::NoteOff => Event::NoteOff {
                time,
                label,
                pitch: self.pitch?,
            },
            EventName::NoteSustain => Event::NoteSustain {
                time,
                label,
                pitch: self.pitch?,
                velocity,
            },
            EventName::PedalOn => Event::PedalOn { time, label },
            EventName::PedalOff => Event::PedalOff { time, label },
            EventName::PedalSustain => Event::PedalSustain { time, label },
            EventName::Beat => Event::Beat { time },
            EventName::Downbeat => Event::Downbeat { time },
        };

        Some(event)
    }
}

fn parse_value(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|time| time.is_finite())
        .ok_or_else(|| CodecError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_seven_bit(key: &str, value: &str) -> Result<u8> {
    value
        .parse::<u8>()
        .ok()
        .filter(|v| *v <= 127)
        .ok_or_else(|| CodecError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
