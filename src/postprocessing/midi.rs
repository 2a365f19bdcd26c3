use std::path::Path;

use midly::num::u7;
use midly::Format;
use midly::Header;
use midly::MetaMessage;
use midly::MidiMessage;
use midly::Smf;
use midly::Timing;
use midly::Track;
use midly::TrackEvent;
use midly::TrackEventKind;
use tracing::info;

use crate::constants::TICKS_PER_BEAT;
use crate::error::Result;
use crate::notes::Note;

#[derive(Debug, Clone)]
struct TrackEventAbsolute<'a> {
    tick: u32,
    // note-offs sort ahead of note-ons on the same tick
    is_note_on: bool,
    kind: TrackEventKind<'a>,
}

pub fn generate_ordered_midi_events(notes: &[Note], ticks_per_second: f64) -> Vec<TrackEvent<'static>> {
    let mut track_events_absolute: Vec<TrackEventAbsolute> = vec![];
    for note in notes {
        let start_tick = (note.start.max(0.0) * ticks_per_second).round() as u32;
        let end_tick = ((note.end.max(0.0) * ticks_per_second).round() as u32).max(start_tick);

        track_events_absolute.push(TrackEventAbsolute {
            tick: start_tick,
            is_note_on: true,
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: u7::from(note.pitch),
                    vel: u7::from(note.velocity.max(1)),
                },
            },
        });

        track_events_absolute.push(TrackEventAbsolute {
            tick: end_tick,
            is_note_on: false,
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: u7::from(note.pitch),
                    vel: u7::from(0),
                },
            },
        });
    }

    track_events_absolute.sort_by_key(|event| (event.tick, event.is_note_on));

    let mut track_events = vec![];
    let mut previous_tick = 0;

    for track_event_absolute in track_events_absolute.iter() {
        track_events.push(TrackEvent {
            delta: (track_event_absolute.tick - previous_tick).into(),
            kind: track_event_absolute.kind,
        });
        previous_tick = track_event_absolute.tick;
    }

    track_events
}

/// Generate MIDI file data from notes.
///
/// # Arguments
///
/// * `notes` - Notes with start and end in seconds.
/// * `beats_per_minute` - Tempo written into the file.
///
/// # Returns
///
/// * A vector of bytes representing a single-track MIDI file.
pub fn generate_midi_file_data(notes: &[Note], beats_per_minute: u32) -> Result<Vec<u8>> {
    let beats_per_minute = beats_per_minute.max(1);
    let timing = Timing::Metrical(TICKS_PER_BEAT.into());
    let ticks_per_second = (TICKS_PER_BEAT as f64) * (beats_per_minute as f64) / 60.0;

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing,
    });
    let mut track = Track::new();

    // Set tempo to match the BPM
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo((60_000_000 / beats_per_minute).into())),
    });

    track.extend(generate_ordered_midi_events(notes, ticks_per_second));

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)?;

    Ok(buffer)
}

/// Write notes to a MIDI file at `midi_path`.
pub fn write_notes_to_midi<P: AsRef<Path>>(notes: &[Note], midi_path: P, beats_per_minute: u32) -> Result<()> {
    let buffer = generate_midi_file_data(notes, beats_per_minute)?;
    std::fs::write(midi_path.as_ref(), buffer)?;
    info!(path = ?midi_path.as_ref(), notes = notes.len(), "Wrote MIDI file");
    Ok(())
}
