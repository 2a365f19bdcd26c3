use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, warn};

use crate::constants::{DEFAULT_MICROS_PER_QUARTER, SUSTAIN_CONTROLLER, SUSTAIN_THRESHOLD};
use crate::error::{CodecError, Result};
use crate::notes::{ControlChange, Note, Pedal};

use super::pedals::extend_offset_by_pedal;

/// Converts absolute ticks into seconds, honouring every tempo change.
#[derive(Debug, Clone)]
pub struct TempoMap {
    timing: Timing,
    // (tick, seconds at tick, microseconds per quarter from tick on)
    segments: Vec<(u32, f64, u32)>,
}

impl TempoMap {
    fn new(timing: Timing, mut tempo_changes: Vec<(u32, u32)>) -> Self {
        tempo_changes.sort_by_key(|&(tick, _)| tick);

        let mut segments = vec![(0, 0.0, DEFAULT_MICROS_PER_QUARTER)];
        if let Timing::Metrical(ticks_per_beat) = timing {
            let ticks_per_beat = ticks_per_beat.as_int() as f64;
            for (tick, micros) in tempo_changes {
                let (last_tick, last_seconds, last_micros) = segments[segments.len() - 1];
                let seconds =
                    last_seconds + (tick - last_tick) as f64 * last_micros as f64 / 1e6 / ticks_per_beat;
                if tick == last_tick {
                    // a later change at the same tick wins
                    let len = segments.len();
                    segments[len - 1] = (tick, seconds, micros);
                } else {
                    segments.push((tick, seconds, micros));
                }
            }
        }

        TempoMap { timing, segments }
    }

    pub fn ticks_per_beat(&self) -> Option<u16> {
        match self.timing {
            Timing::Metrical(ticks_per_beat) => Some(ticks_per_beat.as_int()),
            Timing::Timecode(..) => None,
        }
    }

    /// Convert an absolute tick into seconds from the start of the file.
    pub fn tick_to_seconds(&self, tick: u32) -> f64 {
        match self.timing {
            Timing::Metrical(ticks_per_beat) => {
                let index = self.segments.partition_point(|&(t, _, _)| t <= tick) - 1;
                let (segment_tick, segment_seconds, micros) = self.segments[index];
                segment_seconds
                    + (tick - segment_tick) as f64 * micros as f64
                        / 1e6
                        / ticks_per_beat.as_int() as f64
            }
            Timing::Timecode(fps, subframes) => {
                tick as f64 / (fps.as_f32() as f64 * subframes as f64)
            }
        }
    }
}

/// A time signature change: numerator and denominator as written (4/4, 6/8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub tick: u32,
    pub numerator: u8,
    pub denominator: u32,
}

/// Everything the codec needs from a single-instrument Standard MIDI File.
#[derive(Debug, Clone)]
pub struct MidiFile {
    pub notes: Vec<Note>,
    pub control_changes: Vec<ControlChange>,
    pub tempo_map: TempoMap,
    pub time_signatures: Vec<TimeSignature>,
    pub end_tick: u32,
}

impl MidiFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Parse SMF bytes into notes, controller changes and timing data.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Raw Standard MIDI File contents.
    ///
    /// # Returns
    ///
    /// * The parsed file, or `CodecError::MultipleInstruments` when more than
    ///   one (track, channel) pair carries notes or controller changes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes)?;

        let mut tempo_changes = vec![];
        let mut time_signatures = vec![];
        let mut end_tick = 0;

        // (track, channel) -> raw note and controller data in ticks
        let mut note_ticks: BTreeMap<(usize, u8), Vec<(u8, u8, u32, u32)>> = BTreeMap::new();
        let mut cc_ticks: BTreeMap<(usize, u8), Vec<(u8, u8, u32)>> = BTreeMap::new();

        for (track_idx, track) in smf.tracks.iter().enumerate() {
            let mut tick = 0u32;
            let mut pending: HashMap<(u8, u8), VecDeque<(u32, u8)>> = HashMap::new();

            for event in track.iter() {
                tick = tick
                    .checked_add(event.delta.as_int())
                    .ok_or(CodecError::TickOverflow { track: track_idx })?;
                end_tick = end_tick.max(tick);

                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                pending
                                    .entry((channel, key.as_int()))
                                    .or_default()
                                    .push_back((tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let key = key.as_int();
                                if let Some((start_tick, velocity)) = pending
                                    .get_mut(&(channel, key))
                                    .and_then(|queue| queue.pop_front())
                                {
                                    note_ticks
                                        .entry((track_idx, channel))
                                        .or_default()
                                        .push((key, velocity, start_tick, tick));
                                }
                            }
                            MidiMessage::Controller { controller, value } => {
                                cc_ticks.entry((track_idx, channel)).or_default().push((
                                    controller.as_int(),
                                    value.as_int(),
                                    tick,
                                ));
                            }
                            _ => {}
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                        tempo_changes.push((tick, micros.as_int()));
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_pow, _, _)) => {
                        time_signatures.push(TimeSignature {
                            tick,
                            numerator,
                            denominator: 1 << denominator_pow.min(31),
                        });
                    }
                    _ => {}
                }
            }

            let unclosed: usize = pending.values().map(|queue| queue.len()).sum();
            if unclosed > 0 {
                warn!(track = track_idx, unclosed, "Dropping notes without a note-off");
            }
        }

        let instruments: BTreeSet<(usize, u8)> =
            note_ticks.keys().chain(cc_ticks.keys()).copied().collect();
        if instruments.len() > 1 {
            return Err(CodecError::MultipleInstruments(instruments.len()));
        }

        let tempo_map = TempoMap::new(smf.header.timing, tempo_changes);
        time_signatures.sort_by_key(|signature| signature.tick);

        let mut notes = note_ticks
            .into_values()
            .flatten()
            .map(|(pitch, velocity, start_tick, end_tick)| {
                Note::new(
                    pitch,
                    velocity,
                    tempo_map.tick_to_seconds(start_tick),
                    tempo_map.tick_to_seconds(end_tick),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

        let control_changes = cc_ticks
            .into_values()
            .flatten()
            .map(|(controller, value, tick)| ControlChange {
                controller,
                value,
                time: tempo_map.tick_to_seconds(tick),
            })
            .collect();

        debug!(notes = notes.len(), end_tick, "Parsed MIDI file");

        Ok(MidiFile {
            notes,
            control_changes,
            tempo_map,
            time_signatures,
            end_tick,
        })
    }
}

/// Pair sustain-pedal presses with their releases.
///
/// # Arguments
///
/// * `control_changes` - Controller changes of one instrument, in any order.
///
/// # Returns
///
/// * Time-sorted pedal intervals. A press that is never released is closed
///   at the time of the last controller change.
pub fn get_pedals(control_changes: &[ControlChange]) -> Vec<Pedal> {
    let mut control_changes = control_changes.to_vec();
    control_changes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut onset: Option<f64> = None;
    let mut pedals = vec![];

    for cc in control_changes.iter().filter(|cc| cc.controller == SUSTAIN_CONTROLLER) {
        match onset {
            None if cc.value >= SUSTAIN_THRESHOLD => onset = Some(cc.time),
            Some(start) if cc.value < SUSTAIN_THRESHOLD => {
                pedals.push(Pedal { start, end: cc.time });
                onset = None;
            }
            _ => {}
        }
    }

    if let (Some(start), Some(last)) = (onset, control_changes.last()) {
        pedals.push(Pedal { start, end: last.time });
    }

    pedals
}

/// Read the notes and sustain pedals of a single-instrument MIDI file.
///
/// # Arguments
///
/// * `midi_path` - Path to the MIDI file.
/// * `extend_pedal` - Extend note offsets while the sustain pedal is held.
///
/// # Returns
///
/// * The (optionally extended) notes and the pedal intervals.
pub fn read_single_track_midi<P: AsRef<Path>>(
    midi_path: P,
    extend_pedal: bool,
) -> Result<(Vec<Note>, Vec<Pedal>)> {
    let midi = MidiFile::open(midi_path)?;
    let pedals = get_pedals(&midi.control_changes);

    let notes = if extend_pedal {
        extend_offset_by_pedal(midi.notes, &pedals)?
    } else {
        midi.notes
    };

    Ok((notes, pedals))
}

#[cfg(test)]
mod tests {
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, Track, TrackEvent};

    use super::*;

    fn cc(value: u8, time: f64) -> ControlChange {
        ControlChange {
            controller: SUSTAIN_CONTROLLER,
            value,
            time,
        }
    }

    fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::from(delta),
            kind,
        }
    }

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        event(
            delta,
            TrackEventKind::Midi {
                channel: u4::from(channel),
                message: MidiMessage::NoteOn {
                    key: u7::from(key),
                    vel: u7::from(vel),
                },
            },
        )
    }

    fn write(tracks: Vec<Track<'static>>) -> Vec<u8> {
        let mut smf = Smf::new(Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::from(480)),
        });
        smf.tracks = tracks;
        let mut buffer = Vec::new();
        smf.write_std(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn rejects_tracks_longer_than_the_tick_range() {
        let longest = u28::max_value().as_int();
        let mut track: Track = (0..17)
            .map(|_| event(longest, TrackEventKind::Meta(MetaMessage::Marker(b"bar"))))
            .collect();
        track.push(event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)));

        let result = MidiFile::parse(&write(vec![track]));
        assert!(matches!(result, Err(CodecError::TickOverflow { track: 0 })));
    }

    #[test]
    fn pairs_pedal_presses() {
        let pedals = get_pedals(&[cc(100, 2.0), cc(0, 3.0), cc(127, 1.0), cc(10, 1.5)]);
        assert_eq!(
            pedals,
            vec![Pedal { start: 1.0, end: 1.5 }, Pedal { start: 2.0, end: 3.0 }]
        );
    }

    #[test]
    fn repeated_presses_keep_first_onset() {
        let pedals = get_pedals(&[cc(100, 1.0), cc(120, 1.2), cc(0, 2.0), cc(0, 2.5)]);
        assert_eq!(pedals, vec![Pedal { start: 1.0, end: 2.0 }]);
    }

    #[test]
    fn open_pedal_closes_at_last_control_change() {
        let modulation = ControlChange {
            controller: 1,
            value: 3,
            time: 7.5,
        };
        let pedals = get_pedals(&[cc(100, 4.0), modulation]);
        assert_eq!(pedals, vec![Pedal { start: 4.0, end: 7.5 }]);
    }

    #[test]
    fn parses_notes_with_tempo_change() {
        let conductor: Track = vec![
            event(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(500_000)))),
            event(960, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(1_000_000)))),
            event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        ];
        let piano: Track = vec![
            note_on(0, 0, 60, 90),
            note_on(480, 0, 60, 0),
            note_on(480, 0, 64, 70),
            note_on(480, 0, 64, 0),
            event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        ];

        let midi = MidiFile::parse(&write(vec![conductor, piano])).unwrap();

        assert_eq!(midi.notes.len(), 2);
        assert_eq!(midi.notes[0].pitch, 60);
        assert_eq!(midi.notes[0].velocity, 90);
        assert!((midi.notes[0].end - 0.5).abs() < 1e-9);
        // second note starts after the tempo halves: 1.0s, one beat at 1s/beat
        assert!((midi.notes[1].start - 1.0).abs() < 1e-9);
        assert!((midi.notes[1].end - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_two_instruments() {
        let track: Track = vec![
            note_on(0, 0, 60, 90),
            note_on(10, 0, 60, 0),
            note_on(0, 1, 62, 90),
            note_on(10, 1, 62, 0),
            event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        ];

        let result = MidiFile::parse(&write(vec![track]));
        assert!(matches!(result, Err(CodecError::MultipleInstruments(2))));
    }
}
