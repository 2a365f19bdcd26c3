use ndarray::Array1;
use tracing::debug;

use crate::tokenization::events::{cmp_events, Event};

use super::midi_file::{MidiFile, TimeSignature};
use super::segment::Segment;
use super::time_grid::{time_to_frame, time_to_grid};

#[derive(Debug, Clone)]
pub struct BeatRolls {
    pub beat_roll: Array1<f32>,
    pub downbeat_roll: Array1<f32>,
    pub events: Vec<Event>,
}

/// Beat and downbeat times of a MIDI file, in seconds.
///
/// Beats follow the time signature denominator (a quarter in 4/4, an eighth
/// in 6/8); every `numerator`-th beat of a signature is a downbeat. Files
/// without a signature are read as 4/4, and timecode files have no beats.
pub fn beat_times(midi: &MidiFile) -> (Vec<f64>, Vec<f64>) {
    let Some(ticks_per_beat) = midi.tempo_map.ticks_per_beat() else {
        debug!("Timecode MIDI file has no beat grid");
        return (vec![], vec![]);
    };

    let mut signatures = midi.time_signatures.clone();
    if signatures.first().map_or(true, |signature| signature.tick > 0) {
        signatures.insert(
            0,
            TimeSignature {
                tick: 0,
                numerator: 4,
                denominator: 4,
            },
        );
    }

    let mut beats = vec![];
    let mut downbeats = vec![];

    for (i, signature) in signatures.iter().enumerate() {
        let step = (ticks_per_beat as u32 * 4 / signature.denominator.max(1)).max(1);
        let numerator = signature.numerator.max(1) as u32;
        let next_tick = signatures.get(i + 1).map(|next| next.tick);

        let mut tick = signature.tick;
        let mut index = 0u32;
        loop {
            let in_region = match next_tick {
                Some(next_tick) => tick < next_tick,
                None => tick <= midi.end_tick,
            };
            if !in_region {
                break;
            }

            let time = midi.tempo_map.tick_to_seconds(tick);
            beats.push(time);
            if index % numerator == 0 {
                downbeats.push(time);
            }

            let Some(next) = tick.checked_add(step) else {
                break;
            };
            tick = next;
            index += 1;
        }
    }

    (beats, downbeats)
}

/// Mark beats and downbeats that fall inside a segment.
///
/// # Arguments
///
/// * `beats` - Beat times in seconds.
/// * `downbeats` - Downbeat times in seconds.
/// * `segment` - The window to encode.
///
/// # Returns
///
/// * Beat and downbeat rolls where coinciding beats accumulate, and the
///   quantized beat events sorted by time then name.
pub fn beats_to_rolls_and_events(beats: &[f64], downbeats: &[f64], segment: &Segment) -> BeatRolls {
    let segment_frames = segment.frames();
    let fps = segment.fps;

    let mut beat_roll = Array1::<f32>::zeros(segment_frames);
    let mut downbeat_roll = Array1::<f32>::zeros(segment_frames);
    let mut events = vec![];

    let inside = |time: &&f64| segment.start <= **time && **time <= segment.end();

    for &beat in beats.iter().filter(inside) {
        let time = time_to_grid(beat - segment.start, fps);
        let idx = time_to_frame(time, fps).min(segment_frames - 1);
        beat_roll[idx] += 1.0;
        events.push(Event::Beat { time });
    }

    for &beat in downbeats.iter().filter(inside) {
        let time = time_to_grid(beat - segment.start, fps);
        let idx = time_to_frame(time, fps).min(segment_frames - 1);
        downbeat_roll[idx] += 1.0;
        events.push(Event::Downbeat { time });
    }

    events.sort_by(cmp_events);

    BeatRolls {
        beat_roll,
        downbeat_roll,
        events,
    }
}
