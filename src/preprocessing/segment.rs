use ndarray::{s, Array1, Array2};

use crate::constants::PITCHES_NUM;
use crate::error::{CodecError, Result};
use crate::notes::{Interval, Note, Pedal};
use crate::tokenization::events::{cmp_events, Event};

use super::time_grid::{is_on_grid, nudge_offset, segment_frames, time_to_frame, time_to_grid};

/// A window `[start, start + duration]` of absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    pub fps: f64,
}

impl Segment {
    /// Build a segment whose duration lies on the frame grid. The stored
    /// duration is the grid value, so quantized times compare exactly
    /// against it.
    pub fn new(start: f64, duration: f64, fps: f64) -> Result<Self> {
        let valid = fps.is_finite() && fps > 0.0 && duration.is_finite() && duration >= 0.0;
        if !(valid && is_on_grid(duration, fps)) {
            return Err(CodecError::OffGridSegment { duration, fps });
        }
        if !start.is_finite() {
            return Err(CodecError::InvalidValue {
                key: "segment_start".to_string(),
                value: start.to_string(),
            });
        }

        Ok(Segment {
            start,
            duration: time_to_grid(duration, fps),
            fps,
        })
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn frames(&self) -> usize {
        segment_frames(self.duration, self.fps)
    }

    fn misses<I: Interval>(&self, interval: &I) -> bool {
        interval.end() < self.start || self.end() < interval.start()
    }
}

/// Where a quantized interval falls relative to a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Sounding before the segment, released inside it.
    ClippedFront { offset: f64, offset_idx: usize },
    /// Sounding across the whole segment.
    Spanning,
    /// Pressed and released inside the segment.
    Inside {
        onset: f64,
        onset_idx: usize,
        offset: f64,
        offset_idx: usize,
    },
    /// Pressed inside the segment, released after it.
    ClippedBack { onset: f64, onset_idx: usize },
}

/// Quantize a segment-relative interval and place it on the segment.
///
/// # Arguments
///
/// * `onset` - Start time relative to the segment start.
/// * `offset` - End time relative to the segment start.
/// * `segment` - The segment being encoded.
///
/// # Returns
///
/// * The placement, or `CodecError::UnclassifiedInterval` when the interval
///   does not overlap the segment at all.
pub fn classify(onset: f64, offset: f64, segment: &Segment) -> Result<Placement> {
    let fps = segment.fps;
    let seg_len = segment.duration;

    let onset = time_to_grid(onset, fps);
    let mut offset = time_to_grid(offset, fps);
    if offset == onset {
        offset = nudge_offset(onset, fps);
    }

    let onset_inside = 0.0 <= onset && onset <= seg_len;
    let offset_inside = 0.0 <= offset && offset <= seg_len;

    if onset < 0.0 && offset_inside {
        Ok(Placement::ClippedFront {
            offset,
            offset_idx: time_to_frame(offset, fps),
        })
    } else if onset < 0.0 && seg_len < offset {
        Ok(Placement::Spanning)
    } else if onset_inside && offset_inside {
        Ok(Placement::Inside {
            onset,
            onset_idx: time_to_frame(onset, fps),
            offset,
            offset_idx: time_to_frame(offset, fps),
        })
    } else if onset_inside && seg_len < offset {
        Ok(Placement::ClippedBack {
            onset,
            onset_idx: time_to_frame(onset, fps),
        })
    } else {
        Err(CodecError::UnclassifiedInterval {
            onset,
            offset,
            duration: seg_len,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NoteRolls {
    pub frame_roll: Array2<f32>,
    pub onset_roll: Array2<f32>,
    pub offset_roll: Array2<f32>,
    pub velocity_roll: Array2<f32>,
    pub events: Vec<Event>,
    /// Overlapping notes in segment-relative time, before quantization.
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone)]
pub struct PedalRolls {
    pub frame_roll: Array1<f32>,
    pub onset_roll: Array1<f32>,
    pub offset_roll: Array1<f32>,
    pub events: Vec<Event>,
}

/// Convert notes overlapping a segment into piano rolls and note events.
///
/// # Arguments
///
/// * `notes` - Notes in absolute time.
/// * `segment` - The window to encode.
/// * `label` - Instrument label attached to every event.
///
/// # Returns
///
/// * Frame, onset, offset and velocity rolls of shape (frames, 128), the
///   events sorted by `(time, name, label, pitch)`, and the overlapping notes
///   translated to segment time.
pub fn notes_to_rolls_and_events(notes: &[Note], segment: &Segment, label: &str) -> Result<NoteRolls> {
    let segment_frames = segment.frames();

    let mut frame_roll = Array2::<f32>::zeros((segment_frames, PITCHES_NUM));
    let mut onset_roll = Array2::<f32>::zeros((segment_frames, PITCHES_NUM));
    let mut offset_roll = Array2::<f32>::zeros((segment_frames, PITCHES_NUM));
    let mut velocity_roll = Array2::<f32>::zeros((segment_frames, PITCHES_NUM));

    let mut events = vec![];
    let mut active_notes = vec![];

    for note in notes.iter().filter(|note| !segment.misses(*note)) {
        let active_note = Note::new(
            note.pitch,
            note.velocity,
            note.start - segment.start,
            note.end - segment.start,
        )?;

        let pitch = note.pitch as usize;
        let velocity = note.velocity;
        let label = Some(label.to_string());

        match classify(active_note.start, active_note.end, segment)? {
            Placement::ClippedFront { offset, offset_idx } => {
                offset_roll[[offset_idx, pitch]] = 1.0;
                frame_roll.slice_mut(s![..=offset_idx, pitch]).fill(1.0);

                events.push(Event::NoteSustain {
                    time: 0.0,
                    label: label.clone(),
                    pitch: note.pitch,
                    velocity,
                });
                events.push(Event::NoteOff {
                    time: offset,
                    label,
                    pitch: note.pitch,
                });
            }
            Placement::Spanning => {
                frame_roll.slice_mut(s![.., pitch]).fill(1.0);

                events.push(Event::NoteSustain {
                    time: 0.0,
                    label,
                    pitch: note.pitch,
                    velocity,
                });
            }
            Placement::Inside {
                onset,
                onset_idx,
                offset,
                offset_idx,
            } => {
                onset_roll[[onset_idx, pitch]] = 1.0;
                velocity_roll[[onset_idx, pitch]] = velocity as f32 / 128.0;
                offset_roll[[offset_idx, pitch]] = 1.0;
                frame_roll.slice_mut(s![onset_idx..=offset_idx, pitch]).fill(1.0);

                events.push(Event::NoteOn {
                    time: onset,
                    label: label.clone(),
                    pitch: note.pitch,
                    velocity,
                });
                events.push(Event::NoteOff {
                    time: offset,
                    label,
                    pitch: note.pitch,
                });
            }
            Placement::ClippedBack { onset, onset_idx } => {
                onset_roll[[onset_idx, pitch]] = 1.0;
                velocity_roll[[onset_idx, pitch]] = velocity as f32 / 128.0;
                frame_roll.slice_mut(s![onset_idx.., pitch]).fill(1.0);

                events.push(Event::NoteOn {
                    time: onset,
                    label,
                    pitch: note.pitch,
                    velocity,
                });
            }
        }

        active_notes.push(active_note);
    }

    events.sort_by(cmp_events);

    Ok(NoteRolls {
        frame_roll,
        onset_roll,
        offset_roll,
        velocity_roll,
        events,
        notes: active_notes,
    })
}

/// Convert sustain pedals overlapping a segment into rolls and pedal events.
///
/// Uses the same four placements as notes, without pitch or velocity.
pub fn pedals_to_rolls_and_events(pedals: &[Pedal], segment: &Segment, label: &str) -> Result<PedalRolls> {
    let segment_frames = segment.frames();

    let mut frame_roll = Array1::<f32>::zeros(segment_frames);
    let mut onset_roll = Array1::<f32>::zeros(segment_frames);
    let mut offset_roll = Array1::<f32>::zeros(segment_frames);

    let mut events = vec![];

    for pedal in pedals.iter().filter(|pedal| !segment.misses(*pedal)) {
        let label = Some(label.to_string());
        let onset_time = pedal.start - segment.start;
        let offset_time = pedal.end - segment.start;

        match classify(onset_time, offset_time, segment)? {
            Placement::ClippedFront { offset, offset_idx } => {
                offset_roll[offset_idx] = 1.0;
                frame_roll.slice_mut(s![..=offset_idx]).fill(1.0);

                events.push(Event::PedalSustain {
                    time: 0.0,
                    label: label.clone(),
                });
                events.push(Event::PedalOff { time: offset, label });
            }
            Placement::Spanning => {
                frame_roll.fill(1.0);
                events.push(Event::PedalSustain { time: 0.0, label });
            }
            Placement::Inside {
                onset,
                onset_idx,
                offset,
                offset_idx,
            } => {
                onset_roll[onset_idx] = 1.0;
                offset_roll[offset_idx] = 1.0;
                frame_roll.slice_mut(s![onset_idx..=offset_idx]).fill(1.0);

                events.push(Event::PedalOn {
                    time: onset,
                    label: label.clone(),
                });
                events.push(Event::PedalOff { time: offset, label });
            }
            Placement::ClippedBack { onset, onset_idx } => {
                onset_roll[onset_idx] = 1.0;
                frame_roll.slice_mut(s![onset_idx..]).fill(1.0);

                events.push(Event::PedalOn { time: onset, label });
            }
        }
    }

    events.sort_by(cmp_events);

    Ok(PedalRolls {
        frame_roll,
        onset_roll,
        offset_roll,
        events,
    })
}
