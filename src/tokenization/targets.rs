use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::Deserialize;
use tracing::debug;

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::notes::{Note, Pedal};
use crate::preprocessing::beats::{beats_to_rolls_and_events, BeatRolls};
use crate::preprocessing::segment::{
    notes_to_rolls_and_events, pedals_to_rolls_and_events, NoteRolls, PedalRolls, Segment,
};
use crate::preprocessing::time_grid::{format_time, time_to_grid};

use super::events::cmp_events;
use super::string_processor::{EOS, SOS};
use super::tokenizer::Tokenizer;

/// Which training target a token sequence spells out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Onset time and pitch of every note starting in the segment.
    Onset,
    /// Onset, pitch and offset, with sustain markers at clipped ends.
    Offset,
    /// Onset and pitch as context, velocity as target.
    Velocity,
    /// Onset, pitch, offset and velocity, all as targets.
    Flatten,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Onset => "onset",
            TaskKind::Offset => "offset",
            TaskKind::Velocity => "velocity",
            TaskKind::Flatten => "flatten",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "onset" => Ok(TaskKind::Onset),
            "offset" => Ok(TaskKind::Offset),
            "velocity" => Ok(TaskKind::Velocity),
            "flatten" => Ok(TaskKind::Flatten),
            _ => Err(CodecError::InvalidValue {
                key: "task".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

const NOTE_SUSTAIN: &str = "name=note_sustain";

fn time_string(time: f64, fps: f64) -> String {
    format!("time={}", format_time(time_to_grid(time, fps)))
}

/// Build the task strings and their loss mask for one segment.
///
/// # Arguments
///
/// * `task` - The target to spell out.
/// * `notes` - Notes overlapping the segment, in segment time.
/// * `segment_seconds` - Segment duration.
/// * `fps` - Frames per second of the time grid.
///
/// # Returns
///
/// * The strings, starting with `<sos>` and `task=<task>` and ending with
///   `<eos>`, and a mask of the same length that is 1 where a string is a
///   training target.
pub fn task_strings(task: TaskKind, notes: &[Note], segment_seconds: f64, fps: f64) -> (Vec<String>, Vec<u8>) {
    let mut strings = vec![SOS.to_string(), format!("task={task}")];
    let mut masks = vec![0, 0];

    for note in notes {
        let onset_time = time_to_grid(note.start, fps);
        let offset_time = time_to_grid(note.end, fps);
        let starts_inside = 0.0 <= note.start && note.start <= segment_seconds;

        let onset_string = if onset_time < 0.0 {
            NOTE_SUSTAIN.to_string()
        } else {
            time_string(note.start, fps)
        };
        let offset_string = if segment_seconds < offset_time {
            NOTE_SUSTAIN.to_string()
        } else {
            time_string(note.end, fps)
        };
        let pitch_string = format!("pitch={}", note.pitch);
        let velocity_string = format!("velocity={}", note.velocity);

        match task {
            TaskKind::Onset if starts_inside => {
                strings.extend([time_string(note.start, fps), pitch_string]);
                masks.extend([1, 1]);
            }
            TaskKind::Velocity if starts_inside => {
                strings.extend([time_string(note.start, fps), pitch_string, velocity_string]);
                masks.extend([0, 0, 1]);
            }
            TaskKind::Offset if onset_time <= segment_seconds && 0.0 <= offset_time => {
                strings.extend([onset_string, pitch_string, offset_string]);
                masks.extend([0, 0, 1]);
            }
            TaskKind::Flatten if onset_time <= segment_seconds && 0.0 <= offset_time => {
                strings.extend([onset_string, pitch_string, offset_string, velocity_string]);
                masks.extend([1, 1, 1, 1]);
            }
            _ => {}
        }
    }

    strings.push(EOS.to_string());
    masks.push(1);

    (strings, masks)
}

/// Truncate `x` to `max_len`, or pad it up to `max_len` with `constant_value`.
pub fn fix_length<T: Clone>(mut x: Vec<T>, max_len: usize, constant_value: T) -> Vec<T> {
    x.resize(max_len, constant_value);
    x
}

/// Rolls, strings and fixed-length tokens of one training segment.
#[derive(Debug, Clone)]
pub struct SegmentTargets {
    pub note_rolls: NoteRolls,
    pub pedal_rolls: PedalRolls,
    pub beat_rolls: BeatRolls,
    pub strings: Vec<String>,
    pub tokens: Array1<usize>,
    /// Number of tokens before padding or truncation.
    pub tokens_num: usize,
    pub mask: Array1<u8>,
}

/// Builds the training targets of segments cut from one performance.
pub struct TargetBuilder<'a> {
    config: &'a CodecConfig,
    tokenizer: &'a Tokenizer,
}

impl<'a> TargetBuilder<'a> {
    pub fn new(config: &'a CodecConfig, tokenizer: &'a Tokenizer) -> Self {
        TargetBuilder { config, tokenizer }
    }

    pub fn segment(&self, segment_start: f64) -> Result<Segment> {
        Segment::new(segment_start, self.config.segment_seconds, self.config.fps)
    }

    /// Encode the segment starting at `segment_start`, without beats.
    pub fn build(&self, notes: &[Note], pedals: &[Pedal], segment_start: f64) -> Result<SegmentTargets> {
        self.build_with_beats(notes, pedals, &[], &[], segment_start)
    }

    /// Encode the segment starting at `segment_start`.
    ///
    /// # Arguments
    ///
    /// * `notes` - Notes in absolute time, already pedal-extended if wanted.
    /// * `pedals` - Sustain pedals in absolute time.
    /// * `beats` - Beat times in absolute time.
    /// * `downbeats` - Downbeat times in absolute time.
    /// * `segment_start` - Segment start in seconds.
    ///
    /// # Returns
    ///
    /// * The rolls and token targets. With a task configured the strings come
    ///   from `task_strings`; otherwise the note, pedal and beat events go
    ///   through the configured `StringProcessor` and everything after
    ///   `<sos>` is a target.
    pub fn build_with_beats(
        &self,
        notes: &[Note],
        pedals: &[Pedal],
        beats: &[f64],
        downbeats: &[f64],
        segment_start: f64,
    ) -> Result<SegmentTargets> {
        let segment = self.segment(segment_start)?;
        let label = self.config.label.as_str();

        let note_rolls = notes_to_rolls_and_events(notes, &segment, label)?;
        let pedal_rolls = pedals_to_rolls_and_events(pedals, &segment, label)?;
        let beat_rolls = beats_to_rolls_and_events(beats, downbeats, &segment);

        let (strings, masks) = match self.config.task {
            Some(task) => task_strings(task, &note_rolls.notes, segment.duration, segment.fps),
            None => {
                let mut events = note_rolls.events.clone();
                events.extend(pedal_rolls.events.iter().cloned());
                events.extend(beat_rolls.events.iter().cloned());
                events.sort_by(cmp_events);

                let strings = self.config.string_processor.events_to_strings(&events);
                let mut masks = vec![1; strings.len()];
                masks[0] = 0;
                (strings, masks)
            }
        };

        let tokens = self.tokenizer.strings_to_tokens(&strings)?;
        let tokens_num = tokens.len();
        let max_len = self.config.max_token_len;

        debug!(segment_start, tokens_num, max_len, "Built segment targets");

        let tokens = fix_length(tokens, max_len, self.tokenizer.pad_token()?);
        let mask = fix_length(masks, max_len, 0);

        Ok(SegmentTargets {
            note_rolls,
            pedal_rolls,
            beat_rolls,
            strings,
            tokens: Array1::from(tokens),
            tokens_num,
            mask: Array1::from(mask),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenization::string_processor::StringProcessor;

    fn note(pitch: u8, velocity: u8, start: f64, end: f64) -> Note {
        Note::new(pitch, velocity, start, end).unwrap()
    }

    fn segment_notes() -> Vec<Note> {
        vec![
            note(48, 40, -1.0, 2.0),
            note(60, 90, 1.234, 3.5),
            note(64, 70, 8.0, 12.0),
            note(36, 20, -3.0, 15.0),
        ]
    }

    #[test]
    fn onset_task() {
        let (strings, masks) = task_strings(TaskKind::Onset, &segment_notes(), 10.0, 100.0);
        assert_eq!(
            strings,
            vec!["<sos>", "task=onset", "time=1.23", "pitch=60", "time=8.0", "pitch=64", "<eos>"]
        );
        assert_eq!(masks, vec![0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn offset_task_marks_clipped_ends() {
        let (strings, masks) = task_strings(TaskKind::Offset, &segment_notes(), 10.0, 100.0);
        assert_eq!(
            strings,
            vec![
                "<sos>",
                "task=offset",
                "name=note_sustain",
                "pitch=48",
                "time=2.0",
                "time=1.23",
                "pitch=60",
                "time=3.5",
                "time=8.0",
                "pitch=64",
                "name=note_sustain",
                "name=note_sustain",
                "pitch=36",
                "name=note_sustain",
                "<eos>",
            ]
        );
        assert_eq!(masks.len(), strings.len());
        assert_eq!(&masks[2..5], &[0, 0, 1]);
    }

    #[test]
    fn velocity_task_targets_velocity_only() {
        let (strings, masks) = task_strings(TaskKind::Velocity, &segment_notes(), 10.0, 100.0);
        assert_eq!(&strings[2..5], &["time=1.23", "pitch=60", "velocity=90"]);
        assert_eq!(masks, vec![0, 0, 0, 0, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn flatten_task_has_four_fields_per_note() {
        let (strings, masks) = task_strings(TaskKind::Flatten, &segment_notes(), 10.0, 100.0);
        assert_eq!(strings.len(), 2 + 4 * 4 + 1);
        assert_eq!(&strings[2..6], &["name=note_sustain", "pitch=48", "time=2.0", "velocity=40"]);
        assert!(masks[2..].iter().all(|&m| m == 1));
    }

    #[test]
    fn task_names_parse() {
        assert_eq!("velocity".parse::<TaskKind>().unwrap(), TaskKind::Velocity);
        assert_eq!(TaskKind::Flatten.to_string(), "flatten");
        assert!("chords".parse::<TaskKind>().is_err());
    }

    #[test]
    fn fix_length_pads_and_truncates() {
        assert_eq!(fix_length(vec![1, 2, 3], 5, 0), vec![1, 2, 3, 0, 0]);
        assert_eq!(fix_length(vec![1, 2, 3], 2, 0), vec![1, 2]);
    }

    #[test]
    fn builds_event_mode_targets() {
        let config = CodecConfig {
            max_token_len: 12,
            ..CodecConfig::default()
        };
        let tokenizer = Tokenizer::from_config(&config);
        let builder = TargetBuilder::new(&config, &tokenizer);

        let notes = [note(60, 90, 0.5, 1.0), note(62, 90, 1.5, 2.5)];
        let pedals = [Pedal { start: 0.0, end: 3.0 }];
        let targets = builder.build(&notes, &pedals, 0.0).unwrap();

        assert_eq!(
            targets.strings,
            vec![
                "<sos>",
                "name=note_on",
                "time=0.5",
                "pitch=60",
                "name=note_on",
                "time=1.5",
                "pitch=62",
                "<eos>",
            ]
        );
        assert_eq!(targets.tokens_num, 8);
        assert_eq!(targets.tokens.len(), 12);
        assert_eq!(targets.tokens[8], tokenizer.pad_token().unwrap());
        assert_eq!(targets.mask.to_vec(), vec![0, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(targets.note_rolls.frame_roll.shape(), &[1001, 128]);
        assert_eq!(targets.pedal_rolls.onset_roll[0], 1.0);
    }

    #[test]
    fn builds_task_targets_from_segment_notes() {
        let config = CodecConfig {
            task: Some(TaskKind::Onset),
            max_token_len: 4,
            ..CodecConfig::default()
        };
        let tokenizer = Tokenizer::from_config(&config);
        let builder = TargetBuilder::new(&config, &tokenizer);

        let targets = builder
            .build(&[note(60, 90, 20.5, 21.0)], &[], 20.0)
            .unwrap();

        assert_eq!(
            targets.strings,
            vec!["<sos>", "task=onset", "time=0.5", "pitch=60", "<eos>"]
        );
        assert_eq!(targets.tokens_num, 5);
        assert_eq!(
            targets.tokens.to_vec(),
            tokenizer
                .strings_to_tokens(&["<sos>", "task=onset", "time=0.5", "pitch=60"])
                .unwrap()
        );
    }

    #[test]
    fn beats_are_written_when_enabled() {
        let mut config = CodecConfig::default();
        config.string_processor.onset = false;
        config.string_processor.beat = true;
        config.string_processor.downbeat = true;
        let tokenizer = Tokenizer::from_config(&config);
        let builder = TargetBuilder::new(&config, &tokenizer);

        let targets = builder
            .build_with_beats(&[note(60, 90, 10.2, 10.4)], &[], &[10.5, 11.0], &[10.5], 10.0)
            .unwrap();

        assert_eq!(
            targets.strings,
            vec![
                "<sos>",
                "name=beat",
                "time=0.5",
                "name=downbeat",
                "time=0.5",
                "name=beat",
                "time=1.0",
                "<eos>",
            ]
        );
        assert_eq!(targets.beat_rolls.beat_roll[50], 1.0);
        assert_eq!(targets.beat_rolls.downbeat_roll[50], 1.0);
    }

    #[test]
    fn off_grid_segment_length_is_rejected() {
        let config = CodecConfig {
            segment_seconds: 2.345,
            ..CodecConfig::default()
        };
        let tokenizer = Tokenizer::from_config(&config);
        let result = TargetBuilder::new(&config, &tokenizer).build(&[note(60, 90, 2.345, 3.0)], &[], 0.0);

        assert!(matches!(result, Err(CodecError::OffGridSegment { .. })));
    }

    #[test]
    fn fine_grid_times_survive_tokenization() {
        let config = CodecConfig {
            fps: 1000.0,
            string_processor: StringProcessor {
                offset: true,
                ..StringProcessor::default()
            },
            ..CodecConfig::default()
        };
        let tokenizer = Tokenizer::from_config(&config);
        let targets = TargetBuilder::new(&config, &tokenizer)
            .build(&[note(60, 90, 0.123, 0.457)], &[], 0.0)
            .unwrap();

        let decoded = tokenizer
            .tokens_to_strings(&targets.tokens.to_vec()[..targets.tokens_num])
            .unwrap();
        assert_eq!(decoded, targets.strings);
        assert!(decoded.contains(&"time=0.123".to_string()));
        assert!(decoded.contains(&"time=0.457".to_string()));
    }

    #[test]
    fn coarse_tokenizer_refuses_fine_times() {
        let config = CodecConfig {
            fps: 1000.0,
            ..CodecConfig::default()
        };
        let tokenizer = Tokenizer::default();
        let result = TargetBuilder::new(&config, &tokenizer).build(&[note(60, 90, 0.123, 0.457)], &[], 0.0);

        assert!(matches!(result, Err(CodecError::InvalidValue { .. })));
    }
}
