use std::collections::HashMap;

use crate::constants::{
    BEAT_INDEX_VOCAB_SIZE, FRAMES_PER_SECOND, MAX_TIME_SECONDS, NAME_VOCAB_SIZE, PITCHES_NUM,
    TASK_VOCAB_SIZE,
};
use crate::error::{CodecError, Result};
use crate::preprocessing::time_grid::{format_time, is_on_grid};

use super::events::EventName;
use super::string_processor::{EOS, PAD, SOS, UNK};

/// One contiguous range of the token space.
///
/// `encode` returns `Ok(None)` when the string belongs to another
/// vocabulary, and an error when it carries this vocabulary's key with a
/// value outside of its range.
pub trait SubVocabulary: Send + Sync {
    fn name(&self) -> &str;

    fn vocab_size(&self) -> usize;

    fn encode(&self, string: &str) -> Result<Option<usize>>;

    fn decode(&self, token: usize) -> Result<String>;
}

/// A fixed list of strings, optionally padded with reserved slots.
#[derive(Debug, Clone)]
pub struct EnumeratedVocabulary {
    name: String,
    strings: Vec<String>,
    string_to_token: HashMap<String, usize>,
    vocab_size: usize,
}

impl EnumeratedVocabulary {
    pub fn new<S: Into<String>>(name: &str, strings: Vec<S>) -> Self {
        let strings: Vec<String> = strings.into_iter().map(Into::into).collect();
        let vocab_size = strings.len();
        Self::with_reserved_size(name, strings, vocab_size)
    }

    /// Build a vocabulary that occupies `vocab_size` ids, leaving the ids
    /// past the listed strings unassigned.
    pub fn with_reserved_size<S: Into<String>>(name: &str, strings: Vec<S>, vocab_size: usize) -> Self {
        let strings: Vec<String> = strings.into_iter().map(Into::into).collect();
        let string_to_token = strings
            .iter()
            .enumerate()
            .map(|(token, string)| (string.clone(), token))
            .collect();

        EnumeratedVocabulary {
            name: name.to_string(),
            vocab_size: vocab_size.max(strings.len()),
            strings,
            string_to_token,
        }
    }

    pub fn special() -> Self {
        Self::new("special", vec![PAD, SOS, EOS, UNK])
    }

    pub fn event_names() -> Self {
        let strings: Vec<String> = EventName::ALL
            .iter()
            .map(|name| format!("name={name}"))
            .collect();
        Self::with_reserved_size("name", strings, NAME_VOCAB_SIZE)
    }

    pub fn labels(dataset: &str, labels: &[&str]) -> Self {
        let strings: Vec<String> = labels
            .iter()
            .map(|label| format!("label={dataset}-{label}"))
            .collect();
        Self::new(&format!("label/{dataset}"), strings)
    }

    pub fn maestro_labels() -> Self {
        Self::labels("maestro", &["Piano"])
    }

    pub fn slakh2100_labels() -> Self {
        Self::labels(
            "slakh2100",
            &[
                "Bass",
                "Brass",
                "Chromatic Percussion",
                "Drums",
                "Ethnic",
                "Guitar",
                "Organ",
                "Percussive",
                "Piano",
                "Pipe",
                "Reed",
                "Sound Effects",
                "Strings",
                "Strings (continued)",
                "Synth Lead",
                "Synth Pad",
            ],
        )
    }

    pub fn gtzan_labels() -> Self {
        Self::labels(
            "gtzan",
            &[
                "blues",
                "classical",
                "country",
                "disco",
                "hiphop",
                "jazz",
                "metal",
                "pop",
                "reggae",
                "rock",
            ],
        )
    }

    pub fn tasks() -> Self {
        let strings: Vec<String> = ["onset", "offset", "velocity", "flatten"]
            .iter()
            .map(|task| format!("task={task}"))
            .collect();
        Self::with_reserved_size("task", strings, TASK_VOCAB_SIZE)
    }
}

impl SubVocabulary for EnumeratedVocabulary {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn encode(&self, string: &str) -> Result<Option<usize>> {
        Ok(self.string_to_token.get(string).copied())
    }

    fn decode(&self, token: usize) -> Result<String> {
        match self.strings.get(token) {
            Some(string) => Ok(string.clone()),
            None if token < self.vocab_size => Err(CodecError::UnassignedToken {
                token,
                vocabulary: self.name.clone(),
            }),
            None => Err(CodecError::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size,
            }),
        }
    }
}

/// Quantized time `time=<seconds>` from 0 to `max_seconds` in steps of
/// `1 / fps`. Times between two steps are rejected rather than rounded.
#[derive(Debug, Clone)]
pub struct TimeVocabulary {
    fps: f64,
    vocab_size: usize,
}

impl TimeVocabulary {
    pub fn new(max_seconds: f64, fps: f64) -> Self {
        TimeVocabulary {
            fps,
            vocab_size: (max_seconds * fps).round() as usize + 1,
        }
    }
}

impl Default for TimeVocabulary {
    fn default() -> Self {
        Self::new(MAX_TIME_SECONDS, FRAMES_PER_SECOND)
    }
}

impl SubVocabulary for TimeVocabulary {
    fn name(&self) -> &str {
        "time"
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn encode(&self, string: &str) -> Result<Option<usize>> {
        let Some(value) = string.strip_prefix("time=") else {
            return Ok(None);
        };

        let invalid = || CodecError::InvalidValue {
            key: "time".to_string(),
            value: value.to_string(),
        };
        let time: f64 = value.parse().map_err(|_| invalid())?;
        let token = (time * self.fps).round_ties_even();
        if !is_on_grid(time, self.fps) || !(0.0..self.vocab_size as f64).contains(&token) {
            return Err(invalid());
        }

        Ok(Some(token as usize))
    }

    fn decode(&self, token: usize) -> Result<String> {
        if token >= self.vocab_size {
            return Err(CodecError::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size,
            });
        }
        Ok(format!("time={}", format_time(token as f64 / self.fps)))
    }
}

/// Integers `<key>=0` .. `<key>=<vocab_size - 1>`.
#[derive(Debug, Clone)]
pub struct IntegerVocabulary {
    key: String,
    prefix: String,
    vocab_size: usize,
}

impl IntegerVocabulary {
    pub fn new(key: &str, vocab_size: usize) -> Self {
        IntegerVocabulary {
            key: key.to_string(),
            prefix: format!("{key}="),
            vocab_size,
        }
    }

    pub fn pitch() -> Self {
        Self::new("pitch", PITCHES_NUM)
    }

    pub fn velocity() -> Self {
        Self::new("velocity", 128)
    }

    pub fn beat_index() -> Self {
        Self::new("beat_index", BEAT_INDEX_VOCAB_SIZE)
    }
}

impl SubVocabulary for IntegerVocabulary {
    fn name(&self) -> &str {
        &self.key
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn encode(&self, string: &str) -> Result<Option<usize>> {
        let Some(value) = string.strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };

        match value.parse::<usize>() {
            Ok(token) if token < self.vocab_size => Ok(Some(token)),
            _ => Err(CodecError::InvalidValue {
                key: self.key.clone(),
                value: value.to_string(),
            }),
        }
    }

    fn decode(&self, token: usize) -> Result<String> {
        if token >= self.vocab_size {
            return Err(CodecError::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size,
            });
        }
        Ok(format!("{}{token}", self.prefix))
    }
}
