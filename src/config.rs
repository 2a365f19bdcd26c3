use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::constants::{DEFAULT_BPM, DEFAULT_LABEL, FRAMES_PER_SECOND, MAX_TOKEN_LEN, SEGMENT_SECONDS};
use crate::error::Result;
use crate::preprocessing::segment::Segment;
use crate::tokenization::string_processor::StringProcessor;
use crate::tokenization::targets::TaskKind;

/// Settings shared by encoding and decoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Frames per second of the time grid.
    pub fps: f64,
    /// Duration of one segment in seconds.
    pub segment_seconds: f64,
    /// Extend note offsets while the sustain pedal is held.
    pub extend_pedal: bool,
    /// Instrument label attached to note and pedal events.
    pub label: String,
    /// Length that token sequences are padded or truncated to.
    pub max_token_len: usize,
    /// Tempo of written MIDI files.
    pub bpm: u32,
    /// Training task. Without one, segments are encoded as events.
    pub task: Option<TaskKind>,
    pub string_processor: StringProcessor,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            fps: FRAMES_PER_SECOND,
            segment_seconds: SEGMENT_SECONDS,
            extend_pedal: true,
            label: DEFAULT_LABEL.to_string(),
            max_token_len: MAX_TOKEN_LEN,
            bpm: DEFAULT_BPM,
            task: None,
            string_processor: StringProcessor::default(),
        }
    }
}

impl CodecConfig {
    /// Loads a configuration file. The format follows the file extension.
    pub fn load(path: &Path) -> Result<CodecConfig> {
        Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<CodecConfig>()?
            .validated()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<CodecConfig> {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<CodecConfig>()?
            .validated()
    }

    /// The segment length must be a whole number of frames at `fps`.
    fn validated(self) -> Result<CodecConfig> {
        Segment::new(0.0, self.segment_seconds, self.fps)?;
        Ok(self)
    }
}
