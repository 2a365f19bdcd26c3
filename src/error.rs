/// Errors raised by the roll/token codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid note: {0}")]
    InvalidNote(String),

    #[error("Interval [{onset}, {offset}] does not fit a segment of {duration}s")]
    UnclassifiedInterval { onset: f64, offset: f64, duration: f64 },

    #[error("Note ending at {end}s could not be matched against pedal [{pedal_start}, {pedal_end}]")]
    UnmatchedNote {
        end: f64,
        pedal_start: f64,
        pedal_end: f64,
    },

    #[error("String {0:?} is not supported by any vocabulary")]
    UnknownString(String),

    #[error("Token {token} is outside of the vocabulary (size {vocab_size})")]
    TokenOutOfRange { token: usize, vocab_size: usize },

    #[error("Token {token} falls in a reserved slot of the {vocabulary} vocabulary")]
    UnassignedToken { token: usize, vocabulary: String },

    #[error("Invalid value {value:?} for field {key:?}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown field {0:?}")]
    UnknownField(String),

    #[error("Unknown event name {0:?}")]
    UnknownEventName(String),

    #[error("Segment of {duration}s does not lie on a {fps} fps frame grid")]
    OffGridSegment { duration: f64, fps: f64 },

    #[error("MIDI track {track} runs past the last representable tick")]
    TickOverflow { track: usize },

    #[error("Expected a single instrument, found {0}")]
    MultipleInstruments(usize),

    #[error("MIDI error: {0}")]
    Midi(#[from] midly::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config load/parse error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
