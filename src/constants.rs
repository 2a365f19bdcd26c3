// Grid
pub const FRAMES_PER_SECOND: f64 = 100.0;
pub const SEGMENT_SECONDS: f64 = 10.0;
pub const PITCHES_NUM: usize = 128;
pub const DEGENERATE_OFFSET_SECONDS: f64 = 0.01;
// frames within this distance of an integer count as on the grid
pub const GRID_TOLERANCE: f64 = 1e-6;

// Sustain pedal
pub const SUSTAIN_CONTROLLER: u8 = 64;
pub const SUSTAIN_THRESHOLD: u8 = 64;

// String decoding
pub const DEFAULT_VELOCITY: u8 = 100;
pub const DEFAULT_NOTE_DURATION: f64 = 0.1;
pub const DEFAULT_LABEL: &str = "maestro-Piano";

// Vocabulary
pub const MAX_TIME_SECONDS: f64 = 60.0;
pub const NAME_VOCAB_SIZE: usize = 100;
pub const TASK_VOCAB_SIZE: usize = 100;
pub const BEAT_INDEX_VOCAB_SIZE: usize = 16;
pub const MAX_TOKEN_LEN: usize = 1024;

// MIDI Conversion
pub const TICKS_PER_BEAT: u16 = 480;
pub const DEFAULT_BPM: u32 = 120;
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;
