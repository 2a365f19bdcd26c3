pub mod config;
pub mod constants;
pub mod error;
pub mod notes;
pub mod preprocessing {
    pub mod beats;
    pub mod midi_file;
    pub mod pedals;
    pub mod segment;
    pub mod time_grid;
}
pub mod tokenization {
    pub mod events;
    pub mod string_processor;
    pub mod targets;
    pub mod tokenizer;
    pub mod vocabulary;
}
pub mod postprocessing {
    pub mod midi;
    pub mod note_assembler;
}
