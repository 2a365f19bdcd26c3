use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use roll_tokenizer::config::CodecConfig;
use roll_tokenizer::postprocessing::midi::write_notes_to_midi;
use roll_tokenizer::postprocessing::note_assembler::events_to_notes;
use roll_tokenizer::preprocessing::beats::beat_times;
use roll_tokenizer::preprocessing::midi_file::{get_pedals, MidiFile};
use roll_tokenizer::preprocessing::pedals::extend_offset_by_pedal;
use roll_tokenizer::tokenization::string_processor::PAD;
use roll_tokenizer::tokenization::targets::{TargetBuilder, TaskKind};
use roll_tokenizer::tokenization::tokenizer::Tokenizer;

#[derive(Parser)]
#[clap(
    version = crate_version!(),
    about = "Encodes MIDI performances as piano rolls and tokens, and decodes tokens back to MIDI."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the token ranges of the vocabulary.
    Vocab {
        /// The codec configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Encodes one segment of a MIDI file and prints its strings and tokens.
    Encode {
        /// The MIDI file to encode.
        midi_path: PathBuf,
        /// The segment start in seconds.
        #[arg(short, long, default_value_t = 0.0)]
        start: f64,
        /// The codec configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Encode a training task instead of events. Overrides the configuration.
        #[arg(short, long)]
        task: Option<TaskKind>,
    },
    /// Decodes tokens into notes and writes them to a MIDI file.
    Decode {
        /// The MIDI file to write.
        output_path: PathBuf,
        /// Tokens separated by commas or whitespace.
        #[arg(long)]
        tokens: String,
        /// The codec configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<CodecConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => CodecConfig::load(&path)?,
        None => CodecConfig::default(),
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Vocab { config } => {
            let config = load_config(config)?;
            let tokenizer = Tokenizer::from_config(&config);
            for (name, range) in tokenizer.ranges() {
                println!("{name}: {}..{}", range.start, range.end);
            }
            println!("vocab_size: {}", tokenizer.vocab_size());
        }
        Commands::Encode {
            midi_path,
            start,
            config,
            task,
        } => {
            let mut config = load_config(config)?;
            if task.is_some() {
                config.task = task;
            }

            let midi = MidiFile::open(&midi_path)?;
            let pedals = get_pedals(&midi.control_changes);
            let (beats, downbeats) = beat_times(&midi);
            let notes = if config.extend_pedal {
                extend_offset_by_pedal(midi.notes, &pedals)?
            } else {
                midi.notes
            };
            info!(path = ?midi_path, notes = notes.len(), pedals = pedals.len(), "Read MIDI file");

            let tokenizer = Tokenizer::from_config(&config);
            let builder = TargetBuilder::new(&config, &tokenizer);
            let targets = builder.build_with_beats(&notes, &pedals, &beats, &downbeats, start)?;

            println!("{}", targets.strings.join(" "));
            let tokens: Vec<String> = targets.tokens.iter().map(|token| token.to_string()).collect();
            println!("{}", tokens.join(","));
            if targets.tokens_num > config.max_token_len {
                info!(
                    tokens_num = targets.tokens_num,
                    max_token_len = config.max_token_len,
                    "Tokens were truncated"
                );
            }
        }
        Commands::Decode {
            output_path,
            tokens,
            config,
        } => {
            let config = load_config(config)?;
            let tokenizer = Tokenizer::from_config(&config);

            let tokens = tokens
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .map(|token| token.parse::<usize>())
                .collect::<Result<Vec<usize>, _>>()?;
            let strings: Vec<String> = tokenizer
                .tokens_to_strings(&tokens)?
                .into_iter()
                .filter(|string| string.as_str() != PAD)
                .collect();

            let events = config.string_processor.strings_to_events(&strings)?;
            let notes = events_to_notes(&events);
            write_notes_to_midi(&notes, &output_path, config.bpm)?;
        }
    }

    Ok(())
}
