use roll_tokenizer::config::CodecConfig;
use roll_tokenizer::notes::{Note, Pedal};
use roll_tokenizer::postprocessing::midi::write_notes_to_midi;
use roll_tokenizer::postprocessing::note_assembler::events_to_notes;
use roll_tokenizer::preprocessing::midi_file::read_single_track_midi;
use roll_tokenizer::preprocessing::pedals::extend_offset_by_pedal;
use roll_tokenizer::tokenization::string_processor::StringProcessor;
use roll_tokenizer::tokenization::targets::TargetBuilder;
use roll_tokenizer::tokenization::tokenizer::Tokenizer;

fn full_processor() -> StringProcessor {
    StringProcessor {
        onset: true,
        offset: true,
        velocity: true,
        ..StringProcessor::default()
    }
}

#[test]
fn midi_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round_trip.mid");

    let notes = vec![
        Note::new(48, 60, 0.0, 1.0).unwrap(),
        Note::new(60, 100, 0.5, 1.25).unwrap(),
        Note::new(64, 90, 0.5, 2.0).unwrap(),
    ];
    write_notes_to_midi(&notes, &path, 120).unwrap();

    let (read, pedals) = read_single_track_midi(&path, true).unwrap();
    assert!(pedals.is_empty());
    assert_eq!(read.len(), notes.len());
    for (written, read) in notes.iter().zip(read.iter()) {
        assert_eq!(written.pitch, read.pitch);
        assert_eq!(written.velocity, read.velocity);
        assert!((written.start - read.start).abs() < 1e-3);
        assert!((written.end - read.end).abs() < 1e-3);
    }
}

#[test]
fn segment_tokens_decode_to_notes() {
    let config = CodecConfig {
        string_processor: full_processor(),
        ..CodecConfig::default()
    };
    let tokenizer = Tokenizer::from_config(&config);
    let builder = TargetBuilder::new(&config, &tokenizer);

    let notes = vec![
        Note::new(60, 100, 12.5, 13.0).unwrap(),
        Note::new(67, 80, 14.0, 15.25).unwrap(),
        Note::new(72, 64, 19.0, 19.5).unwrap(),
    ];
    let targets = builder.build(&notes, &[], 10.0).unwrap();
    assert!(targets.tokens_num <= config.max_token_len);

    let strings = tokenizer
        .tokens_to_strings(&targets.tokens.to_vec()[..targets.tokens_num])
        .unwrap();
    assert_eq!(strings, targets.strings);

    let events = config.string_processor.strings_to_events(&strings).unwrap();
    let decoded = events_to_notes(&events);

    assert_eq!(decoded.len(), notes.len());
    for (note, decoded) in notes.iter().zip(decoded.iter()) {
        assert_eq!(note.pitch, decoded.pitch);
        assert_eq!(note.velocity, decoded.velocity);
        assert!((note.start - 10.0 - decoded.start).abs() < 0.01);
        assert!((note.end - 10.0 - decoded.end).abs() < 0.01);
    }
}

#[test]
fn pedal_extended_notes_survive_encoding() {
    let notes = vec![
        Note::new(60, 90, 0.0, 0.5).unwrap(),
        Note::new(60, 90, 1.0, 1.5).unwrap(),
        Note::new(62, 90, 0.25, 0.75).unwrap(),
    ];
    let pedals = vec![Pedal::new(0.4, 2.0).unwrap()];
    let extended = extend_offset_by_pedal(notes, &pedals).unwrap();

    // the first C is cut where the next C starts
    assert_eq!(extended[0].end, 1.0);
    assert_eq!(extended[2].end, 2.0);

    let config = CodecConfig {
        string_processor: StringProcessor {
            pedal_onset: true,
            pedal_offset: true,
            ..full_processor()
        },
        ..CodecConfig::default()
    };
    let tokenizer = Tokenizer::from_config(&config);
    let targets = TargetBuilder::new(&config, &tokenizer)
        .build(&extended, &pedals, 0.0)
        .unwrap();

    assert!(targets.strings.contains(&"name=pedal_on".to_string()));
    assert!(targets.strings.contains(&"name=pedal_off".to_string()));

    let events = config
        .string_processor
        .strings_to_events(&targets.strings)
        .unwrap();
    let decoded = events_to_notes(&events);
    let ends: Vec<(u8, f64)> = decoded.iter().map(|note| (note.pitch, note.end)).collect();
    assert_eq!(ends, vec![(60, 1.0), (62, 2.0), (60, 2.0)]);
}
