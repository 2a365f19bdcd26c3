use std::ops::Range;

use tracing::debug;

use crate::config::CodecConfig;
use crate::constants::MAX_TIME_SECONDS;
use crate::error::{CodecError, Result};

use super::string_processor::PAD;
use super::vocabulary::{EnumeratedVocabulary, IntegerVocabulary, SubVocabulary, TimeVocabulary};

/// Maps strings to a single flat token space built from ordered
/// sub-vocabularies.
///
/// A string is encoded by the first sub-vocabulary that recognises it, so
/// the order of `vocabularies` is part of the token layout: reordering or
/// resizing any of them shifts every id that follows.
pub struct Tokenizer {
    vocabularies: Vec<Box<dyn SubVocabulary>>,
    vocab_size: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::from_config(&CodecConfig::default())
    }
}

impl Tokenizer {
    /// The standard layout, with the time vocabulary stepping at the
    /// configured frame rate.
    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(vec![
            Box::new(EnumeratedVocabulary::special()),
            Box::new(EnumeratedVocabulary::event_names()),
            Box::new(TimeVocabulary::new(MAX_TIME_SECONDS, config.fps)),
            Box::new(EnumeratedVocabulary::maestro_labels()),
            Box::new(EnumeratedVocabulary::slakh2100_labels()),
            Box::new(EnumeratedVocabulary::gtzan_labels()),
            Box::new(IntegerVocabulary::pitch()),
            Box::new(IntegerVocabulary::velocity()),
            Box::new(IntegerVocabulary::beat_index()),
            Box::new(EnumeratedVocabulary::tasks()),
        ])
    }

    pub fn new(vocabularies: Vec<Box<dyn SubVocabulary>>) -> Self {
        let vocab_size = vocabularies.iter().map(|v| v.vocab_size()).sum();

        let tokenizer = Tokenizer {
            vocabularies,
            vocab_size,
        };
        for (name, range) in tokenizer.ranges() {
            debug!(vocabulary = name, start = range.start, end = range.end, "Token range");
        }
        debug!(vocab_size, "Built tokenizer");

        tokenizer
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// The global id range owned by each sub-vocabulary, in order.
    pub fn ranges(&self) -> Vec<(&str, Range<usize>)> {
        let mut start = 0;
        self.vocabularies
            .iter()
            .map(|vocabulary| {
                let range = start..start + vocabulary.vocab_size();
                start = range.end;
                (vocabulary.name(), range)
            })
            .collect()
    }

    /// Token to string.
    ///
    /// # Arguments
    ///
    /// * `token` - A global token id.
    ///
    /// # Returns
    ///
    /// * The string of the sub-vocabulary owning `token`.
    pub fn itos(&self, token: usize) -> Result<String> {
        let mut local = token;
        for vocabulary in self.vocabularies.iter() {
            if local < vocabulary.vocab_size() {
                return vocabulary.decode(local);
            }
            local -= vocabulary.vocab_size();
        }

        Err(CodecError::TokenOutOfRange {
            token,
            vocab_size: self.vocab_size,
        })
    }

    /// String to token.
    ///
    /// # Arguments
    ///
    /// * `string` - A special token or a `key=value` string.
    ///
    /// # Returns
    ///
    /// * The global id: the sizes of all preceding sub-vocabularies plus the
    ///   local id of the first sub-vocabulary that recognises `string`.
    pub fn stoi(&self, string: &str) -> Result<usize> {
        let mut start_token = 0;
        for vocabulary in self.vocabularies.iter() {
            if let Some(token) = vocabulary.encode(string)? {
                return Ok(start_token + token);
            }
            start_token += vocabulary.vocab_size();
        }

        Err(CodecError::UnknownString(string.to_string()))
    }

    pub fn strings_to_tokens<S: AsRef<str>>(&self, strings: &[S]) -> Result<Vec<usize>> {
        strings.iter().map(|string| self.stoi(string.as_ref())).collect()
    }

    pub fn tokens_to_strings(&self, tokens: &[usize]) -> Result<Vec<String>> {
        tokens.iter().map(|&token| self.itos(token)).collect()
    }

    pub fn pad_token(&self) -> Result<usize> {
        self.stoi(PAD)
    }
}
