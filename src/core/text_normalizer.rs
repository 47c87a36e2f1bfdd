//! Text Normalization
//!
//! Word normalization shared by the reference text and the recognizer
//! output, filler handling, and one-time tokenization of the reference text
//! into sentences and words.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::types::ReferenceWord;
use crate::utils::phonetic::PhoneticEncoder;

lazy_static! {
    static ref SENTENCE_RE: Regex = Regex::new(r"[^.!?]+[.!?]*").expect("valid sentence pattern");
    static ref WORD_RE: Regex = Regex::new(r"\S+").expect("valid word pattern");
}

/// Hesitations the recognizer emits that never count as reading
pub const FILLER_WORDS: &[&str] = &[
    "uh", "um", "oh", "ah", "mm", "hmm", "like", "youknow", "erm",
];

/// Lowercase and keep only `[a-z0-9']`.
///
/// Typographic apostrophes fold to `'`. A result without any letter or digit
/// is returned empty so callers can drop it.
pub fn normalize_word(text: &str) -> String {
    let normalized: String = text
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '`' => '\'',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '\'')
        .collect();

    if normalized.chars().any(|c| c != '\'') {
        normalized
    } else {
        String::new()
    }
}

/// Whether a normalized word is a filler
pub fn is_filler(normalized: &str) -> bool {
    FILLER_WORDS.contains(&normalized)
}

/// Drop fillers and collapse runs of the same word, keeping each survivor's
/// position in `tokens`.
pub fn content_tokens(tokens: &[String]) -> Vec<(usize, &str)> {
    let mut result: Vec<(usize, &str)> = Vec::with_capacity(tokens.len());
    for (index, token) in tokens.iter().enumerate() {
        if is_filler(token) || result.last().is_some_and(|&(_, last)| last == token.as_str()) {
            continue;
        }
        result.push((index, token.as_str()));
    }
    result
}

/// Normalizes recognizer output into comparable word lists
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    /// Whole-word recognizer corrections from config (normalized keys)
    corrections: HashMap<String, String>,
}

impl TextNormalizer {
    /// Create a normalizer with manual corrections (e.g. "red" -> "read").
    pub fn new(corrections: HashMap<String, String>) -> Self {
        let corrections = corrections
            .into_iter()
            .map(|(from, to)| (normalize_word(&from), normalize_word(&to)))
            .filter(|(from, to)| !from.is_empty() && !to.is_empty())
            .collect();
        Self { corrections }
    }

    /// Normalize one recognized word, applying corrections.
    pub fn normalize(&self, text: &str) -> String {
        let word = normalize_word(text);
        match self.corrections.get(&word) {
            Some(fixed) => fixed.clone(),
            None => word,
        }
    }

    /// Split a cumulative transcript into normalized, non-empty words.
    pub fn tokenize_transcript(&self, transcript: &str) -> Vec<String> {
        transcript
            .split_whitespace()
            .map(|w| self.normalize(w))
            .filter(|w| !w.is_empty())
            .collect()
    }
}

/// Tokenized reference text
#[derive(Debug, Clone, Default)]
pub struct ReferenceText {
    /// Trimmed sentences; `char_span` offsets point into these
    pub sentences: Vec<String>,
    pub words: Vec<ReferenceWord>,
}

impl ReferenceText {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Split plain text into sentences and reference words.
///
/// Tokens whose normalized form is empty (bare punctuation) are dropped, so
/// every word has a non-empty `normalized_text`.
pub fn tokenize_reference(text: &str, phonetic: &PhoneticEncoder) -> ReferenceText {
    let mut reference = ReferenceText::default();

    for sentence_match in SENTENCE_RE.find_iter(text) {
        let sentence = sentence_match.as_str().trim();
        if sentence.is_empty() {
            continue;
        }

        let sentence_index = reference.sentences.len();
        let mut word_index_in_sentence = 0;

        for word_match in WORD_RE.find_iter(sentence) {
            let normalized = normalize_word(word_match.as_str());
            if normalized.is_empty() {
                continue;
            }

            let start = sentence[..word_match.start()].chars().count();
            let end = start + word_match.as_str().chars().count();

            reference.words.push(ReferenceWord {
                original_text: word_match.as_str().to_string(),
                phonetic_code: phonetic.encode(&normalized),
                normalized_text: normalized,
                sentence_index,
                word_index_in_sentence,
                char_span: (start, end),
            });
            word_index_in_sentence += 1;
        }

        if word_index_in_sentence > 0 {
            reference.sentences.push(sentence.to_string());
        }
    }

    reference
}
