//! Phonetic Encoding
//!
//! Double Metaphone codes for normalized words. Only the primary code is
//! kept; callers treat equality of two codes as a "sounds alike" signal.

use rphonetic::{DoubleMetaphone, Encoder};

/// Maps a normalized word to its primary Double Metaphone code
pub struct PhoneticEncoder {
    encoder: DoubleMetaphone,
}

impl Default for PhoneticEncoder {
    fn default() -> Self {
        Self {
            encoder: DoubleMetaphone::default(),
        }
    }
}

impl std::fmt::Debug for PhoneticEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PhoneticEncoder(DoubleMetaphone)")
    }
}

impl PhoneticEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary code, empty for input without letters.
    pub fn encode(&self, word: &str) -> String {
        let letters: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.is_empty() {
            return String::new();
        }
        self.encoder.encode(&letters)
    }

    /// Both words produce the same non-empty code.
    pub fn sounds_alike(&self, a: &str, b: &str) -> bool {
        let code = self.encode(a);
        !code.is_empty() && code == self.encode(b)
    }
}
