//! Core data model
//!
//! Reference words and their states, text normalization and timing.

pub mod clock;
pub mod text_normalizer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use text_normalizer::{tokenize_reference, ReferenceText, TextNormalizer};
pub use types::{Difficulty, RecognizedToken, ReferenceWord, Verdict, WordColor, WordState};
