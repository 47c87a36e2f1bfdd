//! ReadAlong Library
//!
//! Real-time alignment of speech recognition output against a reference
//! text being read aloud.

pub mod align;
pub mod asr;
pub mod config;
pub mod core;
pub mod correction;
pub mod error;
pub mod session;
pub mod utils;

pub use crate::align::{AlignmentCore, AlignmentObserver, AlignmentSnapshot, ColorBoard, NullObserver};
pub use crate::asr::{AsrListener, AsrState, ScriptedRecognizer, SpeechRecognizer};
pub use crate::config::{Config, MatchProfile};
pub use crate::core::types::{Difficulty, RecognizedToken, ReferenceWord, Verdict, WordColor, WordState};
pub use crate::error::{ReadAlongError, ReadAlongResult};
pub use crate::session::SessionController;
