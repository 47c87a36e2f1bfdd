//! ASR (Automatic Speech Recognition) Contract
//!
//! Recognition itself is an external black box. This module defines the
//! callbacks a recognizer drives and the trait a recognizer implements.
//! - `script`: replays a recorded recognition session from text

pub mod script;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::RecognizedToken;
use crate::error::ReadAlongResult;

pub use script::{parse_script, AsrEvent, ScriptedRecognizer};

/// Recognizer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AsrState {
    #[default]
    Idle,
    Listening,
    Error,
}

impl std::str::FromStr for AsrState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "listening" => Ok(Self::Listening),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown recognizer state '{}'", other)),
        }
    }
}

/// Callbacks driven by a recognizer, possibly from its own thread
pub trait AsrListener: Send + Sync {
    /// Cumulative, revisable hypothesis for the current utterance
    fn on_partial_result(&self, transcript: &str);

    /// Terminal hypothesis for the utterance
    fn on_final_result(&self, transcript: &str);

    fn on_state_changed(&self, state: AsrState);

    /// `critical` errors (permissions, hardware) end the session's input
    fn on_error(&self, code: i32, critical: bool);

    /// Per-token results with confidences, for recognizers that provide them
    fn on_recognized_tokens(&self, _tokens: &[RecognizedToken]) {}
}

/// Source of recognition callbacks
pub trait SpeechRecognizer: Send {
    fn start(&mut self, listener: Arc<dyn AsrListener>) -> ReadAlongResult<()>;

    fn stop(&mut self);

    /// Block until the recognizer has no more input to deliver.
    fn wait(&mut self) {}

    fn is_running(&self) -> bool {
        false
    }
}
