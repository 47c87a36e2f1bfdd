//! Mock Recognizer for Testing
//!
//! Delivers predetermined events synchronously from `start`, on the caller's
//! thread, so tests observe a deterministic order.

use std::sync::{Arc, Mutex};

use readalong::asr::AsrEvent;
use readalong::{AsrListener, ReadAlongResult, SpeechRecognizer};

pub struct MockRecognizer {
    events: Vec<AsrEvent>,
    /// Record of lifecycle calls (for verification)
    pub lifecycle: Arc<Mutex<Vec<&'static str>>>,
}

impl MockRecognizer {
    pub fn new(events: Vec<AsrEvent>) -> Self {
        Self {
            events,
            lifecycle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Listening state followed by one final result
    pub fn with_final(text: &str) -> Self {
        Self::new(vec![
            AsrEvent::State(readalong::AsrState::Listening),
            AsrEvent::Final(text.to_string()),
        ])
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn start(&mut self, listener: Arc<dyn AsrListener>) -> ReadAlongResult<()> {
        self.lifecycle.lock().unwrap().push("start");
        for event in &self.events {
            event.dispatch(listener.as_ref());
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.lifecycle.lock().unwrap().push("stop");
    }
}
