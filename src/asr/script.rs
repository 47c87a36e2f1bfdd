//! Scripted recognizer
//!
//! Replays a line-oriented recognition script, one event per line:
//!
//! ```text
//! state: listening
//! partial: the cat
//! final: the cat sat
//! tokens: giraffe@0.3 elephant
//! wait: 450
//! error: 9 critical
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::asr::{AsrListener, AsrState, SpeechRecognizer};
use crate::core::types::RecognizedToken;
use crate::error::{ReadAlongError, ReadAlongResult};

/// One recognizer callback, or a pause between callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum AsrEvent {
    State(AsrState),
    Partial(String),
    Final(String),
    Tokens(Vec<RecognizedToken>),
    Wait(Duration),
    Error { code: i32, critical: bool },
}

impl AsrEvent {
    /// Deliver to `listener`. Waits sleep on the calling thread.
    pub fn dispatch(&self, listener: &dyn AsrListener) {
        match self {
            Self::State(state) => listener.on_state_changed(*state),
            Self::Partial(text) => listener.on_partial_result(text),
            Self::Final(text) => listener.on_final_result(text),
            Self::Tokens(tokens) => listener.on_recognized_tokens(tokens),
            Self::Wait(duration) => thread::sleep(*duration),
            Self::Error { code, critical } => listener.on_error(*code, *critical),
        }
    }
}

fn script_error(line: usize, message: impl Into<String>) -> ReadAlongError {
    ReadAlongError::Script {
        line,
        message: message.into(),
    }
}

fn parse_token(word: &str, line: usize) -> ReadAlongResult<RecognizedToken> {
    match word.rsplit_once('@') {
        Some((text, conf)) if !text.is_empty() => {
            let confidence: f32 = conf
                .parse()
                .map_err(|_| script_error(line, format!("bad confidence '{}'", conf)))?;
            Ok(RecognizedToken::with_confidence(text, confidence))
        }
        _ => Ok(RecognizedToken::new(word)),
    }
}

/// Parse a recognition script.
pub fn parse_script(source: &str) -> ReadAlongResult<Vec<AsrEvent>> {
    let mut events = Vec::new();

    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (kind, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| script_error(line, "expected '<event>: <value>'"))?;
        let rest = rest.trim();

        let event = match kind.trim().to_lowercase().as_str() {
            "state" => AsrEvent::State(rest.parse().map_err(|e: String| script_error(line, e))?),
            "partial" => AsrEvent::Partial(rest.to_string()),
            "final" => AsrEvent::Final(rest.to_string()),
            "tokens" => AsrEvent::Tokens(
                rest.split_whitespace()
                    .map(|w| parse_token(w, line))
                    .collect::<ReadAlongResult<Vec<_>>>()?,
            ),
            "wait" => {
                let ms: u64 = rest
                    .parse()
                    .map_err(|_| script_error(line, format!("bad wait '{}'", rest)))?;
                AsrEvent::Wait(Duration::from_millis(ms))
            }
            "error" => {
                let mut parts = rest.split_whitespace();
                let code: i32 = parts
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| script_error(line, "error needs a numeric code"))?;
                let critical = match parts.next() {
                    None => false,
                    Some("critical") => true,
                    Some(other) => {
                        return Err(script_error(line, format!("unexpected '{}'", other)))
                    }
                };
                AsrEvent::Error { code, critical }
            }
            other => return Err(script_error(line, format!("unknown event '{}'", other))),
        };
        events.push(event);
    }

    Ok(events)
}

/// Recognizer that plays back scripted events on its own thread
pub struct ScriptedRecognizer {
    events: Arc<Vec<AsrEvent>>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ScriptedRecognizer {
    pub fn new(events: Vec<AsrEvent>) -> Self {
        Self {
            events: Arc::new(events),
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn from_script(source: &str) -> ReadAlongResult<Self> {
        Ok(Self::new(parse_script(source)?))
    }

    pub fn from_file(path: &Path) -> ReadAlongResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_script(&source)
    }

    pub fn events(&self) -> &[AsrEvent] {
        &self.events
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&mut self, listener: Arc<dyn AsrListener>) -> ReadAlongResult<()> {
        if self.handle.is_some() {
            return Err(ReadAlongError::Recognizer("already started".to_string()));
        }
        self.stop_flag.store(false, Ordering::SeqCst);

        let events = Arc::clone(&self.events);
        let stop_flag = Arc::clone(&self.stop_flag);
        let handle = thread::Builder::new()
            .name("scripted-asr".to_string())
            .spawn(move || {
                debug!("replaying {} recognizer events", events.len());
                for event in events.iter() {
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    event.dispatch(listener.as_ref());
                }
            })
            .map_err(|e| ReadAlongError::Recognizer(format!("playback thread: {}", e)))?;

        self.handle = Some(handle);
        info!("🎤 Scripted recognizer started");
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.wait();
    }

    fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("⚠️ Scripted recognizer thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ScriptedRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}
