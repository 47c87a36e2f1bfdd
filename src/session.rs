//! Session Controller
//!
//! Owns one reading session: tokenizes the reference text once, builds the
//! alignment core for the configured difficulty and turns recognizer
//! callbacks into core calls. A small ticker thread fires the greedy
//! strategy's debounced pass when no new transcript arrives to do it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::align::observer::{emit_metric, AlignmentObserver};
use crate::align::{AlignmentCore, AlignmentSnapshot};
use crate::asr::{AsrListener, AsrState, SpeechRecognizer};
use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::text_normalizer::{tokenize_reference, ReferenceText};
use crate::core::types::{Difficulty, RecognizedToken};
use crate::error::{ReadAlongError, ReadAlongResult};
use crate::utils::distance::DistanceEngine;
use crate::utils::fuzzy::SimilarityScorer;

/// How often the ticker checks for a due deferred pass
pub const TICK_INTERVAL: Duration = Duration::from_millis(25);

/// Recognizer error reported to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsrFailure {
    pub code: i32,
    pub critical: bool,
}

/// Session state reachable from recognizer and ticker threads
struct SessionShared {
    core: AlignmentCore,
    observer: Arc<dyn AlignmentObserver>,
    clock: Arc<dyn Clock>,
    listening: AtomicBool,
    /// Set by a critical recognizer error; later input is dropped
    halted: AtomicBool,
    /// The recognizer delivered per-token results for the current utterance
    tokens_seen: AtomicBool,
    last_error: Mutex<Option<AsrFailure>>,
}

impl AsrListener for SessionShared {
    fn on_partial_result(&self, transcript: &str) {
        if self.halted.load(Ordering::SeqCst) {
            return;
        }
        self.core.on_partial(transcript, self.clock.now_ms());
    }

    fn on_final_result(&self, transcript: &str) {
        if self.halted.load(Ordering::SeqCst) {
            return;
        }
        let as_tokens = !self.tokens_seen.swap(false, Ordering::SeqCst);
        self.core.on_final(transcript, as_tokens, self.clock.now_ms());
    }

    fn on_state_changed(&self, state: AsrState) {
        if self.halted.load(Ordering::SeqCst) {
            return;
        }
        let listening = state == AsrState::Listening;
        if self.listening.swap(listening, Ordering::SeqCst) != listening {
            debug!(?state, "recognizer state changed");
            self.core.set_listening(listening);
        }
    }

    fn on_error(&self, code: i32, critical: bool) {
        emit_metric(
            self.observer.as_ref(),
            "asr_error",
            &format!("code={} critical={}", code, critical),
        );
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(AsrFailure { code, critical });
        }
        if !critical {
            warn!("⚠️ Recognizer error {} (continuing)", code);
            return;
        }

        error!("🛑 Critical recognizer error {}, session input stopped", code);
        self.halted.store(true, Ordering::SeqCst);
        self.listening.store(false, Ordering::SeqCst);
        self.core.set_listening(false);
        self.observer.recognizer_failed(code);
    }

    fn on_recognized_tokens(&self, tokens: &[RecognizedToken]) {
        if self.halted.load(Ordering::SeqCst) || tokens.is_empty() {
            return;
        }
        self.tokens_seen.store(true, Ordering::SeqCst);
        self.core.on_tokens(tokens, self.clock.now_ms());
    }
}

/// Background thread calling `tick` on a fixed interval
struct Ticker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl Ticker {
    fn spawn(shared: Arc<SessionShared>) -> ReadAlongResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("session-ticker".to_string())
            .spawn(move || {
                while !flag.load(Ordering::SeqCst) {
                    thread::sleep(TICK_INTERVAL);
                    if !shared.halted.load(Ordering::SeqCst) {
                        shared.core.tick(shared.clock.now_ms());
                    }
                }
            })
            .map_err(|e| ReadAlongError::Worker(format!("session ticker: {}", e)))?;
        Ok(Self { stop, handle })
    }

    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if self.handle.join().is_err() {
            warn!("⚠️ Session ticker panicked");
        }
    }
}

/// One reading exercise over one reference text
pub struct SessionController {
    reference: ReferenceText,
    difficulty: Difficulty,
    shared: Arc<SessionShared>,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    ticker: Option<Ticker>,
}

impl SessionController {
    /// Session with the system clock and a private distance cache.
    pub fn new(
        text: &str,
        config: &Config,
        observer: Arc<dyn AlignmentObserver>,
    ) -> ReadAlongResult<Self> {
        let distance = Arc::new(DistanceEngine::with_capacity(config.distance_cache_capacity));
        Self::with_parts(text, config, observer, Arc::new(SystemClock::default()), distance)
    }

    /// Session with an injected clock and a distance cache that may be
    /// shared with other sessions.
    pub fn with_parts(
        text: &str,
        config: &Config,
        observer: Arc<dyn AlignmentObserver>,
        clock: Arc<dyn Clock>,
        distance: Arc<DistanceEngine>,
    ) -> ReadAlongResult<Self> {
        config.validate()?;

        let scorer = SimilarityScorer::new(distance);
        let reference = tokenize_reference(text, scorer.phonetic());
        if reference.is_empty() {
            return Err(ReadAlongError::EmptyReference);
        }

        let words = Arc::new(reference.words.clone());
        let core = AlignmentCore::new(words, config, scorer, Arc::clone(&observer))?;

        info!(
            "📖 Reading session ready: {} words in {} sentences ({})",
            reference.len(),
            reference.sentences.len(),
            config.difficulty
        );

        Ok(Self {
            reference,
            difficulty: config.difficulty,
            shared: Arc::new(SessionShared {
                core,
                observer,
                clock,
                listening: AtomicBool::new(false),
                halted: AtomicBool::new(false),
                tokens_seen: AtomicBool::new(false),
                last_error: Mutex::new(None),
            }),
            recognizer: None,
            ticker: None,
        })
    }

    pub fn reference(&self) -> &ReferenceText {
        &self.reference
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Callback sink for a recognizer driven outside the session.
    pub fn listener(&self) -> Arc<dyn AsrListener> {
        Arc::clone(&self.shared) as Arc<dyn AsrListener>
    }

    /// Subscribe to `recognizer` and start the ticker.
    pub fn start(&mut self, mut recognizer: Box<dyn SpeechRecognizer>) -> ReadAlongResult<()> {
        self.stop();
        self.start_ticker()?;
        recognizer.start(self.listener())?;
        self.recognizer = Some(recognizer);
        info!("▶️ Reading session started");
        Ok(())
    }

    /// Start only the ticker, for recognizers wired through [`listener`](Self::listener).
    pub fn start_ticker(&mut self) -> ReadAlongResult<()> {
        if self.ticker.is_none() && !self.shared.core.is_debt() {
            self.ticker = Some(Ticker::spawn(Arc::clone(&self.shared))?);
        }
        Ok(())
    }

    /// Block until the recognizer has delivered all of its input.
    pub fn wait_for_recognizer(&mut self) {
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.wait();
        }
    }

    /// Unsubscribe from the recognizer and stop the ticker. Alignment state stays.
    pub fn stop(&mut self) {
        if let Some(mut recognizer) = self.recognizer.take() {
            recognizer.stop();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
        if self.shared.listening.swap(false, Ordering::SeqCst) {
            self.shared.core.set_listening(false);
        }
    }

    /// Run any due deferred work now.
    pub fn tick(&self) {
        if !self.shared.halted.load(Ordering::SeqCst) {
            self.shared.core.tick(self.shared.clock.now_ms());
        }
    }

    /// Back to the start of the text. Workers keep running.
    pub fn reset(&self) {
        self.shared.core.reset();
        self.shared.tokens_seen.store(false, Ordering::SeqCst);
        self.shared.halted.store(false, Ordering::SeqCst);
        if let Ok(mut last) = self.shared.last_error.lock() {
            *last = None;
        }
        emit_metric(self.shared.observer.as_ref(), "session_reset", "");
    }

    pub fn snapshot(&self) -> AlignmentSnapshot {
        self.shared.core.snapshot()
    }

    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }

    /// True after a critical recognizer error
    pub fn is_halted(&self) -> bool {
        self.shared.halted.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<AsrFailure> {
        self.shared
            .last_error
            .lock()
            .map(|e| *e)
            .unwrap_or_else(|e| *e.into_inner())
    }

    /// Full teardown: recognizer, ticker and correction workers.
    pub fn shutdown(&mut self) {
        self.stop();
        self.shared.core.shutdown();
        debug!("reading session shut down");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
