//! Alignment Core
//!
//! Maps live recognition output onto reference words. The greedy strategy
//! serves the lenient and moderate difficulties, the debt strategy serves
//! the high difficulty. Both report through an [`AlignmentObserver`].

pub mod debt;
pub mod greedy;
pub mod matcher;
pub mod observer;
pub mod window;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::text_normalizer::TextNormalizer;
use crate::core::types::{Difficulty, RecognizedToken, ReferenceWord, WordColor, WordState};
use crate::error::ReadAlongResult;
use crate::utils::fuzzy::SimilarityScorer;

pub use debt::DebtAligner;
pub use greedy::GreedyAligner;
pub use matcher::{MatchRule, WordMatcher};
pub use observer::{AlignmentObserver, ColorBoard, NullObserver};
pub use window::WindowAligner;

/// One reference word as seen by a renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordView {
    pub text: String,
    pub state: WordState,
    pub color: WordColor,
    pub focused: bool,
}

/// Read-only projection of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentSnapshot {
    pub words: Vec<WordView>,
    pub cursor: usize,
    pub locked_index: Option<usize>,
    pub open_debt: Option<usize>,
    pub complete: bool,
}

impl AlignmentSnapshot {
    pub fn build(
        words: &[ReferenceWord],
        states: &[WordState],
        cursor: usize,
        locked_index: Option<usize>,
        focus: Option<usize>,
        open_debt: Option<usize>,
    ) -> Self {
        let words = words
            .iter()
            .zip(states)
            .enumerate()
            .map(|(i, (word, state))| WordView {
                text: word.original_text.clone(),
                state: *state,
                color: state.color(),
                focused: focus == Some(i),
            })
            .collect::<Vec<_>>();
        let complete = cursor >= words.len();
        Self {
            words,
            cursor,
            locked_index,
            open_debt,
            complete,
        }
    }

    pub fn states(&self) -> Vec<WordState> {
        self.words.iter().map(|w| w.state).collect()
    }

    pub fn count(&self, state: WordState) -> usize {
        self.words.iter().filter(|w| w.state == state).count()
    }
}

/// Strategy selected by difficulty
pub enum AlignmentCore {
    Greedy(Mutex<GreedyAligner>),
    Debt(DebtAligner),
}

impl AlignmentCore {
    pub fn new(
        words: Arc<Vec<ReferenceWord>>,
        config: &Config,
        scorer: SimilarityScorer,
        observer: Arc<dyn AlignmentObserver>,
    ) -> ReadAlongResult<Self> {
        let profile = config.match_profile();
        let normalizer = TextNormalizer::new(config.voice_corrections.clone());

        let core = match config.difficulty {
            Difficulty::High => Self::Debt(DebtAligner::new(
                words,
                &profile,
                config.debt.clone(),
                &config.strict,
                scorer,
                normalizer,
                observer,
            )?),
            Difficulty::Low | Difficulty::Medium => Self::Greedy(Mutex::new(GreedyAligner::new(
                words,
                &profile,
                config.greedy.clone(),
                scorer,
                normalizer,
                observer,
            ))),
        };
        info!("✅ Alignment core ready ({}, {:?} rule)", config.difficulty, profile.match_rule);
        Ok(core)
    }

    pub fn is_debt(&self) -> bool {
        matches!(self, Self::Debt(_))
    }

    fn greedy(lock: &Mutex<GreedyAligner>) -> MutexGuard<'_, GreedyAligner> {
        lock.lock().unwrap_or_else(|e| {
            warn!("⚠️ greedy session lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Cumulative partial hypothesis. Only the greedy strategy consumes these.
    pub fn on_partial(&self, transcript: &str, now_ms: u64) {
        if let Self::Greedy(aligner) = self {
            Self::greedy(aligner).on_transcript(transcript, false, now_ms);
        }
    }

    /// Terminal hypothesis for the utterance.
    ///
    /// The debt strategy only sees it when `as_tokens` is set, that is when
    /// the recognizer did not deliver per-token results for the utterance.
    pub fn on_final(&self, transcript: &str, as_tokens: bool, now_ms: u64) {
        match self {
            Self::Greedy(aligner) => Self::greedy(aligner).on_transcript(transcript, true, now_ms),
            Self::Debt(aligner) if as_tokens => {
                let tokens: Vec<RecognizedToken> = transcript
                    .split_whitespace()
                    .map(RecognizedToken::new)
                    .collect();
                aligner.on_tokens(&tokens, now_ms);
            }
            Self::Debt(_) => {}
        }
    }

    /// Per-token recognition results. Only the debt strategy consumes these.
    pub fn on_tokens(&self, tokens: &[RecognizedToken], now_ms: u64) {
        if let Self::Debt(aligner) = self {
            aligner.on_tokens(tokens, now_ms);
        }
    }

    pub fn tick(&self, now_ms: u64) {
        if let Self::Greedy(aligner) = self {
            Self::greedy(aligner).tick(now_ms);
        }
    }

    pub fn set_listening(&self, listening: bool) {
        match self {
            Self::Greedy(aligner) => Self::greedy(aligner).set_listening(listening),
            Self::Debt(aligner) => aligner.set_listening(listening),
        }
    }

    pub fn reset(&self) {
        match self {
            Self::Greedy(aligner) => Self::greedy(aligner).reset(),
            Self::Debt(aligner) => aligner.reset(),
        }
    }

    pub fn snapshot(&self) -> AlignmentSnapshot {
        match self {
            Self::Greedy(aligner) => Self::greedy(aligner).snapshot(),
            Self::Debt(aligner) => aligner.snapshot(),
        }
    }

    /// Stop background workers. The greedy strategy has none.
    pub fn shutdown(&self) {
        if let Self::Debt(aligner) = self {
            aligner.shutdown();
        }
    }
}
