//! Alignment Observer
//!
//! The single capability through which alignment results leave the core.
//! Rendering collaborators implement it; the core never sees a UI type.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::core::types::WordColor;

/// Receiver of word colors, cursor moves, debt markers and metrics.
///
/// Calls may arrive from the ASR callback thread and from background
/// correction threads, so implementations must be `Send + Sync`.
/// `mark_word` must tolerate redundant calls with the same color.
pub trait AlignmentObserver: Send + Sync {
    fn mark_word(&self, index: usize, color: WordColor);

    /// `index` may equal the word count to signal that reading is complete.
    fn advance_cursor_to(&self, index: usize);

    fn show_debt_marker(&self, _index: usize) {}

    fn hide_debt_marker(&self, _index: usize) {}

    /// Focused word while listening, `None` otherwise
    fn focus_changed(&self, _index: Option<usize>) {}

    fn log_metric(&self, _key: &str, _value: &str) {}

    /// The recognizer reported a critical error; no further input will arrive.
    fn recognizer_failed(&self, _code: i32) {}
}

/// Observer that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl AlignmentObserver for NullObserver {
    fn mark_word(&self, _index: usize, _color: WordColor) {}
    fn advance_cursor_to(&self, _index: usize) {}
}

/// Trace a metric under `readalong::metrics` and forward it to the observer.
pub fn emit_metric(observer: &dyn AlignmentObserver, key: &str, value: &str) {
    tracing::debug!(target: "readalong::metrics", key, value, "metric");
    observer.log_metric(key, value);
}

#[derive(Debug, Default)]
struct BoardState {
    colors: Vec<WordColor>,
    cursor: usize,
    focus: Option<usize>,
    debt_markers: BTreeSet<usize>,
}

/// Idempotent color board: the latest color per word plus cursor, focus and
/// visible debt markers. Useful as a rendering-side projection.
#[derive(Debug, Default)]
pub struct ColorBoard {
    state: Mutex<BoardState>,
}

impl ColorBoard {
    pub fn new(word_count: usize) -> Self {
        Self {
            state: Mutex::new(BoardState {
                colors: vec![WordColor::Default; word_count],
                ..BoardState::default()
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BoardState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn colors(&self) -> Vec<WordColor> {
        self.with_state(|s| s.colors.clone())
    }

    pub fn color(&self, index: usize) -> Option<WordColor> {
        self.with_state(|s| s.colors.get(index).copied())
    }

    pub fn cursor(&self) -> usize {
        self.with_state(|s| s.cursor)
    }

    pub fn focus(&self) -> Option<usize> {
        self.with_state(|s| s.focus)
    }

    pub fn debt_markers(&self) -> Vec<usize> {
        self.with_state(|s| s.debt_markers.iter().copied().collect())
    }
}

impl AlignmentObserver for ColorBoard {
    fn mark_word(&self, index: usize, color: WordColor) {
        self.with_state(|s| {
            if index >= s.colors.len() {
                s.colors.resize(index + 1, WordColor::Default);
            }
            s.colors[index] = color;
        });
    }

    fn advance_cursor_to(&self, index: usize) {
        self.with_state(|s| s.cursor = index);
    }

    fn show_debt_marker(&self, index: usize) {
        self.with_state(|s| {
            s.debt_markers.insert(index);
        });
    }

    fn hide_debt_marker(&self, index: usize) {
        self.with_state(|s| {
            s.debt_markers.remove(&index);
        });
    }

    fn focus_changed(&self, index: Option<usize>) {
        self.with_state(|s| s.focus = index);
    }
}
