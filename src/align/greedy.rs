//! Greedy Alignment
//!
//! Synchronous strategy for the lenient and moderate difficulties. Each
//! transcript update is prefix-diffed against the previous one, the new
//! words are walked against the reference from the lock, and a debounced
//! windowed pass repairs what the walk missed.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::align::matcher::WordMatcher;
use crate::align::observer::{emit_metric, AlignmentObserver};
use crate::align::window::{AlignmentMove, WindowAligner};
use crate::align::AlignmentSnapshot;
use crate::config::{GreedyTuning, MatchProfile};
use crate::core::text_normalizer::{content_tokens, TextNormalizer};
use crate::core::types::{ReferenceWord, WordColor, WordState};
use crate::utils::fuzzy::SimilarityScorer;

/// Candidate lock built from consecutive fuzzy matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingLock {
    index: usize,
    count: u32,
}

/// Greedy walk plus windowed re-alignment over one reference text
pub struct GreedyAligner {
    words: Arc<Vec<ReferenceWord>>,
    states: Vec<WordState>,
    observer: Arc<dyn AlignmentObserver>,
    matcher: WordMatcher,
    window: WindowAligner,
    normalizer: TextNormalizer,
    lock_ratio: f32,
    consecutive_required: u32,
    tuning: GreedyTuning,

    locked: Option<usize>,
    pending_lock: Option<PendingLock>,
    /// Tokens of the last update the walk processed
    walked: Vec<String>,
    /// Tokens of the latest update, walked or throttled
    latest: Vec<String>,
    /// Leading tokens of `latest` already accounted for
    consumed: usize,
    last_partial_at: Option<u64>,
    deferred_due_at: Option<u64>,
    listening: bool,
    cursor: usize,
    focus: Option<usize>,
}

impl GreedyAligner {
    pub fn new(
        words: Arc<Vec<ReferenceWord>>,
        profile: &MatchProfile,
        tuning: GreedyTuning,
        scorer: SimilarityScorer,
        normalizer: TextNormalizer,
        observer: Arc<dyn AlignmentObserver>,
    ) -> Self {
        let matcher = WordMatcher::new(profile.match_rule, profile.match_threshold, scorer);
        let window = WindowAligner::new(matcher.clone(), profile);
        let states = vec![WordState::Pending; words.len()];
        Self {
            words,
            states,
            observer,
            matcher,
            window,
            normalizer,
            lock_ratio: profile.lock_ratio,
            consecutive_required: profile.consecutive_required.max(1),
            tuning,
            locked: None,
            pending_lock: None,
            walked: Vec::new(),
            latest: Vec::new(),
            consumed: 0,
            last_partial_at: None,
            deferred_due_at: None,
            listening: false,
            cursor: 0,
            focus: None,
        }
    }

    pub fn states(&self) -> &[WordState] {
        &self.states
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn locked_index(&self) -> Option<usize> {
        self.locked
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn snapshot(&self) -> AlignmentSnapshot {
        AlignmentSnapshot::build(
            &self.words,
            &self.states,
            self.cursor,
            self.locked,
            self.focus,
            None,
        )
    }

    /// Listening gates the debounced pass and the focus candidate.
    pub fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
        if !listening {
            self.deferred_due_at = None;
        }
        self.refresh_focus();
    }

    /// Apply one cumulative transcript update.
    pub fn on_transcript(&mut self, transcript: &str, is_final: bool, now_ms: u64) {
        self.tick(now_ms);

        let tokens = self.normalizer.tokenize_transcript(transcript);
        if tokens.is_empty() {
            if is_final {
                self.end_utterance();
            }
            return;
        }

        if tokens.len() < self.latest.len() {
            debug!(
                previous = self.latest.len(),
                current = tokens.len(),
                "transcript revised backward, dropping continuity"
            );
            self.walked.clear();
            self.pending_lock = None;
        }
        let kept = common_prefix_len(&self.latest, &tokens);
        self.consumed = self.consumed.min(kept);
        self.latest = tokens;

        if !is_final {
            let throttled = self
                .last_partial_at
                .is_some_and(|last| now_ms.saturating_sub(last) < self.tuning.partial_min_interval_ms);
            self.deferred_due_at = Some(now_ms + self.tuning.deferred_delay_ms);
            if throttled {
                trace!("partial throttled");
                emit_metric(self.observer.as_ref(), "partial_throttled", &self.latest.len().to_string());
                return;
            }
            self.last_partial_at = Some(now_ms);
        }

        let prefix = common_prefix_len(&self.walked, &self.latest);
        self.walked = self.latest.clone();
        self.walk(prefix.max(self.consumed));
        self.apply_amnesty();
        self.refresh_cursor();

        if is_final {
            self.run_deferred(true);
            self.end_utterance();
        }
    }

    /// Run the debounced windowed pass once it is due.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(due) = self.deferred_due_at {
            if now_ms >= due {
                self.deferred_due_at = None;
                self.run_deferred(false);
            }
        }
    }

    /// Back to all-pending without reallocating the word list.
    pub fn reset(&mut self) {
        for (index, state) in self.states.iter_mut().enumerate() {
            if *state != WordState::Pending {
                *state = WordState::Pending;
                self.observer.mark_word(index, WordColor::Default);
            }
        }
        self.locked = None;
        self.pending_lock = None;
        self.walked.clear();
        self.latest.clear();
        self.consumed = 0;
        self.last_partial_at = None;
        self.deferred_due_at = None;
        self.cursor = 0;
        self.observer.advance_cursor_to(0);
        self.refresh_focus();
    }

    fn next_after_lock(&self) -> usize {
        self.locked.map_or(0, |i| i + 1)
    }

    fn walk(&mut self, start: usize) {
        let mut position = self
            .pending_lock
            .map_or(self.next_after_lock(), |p| p.index + 1);
        let tokens = self.latest.clone();
        let unwalked = tokens.get(start..).unwrap_or(&[]);

        for (offset, token) in content_tokens(unwalked) {
            let raw_index = start + offset;
            if position >= self.words.len() {
                break;
            }

            let outcome = self.matcher.evaluate(token, &self.words[position]);
            if outcome.matched {
                self.set_state(position, WordState::Correct);
                self.register_match(position, outcome.score);
                position += 1;
                self.consumed = raw_index + 1;
            } else if self.reclaim_skipped(token, position) {
                self.consumed = raw_index + 1;
            } else {
                if self.pending_lock.take().is_some() {
                    trace!(word = position, "pending lock cleared by mismatch");
                }
                break;
            }
        }
    }

    fn register_match(&mut self, index: usize, score: f32) {
        if score >= self.lock_ratio {
            self.lock_at(index);
            return;
        }

        let count = match self.pending_lock {
            Some(p) if p.index + 1 == index => p.count + 1,
            _ => 1,
        };
        if count >= self.consecutive_required {
            self.lock_at(index);
        } else {
            self.pending_lock = Some(PendingLock { index, count });
        }
    }

    fn lock_at(&mut self, index: usize) {
        if self.locked.map_or(true, |l| index > l) {
            trace!(index, "🔒 lock");
            self.locked = Some(index);
        }
        self.pending_lock = None;
    }

    /// A word skipped within the amnesty window can still be read late.
    fn reclaim_skipped(&mut self, token: &str, before: usize) -> bool {
        let locked = self.locked.unwrap_or(0);
        let found = (0..before.min(self.words.len())).rev().find(|&i| {
            self.states[i] == WordState::Skipped
                && i + self.tuning.amnesty_distance >= locked
                && self.matcher.is_match(token, &self.words[i])
        });

        match found {
            Some(index) => {
                self.set_state(index, WordState::Correct);
                emit_metric(self.observer.as_ref(), "skip_reclaimed", &index.to_string());
                true
            }
            None => false,
        }
    }

    fn run_deferred(&mut self, is_final: bool) {
        if !is_final && (!self.listening || self.latest.len() < self.tuning.min_words_for_alignment) {
            return;
        }

        let start = self.next_after_lock();
        let end = (start + self.tuning.alignment_window).min(self.words.len());
        if start >= end {
            return;
        }

        let unconsumed = self.latest.get(self.consumed..).unwrap_or(&[]);
        let (raw_indices, recognized): (Vec<usize>, Vec<String>) = content_tokens(unconsumed)
            .into_iter()
            .map(|(offset, token)| (self.consumed + offset, token.to_string()))
            .unzip();
        if recognized.is_empty() {
            return;
        }

        let words = Arc::clone(&self.words);
        let alignment = self.window.align(&words[start..end], &recognized);
        if alignment.is_empty() {
            return;
        }

        let mut new_lock = None;
        let mut last_token = None;
        for step in &alignment.steps {
            let Some(offset) = step.word else { continue };
            let index = start + offset;
            match step.kind {
                AlignmentMove::Match => {
                    self.set_state(index, WordState::Correct);
                    new_lock = Some(index);
                    last_token = step.token;
                }
                AlignmentMove::Substitution | AlignmentMove::Deletion => {
                    if self.states[index] == WordState::Pending {
                        self.set_state(index, WordState::Skipped);
                        emit_metric(self.observer.as_ref(), "window_skip", &index.to_string());
                    }
                    new_lock = Some(index);
                    if step.kind == AlignmentMove::Substitution {
                        last_token = step.token;
                    }
                }
                AlignmentMove::Insertion => {}
            }
        }

        if let Some(token) = last_token {
            self.consumed = self.consumed.max(raw_indices[token] + 1);
        }
        if let Some(index) = new_lock {
            debug!(index, score = alignment.score, is_final, "windowed pass moved lock");
            self.lock_at(index);
        }

        self.apply_amnesty();
        self.refresh_cursor();
    }

    /// Skipped words the lock has left far enough behind become incorrect.
    fn apply_amnesty(&mut self) {
        let Some(locked) = self.locked else { return };
        for index in 0..self.states.len() {
            if self.states[index] == WordState::Skipped
                && index + self.tuning.amnesty_distance < locked
            {
                self.set_state(index, WordState::Incorrect);
                emit_metric(self.observer.as_ref(), "amnesty_incorrect", &index.to_string());
            }
        }
    }

    fn set_state(&mut self, index: usize, next: WordState) {
        let current = self.states[index];
        if !current.can_transition_to(next) {
            return;
        }
        self.states[index] = next;
        self.observer.mark_word(index, next.color());
    }

    fn refresh_cursor(&mut self) {
        let cursor = self.next_after_lock().min(self.words.len());
        if cursor > self.cursor {
            self.cursor = cursor;
            self.observer.advance_cursor_to(cursor);
        }
        self.refresh_focus();
    }

    fn refresh_focus(&mut self) {
        let candidate = self.next_after_lock();
        let focus = (self.listening && candidate < self.words.len()).then_some(candidate);
        if focus != self.focus {
            self.focus = focus;
            self.observer.focus_changed(focus);
        }
    }

    fn end_utterance(&mut self) {
        self.walked.clear();
        self.latest.clear();
        self.consumed = 0;
        self.pending_lock = None;
        self.last_partial_at = None;
        self.deferred_due_at = None;
    }
}

fn common_prefix_len(a: &[String], b: &[String]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
