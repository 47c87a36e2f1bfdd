//! Debt Alignment
//!
//! Asynchronous strategy for the high difficulty. Tokens are consumed one at
//! a time; a mismatch opens a debt on the current word that is settled later
//! by the strict correction path or by exhausting its correction buffer.
//! Every entry point (token in, strict result, reset) takes the same lock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::align::matcher::WordMatcher;
use crate::align::observer::{emit_metric, AlignmentObserver};
use crate::align::AlignmentSnapshot;
use crate::config::{DebtTuning, MatchProfile, StrictTuning};
use crate::core::text_normalizer::{is_filler, TextNormalizer};
use crate::core::types::{RecognizedToken, ReferenceWord, Verdict, WordColor, WordState};
use crate::correction::collector::{pick_candidate, InspectJob, ReconciliationWorker};
use crate::correction::strict::{
    ScoreComparator, StrictComparator, StrictCorrectionService, StrictOutcome, StrictRequest,
    StrictResult,
};
use crate::error::ReadAlongResult;
use crate::utils::fuzzy::SimilarityScorer;

/// Mutable session state guarded by the session lock
#[derive(Debug, Default)]
struct DebtState {
    states: Vec<WordState>,
    cursor: usize,
    debt: Option<usize>,
    buffers: HashMap<usize, VecDeque<RecognizedToken>>,
    /// A strict request for the open debt has not answered yet
    strict_in_flight: bool,
    low_confidence_streak: u32,
    listening: bool,
    focus: Option<usize>,
    last_lookahead_at: Option<u64>,
    /// Bumped by every reset so late strict results can be recognized
    epoch: u64,
}

/// State and collaborators shared with the background threads
pub struct DebtShared {
    words: Arc<Vec<ReferenceWord>>,
    state: Mutex<DebtState>,
    observer: Arc<dyn AlignmentObserver>,
    matcher: WordMatcher,
    normalizer: TextNormalizer,
    comparator: Arc<dyn StrictComparator>,
    strict_threshold: f32,
    lookahead_window: usize,
    tuning: DebtTuning,
    strict: StrictCorrectionService,
    self_ref: Weak<DebtShared>,
}

/// Debt strategy with its reconciliation worker
pub struct DebtAligner {
    shared: Arc<DebtShared>,
    worker: ReconciliationWorker,
}

impl DebtAligner {
    pub fn new(
        words: Arc<Vec<ReferenceWord>>,
        profile: &MatchProfile,
        tuning: DebtTuning,
        strict_tuning: &StrictTuning,
        scorer: SimilarityScorer,
        normalizer: TextNormalizer,
        observer: Arc<dyn AlignmentObserver>,
    ) -> ReadAlongResult<Self> {
        let comparator: Arc<dyn StrictComparator> = Arc::new(ScoreComparator::new(scorer.clone()));
        Self::with_comparator(
            words,
            profile,
            tuning,
            strict_tuning,
            scorer,
            normalizer,
            observer,
            comparator,
        )
    }

    /// Same as [`new`](Self::new) with a custom strict comparator.
    #[allow(clippy::too_many_arguments)]
    pub fn with_comparator(
        words: Arc<Vec<ReferenceWord>>,
        profile: &MatchProfile,
        tuning: DebtTuning,
        strict_tuning: &StrictTuning,
        scorer: SimilarityScorer,
        normalizer: TextNormalizer,
        observer: Arc<dyn AlignmentObserver>,
        comparator: Arc<dyn StrictComparator>,
    ) -> ReadAlongResult<Self> {
        let strict = StrictCorrectionService::new(strict_tuning)?;
        let matcher = WordMatcher::new(profile.match_rule, profile.fast_threshold, scorer.clone());
        let state = DebtState {
            states: vec![WordState::Pending; words.len()],
            ..DebtState::default()
        };

        let shared = Arc::new_cyclic(|self_ref| DebtShared {
            words,
            state: Mutex::new(state),
            observer: Arc::clone(&observer),
            matcher,
            normalizer,
            comparator,
            strict_threshold: profile.strict_threshold,
            lookahead_window: tuning.lookahead_window,
            tuning: tuning.clone(),
            strict,
            self_ref: self_ref.clone(),
        });

        let weak = Arc::downgrade(&shared);
        let worker_tuning = tuning;
        let worker = ReconciliationWorker::spawn(
            move |job: InspectJob| {
                let Some(shared) = weak.upgrade() else { return };
                if let Some(candidate) = pick_candidate(&job, shared.matcher.scorer(), &worker_tuning) {
                    shared.request_strict_reeval(job.debt_index, candidate, job.epoch);
                }
            },
            observer,
            Duration::from_millis(strict_tuning.shutdown_grace_ms),
        )?;

        info!("🎯 Debt aligner ready ({} words)", shared.words.len());
        Ok(Self { shared, worker })
    }

    /// Feed recognized tokens in arrival order.
    pub fn on_tokens(&self, tokens: &[RecognizedToken], now_ms: u64) {
        if tokens.is_empty() {
            return;
        }
        emit_metric(self.shared.observer.as_ref(), "tokens_in", &tokens.len().to_string());
        for token in tokens {
            if let Some(job) = self.shared.process_token(token, now_ms) {
                if !self.worker.submit(job) {
                    trace!("debt collector stopped, job dropped");
                }
            }
        }
    }

    pub fn set_listening(&self, listening: bool) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        state.listening = listening;
        shared.refresh_focus(&mut state);
    }

    /// Zero all mutable state; workers stay up.
    pub fn reset(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if let Some(index) = state.debt.take() {
            shared.observer.hide_debt_marker(index);
        }
        state.epoch += 1;
        for (index, word) in state.states.iter_mut().enumerate() {
            if *word != WordState::Pending {
                *word = WordState::Pending;
                shared.observer.mark_word(index, WordColor::Default);
            }
        }
        state.cursor = 0;
        state.buffers.clear();
        state.strict_in_flight = false;
        state.low_confidence_streak = 0;
        state.last_lookahead_at = None;
        shared.observer.advance_cursor_to(0);
        shared.refresh_focus(&mut state);
        debug!(epoch = state.epoch, "debt session reset");
    }

    /// Stop the collector and the strict pool with bounded waits.
    pub fn shutdown(&self) {
        self.worker.shutdown();
        self.shared.strict.shutdown();
    }

    pub fn states(&self) -> Vec<WordState> {
        self.shared.lock_state().states.clone()
    }

    pub fn cursor(&self) -> usize {
        self.shared.lock_state().cursor
    }

    pub fn open_debt(&self) -> Option<usize> {
        self.shared.lock_state().debt
    }

    pub fn buffered_tokens(&self, index: usize) -> Vec<RecognizedToken> {
        self.shared
            .lock_state()
            .buffers
            .get(&index)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> AlignmentSnapshot {
        let state = self.shared.lock_state();
        AlignmentSnapshot::build(
            &self.shared.words,
            &state.states,
            state.cursor,
            state.cursor.checked_sub(1),
            state.focus,
            state.debt,
        )
    }
}

impl Drop for DebtAligner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DebtShared {
    fn lock_state(&self) -> MutexGuard<'_, DebtState> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("⚠️ debt state lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Returns a buffer snapshot for the collector while a debt stays open.
    fn process_token(&self, token: &RecognizedToken, now_ms: u64) -> Option<InspectJob> {
        let normalized = self.normalizer.normalize(&token.text);
        if normalized.is_empty() || is_filler(&normalized) {
            return None;
        }

        let mut state = self.lock_state();

        if token.confidence < self.tuning.min_token_confidence {
            if state.low_confidence_streak < self.tuning.low_confidence_grace {
                state.low_confidence_streak += 1;
                emit_metric(
                    self.observer.as_ref(),
                    "low_confidence_suppressed",
                    &format!("{}@{:.2}", normalized, token.confidence),
                );
                return None;
            }
        } else {
            state.low_confidence_streak = 0;
        }

        self.advance_cursor(&mut state);
        if state.cursor >= self.words.len() {
            return None;
        }

        let token = RecognizedToken::with_confidence(normalized.clone(), token.confidence);

        let debt_index = match state.debt {
            Some(index) => index,
            None => {
                let cursor = state.cursor;
                if self.matcher.is_match(&normalized, &self.words[cursor]) {
                    self.mark_correct(&mut state, cursor);
                    return None;
                }
                if self.try_self_correction(&mut state, &normalized) {
                    return None;
                }
                self.open_debt(&mut state, cursor);
                cursor
            }
        };

        self.try_lookahead(&mut state, &normalized, now_ms);

        let buffer = state.buffers.entry(debt_index).or_default();
        if buffer.len() >= self.tuning.correction_window {
            buffer.pop_front();
        }
        buffer.push_back(token);
        let buffered = buffer.len();
        let snapshot: Vec<RecognizedToken> = buffer.iter().cloned().collect();

        if buffered >= self.tuning.correction_window {
            self.finalize_incorrect(&mut state, debt_index);
            return None;
        }

        Some(InspectJob {
            debt_index,
            target: self.words[debt_index].normalized_text.clone(),
            snapshot,
            epoch: state.epoch,
        })
    }

    /// Ask for a strict check of the open debt, at most one at a time.
    pub fn request_strict_reeval(&self, debt_index: usize, candidate: RecognizedToken, epoch: u64) {
        let request = {
            let mut state = self.lock_state();
            if state.epoch != epoch
                || state.debt != Some(debt_index)
                || state.states.get(debt_index) != Some(&WordState::UnresolvedDebt)
                || state.strict_in_flight
            {
                return;
            }
            state.strict_in_flight = true;
            StrictRequest {
                debt_index,
                candidate: candidate.text,
                target: self.words[debt_index].normalized_text.clone(),
                threshold: self.strict_threshold,
                epoch,
            }
        };

        emit_metric(
            self.observer.as_ref(),
            "strict_requested",
            &format!("index={} candidate='{}'", debt_index, request.candidate),
        );

        let weak = self.self_ref.clone();
        self.strict.submit(request, Arc::clone(&self.comparator), move |result| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_strict_result(result);
            }
        });
    }

    fn handle_strict_result(&self, result: StrictResult) {
        let mut state = self.lock_state();
        emit_metric(
            self.observer.as_ref(),
            "strict_result",
            &format!(
                "index={} verdict={:?} time={}ms",
                result.debt_index, result.verdict, result.elapsed_ms
            ),
        );

        if result.epoch != state.epoch
            || state.states.get(result.debt_index) != Some(&WordState::UnresolvedDebt)
        {
            trace!(index = result.debt_index, "stale strict result ignored");
            return;
        }
        if state.debt == Some(result.debt_index) {
            state.strict_in_flight = false;
        }

        match result.verdict {
            Verdict::Green => self.mark_correct(&mut state, result.debt_index),
            Verdict::Red => self.finalize_incorrect(&mut state, result.debt_index),
            Verdict::Unknown => {
                let key = match result.outcome {
                    StrictOutcome::TimedOut => "strict_timeout",
                    StrictOutcome::Failed(_) => "strict_failure",
                    StrictOutcome::Scored(_) => "strict_unknown",
                };
                emit_metric(self.observer.as_ref(), key, &result.debt_index.to_string());
            }
        }
    }

    fn open_debt(&self, state: &mut DebtState, index: usize) {
        if !self.transition(state, index, WordState::UnresolvedDebt) {
            return;
        }
        state.debt = Some(index);
        state.buffers.insert(index, VecDeque::with_capacity(self.tuning.correction_window));
        state.strict_in_flight = false;
        self.observer.show_debt_marker(index);
        emit_metric(self.observer.as_ref(), "debt_created", &index.to_string());
    }

    /// A reader who repeats the word they just got wrong gets credit for it.
    fn try_self_correction(&self, state: &mut DebtState, normalized: &str) -> bool {
        let Some(previous) = state.cursor.checked_sub(1) else {
            return false;
        };
        if state.states[previous] != WordState::Incorrect {
            return false;
        }
        let score = self
            .matcher
            .scorer()
            .score_normalized(normalized, &self.words[previous].normalized_text);
        if score < self.strict_threshold {
            return false;
        }
        self.mark_correct(state, previous);
        emit_metric(self.observer.as_ref(), "correction_success", &previous.to_string());
        true
    }

    /// Credit an upcoming pending word the reader may have jumped to.
    ///
    /// The jump needs a strong score with a clear lead over the cursor word.
    /// Very short words need an exact hit, and jumps are rate limited.
    fn try_lookahead(&self, state: &mut DebtState, normalized: &str, now_ms: u64) {
        let tuning = &self.tuning;
        if state
            .last_lookahead_at
            .is_some_and(|last| now_ms.saturating_sub(last) < tuning.lookahead_cooldown_ms)
        {
            trace!("lookahead cooling down");
            return;
        }

        let cursor = state.cursor;
        let start = cursor + 1;
        let end = (cursor + self.lookahead_window).min(self.words.len().saturating_sub(1));
        if start > end {
            return;
        }

        let scorer = self.matcher.scorer();
        let current = scorer.score_normalized(normalized, &self.words[cursor].normalized_text);
        for index in start..=end {
            if state.states[index] != WordState::Pending {
                continue;
            }
            let candidate = self.words[index].normalized_text.as_str();
            let score = scorer.score_normalized(normalized, candidate);
            let short = candidate.chars().count() <= tuning.lookahead_short_word_len;
            let accepted = score >= tuning.lookahead_min_score
                && score - current >= tuning.lookahead_margin
                && (!short || candidate == normalized);

            emit_metric(
                self.observer.as_ref(),
                "lookahead_decision",
                &format!(
                    "index={} token='{}' current={:.2} candidate={:.2} accepted={}",
                    index, normalized, current, score, accepted
                ),
            );
            if accepted {
                state.last_lookahead_at = Some(now_ms);
                self.mark_correct(state, index);
                return;
            }
        }
    }

    fn mark_correct(&self, state: &mut DebtState, index: usize) {
        if !self.transition(state, index, WordState::Correct) {
            return;
        }
        state.buffers.remove(&index);
        if state.debt == Some(index) {
            state.debt = None;
            state.strict_in_flight = false;
            self.observer.hide_debt_marker(index);
        }
        emit_metric(self.observer.as_ref(), "mark_correct", &index.to_string());
        self.advance_cursor(state);
    }

    fn finalize_incorrect(&self, state: &mut DebtState, index: usize) {
        if state.states.get(index) != Some(&WordState::UnresolvedDebt) {
            return;
        }
        self.transition(state, index, WordState::Incorrect);
        state.buffers.remove(&index);
        self.observer.hide_debt_marker(index);
        if state.debt == Some(index) {
            state.debt = None;
            state.strict_in_flight = false;
        }
        emit_metric(self.observer.as_ref(), "debt_finalized_incorrect", &index.to_string());
        self.advance_cursor(state);
    }

    fn transition(&self, state: &mut DebtState, index: usize, next: WordState) -> bool {
        let Some(current) = state.states.get(index).copied() else {
            return false;
        };
        if !current.can_transition_to(next) {
            return false;
        }
        state.states[index] = next;
        self.observer.mark_word(index, next.color());
        true
    }

    /// Move past settled words; stops at pending words and open debts.
    fn advance_cursor(&self, state: &mut DebtState) {
        let before = state.cursor;
        while state.cursor < self.words.len()
            && matches!(
                state.states[state.cursor],
                WordState::Correct | WordState::Skipped | WordState::Incorrect
            )
        {
            state.cursor += 1;
        }
        if state.cursor != before {
            self.observer.advance_cursor_to(state.cursor);
        }
        self.refresh_focus(state);
    }

    fn refresh_focus(&self, state: &mut DebtState) {
        let focus = (state.listening && state.cursor < self.words.len()).then_some(state.cursor);
        if focus != state.focus {
            state.focus = focus;
            self.observer.focus_changed(focus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::observer::ColorBoard;
    use crate::core::text_normalizer::tokenize_reference;
    use crate::core::types::Difficulty;
    use crate::utils::phonetic::PhoneticEncoder;
    use std::time::Instant;

    fn aligner_with(
        text: &str,
        tuning: DebtTuning,
        comparator: Option<Arc<dyn StrictComparator>>,
    ) -> (DebtAligner, Arc<ColorBoard>) {
        let words = Arc::new(tokenize_reference(text, &PhoneticEncoder::new()).words);
        let board = Arc::new(ColorBoard::new(words.len()));
        let profile = MatchProfile::for_difficulty(Difficulty::High);
        let scorer = SimilarityScorer::default();
        let comparator =
            comparator.unwrap_or_else(|| Arc::new(ScoreComparator::new(scorer.clone())));
        let aligner = DebtAligner::with_comparator(
            words,
            &profile,
            tuning,
            &StrictTuning::default(),
            scorer,
            TextNormalizer::default(),
            board.clone(),
            comparator,
        )
        .expect("aligner");
        (aligner, board)
    }

    fn aligner(text: &str) -> (DebtAligner, Arc<ColorBoard>) {
        aligner_with(text, DebtTuning::default(), None)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn tok(text: &str) -> RecognizedToken {
        RecognizedToken::new(text)
    }

    #[test]
    fn test_exact_tokens_advance() {
        let (aligner, board) = aligner("the cat sat");
        aligner.on_tokens(&[tok("the"), tok("cat"), tok("sat")], 0);
        assert_eq!(aligner.states(), vec![WordState::Correct; 3]);
        assert_eq!(aligner.cursor(), 3);
        assert_eq!(board.cursor(), 3);
    }

    #[test]
    fn test_near_miss_opens_debt() {
        let (aligner, board) = aligner("hello");
        aligner.on_tokens(&[tok("jello")], 0);
        assert_eq!(aligner.open_debt(), Some(0));
        assert_eq!(aligner.states(), vec![WordState::UnresolvedDebt]);
        assert_eq!(board.debt_markers(), vec![0]);
        assert_eq!(aligner.cursor(), 0);
    }

    #[test]
    fn test_buffer_exhaustion_finalizes_incorrect() {
        let (aligner, board) = aligner("elephant");
        let giraffe = RecognizedToken::with_confidence("giraffe", 0.3);
        aligner.on_tokens(&[giraffe.clone()], 0);
        assert_eq!(aligner.open_debt(), Some(0));
        aligner.on_tokens(&[giraffe.clone()], 0);
        assert_eq!(aligner.buffered_tokens(0).len(), 2);
        aligner.on_tokens(&[giraffe], 0);

        assert_eq!(aligner.states(), vec![WordState::Incorrect]);
        assert_eq!(aligner.open_debt(), None);
        assert_eq!(board.color(0), Some(WordColor::Red));
        assert!(board.debt_markers().is_empty());
        assert_eq!(aligner.cursor(), 1);
    }

    #[test]
    fn test_strict_green_resolves_debt() {
        let (aligner, board) = aligner("elephant runs");
        aligner.on_tokens(&[tok("giraffe"), tok("elephant")], 0);
        assert!(wait_for(|| aligner.states()[0] == WordState::Correct));
        assert_eq!(aligner.open_debt(), None);
        assert!(wait_for(|| board.color(0) == Some(WordColor::Green)));
        assert_eq!(aligner.cursor(), 1);
    }

    #[test]
    fn test_strict_red_finalizes_debt() {
        let red: Arc<dyn StrictComparator> = Arc::new(|_: &str, _: &str| 0.0f32);
        let (aligner, _board) = aligner_with("elephant runs", DebtTuning::default(), Some(red));
        aligner.on_tokens(&[tok("elephants")], 0);
        assert!(wait_for(|| aligner.states()[0] == WordState::Incorrect));
        assert_eq!(aligner.cursor(), 1);
    }

    #[test]
    fn test_lookahead_credits_upcoming_word() {
        let (aligner, _board) = aligner("one two three four five");
        aligner.on_tokens(&[tok("one"), tok("three")], 0);
        let states = aligner.states();
        assert_eq!(states[1], WordState::UnresolvedDebt);
        assert_eq!(states[2], WordState::Correct);
        assert_eq!(aligner.cursor(), 1);
    }

    #[test]
    fn test_lookahead_needs_min_score() {
        // "qharlxe" scores about 0.71 against "charlie"
        let text = "alpha bravo charlie delta";
        let (aligner, _board) = aligner(text);
        aligner.on_tokens(&[tok("alpha"), tok("qharlxe")], 0);
        assert_eq!(aligner.states()[1], WordState::UnresolvedDebt);
        assert_eq!(aligner.states()[2], WordState::Pending);

        let loose = DebtTuning {
            lookahead_min_score: 0.7,
            ..DebtTuning::default()
        };
        let (aligner, _board) = aligner_with(text, loose, None);
        aligner.on_tokens(&[tok("alpha"), tok("qharlxe")], 0);
        assert_eq!(aligner.states()[2], WordState::Correct);
    }

    #[test]
    fn test_lookahead_needs_margin_over_cursor_word() {
        let wide = DebtTuning {
            lookahead_margin: 0.9,
            ..DebtTuning::default()
        };
        // "charlie" leads "bravo" by about 0.86
        let (wide_aligner, _board) = aligner_with("alpha bravo charlie delta", wide, None);
        wide_aligner.on_tokens(&[tok("alpha"), tok("charlie")], 0);
        assert_eq!(wide_aligner.states()[2], WordState::Pending);

        let (aligner, _board) = aligner("alpha bravo charlie delta");
        aligner.on_tokens(&[tok("alpha"), tok("charlie")], 0);
        assert_eq!(aligner.states()[2], WordState::Correct);
    }

    #[test]
    fn test_lookahead_short_words_need_exact_hit() {
        // "ad" sounds like "at" and scores above the minimum
        let (aligner, _board) = aligner("alpha bravo at delta");
        aligner.on_tokens(&[tok("alpha"), tok("ad")], 0);
        assert_eq!(aligner.states()[1], WordState::UnresolvedDebt);
        assert_eq!(aligner.states()[2], WordState::Pending);

        aligner.on_tokens(&[tok("at")], 1_000);
        assert_eq!(aligner.states()[2], WordState::Correct);
    }

    #[test]
    fn test_lookahead_cooldown() {
        let (aligner, _board) = aligner("alpha bravo charlie delta echo");
        aligner.on_tokens(&[tok("alpha"), tok("charlie")], 1_000);
        assert_eq!(aligner.states()[2], WordState::Correct);

        aligner.on_tokens(&[tok("delta")], 1_100);
        assert_eq!(aligner.states()[3], WordState::Pending);
        assert_eq!(aligner.open_debt(), Some(1));

        aligner.on_tokens(&[tok("delta")], 1_400);
        assert_eq!(aligner.states()[3], WordState::Correct);
    }

    #[test]
    fn test_lookahead_window_is_bounded() {
        let (aligner, _board) = aligner("one two three four five six");
        aligner.on_tokens(&[tok("one"), tok("six")], 0);
        assert_eq!(aligner.states()[5], WordState::Pending);
    }

    #[test]
    fn test_self_correction_of_previous_word() {
        let (aligner, _board) = aligner("zebra runs fast");
        let noise = RecognizedToken::with_confidence("quokka", 1.0);
        aligner.on_tokens(&[noise.clone(), noise.clone(), noise], 0);
        assert_eq!(aligner.states()[0], WordState::Incorrect);
        assert_eq!(aligner.cursor(), 1);

        aligner.on_tokens(&[tok("zebra")], 0);
        assert_eq!(aligner.states()[0], WordState::Correct);
        assert_eq!(aligner.states()[1], WordState::Pending);
    }

    #[test]
    fn test_low_confidence_grace() {
        let (aligner, _board) = aligner("elephant");
        let faint = RecognizedToken::with_confidence("giraffe", 0.1);
        for _ in 0..3 {
            aligner.on_tokens(&[faint.clone()], 0);
        }
        assert_eq!(aligner.states(), vec![WordState::Pending]);
        aligner.on_tokens(&[faint], 0);
        assert_eq!(aligner.open_debt(), Some(0));
    }

    #[test]
    fn test_fillers_ignored() {
        let (aligner, _board) = aligner("elephant");
        aligner.on_tokens(&[tok("um"), tok("uh"), tok("...")], 0);
        assert_eq!(aligner.states(), vec![WordState::Pending]);
    }

    #[test]
    fn test_reset_clears_debt_and_ignores_stale_results() {
        let slow: Arc<dyn StrictComparator> = Arc::new(|_: &str, _: &str| {
            std::thread::sleep(Duration::from_millis(150));
            1.0f32
        });
        let (aligner, board) = aligner_with("elephant runs", DebtTuning::default(), Some(slow));
        aligner.on_tokens(&[tok("elephants")], 0);
        aligner.reset();
        assert_eq!(aligner.states(), vec![WordState::Pending; 2]);
        assert_eq!(aligner.open_debt(), None);
        assert!(board.debt_markers().is_empty());

        // Same index in debt again under a new epoch
        aligner.on_tokens(&[tok("giraffe")], 0);
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(aligner.states()[0], WordState::UnresolvedDebt);
    }

    #[test]
    fn test_reset_repaints_marked_words() {
        let (aligner, board) = aligner("elephant runs fast");
        aligner.on_tokens(&[tok("elephant"), tok("giraffe")], 0);
        assert_eq!(board.color(0), Some(WordColor::Green));
        assert_eq!(board.debt_markers(), vec![1]);

        aligner.reset();
        assert_eq!(board.colors(), vec![WordColor::Default; 3]);
        assert!(board.debt_markers().is_empty());
        assert_eq!(board.cursor(), 0);
    }

    #[test]
    fn test_shutdown_stops_workers() {
        let (aligner, _board) = aligner("elephant");
        aligner.shutdown();
        // Tokens still apply synchronously after teardown
        aligner.on_tokens(&[tok("giraffe")], 0);
        assert_eq!(aligner.open_debt(), Some(0));
    }
}
