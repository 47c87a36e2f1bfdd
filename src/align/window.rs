//! Windowed Re-alignment
//!
//! Local sequence alignment of recognized words against a bounded window of
//! upcoming reference words. Catches words the greedy walk missed, such as a
//! word the reader skipped entirely.

use crate::align::matcher::WordMatcher;
use crate::config::MatchProfile;
use crate::core::types::ReferenceWord;

pub const MATCH_SCORE: f32 = 5.0;
pub const MISMATCH_PENALTY: f32 = -3.0;
pub const GAP_PENALTY: f32 = -2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMove {
    Match,
    Substitution,
    /// Reference word with no recognized counterpart
    Deletion,
    /// Recognized word with no reference counterpart
    Insertion,
}

/// One step of the best path. Indices are relative to the window and the
/// token slice passed to [`WindowAligner::align`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentStep {
    pub kind: AlignmentMove,
    pub word: Option<usize>,
    pub token: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowAlignment {
    pub steps: Vec<AlignmentStep>,
    pub score: f32,
}

impl WindowAlignment {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Jump-penalized local aligner
#[derive(Debug, Clone)]
pub struct WindowAligner {
    matcher: WordMatcher,
    jump_penalty_factor: f32,
    max_jump_distance: usize,
    high_confidence_ratio: f32,
}

impl WindowAligner {
    pub fn new(matcher: WordMatcher, profile: &MatchProfile) -> Self {
        Self {
            matcher,
            jump_penalty_factor: profile.jump_penalty_factor,
            max_jump_distance: profile.max_jump_distance,
            high_confidence_ratio: profile.high_confidence_ratio,
        }
    }

    /// Score of aligning `token` onto the window word at offset `distance`.
    ///
    /// `None` when the pair is a match rejected by the jump cap.
    fn substitution_score(&self, word: &ReferenceWord, token: &str, distance: usize) -> (bool, Option<f32>) {
        let outcome = self.matcher.evaluate(token, word);
        if !outcome.matched {
            return (false, Some(MISMATCH_PENALTY));
        }
        if distance > self.max_jump_distance && outcome.score < self.high_confidence_ratio {
            return (true, None);
        }
        let d = distance as f32;
        (true, Some(MATCH_SCORE - self.jump_penalty_factor * d * d))
    }

    /// Best local alignment path. Empty when either side is empty or nothing
    /// scores above zero.
    pub fn align(&self, window: &[ReferenceWord], tokens: &[String]) -> WindowAlignment {
        let m = window.len();
        let n = tokens.len();
        if m == 0 || n == 0 {
            return WindowAlignment::default();
        }

        let mut dp = vec![vec![0.0f32; n + 1]; m + 1];
        let mut trace = vec![vec![AlignmentMove::Deletion; n + 1]; m + 1];

        let mut max_score = 0.0f32;
        let (mut max_i, mut max_j) = (0, 0);

        for i in 1..=m {
            for j in 1..=n {
                let (is_match, sub) = self.substitution_score(&window[i - 1], &tokens[j - 1], i - 1);

                let from_sub = sub.map(|s| dp[i - 1][j - 1] + s);
                let from_del = dp[i - 1][j] + GAP_PENALTY;
                let from_ins = dp[i][j - 1] + GAP_PENALTY;

                let mut best = from_del;
                let mut mv = AlignmentMove::Deletion;
                if from_ins > best {
                    best = from_ins;
                    mv = AlignmentMove::Insertion;
                }
                if let Some(score) = from_sub {
                    if score >= best {
                        best = score;
                        mv = if is_match {
                            AlignmentMove::Match
                        } else {
                            AlignmentMove::Substitution
                        };
                    }
                }

                dp[i][j] = if best > 0.0 { best } else { 0.0 };
                trace[i][j] = mv;

                if best > max_score {
                    max_score = best;
                    max_i = i;
                    max_j = j;
                }
            }
        }

        let mut steps = Vec::new();
        let (mut i, mut j) = (max_i, max_j);
        while i > 0 || j > 0 {
            let kind = if i > 0 && j > 0 {
                trace[i][j]
            } else if i > 0 {
                AlignmentMove::Deletion
            } else {
                AlignmentMove::Insertion
            };

            match kind {
                AlignmentMove::Match | AlignmentMove::Substitution => {
                    steps.push(AlignmentStep {
                        kind,
                        word: Some(i - 1),
                        token: Some(j - 1),
                    });
                    i -= 1;
                    j -= 1;
                }
                AlignmentMove::Deletion => {
                    steps.push(AlignmentStep {
                        kind,
                        word: Some(i - 1),
                        token: None,
                    });
                    i -= 1;
                }
                AlignmentMove::Insertion => {
                    steps.push(AlignmentStep {
                        kind,
                        word: None,
                        token: Some(j - 1),
                    });
                    j -= 1;
                }
            }
        }
        steps.reverse();

        WindowAlignment {
            steps,
            score: max_score,
        }
    }
}
