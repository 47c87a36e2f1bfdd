//! Word Match Rules
//!
//! Strictness-dependent predicate deciding whether a recognized word counts
//! as a reading of a reference word.

use serde::{Deserialize, Serialize};

use crate::core::types::ReferenceWord;
use crate::utils::fuzzy::SimilarityScorer;

/// Reference words the lenient rule always accepts
const LENIENT_STOP_WORDS: &[&str] = &["um", "uh", "yeah"];

/// Largest edit distance the lenient rule accepts
const LENIENT_MAX_DISTANCE: usize = 2;

/// Edit distance a phonetic match may still carry under the moderate rule
const PHONETIC_MAX_DISTANCE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// Proper nouns, stop words, sound-alikes, or distance <= 2
    Lenient,
    /// Length-scaled distance, or sound-alike within distance 2
    Moderate,
    /// Equal once apostrophes are dropped
    Exact,
}

impl MatchRule {
    /// Whether normalized `token` reads as `word` under this rule.
    pub fn matches(self, token: &str, word: &ReferenceWord, scorer: &SimilarityScorer) -> bool {
        let reference = word.normalized_text.as_str();
        if token.is_empty() {
            return false;
        }
        if token == reference {
            return true;
        }

        match self {
            MatchRule::Lenient => {
                word.is_proper_noun()
                    || LENIENT_STOP_WORDS.contains(&reference)
                    || sounds_like(token, word, scorer)
                    || scorer.edit_distance(token, reference, LENIENT_MAX_DISTANCE)
                        <= LENIENT_MAX_DISTANCE
            }
            MatchRule::Moderate => {
                let allowed = moderate_threshold(reference.chars().count());
                if scorer.edit_distance(token, reference, allowed) <= allowed {
                    return true;
                }
                sounds_like(token, word, scorer)
                    && scorer.edit_distance(token, reference, PHONETIC_MAX_DISTANCE)
                        <= PHONETIC_MAX_DISTANCE
            }
            MatchRule::Exact => strip_apostrophes(token) == strip_apostrophes(reference),
        }
    }
}

/// Result of comparing one recognized word to one reference word
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub matched: bool,
    pub score: f32,
}

/// Rule plus score threshold, bound to a shared scorer.
///
/// A word matches when the rule accepts it or, outside the exact rule, when
/// its similarity score reaches `threshold`.
#[derive(Debug, Clone)]
pub struct WordMatcher {
    rule: MatchRule,
    threshold: f32,
    scorer: SimilarityScorer,
}

impl WordMatcher {
    pub fn new(rule: MatchRule, threshold: f32, scorer: SimilarityScorer) -> Self {
        Self {
            rule,
            threshold,
            scorer,
        }
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Compare a normalized recognized word against a reference word.
    pub fn evaluate(&self, token: &str, word: &ReferenceWord) -> MatchOutcome {
        let score = self.scorer.score_normalized(token, &word.normalized_text);
        let matched = self.rule.matches(token, word, &self.scorer)
            || (self.rule != MatchRule::Exact && score >= self.threshold);
        MatchOutcome { matched, score }
    }

    pub fn is_match(&self, token: &str, word: &ReferenceWord) -> bool {
        self.evaluate(token, word).matched
    }
}

/// Allowed edit distance for a reference word of `len` characters
pub fn moderate_threshold(len: usize) -> usize {
    match len {
        0..=3 => 0,
        4..=7 => 1,
        _ => ((len as f32 * 0.2).round() as usize).clamp(2, 3),
    }
}

fn sounds_like(token: &str, word: &ReferenceWord, scorer: &SimilarityScorer) -> bool {
    !word.phonetic_code.is_empty() && scorer.phonetic().encode(token) == word.phonetic_code
}

fn strip_apostrophes(text: &str) -> String {
    text.chars().filter(|c| *c != '\'').collect()
}
