//! Core Types
//!
//! Reference words, recognized tokens and the per-word state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reading strictness selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "beginner" | "easy" | "0" => Ok(Difficulty::Low),
            "medium" | "intermediate" | "1" => Ok(Difficulty::Medium),
            "high" | "advanced" | "hard" | "2" => Ok(Difficulty::High),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Low => "LOW",
            Difficulty::Medium => "MEDIUM",
            Difficulty::High => "HIGH",
        };
        f.write_str(name)
    }
}

/// Classification of a single reference word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WordState {
    #[default]
    Pending,
    Correct,
    Incorrect,
    Skipped,
    /// Debt strategy only: waiting on a delayed judgment
    UnresolvedDebt,
}

impl WordState {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Correct` is final until a full session reset; same-state moves are
    /// reported as illegal so callers can treat them as no-ops.
    pub fn can_transition_to(self, next: WordState) -> bool {
        use WordState::*;
        matches!(
            (self, next),
            (Pending, Correct | Incorrect | Skipped | UnresolvedDebt)
                | (UnresolvedDebt, Correct | Incorrect)
                | (Incorrect, Correct | Skipped)
                | (Skipped, Correct | Incorrect)
        )
    }

    /// Color the rendering collaborator should paint this state with.
    pub fn color(self) -> WordColor {
        match self {
            WordState::Correct => WordColor::Green,
            WordState::Incorrect => WordColor::Red,
            WordState::Pending | WordState::Skipped | WordState::UnresolvedDebt => {
                WordColor::Default
            }
        }
    }
}

/// Rendering color for a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum WordColor {
    Green,
    Red,
    #[default]
    Default,
}

/// Outcome of a strict re-evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Green,
    Red,
    Unknown,
}

impl Verdict {
    /// Map a score onto a verdict: `>= threshold` is green, below half the
    /// threshold is red, anything in between stays unknown.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        if score >= threshold {
            Verdict::Green
        } else if score < threshold * 0.5 {
            Verdict::Red
        } else {
            Verdict::Unknown
        }
    }
}

/// One token of the text being read.
///
/// Immutable once built; the per-word state lives in the alignment session
/// so a reset never has to rebuild the word list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceWord {
    pub original_text: String,
    pub normalized_text: String,
    pub phonetic_code: String,
    pub sentence_index: usize,
    pub word_index_in_sentence: usize,
    /// Character offsets (start, end) inside the owning sentence
    pub char_span: (usize, usize),
}

impl ReferenceWord {
    /// Capitalized and not the first word of its sentence.
    pub fn is_proper_noun(&self) -> bool {
        self.word_index_in_sentence > 0
            && self
                .original_text
                .chars()
                .find(|c| c.is_alphanumeric())
                .is_some_and(|c| c.is_uppercase())
    }
}

/// One word-like unit emitted by the recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedToken {
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl RecognizedToken {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_is_final() {
        for next in [
            WordState::Pending,
            WordState::Incorrect,
            WordState::Skipped,
            WordState::UnresolvedDebt,
        ] {
            assert!(!WordState::Correct.can_transition_to(next));
        }
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(WordState::Pending.can_transition_to(WordState::UnresolvedDebt));
        assert!(WordState::UnresolvedDebt.can_transition_to(WordState::Correct));
        assert!(WordState::Incorrect.can_transition_to(WordState::Correct));
        assert!(WordState::Incorrect.can_transition_to(WordState::Skipped));
        assert!(WordState::Skipped.can_transition_to(WordState::Incorrect));
        assert!(!WordState::UnresolvedDebt.can_transition_to(WordState::Skipped));
        assert!(!WordState::Skipped.can_transition_to(WordState::Skipped));
    }

    #[test]
    fn test_verdict_policy() {
        assert_eq!(Verdict::from_score(0.92, 0.92), Verdict::Green);
        assert_eq!(Verdict::from_score(0.45, 0.92), Verdict::Red);
        assert_eq!(Verdict::from_score(0.46, 0.92), Verdict::Unknown);
        assert_eq!(Verdict::from_score(0.7, 0.92), Verdict::Unknown);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("low".parse::<Difficulty>(), Ok(Difficulty::Low));
        assert_eq!("Advanced".parse::<Difficulty>(), Ok(Difficulty::High));
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn test_proper_noun() {
        let mut word = ReferenceWord {
            original_text: "Tom".to_string(),
            normalized_text: "tom".to_string(),
            phonetic_code: "TM".to_string(),
            sentence_index: 0,
            word_index_in_sentence: 0,
            char_span: (0, 3),
        };
        assert!(!word.is_proper_noun());
        word.word_index_in_sentence = 2;
        assert!(word.is_proper_noun());
    }

    #[test]
    fn test_token_confidence_clamped() {
        assert_eq!(RecognizedToken::with_confidence("a", 1.5).confidence, 1.0);
        assert_eq!(RecognizedToken::new("a").confidence, 1.0);
    }
}
