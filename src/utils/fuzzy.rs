//! Similarity Scoring
//!
//! Normalized edit-distance similarity between a recognized token and a
//! reference word, boosted when both words sound alike.

use std::sync::Arc;

use crate::core::text_normalizer::normalize_word;
use crate::utils::distance::DistanceEngine;
use crate::utils::phonetic::PhoneticEncoder;

/// Weight applied to the phonetic blend before clamping
const PHONETIC_BOOST: f32 = 1.1;

/// Similarity scorer over a shared distance cache
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    distance: Arc<DistanceEngine>,
    phonetic: Arc<PhoneticEncoder>,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(Arc::new(DistanceEngine::default()))
    }
}

impl SimilarityScorer {
    pub fn new(distance: Arc<DistanceEngine>) -> Self {
        Self {
            distance,
            phonetic: Arc::new(PhoneticEncoder::new()),
        }
    }

    pub fn distance_engine(&self) -> &DistanceEngine {
        &self.distance
    }

    pub fn phonetic(&self) -> &PhoneticEncoder {
        &self.phonetic
    }

    /// Score in `[0, 1]`; exact normalized equality is always 1.0.
    pub fn score(&self, recognized: &str, reference: &str) -> f32 {
        let a = normalize_word(recognized);
        let b = normalize_word(reference);
        self.score_normalized(&a, &b)
    }

    /// Same as [`score`](Self::score) for inputs that are already normalized.
    pub fn score_normalized(&self, a: &str, b: &str) -> f32 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }

        let max_len = a.chars().count().max(b.chars().count());
        let distance = self.distance.distance(a, b, max_len).min(max_len);
        let lev_score = (max_len - distance) as f32 / max_len as f32;

        if self.phonetic.sounds_alike(a, b) {
            ((lev_score + 1.0) / 2.0 * PHONETIC_BOOST).clamp(0.0, 1.0)
        } else {
            lev_score
        }
    }

    /// Bounded edit distance between two normalized words.
    pub fn edit_distance(&self, a: &str, b: &str, threshold: usize) -> usize {
        self.distance.distance(a, b, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_scores_one() {
        let scorer = SimilarityScorer::default();
        for word in ["the", "Cat", "don't", "42"] {
            assert_eq!(scorer.score(word, word), 1.0);
        }
        assert_eq!(scorer.score("Hello!", "hello"), 1.0);
    }

    #[test]
    fn test_empty_scores_zero() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score("", "cat"), 0.0);
        assert_eq!(scorer.score("...", "cat"), 0.0);
    }

    #[test]
    fn test_plain_levenshtein_score() {
        let scorer = SimilarityScorer::default();
        // Different codes, so no phonetic boost
        let score = scorer.score("giraffe", "elephant");
        let expected = 1.0 - strsim::levenshtein("giraffe", "elephant") as f32 / 8.0;
        assert!((score - expected).abs() < 1e-6);
        assert!(score < 0.4);
    }

    #[test]
    fn test_phonetic_boost() {
        let scorer = SimilarityScorer::default();
        let lev = 1.0 - strsim::levenshtein("nite", "night") as f32 / 5.0;
        let boosted = scorer.score("nite", "night");
        assert!((boosted - (lev + 1.0) / 2.0 * 1.1).abs() < 1e-6);
        assert!(boosted <= 1.0);
    }

    #[test]
    fn test_score_in_range() {
        let scorer = SimilarityScorer::default();
        for (a, b) in [("jello", "hello"), ("x", "xylophone"), ("phone", "fone")] {
            let s = scorer.score(a, b);
            assert!((0.0..=1.0).contains(&s), "{a} vs {b} = {s}");
        }
    }
}
