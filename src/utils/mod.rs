//! Utility modules

pub mod distance;
pub mod fuzzy;
pub mod phonetic;

pub use distance::{bounded_levenshtein, DistanceEngine};
pub use fuzzy::SimilarityScorer;
pub use phonetic::PhoneticEncoder;
