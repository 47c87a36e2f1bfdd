//! Configuration
//!
//! Strictness profiles and the tuning knobs of both alignment strategies.
//! Stored as JSON under the user config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::align::matcher::MatchRule;
use crate::core::types::Difficulty;
use crate::error::{ReadAlongError, ReadAlongResult};
use crate::utils::distance::DEFAULT_CACHE_CAPACITY;

/// Strictness-parameterized matching profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProfile {
    /// Word-level match predicate for the greedy walk and window aligner
    pub match_rule: MatchRule,
    /// Minimum similarity for a window alignment cell to count as a match
    pub match_threshold: f32,
    /// Similarity at or above which a greedy match locks immediately
    pub lock_ratio: f32,
    /// Consecutive fuzzy hits needed before a lock
    pub consecutive_required: u32,
    /// Upcoming words the debt strategy may match opportunistically
    pub lookahead_window: usize,
    /// Quadratic jump penalty factor for the window aligner
    pub jump_penalty_factor: f32,
    /// Largest forward jump accepted without a high-confidence score
    pub max_jump_distance: usize,
    pub high_confidence_ratio: f32,
    /// Debt strategy fast-path score
    pub fast_threshold: f32,
    /// Strict correction GREEN threshold
    pub strict_threshold: f32,
}

impl MatchProfile {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Low => Self {
                match_rule: MatchRule::Lenient,
                match_threshold: 0.50,
                lock_ratio: 0.85,
                consecutive_required: 2,
                lookahead_window: 3,
                jump_penalty_factor: 0.08,
                max_jump_distance: 5,
                high_confidence_ratio: 0.90,
                fast_threshold: 0.70,
                strict_threshold: 0.80,
            },
            Difficulty::Medium => Self {
                match_rule: MatchRule::Moderate,
                match_threshold: 0.65,
                lock_ratio: 0.92,
                consecutive_required: 3,
                lookahead_window: 3,
                jump_penalty_factor: 0.10,
                max_jump_distance: 3,
                high_confidence_ratio: 0.95,
                fast_threshold: 0.75,
                strict_threshold: 0.85,
            },
            Difficulty::High => Self {
                match_rule: MatchRule::Exact,
                match_threshold: 0.80,
                lock_ratio: 0.98,
                consecutive_required: 2,
                lookahead_window: 3,
                jump_penalty_factor: 0.12,
                max_jump_distance: 1,
                high_confidence_ratio: 0.99,
                fast_threshold: 0.82,
                strict_threshold: 0.92,
            },
        }
    }
}

/// Greedy strategy timing and window knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyTuning {
    pub partial_min_interval_ms: u64,
    pub deferred_delay_ms: u64,
    pub alignment_window: usize,
    pub min_words_for_alignment: usize,
    pub amnesty_distance: usize,
}

impl Default for GreedyTuning {
    fn default() -> Self {
        Self {
            partial_min_interval_ms: 100,
            deferred_delay_ms: 400,
            alignment_window: 30,
            min_words_for_alignment: 2,
            amnesty_distance: 5,
        }
    }
}

/// Debt strategy knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebtTuning {
    /// Correction buffer bound; a full buffer finalizes the debt
    pub correction_window: usize,
    pub lookahead_window: usize,
    pub min_token_confidence: f32,
    pub low_confidence_grace: u32,
    /// Cheap score the reconciliation worker needs before asking for a strict check
    pub quick_threshold: f32,
    pub quick_min_confidence: f32,
    /// Score an upcoming word needs before the reader is credited with it
    pub lookahead_min_score: f32,
    /// Lead that score needs over the score against the cursor word
    pub lookahead_margin: f32,
    /// Words this short are only credited on an exact hit
    pub lookahead_short_word_len: usize,
    pub lookahead_cooldown_ms: u64,
}

impl Default for DebtTuning {
    fn default() -> Self {
        Self {
            correction_window: 3,
            lookahead_window: 3,
            min_token_confidence: 0.25,
            low_confidence_grace: 3,
            quick_threshold: 0.55,
            quick_min_confidence: 0.2,
            lookahead_min_score: 0.75,
            lookahead_margin: 0.20,
            lookahead_short_word_len: 2,
            lookahead_cooldown_ms: 300,
        }
    }
}

/// Strict correction service knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrictTuning {
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for StrictTuning {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            timeout_ms: 600,
            shutdown_grace_ms: 200,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub difficulty: Difficulty,
    /// Replaces the built-in profile for `difficulty` when present
    pub profile: Option<MatchProfile>,

    pub greedy: GreedyTuning,
    pub debt: DebtTuning,
    pub strict: StrictTuning,

    pub distance_cache_capacity: usize,
    /// Whole-word recognizer corrections, e.g. "red" -> "read"
    pub voice_corrections: HashMap<String, String>,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            profile: None,
            greedy: GreedyTuning::default(),
            debt: DebtTuning::default(),
            strict: StrictTuning::default(),
            distance_cache_capacity: DEFAULT_CACHE_CAPACITY,
            voice_corrections: HashMap::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Effective profile for the configured difficulty
    pub fn match_profile(&self) -> MatchProfile {
        self.profile
            .clone()
            .unwrap_or_else(|| MatchProfile::for_difficulty(self.difficulty))
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`, falling back to defaults when it is missing or corrupt
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Reject values no alignment run can work with
    pub fn validate(&self) -> ReadAlongResult<()> {
        let profile = self.match_profile();
        let ratios = [
            ("match_threshold", profile.match_threshold),
            ("lock_ratio", profile.lock_ratio),
            ("high_confidence_ratio", profile.high_confidence_ratio),
            ("fast_threshold", profile.fast_threshold),
            ("strict_threshold", profile.strict_threshold),
            ("min_token_confidence", self.debt.min_token_confidence),
            ("quick_threshold", self.debt.quick_threshold),
            ("quick_min_confidence", self.debt.quick_min_confidence),
            ("lookahead_min_score", self.debt.lookahead_min_score),
            ("lookahead_margin", self.debt.lookahead_margin),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReadAlongError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if profile.jump_penalty_factor < 0.0 {
            return Err(ReadAlongError::Config(
                "jump_penalty_factor must not be negative".to_string(),
            ));
        }

        let sizes = [
            ("consecutive_required", profile.consecutive_required as usize),
            ("alignment_window", self.greedy.alignment_window),
            ("correction_window", self.debt.correction_window),
            ("max_concurrency", self.strict.max_concurrency),
            ("timeout_ms", self.strict.timeout_ms as usize),
            ("distance_cache_capacity", self.distance_cache_capacity),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ReadAlongError::Config(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readalong")
        .join("config.json")
}
