//! Bounded Edit Distance
//!
//! Levenshtein distance with an early-exit threshold and a memoization cache
//! that is safe to share across threads and sessions.

use dashmap::DashMap;
use tracing::trace;

/// Default number of cached string pairs before the cache is flushed
pub const DEFAULT_CACHE_CAPACITY: usize = 50_000;

/// Cached result for one ordered string pair.
///
/// `value <= threshold` means `value` is the exact distance. Otherwise the
/// entry only proves that the true distance exceeds `threshold`.
#[derive(Debug, Clone, Copy)]
struct CachedDistance {
    value: usize,
    threshold: usize,
}

impl CachedDistance {
    fn is_exact(&self) -> bool {
        self.value <= self.threshold
    }

    /// Answer a query for `threshold` from this entry, if it can.
    fn answer(&self, threshold: usize) -> Option<usize> {
        if self.is_exact() {
            Some(if self.value <= threshold {
                self.value
            } else {
                threshold + 1
            })
        } else if threshold <= self.threshold {
            Some(threshold + 1)
        } else {
            None
        }
    }
}

/// Distance engine with an explicit, concurrent memoization cache
#[derive(Debug)]
pub struct DistanceEngine {
    cache: DashMap<(String, String), CachedDistance>,
    capacity: usize,
}

impl Default for DistanceEngine {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl DistanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine whose cache is flushed once it holds `capacity` pairs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Edit distance between `a` and `b`, or `threshold + 1` when it exceeds
    /// `threshold`.
    pub fn distance(&self, a: &str, b: &str, threshold: usize) -> usize {
        if a == b {
            return 0;
        }

        let key = canonical_key(a, b);
        if let Some(entry) = self.cache.get(&key) {
            if let Some(answer) = entry.answer(threshold) {
                return answer;
            }
        }

        let value = bounded_levenshtein(&key.0, &key.1, threshold);

        if self.cache.len() >= self.capacity {
            trace!(capacity = self.capacity, "distance cache full, flushing");
            self.cache.clear();
        }
        self.cache.insert(key, CachedDistance { value, threshold });
        value
    }

    /// Number of cached pairs
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Order a pair so `(a, b)` and `(b, a)` share one entry: shorter first, ties
/// broken lexicographically.
fn canonical_key(a: &str, b: &str) -> (String, String) {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if (a_len, a) <= (b_len, b) {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Two-row Levenshtein with length-difference and row-minimum early exits.
pub fn bounded_levenshtein(a: &str, b: &str, threshold: usize) -> usize {
    let exceeded = threshold.saturating_add(1);
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Iterate rows over the longer string so the rows stay O(min(n, m))
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if long.len() - short.len() > threshold {
        return exceeded;
    }
    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0usize; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }

        if row_min > threshold {
            return exceeded;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let result = prev[short.len()];
    if result > threshold {
        exceeded
    } else {
        result
    }
}
