//! Session-scoped exact + fuzzy deduplication.
//!
//! Dedup scope is the whole session, not a single job: every accepted item
//! is matched against everything accepted before it, across jobs and across
//! rounds. State is cleared only by constructing a fresh session.
//!
//! Items from concurrent jobs arrive in completion order, so which
//! near-duplicate variant survives as the "original" depends on scheduling
//! timing. The unique-item *count* is stable; the surviving wording is not.

use std::collections::HashSet;

use similar::TextDiff;

use crate::error::HarvestError;
use crate::models::compute_hash;

/// Tunable dedup constants. The defaults come from the observed behavior of
/// the surrounding system and have no deeper rationale; treat them as
/// configuration, not gospel.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Fuzzy similarity at or above this ratio is a duplicate.
    pub similarity_threshold: f32,
    /// Normalized texts shorter than this are dropped as noise.
    pub min_normalized_len: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            min_normalized_len: 10,
        }
    }
}

/// Classification of one candidate item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unique,
    Duplicate,
}

/// Dedup state for one harvest session.
///
/// Owned exclusively by the scheduler's coordinating task; never shared
/// between concurrently-completing jobs.
#[derive(Debug)]
pub struct DedupSession {
    config: DedupConfig,
    round: u32,
    max_rounds: u32,
    seen_exact_keys: HashSet<String>,
    seen_normalized: Vec<String>,
}

impl DedupSession {
    pub fn new(config: DedupConfig, max_rounds: u32) -> Self {
        Self {
            config,
            round: 0,
            max_rounds,
            seen_exact_keys: HashSet::new(),
            seen_normalized: Vec::new(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Number of unique items accepted so far.
    pub fn accepted_count(&self) -> usize {
        self.seen_normalized.len()
    }

    /// Open the next round. Dedup memory is retained; only the round counter
    /// advances. The scheduler never calls this; round limits are caller
    /// policy.
    pub fn begin_round(&mut self) -> Result<u32, HarvestError> {
        if self.round >= self.max_rounds {
            return Err(HarvestError::RoundLimitReached(self.max_rounds));
        }
        self.round += 1;
        Ok(self.round)
    }

    /// Classify one item text against everything accepted this session.
    ///
    /// Unique items are recorded; duplicates (and noise below the minimum
    /// normalized length) leave the state untouched.
    pub fn accept(&mut self, text: &str) -> Verdict {
        let normalized = normalize_text(text);
        if normalized.chars().count() < self.config.min_normalized_len {
            return Verdict::Duplicate;
        }

        let exact_key = compute_hash(&normalized);
        if self.seen_exact_keys.contains(&exact_key) {
            return Verdict::Duplicate;
        }

        // O(n) fuzzy pass over the running seen-set. Fine at tens to low
        // hundreds of items per harvest.
        for seen in &self.seen_normalized {
            if similarity_ratio(seen, &normalized) >= self.config.similarity_threshold {
                return Verdict::Duplicate;
            }
        }

        self.seen_exact_keys.insert(exact_key);
        self.seen_normalized.push(normalized);
        Verdict::Unique
    }
}

/// Lowercase, strip punctuation, collapse internal whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else if ch.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.extend(ch.to_lowercase());
        }
        // Punctuation and symbols are dropped without forcing a word break.
    }
    out
}

/// LCS-based similarity ratio in [0, 1] over characters.
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio()
}
