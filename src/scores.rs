//! Listening scores keyed by track path.
//!
//! Each entry counts how many times a track was left (skipped, advanced past
//! or played out) and sums the fraction of the track that had been heard at
//! that moment. The average of those fractions is the track's score.

use std::collections::HashMap;

use anyhow::Result;
use log::{debug, warn};

/// Per-track listening history
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ListeningScore {
    pub count: u32,
    pub score_sum: f64,
}

impl ListeningScore {
    /// Entry assumed for tracks with no history: one listen at the midpoint
    pub const NEUTRAL: Self = Self {
        count: 1,
        score_sum: 0.5,
    };

    /// Average heard fraction, 0.5 when the count is zero
    #[must_use]
    pub fn score(&self) -> f64 {
        match self.count {
            0 => 0.5,
            count => self.score_sum / f64::from(count),
        }
    }

    /// Adds one listen that covered `ratio` of the track
    #[must_use]
    pub fn with_listen(self, ratio: f64) -> Self {
        Self {
            count: self.count.saturating_add(1),
            score_sum: self.score_sum + ratio.max(0.0),
        }
    }
}

impl Default for ListeningScore {
    fn default() -> Self {
        Self {
            count: 0,
            score_sum: 0.0,
        }
    }
}

/// Key-value store of listening scores
pub trait ScoreStore {
    fn get(&self, path: &str) -> Option<ListeningScore>;

    /// Stores the entry for `path`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage rejects the write.
    fn put(&mut self, path: &str, score: ListeningScore) -> Result<()>;
}

/// In-memory store, used for tests and sessions without persistence
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    entries: HashMap<String, ListeningScore>,
}

impl MemoryScoreStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn get(&self, path: &str) -> Option<ListeningScore> {
        self.entries.get(path).copied()
    }

    fn put(&mut self, path: &str, score: ListeningScore) -> Result<()> {
        self.entries.insert(path.to_string(), score);
        Ok(())
    }
}

impl<S: ScoreStore + ?Sized> ScoreStore for Box<S> {
    fn get(&self, path: &str) -> Option<ListeningScore> {
        (**self).get(path)
    }

    fn put(&mut self, path: &str, score: ListeningScore) -> Result<()> {
        (**self).put(path, score)
    }
}

/// Records one listen of `path` that stopped at `elapsed` of `duration` seconds.
///
/// Skipped when the duration is unknown, NaN or not positive. A failed write
/// is logged and dropped; returns whether an update was made.
pub fn record_listen<S: ScoreStore + ?Sized>(
    store: &mut S,
    path: &str,
    elapsed: f64,
    duration: Option<f64>,
) -> bool {
    let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
        debug!("Not scoring {path}: duration unknown");
        return false;
    };
    if path.is_empty() || elapsed.is_nan() {
        return false;
    }

    let ratio = elapsed / duration;
    let updated = store.get(path).unwrap_or_default().with_listen(ratio);
    debug!(
        "Scoring {path}: ratio {ratio:.3}, count {}, sum {:.3}",
        updated.count, updated.score_sum
    );
    if let Err(e) = store.put(path, updated) {
        warn!("Failed to persist listening score for {path}: {e:#}");
    }
    true
}
