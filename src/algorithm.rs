//! Listening-weighted playlist sampling.
//!
//! Builds a queue by drawing random catalog tracks and keeping each one with
//! a probability that grows with its listening score.
//!
//! # Acceptance
//!
//! ```text
//! base   = random_weight / target
//! p(t)   = base + (1 - base) * score(t)
//! ```
//!
//! Every track keeps at least `base` chance of being picked no matter its
//! history; a track that is always played to the end is always kept. Tracks
//! without history use the neutral entry (`count 1`, `sum 0.5`).
//!
//! # Termination
//!
//! Drawn indices are remembered whether accepted or not. Drawing an index a
//! second time is a stall; stalls reset on every acceptance and sampling
//! stops once they reach `max(1, target / 10)`, or as soon as every index
//! has been drawn. With a catalog smaller than the target the loop ends once
//! the catalog is exhausted.

use std::collections::HashSet;

use log::debug;
use rand::Rng;

use crate::catalog::{Catalog, TrackRef};
use crate::scores::{ListeningScore, ScoreStore};

/// Sampling parameters
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Wanted queue length
    pub target: usize,
    /// Floor weight shared by every track, in "tracks per target"
    pub random_weight: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            target: 200,
            random_weight: 5.0,
        }
    }
}

impl SamplerConfig {
    /// Chance every track gets regardless of score
    #[must_use]
    pub fn base_probability(&self) -> f64 {
        match self.target {
            0 => 1.0,
            #[allow(clippy::cast_precision_loss)]
            target => {
                let base = self.random_weight / target as f64;
                if base.is_nan() { 0.0 } else { base.clamp(0.0, 1.0) }
            }
        }
    }

    /// Stalls tolerated between two acceptances
    #[must_use]
    pub fn stall_limit(&self) -> usize {
        (self.target / 10).max(1)
    }
}

/// Acceptance probability for a track with average score `score`
#[must_use]
pub fn acceptance_probability(base: f64, score: f64) -> f64 {
    let score = if score.is_nan() { 0.5 } else { score.clamp(0.0, 1.0) };
    (base + (1.0 - base) * score).clamp(0.0, 1.0)
}

/// Draws up to `config.target` distinct tracks from `catalog`.
///
/// An empty catalog or a zero target yields an empty list.
///
/// # Examples
///
/// ```
/// use cadence::algorithm::{build_weighted, SamplerConfig};
/// use cadence::catalog::Catalog;
/// use cadence::scores::MemoryScoreStore;
/// use rand::SeedableRng;
///
/// let catalog = Catalog::from_albums([("A", vec!["1.mp3", "2.mp3", "3.mp3"])]);
/// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
/// let queue = build_weighted(&catalog, &MemoryScoreStore::new(), SamplerConfig::default(), &mut rng);
/// assert!(queue.len() <= 3);
/// ```
pub fn build_weighted<S, R>(
    catalog: &Catalog,
    scores: &S,
    config: SamplerConfig,
    rng: &mut R,
) -> Vec<TrackRef>
where
    S: ScoreStore + ?Sized,
    R: Rng + ?Sized,
{
    let tracks: Vec<TrackRef> = catalog.tracks().collect();
    if tracks.is_empty() || config.target == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = tracks
        .iter()
        .map(|track| {
            scores
                .get(&track.path())
                .filter(|entry| entry.count > 0)
                .unwrap_or(ListeningScore::NEUTRAL)
                .score()
        })
        .collect();

    let base = config.base_probability();
    let stall_limit = config.stall_limit();
    let mut visited: HashSet<usize> = HashSet::with_capacity(tracks.len().min(config.target.saturating_mul(2)));
    let mut picked: Vec<usize> = Vec::with_capacity(config.target.min(tracks.len()));
    let mut stalls = 0;
    let mut draws = 0usize;

    // Once every index has been drawn nothing further can be accepted
    while picked.len() < config.target && stalls < stall_limit && visited.len() < tracks.len() {
        let index = rng.gen_range(0..tracks.len());
        draws += 1;

        if !visited.insert(index) {
            stalls += 1;
            continue;
        }

        if rng.gen_bool(acceptance_probability(base, weights[index])) {
            picked.push(index);
            stalls = 0;
        }
    }

    debug!(
        "Sampled {} of {} tracks in {draws} draws (base {base:.3}, stalls {stalls})",
        picked.len(),
        tracks.len()
    );

    picked.into_iter().map(|i| tracks[i].clone()).collect()
}
