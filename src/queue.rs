//! # Queue Model
//!
//! The play queue is kept twice: an **ordered** list in insertion order and
//! an **active** list that playback walks. With shuffle off the two are
//! identical; with shuffle on the active list is a permutation of the ordered
//! one. A current-position pointer indexes the active list.
//!
//! ## Invariants
//!
//! After every operation:
//! - no track path appears twice in the ordered list
//! - the active list has the same tracks as the ordered list
//! - `current` is `None` exactly when the queue is empty, otherwise it is a
//!   valid index into the active list
//!
//! Index-taking operations reject out-of-range values with
//! [`PlayerError::InvalidIndex`] and leave the queue untouched.
//!
//! ## Batching
//!
//! [`QueueModel::add_track`] accepts a `defer` flag. Deferred additions only
//! touch the ordered list; the next non-deferred call rebuilds the active list
//! once for the whole batch, which is how [`QueueModel::add_album`] adds an
//! album with a single rebuild.

use log::debug;
use rand::Rng;

use crate::catalog::{Catalog, TrackRef};
use crate::error::{IgnoreReason, Outcome, PlayerError, PlayerResult};
use crate::shuffle;

/// Ordered and active play queues plus the current position
#[derive(Debug, Clone, Default)]
pub struct QueueModel {
    ordered: Vec<TrackRef>,
    active: Vec<TrackRef>,
    current: Option<usize>,
    shuffled: bool,
    pending_rebuild: bool,
}

impl QueueModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&TrackRef> {
        self.current.and_then(|i| self.active.get(i))
    }

    #[must_use]
    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Tracks in insertion order
    #[must_use]
    pub fn ordered(&self) -> &[TrackRef] {
        &self.ordered
    }

    /// Tracks in playback order
    #[must_use]
    pub fn active(&self) -> &[TrackRef] {
        &self.active
    }

    /// Display names of the active queue
    #[must_use]
    pub fn titles(&self) -> Vec<&str> {
        self.active.iter().map(TrackRef::display_name).collect()
    }

    /// Track paths of the active queue
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.active.iter().map(TrackRef::path).collect()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.ordered.iter().any(|t| t.has_path(path))
    }

    /// Position of `path` in the active queue
    #[must_use]
    pub fn position_of(&self, path: &str) -> Option<usize> {
        self.active.iter().position(|t| t.has_path(path))
    }

    /// Track at `index` of the active queue.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` when `index >= len()`.
    pub fn get(&self, index: usize) -> PlayerResult<&TrackRef> {
        self.active.get(index).ok_or(PlayerError::InvalidIndex {
            index,
            len: self.active.len(),
        })
    }

    /// Moves the current pointer.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` when `index >= len()`; the pointer is unchanged.
    pub fn set_current(&mut self, index: usize) -> PlayerResult<()> {
        self.get(index)?;
        self.current = Some(index);
        Ok(())
    }

    /// Index after the current one, wrapping to 0
    #[must_use]
    pub fn next_index(&self) -> Option<usize> {
        let len = self.active.len();
        self.current.filter(|_| len > 0).map(|c| (c + 1) % len)
    }

    /// Index before the current one, wrapping to the last
    #[must_use]
    pub fn previous_index(&self) -> Option<usize> {
        let len = self.active.len();
        self.current.filter(|_| len > 0).map(|c| (c + len - 1) % len)
    }

    /// Appends one catalog track.
    ///
    /// Duplicates are ignored. Unless `defer` is set, the active queue is
    /// rebuilt (and reshuffled when shuffle is on) before returning.
    ///
    /// # Errors
    ///
    /// `UnknownAlbum` or `InvalidIndex` when the track does not resolve.
    pub fn add_track<R: Rng + ?Sized>(
        &mut self,
        catalog: &Catalog,
        album_id: &str,
        file_index: usize,
        defer: bool,
        rng: &mut R,
    ) -> PlayerResult<Outcome> {
        let track = catalog.resolve(album_id, file_index)?;
        Ok(self.push(track, defer, rng))
    }

    /// Appends an already-resolved track, same rules as [`Self::add_track`]
    pub fn push<R: Rng + ?Sized>(&mut self, track: TrackRef, defer: bool, rng: &mut R) -> Outcome {
        let outcome = if self.contains(&track.path()) {
            debug!("Skipping duplicate queue entry {}", track.path());
            Outcome::Ignored(IgnoreReason::Duplicate)
        } else {
            self.ordered.push(track);
            self.pending_rebuild = true;
            Outcome::Applied
        };

        if !defer && self.pending_rebuild {
            self.rebuild_active(rng);
        }
        outcome
    }

    /// Adds every track of an album with one rebuild at the end.
    ///
    /// Returns how many tracks were new. An album with no files is a no-op.
    ///
    /// # Errors
    ///
    /// `UnknownAlbum` when the album is not in the catalog.
    pub fn add_album<R: Rng + ?Sized>(
        &mut self,
        catalog: &Catalog,
        album_id: &str,
        rng: &mut R,
    ) -> PlayerResult<usize> {
        let files = catalog
            .album(album_id)
            .ok_or_else(|| PlayerError::UnknownAlbum(album_id.to_string()))?;

        let last = files.len().saturating_sub(1);
        let mut added = 0;
        for index in 0..files.len() {
            if self.add_track(catalog, album_id, index, index != last, rng)?.is_applied() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes the entry at `index` of the active queue from both lists.
    ///
    /// The caller is responsible for moving playback off the current track
    /// first; if `index` is still current afterwards the pointer stays on the
    /// same slot (clamped), or becomes `None` when the queue empties.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` when `index >= len()`.
    pub fn remove_at(&mut self, index: usize) -> PlayerResult<TrackRef> {
        self.get(index)?;
        let removed = self.active.remove(index);
        if let Some(pos) = self.ordered.iter().position(|t| *t == removed) {
            self.ordered.remove(pos);
        }

        self.current = match self.current {
            _ if self.active.is_empty() => None,
            Some(c) if c > index => Some(c - 1),
            Some(c) => Some(c.min(self.active.len() - 1)),
            None => Some(0),
        };
        Ok(removed)
    }

    /// Empties both lists; the shuffle flag is kept
    pub fn clear(&mut self) {
        self.ordered.clear();
        self.active.clear();
        self.current = None;
        self.pending_rebuild = false;
    }

    /// Replaces the whole queue, current pointer at 0
    pub fn replace_with<R: Rng + ?Sized>(&mut self, tracks: Vec<TrackRef>, rng: &mut R) {
        self.clear();
        for track in tracks {
            self.push(track, true, rng);
        }
        self.rebuild_active(rng);
        self.current = (!self.active.is_empty()).then_some(0);
    }

    /// Flips shuffle mode.
    ///
    /// On: the active list is permuted in place and the pointer follows the
    /// current track. Off: the active list becomes a copy of the ordered one
    /// and the pointer is found again by path.
    pub fn toggle_shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.shuffled = !self.shuffled;
        if self.shuffled {
            self.current = shuffle::shuffle_tracking(&mut self.active, self.current, rng);
        } else {
            let loaded = self.current().map(TrackRef::path);
            let (restored, current) = shuffle::restore_order(&self.ordered, loaded.as_deref());
            self.active = restored;
            self.current = current;
        }
        debug!("Shuffle {}", if self.shuffled { "on" } else { "off" });
    }

    /// Rebuilds the active list from the ordered one, keeping the current track
    fn rebuild_active<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let loaded = self.current().map(TrackRef::path);
        let (mut active, current) = shuffle::restore_order(&self.ordered, loaded.as_deref());
        self.current = if self.shuffled {
            shuffle::shuffle_tracking(&mut active, current, rng)
        } else {
            current
        };
        self.active = active;
        self.pending_rebuild = false;
    }
}
