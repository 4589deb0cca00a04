//! # Playback Coordinator
//!
//! Owns the queue, the single "now playing" session and the playback
//! backend, and turns commands, backend events and timer firings into state
//! transitions. Everything here runs on one thread; see [`crate::runtime`]
//! for the loop that feeds it.
//!
//! ## States
//!
//! ```text
//! Idle ──play──> Loading ──Started──> Playing <──pause/play──> Paused
//!   ^               │                    │
//!   └──clear/stop───┴──── next/prev/choose/track end ───> Loading
//! ```
//!
//! ## Single-flight loads
//!
//! While a backend load has not been acknowledged, every request that would
//! start another load (play, next, previous, choose, auto-advance) is dropped
//! and reported as [`IgnoreReason::LoadInFlight`]. Rapid repeated commands
//! therefore never interleave two teardown/load pairs.
//!
//! ## End-of-track detection
//!
//! Backends are not required to report the end of a track. After each start
//! acknowledgement a two-phase timer is armed: a short settle delay, then
//! `duration - elapsed` measured at that point. This is an estimate; a real
//! [`BackendEvent::TrackEnded`] wins whenever the backend sends one. Each
//! armed timer carries a ticket and any transition invalidates the old ticket,
//! so a superseded timer can never advance the queue.
//!
//! ## Listening scores
//!
//! Leaving a track that was playing records `elapsed / duration` for it.
//! Skips use the elapsed time at the moment of the skip; a natural end counts
//! as the full duration. Tracks that failed to load or play, and tracks
//! dropped by `clear`, are not scored.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::algorithm::{self, SamplerConfig};
use crate::backend::{BackendEvent, PlaybackBackend};
use crate::catalog::{Catalog, TrackRef};
use crate::error::{IgnoreReason, Outcome, PlayerError, PlayerResult};
use crate::queue::QueueModel;
use crate::scores::{self, ScoreStore};

/// Playback session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Change signals for UI consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    QueueChanged,
    PlaybackStateChanged,
    CatalogChanged,
}

/// Which half of the end-of-track timer is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// Waiting for the backend to settle after a start
    Settle,
    /// Waiting for the remaining duration to run out
    Finish,
}

/// An armed end-of-track timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub ticket: u64,
    pub phase: TimerPhase,
    pub deadline: Instant,
}

/// Tunables for the coordinator
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub settle_delay: Duration,
    pub volume: f64,
    pub volume_step: f64,
    pub sampler: SamplerConfig,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(2000),
            volume: 0.5,
            volume_step: 0.02,
            sampler: SamplerConfig::default(),
        }
    }
}

/// How the outgoing track is being left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// User moved away; score with the elapsed time
    Skipped,
    /// Track played out; score as fully heard
    Finished,
    /// Track broke; no score
    Failed,
}

#[derive(Debug, Clone, Default)]
struct Session {
    loaded: Option<String>,
    duration: Option<f64>,
}

/// Queue owner and playback state machine
pub struct Coordinator<B: PlaybackBackend, S: ScoreStore> {
    queue: QueueModel,
    catalog: Arc<Catalog>,
    backend: B,
    scores: S,
    rng: StdRng,
    settings: CoordinatorSettings,
    status: PlaybackStatus,
    session: Session,
    volume: f64,
    load_in_flight: Option<String>,
    timer: Option<ArmedTimer>,
    next_ticket: u64,
    failures: usize,
    subscribers: Vec<Sender<Notification>>,
}

impl<B: PlaybackBackend, S: ScoreStore> Coordinator<B, S> {
    pub fn new(backend: B, scores: S, catalog: Arc<Catalog>, settings: CoordinatorSettings) -> Self {
        Self {
            queue: QueueModel::new(),
            catalog,
            backend,
            scores,
            rng: StdRng::from_entropy(),
            volume: settings.volume.clamp(0.0, 1.0),
            settings,
            status: PlaybackStatus::Idle,
            session: Session::default(),
            load_in_flight: None,
            timer: None,
            next_ticket: 0,
            failures: 0,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the random source, for reproducible shuffles and samples
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Receiver for change notifications
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, notification: Notification) {
        self.subscribers.retain(|tx| tx.send(notification).is_ok());
    }

    // ---------------------------------------------------------------------
    // Read accessors
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    #[must_use]
    pub fn queue(&self) -> &QueueModel {
        &self.queue
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn scores(&self) -> &S {
        &self.scores
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.queue.current_index()
    }

    #[must_use]
    pub fn current_title(&self) -> Option<&str> {
        self.queue.current().map(TrackRef::display_name)
    }

    #[must_use]
    pub fn current_path(&self) -> Option<String> {
        self.queue.current().map(TrackRef::path)
    }

    /// Path the backend has loaded or is loading
    #[must_use]
    pub fn loaded_path(&self) -> Option<&str> {
        self.session.loaded.as_deref()
    }

    #[must_use]
    pub fn elapsed(&self) -> f64 {
        match self.session.loaded {
            Some(_) => self.backend.elapsed(),
            None => 0.0,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.session.duration
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    #[must_use]
    pub fn is_shuffled(&self) -> bool {
        self.queue.is_shuffled()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.load_in_flight.is_some()
    }

    /// End-of-track timer currently armed, if any
    #[must_use]
    pub fn pending_timer(&self) -> Option<ArmedTimer> {
        self.timer
    }

    // ---------------------------------------------------------------------
    // Playback commands
    // ---------------------------------------------------------------------

    /// Starts or resumes the current track.
    ///
    /// A paused track is resumed without reloading; an idle session loads
    /// the current track. An empty queue makes no backend call at all.
    pub fn play(&mut self) -> Outcome {
        if self.queue.is_empty() {
            return Outcome::Ignored(IgnoreReason::EmptyQueue);
        }
        if self.load_in_flight.is_some() {
            return Outcome::Ignored(IgnoreReason::LoadInFlight);
        }

        match self.status {
            PlaybackStatus::Playing | PlaybackStatus::Loading => Outcome::Ignored(IgnoreReason::AlreadyPlaying),
            PlaybackStatus::Paused if self.session.loaded == self.current_path() => self.resume(),
            PlaybackStatus::Paused | PlaybackStatus::Idle => self.play_current(),
        }
    }

    fn resume(&mut self) -> Outcome {
        if let Err(e) = self.backend.play() {
            error!("Backend refused to resume: {e}");
            return self.fail_current();
        }
        info!("Resumed {}", self.current_title().unwrap_or_default());
        self.status = PlaybackStatus::Playing;
        self.arm_timer(TimerPhase::Settle, self.settings.settle_delay);
        self.notify(Notification::PlaybackStateChanged);
        Outcome::Applied
    }

    /// Pauses a playing track; any other state is left alone
    pub fn pause(&mut self) -> Outcome {
        if self.status != PlaybackStatus::Playing {
            return Outcome::Ignored(IgnoreReason::NotPlaying);
        }
        if let Err(e) = self.backend.pause() {
            warn!("Backend refused to pause: {e}");
            return Outcome::Ignored(IgnoreReason::NotPlaying);
        }
        self.cancel_timer();
        self.status = PlaybackStatus::Paused;
        self.notify(Notification::PlaybackStateChanged);
        Outcome::Applied
    }

    /// Pause when playing, play otherwise
    pub fn toggle(&mut self) -> Outcome {
        match self.status {
            PlaybackStatus::Playing => self.pause(),
            _ => self.play(),
        }
    }

    /// Stops playback without scoring; the queue and position are kept
    pub fn stop(&mut self) -> Outcome {
        if self.status == PlaybackStatus::Idle && self.session.loaded.is_none() {
            return Outcome::Ignored(IgnoreReason::NotPlaying);
        }
        self.halt();
        Outcome::Applied
    }

    /// Advances to the next track, wrapping at the end
    pub fn next(&mut self) -> Outcome {
        match self.queue.next_index() {
            None => Outcome::Ignored(IgnoreReason::EmptyQueue),
            Some(_) if self.load_in_flight.is_some() => Outcome::Ignored(IgnoreReason::LoadInFlight),
            Some(index) => self.transition_to(index, Departure::Skipped),
        }
    }

    /// Steps back one track, wrapping to the last
    pub fn previous(&mut self) -> Outcome {
        match self.queue.previous_index() {
            None => Outcome::Ignored(IgnoreReason::EmptyQueue),
            Some(_) if self.load_in_flight.is_some() => Outcome::Ignored(IgnoreReason::LoadInFlight),
            Some(index) => self.transition_to(index, Departure::Skipped),
        }
    }

    /// Jumps to `index` of the active queue.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` when `index` is out of range; nothing changes.
    pub fn choose_track(&mut self, index: usize) -> PlayerResult<Outcome> {
        let target = self.queue.get(index)?.path();
        if self.load_in_flight.is_some() {
            return Ok(Outcome::Ignored(IgnoreReason::LoadInFlight));
        }
        if self.status == PlaybackStatus::Playing && self.session.loaded.as_deref() == Some(target.as_str()) {
            return Ok(Outcome::Ignored(IgnoreReason::AlreadyPlaying));
        }
        Ok(self.transition_to(index, Departure::Skipped))
    }

    /// Sets the output volume, clamped to `0.0..=1.0`
    pub fn set_volume(&mut self, volume: f64) -> Outcome {
        let volume = if volume.is_nan() { self.volume } else { volume.clamp(0.0, 1.0) };
        self.volume = (volume * 100.0).round() / 100.0;
        if let Err(e) = self.backend.set_volume(self.volume) {
            warn!("Failed to apply volume {:.2}: {e}", self.volume);
        }
        self.notify(Notification::PlaybackStateChanged);
        Outcome::Applied
    }

    pub fn volume_up(&mut self) -> Outcome {
        self.set_volume(self.volume + self.settings.volume_step)
    }

    pub fn volume_down(&mut self) -> Outcome {
        self.set_volume(self.volume - self.settings.volume_step)
    }

    // ---------------------------------------------------------------------
    // Queue commands
    // ---------------------------------------------------------------------

    /// Queues one catalog track; starts playback when the session is idle.
    ///
    /// # Errors
    ///
    /// `UnknownAlbum` or `InvalidIndex` when the track does not resolve.
    pub fn add_track(&mut self, album_id: &str, file_index: usize) -> PlayerResult<Outcome> {
        let track = self.catalog.resolve(album_id, file_index)?;
        let outcome = self.queue.push(track.clone(), false, &mut self.rng);
        if outcome.is_applied() {
            info!("Queued {}", track.display_name());
            self.after_add(&track);
        }
        Ok(outcome)
    }

    /// Queues a whole album with one notification and at most one playback start.
    ///
    /// # Errors
    ///
    /// `UnknownAlbum` when the album is not in the catalog.
    pub fn add_album(&mut self, album_id: &str) -> PlayerResult<Outcome> {
        let catalog = Arc::clone(&self.catalog);
        let first_new = catalog
            .album(album_id)
            .ok_or_else(|| PlayerError::UnknownAlbum(album_id.to_string()))?
            .iter()
            .map(|file| TrackRef::new(album_id, file.as_str()))
            .find(|track| !self.queue.contains(&track.path()));

        let added = self.queue.add_album(&catalog, album_id, &mut self.rng)?;
        match first_new {
            Some(track) if added > 0 => {
                info!("Queued {added} tracks from {album_id}");
                self.after_add(&track);
                Ok(Outcome::Applied)
            }
            _ => Ok(Outcome::Ignored(IgnoreReason::Duplicate)),
        }
    }

    fn after_add(&mut self, first_new: &TrackRef) {
        self.notify(Notification::QueueChanged);
        if self.status != PlaybackStatus::Idle || self.load_in_flight.is_some() {
            return;
        }
        if let Some(index) = self.queue.position_of(&first_new.path()) {
            if self.queue.set_current(index).is_ok() {
                self.play_current();
            }
        }
    }

    /// Removes `index` from the queue.
    ///
    /// Removing the loaded track scores it as a skip, takes it out of the
    /// queue and then plays the entry that took its slot (wrapping to the
    /// top). The removed track is never reloaded; when nothing playable is
    /// left the session stops.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` when `index` is out of range; nothing changes.
    pub fn remove_at(&mut self, index: usize) -> PlayerResult<Outcome> {
        self.queue.get(index)?;
        let removing_current = self.queue.current_index() == Some(index) && self.status != PlaybackStatus::Idle;

        if !removing_current {
            let removed = self.queue.remove_at(index)?;
            debug!("Removed {} from queue", removed.path());
            self.notify(Notification::QueueChanged);
            return Ok(Outcome::Applied);
        }

        if self.load_in_flight.is_some() {
            return Ok(Outcome::Ignored(IgnoreReason::LoadInFlight));
        }
        self.depart(Departure::Skipped);
        self.halt();

        let removed = self.queue.remove_at(index)?;
        debug!("Removed playing track {} from queue", removed.path());
        if !self.queue.is_empty() {
            let successor = if index < self.queue.len() { index } else { 0 };
            self.queue.set_current(successor)?;
        }
        self.notify(Notification::QueueChanged);

        if !self.queue.is_empty() {
            self.play_current();
        }
        Ok(Outcome::Applied)
    }

    /// Empties the queue and stops playback; nothing is scored
    pub fn clear(&mut self) -> Outcome {
        self.halt();
        self.queue.clear();
        info!("Queue cleared");
        self.notify(Notification::QueueChanged);
        Outcome::Applied
    }

    /// Flips shuffle mode, keeping the current track in place
    pub fn toggle_shuffle(&mut self) -> Outcome {
        if self.queue.is_empty() {
            return Outcome::Ignored(IgnoreReason::EmptyQueue);
        }
        self.queue.toggle_shuffle(&mut self.rng);
        info!("Shuffle {}", if self.queue.is_shuffled() { "on" } else { "off" });
        self.notify(Notification::QueueChanged);
        Outcome::Applied
    }

    /// Replaces the queue with a listening-weighted sample and plays from the top
    pub fn auto_queue(&mut self) -> Outcome {
        let tracks = algorithm::build_weighted(&self.catalog, &self.scores, self.settings.sampler, &mut self.rng);
        self.clear();
        if tracks.is_empty() {
            return Outcome::Ignored(IgnoreReason::EmptyQueue);
        }

        info!("Auto queue built with {} tracks", tracks.len());
        self.queue.replace_with(tracks, &mut self.rng);
        self.notify(Notification::QueueChanged);
        self.play_current();
        Outcome::Applied
    }

    /// Installs a new catalog snapshot
    pub fn replace_catalog(&mut self, catalog: Arc<Catalog>) {
        debug!("Catalog now has {} tracks", catalog.track_count());
        self.catalog = catalog;
        self.notify(Notification::CatalogChanged);
    }

    // ---------------------------------------------------------------------
    // Backend events and timers
    // ---------------------------------------------------------------------

    /// Applies an event reported by the backend
    pub fn on_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Started { path, duration } => self.on_started(&path, duration),
            BackendEvent::DurationKnown { path, seconds } => self.on_duration(&path, seconds),
            BackendEvent::TrackEnded { path } => {
                if self.is_session_path(&path) {
                    debug!("Backend reports end of {path}");
                    self.load_in_flight = None;
                    self.advance(Departure::Finished);
                } else {
                    debug!("Ignoring stale end signal for {path}");
                }
            }
            BackendEvent::Error { path, reason } => {
                if self.is_session_path(&path) {
                    error!("Playback of {path} failed: {reason}");
                    self.load_in_flight = None;
                    self.fail_current();
                } else {
                    debug!("Ignoring stale backend error for {path}: {reason}");
                }
            }
        }
    }

    fn is_session_path(&self, path: &str) -> bool {
        self.session.loaded.as_deref() == Some(path) || self.load_in_flight.as_deref() == Some(path)
    }

    fn on_started(&mut self, path: &str, duration: Option<f64>) {
        if self.load_in_flight.as_deref() != Some(path) {
            debug!("Ignoring start acknowledgement for superseded load {path}");
            return;
        }
        self.load_in_flight = None;
        self.failures = 0;
        self.status = PlaybackStatus::Playing;
        self.session.duration = duration.filter(|d| d.is_finite() && *d > 0.0);
        if let Err(e) = self.backend.set_volume(self.volume) {
            warn!("Failed to apply volume on start: {e}");
        }
        info!("Playing {}", self.current_title().unwrap_or(path));
        self.arm_timer(TimerPhase::Settle, self.settings.settle_delay);
        self.notify(Notification::PlaybackStateChanged);
    }

    fn on_duration(&mut self, path: &str, seconds: f64) {
        if self.session.loaded.as_deref() != Some(path) || !seconds.is_finite() || seconds <= 0.0 {
            return;
        }
        self.session.duration = Some(seconds);
        // Settle phase already over but had no duration to work with
        if self.status == PlaybackStatus::Playing && self.timer.is_none() {
            self.arm_finish_timer();
        }
        self.notify(Notification::PlaybackStateChanged);
    }

    /// Fires the timer holding `ticket`; returns false when it was superseded
    pub fn fire_timer(&mut self, ticket: u64) -> bool {
        let Some(timer) = self.timer.filter(|t| t.ticket == ticket) else {
            debug!("Dropping stale timer {ticket}");
            return false;
        };
        self.timer = None;

        match timer.phase {
            TimerPhase::Settle => self.arm_finish_timer(),
            TimerPhase::Finish => {
                debug!("Estimated end of {}", self.session.loaded.as_deref().unwrap_or("?"));
                self.advance(Departure::Finished);
            }
        }
        true
    }

    /// Fires the armed timer if its deadline has passed
    pub fn fire_due_timer(&mut self, now: Instant) -> bool {
        match self.timer {
            Some(timer) if timer.deadline <= now => self.fire_timer(timer.ticket),
            _ => false,
        }
    }

    fn arm_finish_timer(&mut self) {
        let Some(duration) = self.session.duration else {
            debug!("Duration unknown; waiting for the backend before arming end timer");
            return;
        };
        let remaining = (duration - self.backend.elapsed()).max(0.0);
        self.arm_timer(TimerPhase::Finish, Duration::from_secs_f64(remaining));
    }

    fn arm_timer(&mut self, phase: TimerPhase, delay: Duration) {
        self.next_ticket += 1;
        self.timer = Some(ArmedTimer {
            ticket: self.next_ticket,
            phase,
            deadline: Instant::now() + delay,
        });
        debug!("Armed {phase:?} timer #{} for {delay:?}", self.next_ticket);
    }

    fn cancel_timer(&mut self) {
        if self.timer.take().is_some() {
            self.next_ticket += 1;
        }
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    fn advance(&mut self, departure: Departure) {
        if let Some(index) = self.queue.next_index() {
            self.transition_to(index, departure);
        } else {
            self.halt();
        }
    }

    /// Records the outgoing track, tears it down and loads `index`
    fn transition_to(&mut self, index: usize, departure: Departure) -> Outcome {
        self.depart(departure);
        self.cancel_timer();
        self.teardown();
        if self.queue.set_current(index).is_err() {
            self.halt();
            return Outcome::Ignored(IgnoreReason::EmptyQueue);
        }
        self.notify(Notification::QueueChanged);
        self.play_current()
    }

    fn depart(&mut self, departure: Departure) {
        let Some(path) = self.session.loaded.clone() else {
            return;
        };
        if !matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
            return;
        }
        let elapsed = match departure {
            Departure::Skipped => self.backend.elapsed(),
            Departure::Finished => self.session.duration.unwrap_or(f64::NAN),
            Departure::Failed => return,
        };
        scores::record_listen(&mut self.scores, &path, elapsed, self.session.duration);
    }

    fn teardown(&mut self) {
        if self.session.loaded.is_some() {
            if let Err(e) = self.backend.teardown() {
                warn!("Backend teardown failed: {e}");
            }
        }
        self.session = Session::default();
        self.status = PlaybackStatus::Idle;
    }

    /// Stops everything and settles in `Idle`, keeping the queue position
    fn halt(&mut self) {
        self.cancel_timer();
        self.teardown();
        self.load_in_flight = None;
        self.failures = 0;
        self.notify(Notification::PlaybackStateChanged);
    }

    /// Loads the current track, skipping ahead past tracks that cannot load.
    ///
    /// Gives up and halts after one full pass of consecutive failures.
    fn play_current(&mut self) -> Outcome {
        loop {
            let Some(path) = self.current_path() else {
                self.halt();
                return Outcome::Ignored(IgnoreReason::EmptyQueue);
            };
            if self.status == PlaybackStatus::Playing && self.session.loaded.as_deref() == Some(path.as_str()) {
                return Outcome::Ignored(IgnoreReason::AlreadyPlaying);
            }
            if self.load_in_flight.is_some() {
                return Outcome::Ignored(IgnoreReason::LoadInFlight);
            }

            self.cancel_timer();
            self.teardown();

            let refused = if self.backend.source_exists(&path) {
                self.backend.load(&path).map_err(PlayerError::from)
            } else {
                Err(PlayerError::MissingFile(path.clone().into()))
            };

            match refused {
                Ok(()) => {
                    debug!("Loading {path}");
                    self.session.loaded = Some(path.clone());
                    self.load_in_flight = Some(path);
                    self.status = PlaybackStatus::Loading;
                    self.notify(Notification::PlaybackStateChanged);
                    return Outcome::Applied;
                }
                Err(e) => {
                    warn!("Skipping unplayable track: {e}");
                    if !self.step_past_failure() {
                        return Outcome::Applied;
                    }
                }
            }
        }
    }

    /// Counts a failure and moves the pointer on; false once every track failed
    fn step_past_failure(&mut self) -> bool {
        self.failures += 1;
        if self.failures >= self.queue.len() {
            error!("No playable track in queue after {} attempts", self.failures);
            self.halt();
            return false;
        }
        match self.queue.next_index() {
            Some(index) => self.queue.set_current(index).is_ok(),
            None => false,
        }
    }

    /// Handles a track that broke after its load was accepted
    fn fail_current(&mut self) -> Outcome {
        self.depart(Departure::Failed);
        self.cancel_timer();
        self.teardown();
        if !self.step_past_failure() {
            return Outcome::Applied;
        }
        self.notify(Notification::QueueChanged);
        self.play_current()
    }
}

impl<B: PlaybackBackend, S: ScoreStore> std::fmt::Debug for Coordinator<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("status", &self.status)
            .field("current", &self.queue.current_index())
            .field("queue_len", &self.queue.len())
            .field("loaded", &self.session.loaded)
            .field("load_in_flight", &self.load_in_flight)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResult};
    use crate::scores::{ListeningScore, MemoryScoreStore};
    use std::collections::HashSet;

    /// Records calls; loads are acknowledged only when the test says so
    #[derive(Debug, Default)]
    struct ScriptedBackend {
        calls: Vec<String>,
        elapsed: f64,
        missing: HashSet<String>,
        refuse: HashSet<String>,
    }

    impl ScriptedBackend {
        fn loads(&self) -> usize {
            self.calls.iter().filter(|c| c.starts_with("load ")).count()
        }
    }

    impl PlaybackBackend for ScriptedBackend {
        fn load(&mut self, path: &str) -> BackendResult<()> {
            if self.refuse.contains(path) {
                return Err(BackendError::Load(format!("cannot decode {path}")));
            }
            self.calls.push(format!("load {path}"));
            Ok(())
        }

        fn play(&mut self) -> BackendResult<()> {
            self.calls.push("play".into());
            Ok(())
        }

        fn pause(&mut self) -> BackendResult<()> {
            self.calls.push("pause".into());
            Ok(())
        }

        fn teardown(&mut self) -> BackendResult<()> {
            self.calls.push("teardown".into());
            Ok(())
        }

        fn set_volume(&mut self, volume: f64) -> BackendResult<()> {
            self.calls.push(format!("volume {volume:.2}"));
            Ok(())
        }

        fn elapsed(&self) -> f64 {
            self.elapsed
        }

        fn source_exists(&self, path: &str) -> bool {
            !self.missing.contains(path)
        }
    }

    type TestCoordinator = Coordinator<ScriptedBackend, MemoryScoreStore>;

    fn coordinator(albums: &[(&str, &[&str])]) -> TestCoordinator {
        let catalog = Catalog::from_albums(albums.iter().map(|(a, files)| (*a, files.to_vec())));
        Coordinator::new(
            ScriptedBackend::default(),
            MemoryScoreStore::new(),
            Arc::new(catalog),
            CoordinatorSettings::default(),
        )
        .with_seed(17)
    }

    fn ack(c: &mut TestCoordinator, duration: f64) {
        let path = c.loaded_path().expect("a load should be pending").to_string();
        c.on_backend_event(BackendEvent::Started { path, duration: Some(duration) });
    }

    #[test]
    fn test_play_on_empty_queue_does_nothing() {
        let mut c = coordinator(&[("A", &["1.mp3"])]);
        assert_eq!(c.play(), Outcome::Ignored(IgnoreReason::EmptyQueue));
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(c.backend().calls.is_empty());
    }

    #[test]
    fn test_add_album_starts_playback_once() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        let rx = c.subscribe();
        c.add_album("A")?;

        assert_eq!(c.queue().titles(), vec!["1", "2"]);
        assert_eq!(c.status(), PlaybackStatus::Loading);
        assert_eq!(c.backend().loads(), 1);
        let queue_changes = rx.try_iter().filter(|n| *n == Notification::QueueChanged).count();
        assert_eq!(queue_changes, 1);
        Ok(())
    }

    #[test]
    fn test_double_play_loads_once() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        c.stop();
        assert_eq!(c.play(), Outcome::Applied);
        assert_eq!(c.play(), Outcome::Ignored(IgnoreReason::LoadInFlight));
        ack(&mut c, 100.0);
        assert_eq!(c.play(), Outcome::Ignored(IgnoreReason::AlreadyPlaying));
        assert_eq!(c.backend().loads(), 2);
        Ok(())
    }

    #[test]
    fn test_next_scores_and_wraps() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 200.0);
        c.backend.elapsed = 50.0;

        assert_eq!(c.next(), Outcome::Applied);
        assert_eq!(c.current_index(), Some(1));
        let entry = c.scores().get("A/1.mp3").expect("score recorded");
        assert_eq!(entry.count, 1);
        assert!((entry.score_sum - 0.25).abs() < 1e-9);

        ack(&mut c, 200.0);
        assert_eq!(c.next(), Outcome::Applied);
        assert_eq!(c.current_index(), Some(0));
        Ok(())
    }

    #[test]
    fn test_previous_wraps_to_end() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3", "3.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 10.0);
        c.previous();
        assert_eq!(c.current_index(), Some(2));
        Ok(())
    }

    #[test]
    fn test_rapid_next_is_single_flight() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3", "3.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 10.0);

        assert_eq!(c.next(), Outcome::Applied);
        assert_eq!(c.next(), Outcome::Ignored(IgnoreReason::LoadInFlight));
        assert_eq!(c.previous(), Outcome::Ignored(IgnoreReason::LoadInFlight));
        assert_eq!(c.current_index(), Some(1));
        assert_eq!(c.backend().loads(), 2);
        Ok(())
    }

    #[test]
    fn test_stale_start_ack_is_ignored() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        c.clear();
        c.on_backend_event(BackendEvent::Started {
            path: "A/1.mp3".into(),
            duration: Some(5.0),
        });
        assert_eq!(c.status(), PlaybackStatus::Idle);
        Ok(())
    }

    #[test]
    fn test_choose_track_bounds() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 10.0);

        assert!(matches!(c.choose_track(5), Err(PlayerError::InvalidIndex { index: 5, len: 2 })));
        assert_eq!(c.current_index(), Some(0));
        assert_eq!(c.choose_track(0)?, Outcome::Ignored(IgnoreReason::AlreadyPlaying));
        assert_eq!(c.choose_track(1)?, Outcome::Applied);
        assert_eq!(c.loaded_path(), Some("A/2.mp3"));
        Ok(())
    }

    #[test]
    fn test_pause_resume_without_reload() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3"])]);
        c.add_album("A")?;
        assert_eq!(c.pause(), Outcome::Ignored(IgnoreReason::NotPlaying));
        ack(&mut c, 60.0);

        assert_eq!(c.pause(), Outcome::Applied);
        assert_eq!(c.status(), PlaybackStatus::Paused);
        assert!(c.pending_timer().is_none());

        assert_eq!(c.toggle(), Outcome::Applied);
        assert_eq!(c.status(), PlaybackStatus::Playing);
        assert_eq!(c.backend().loads(), 1);
        assert!(c.backend().calls.contains(&"play".to_string()));

        // Resuming re-arms both phases; the finish phase uses the position at settle time
        let settle = c.pending_timer().expect("settle timer re-armed on resume");
        assert_eq!(settle.phase, TimerPhase::Settle);
        c.backend.elapsed = 45.0;
        let before = Instant::now();
        assert!(c.fire_timer(settle.ticket));

        let finish = c.pending_timer().expect("finish timer armed after resume");
        assert_eq!(finish.phase, TimerPhase::Finish);
        let remaining = finish.deadline.saturating_duration_since(before);
        assert!(remaining >= Duration::from_secs(15), "got {remaining:?}");
        assert!(remaining <= Duration::from_secs(16), "got {remaining:?}");
        assert_eq!(c.current_index(), Some(0));
        Ok(())
    }

    #[test]
    fn test_two_phase_timer_advances_and_scores_full() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 120.0);

        let settle = c.pending_timer().expect("settle timer armed");
        assert_eq!(settle.phase, TimerPhase::Settle);
        c.backend.elapsed = 100.0;
        assert!(c.fire_timer(settle.ticket));

        let finish = c.pending_timer().expect("finish timer armed");
        assert_eq!(finish.phase, TimerPhase::Finish);
        let remaining = finish.deadline.saturating_duration_since(Instant::now());
        assert!(remaining <= Duration::from_secs(20));

        assert!(c.fire_timer(finish.ticket));
        assert_eq!(c.current_index(), Some(1));
        let entry = c.scores().get("A/1.mp3").expect("score recorded");
        assert_eq!(entry, ListeningScore { count: 1, score_sum: 1.0 });
        Ok(())
    }

    #[test]
    fn test_stale_timer_never_advances() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3", "3.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);
        let old = c.pending_timer().expect("timer armed");

        c.next();
        assert!(!c.fire_timer(old.ticket));
        assert_eq!(c.current_index(), Some(1));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_skipped_without_loading() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.backend.missing.insert("A/1.mp3".into());
        c.add_album("A")?;

        assert_eq!(c.loaded_path(), Some("A/2.mp3"));
        assert_eq!(c.current_index(), Some(1));
        assert!(!c.backend().calls.iter().any(|call| call == "load A/1.mp3"));
        assert!(c.scores().get("A/1.mp3").is_none());
        Ok(())
    }

    #[test]
    fn test_all_tracks_broken_settles_idle() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.backend.missing.insert("A/1.mp3".into());
        c.backend.refuse.insert("A/2.mp3".into());
        c.add_album("A")?;

        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(!c.is_loading());
        assert!(c.current_index().is_some());
        Ok(())
    }

    #[test]
    fn test_backend_error_advances() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);
        c.on_backend_event(BackendEvent::Error {
            path: "A/1.mp3".into(),
            reason: "decode error".into(),
        });
        assert_eq!(c.loaded_path(), Some("A/2.mp3"));
        assert!(c.scores().get("A/1.mp3").is_none());
        Ok(())
    }

    #[test]
    fn test_track_end_signal_is_authoritative() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);
        let timer = c.pending_timer().expect("timer armed");

        c.on_backend_event(BackendEvent::TrackEnded { path: "A/1.mp3".into() });
        assert_eq!(c.current_index(), Some(1));
        assert!(!c.fire_timer(timer.ticket));
        Ok(())
    }

    #[test]
    fn test_remove_current_advances_first() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3", "3.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);

        assert_eq!(c.remove_at(0)?, Outcome::Applied);
        assert_eq!(c.queue().titles(), vec!["2", "3"]);
        assert_eq!(c.current_index(), Some(0));
        assert_eq!(c.loaded_path(), Some("A/2.mp3"));
        Ok(())
    }

    #[test]
    fn test_remove_current_never_reloads_removed_track() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);
        c.backend.elapsed = 6.0;
        c.backend.missing.insert("A/2.mp3".into());

        assert_eq!(c.remove_at(0)?, Outcome::Applied);
        assert_eq!(c.queue().paths(), vec!["A/2.mp3".to_string()]);
        assert_eq!(c.backend().loads(), 1);
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert_eq!(c.loaded_path(), None);
        assert!(!c.is_loading());
        let entry = c.scores().get("A/1.mp3").expect("removed track scored as a skip");
        assert!((entry.score_sum - 0.2).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_remove_current_at_end_wraps_to_top() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3", "3.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);
        c.choose_track(2)?;
        ack(&mut c, 30.0);

        assert_eq!(c.remove_at(2)?, Outcome::Applied);
        assert_eq!(c.queue().titles(), vec!["1", "2"]);
        assert_eq!(c.current_index(), Some(0));
        assert_eq!(c.loaded_path(), Some("A/1.mp3"));
        assert_eq!(c.current_path().as_deref(), c.loaded_path());
        Ok(())
    }

    #[test]
    fn test_remove_only_track_stops() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);

        c.remove_at(0)?;
        assert!(c.queue().is_empty());
        assert_eq!(c.current_index(), None);
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(matches!(c.remove_at(0), Err(PlayerError::InvalidIndex { .. })));
        Ok(())
    }

    #[test]
    fn test_clear_does_not_score() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        ack(&mut c, 30.0);
        c.backend.elapsed = 10.0;

        c.clear();
        assert!(c.queue().is_empty());
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert!(c.scores().is_empty());
        assert!(c.pending_timer().is_none());
        Ok(())
    }

    #[test]
    fn test_shuffle_keeps_loaded_track() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3", "3.mp3", "4.mp3", "5.mp3"])]);
        assert_eq!(c.toggle_shuffle(), Outcome::Ignored(IgnoreReason::EmptyQueue));
        assert!(!c.is_shuffled());

        c.add_album("A")?;
        ack(&mut c, 30.0);
        c.toggle_shuffle();
        assert!(c.is_shuffled());
        assert_eq!(c.current_path().as_deref(), c.loaded_path());

        c.toggle_shuffle();
        assert_eq!(c.current_path().as_deref(), Some("A/1.mp3"));
        Ok(())
    }

    #[test]
    fn test_volume_steps_and_clamps() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3"])]);
        c.set_volume(0.99);
        c.volume_up();
        assert!((c.volume() - 1.0).abs() < 1e-9);
        c.set_volume(0.01);
        c.volume_down();
        assert!(c.volume().abs() < 1e-9);
        c.set_volume(0.5);
        c.volume_up();
        assert!((c.volume() - 0.52).abs() < 1e-9);

        c.add_album("A")?;
        ack(&mut c, 30.0);
        assert_eq!(c.backend().calls.last().map(String::as_str), Some("volume 0.52"));
        Ok(())
    }

    #[test]
    fn test_auto_queue_on_empty_catalog() {
        let mut c = coordinator(&[]);
        assert_eq!(c.auto_queue(), Outcome::Ignored(IgnoreReason::EmptyQueue));
        assert!(c.backend().calls.is_empty());
    }

    #[test]
    fn test_auto_queue_plays_from_top() {
        let catalog = Catalog::from_albums([("A", vec!["1.mp3", "2.mp3", "3.mp3"]), ("B", vec!["x.ogg"])]);
        let settings = CoordinatorSettings {
            sampler: SamplerConfig { target: 4, random_weight: 4.0 },
            ..CoordinatorSettings::default()
        };
        let mut c = Coordinator::new(ScriptedBackend::default(), MemoryScoreStore::new(), Arc::new(catalog), settings);
        assert_eq!(c.auto_queue(), Outcome::Applied);
        assert_eq!(c.current_index(), Some(0));
        assert_eq!(c.status(), PlaybackStatus::Loading);
        assert_eq!(c.loaded_path(), c.current_path().as_deref());
    }

    #[test]
    fn test_duration_known_arms_finish_timer() -> PlayerResult<()> {
        let mut c = coordinator(&[("A", &["1.mp3", "2.mp3"])]);
        c.add_album("A")?;
        c.on_backend_event(BackendEvent::Started { path: "A/1.mp3".into(), duration: None });
        let settle = c.pending_timer().expect("settle timer armed");
        assert!(c.fire_timer(settle.ticket));
        assert!(c.pending_timer().is_none());

        c.on_backend_event(BackendEvent::DurationKnown { path: "A/1.mp3".into(), seconds: 90.0 });
        assert_eq!(c.duration(), Some(90.0));
        assert_eq!(c.pending_timer().map(|t| t.phase), Some(TimerPhase::Finish));
        Ok(())
    }
}
