//! Playback backend interface.
//!
//! The coordinator drives audio output only through [`PlaybackBackend`].
//! Requests go in as method calls; asynchronous results come back as
//! [`BackendEvent`]s on the runtime's event channel, which keeps every
//! coordinator mutation on one thread.

use std::path::Path;
use std::sync::mpsc::Sender;

use thiserror::Error;

/// Failures reported by a playback backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Load request rejected or the source could not be decoded
    #[error("Failed to load track: {0}")]
    Load(String),

    /// Play, pause or volume command failed
    #[error("Playback control failed: {0}")]
    Control(String),

    /// Backend not reachable at all
    #[error("Playback backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Signals sent from a backend back to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Load acknowledged, audio is running. `duration` is `None` until known.
    Started { path: String, duration: Option<f64> },
    /// Media finished by itself
    TrackEnded { path: String },
    /// Duration became known after the start acknowledgement
    DurationKnown { path: String, seconds: f64 },
    /// Decode or I/O failure while loading or playing
    Error { path: String, reason: String },
}

impl BackendEvent {
    /// Track path the event refers to
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Started { path, .. }
            | Self::TrackEnded { path }
            | Self::DurationKnown { path, .. }
            | Self::Error { path, .. } => path,
        }
    }
}

/// Where a backend delivers its events
pub type EventSink = Box<dyn Fn(BackendEvent) + Send>;

/// Sink forwarding into an `mpsc` channel, wrapping each event with `wrap`
pub fn channel_sink<T, F>(tx: Sender<T>, wrap: F) -> EventSink
where
    T: Send + 'static,
    F: Fn(BackendEvent) -> T + Send + 'static,
{
    Box::new(move |event| {
        // Receiver gone means the runtime is shutting down
        let _ = tx.send(wrap(event));
    })
}

/// Audio output capability used by the coordinator.
///
/// `load` only starts loading; success is reported later through
/// [`BackendEvent::Started`]. A returned `Err` means the request itself was
/// refused and no event will follow.
pub trait PlaybackBackend {
    /// Starts loading `path`, replacing whatever is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the source.
    fn load(&mut self, path: &str) -> BackendResult<()>;

    /// Resumes the loaded track.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the command.
    fn play(&mut self) -> BackendResult<()>;

    /// Pauses the loaded track.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the command.
    fn pause(&mut self) -> BackendResult<()>;

    /// Stops and unloads the current track.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the command.
    fn teardown(&mut self) -> BackendResult<()>;

    /// Sets output volume, `0.0..=1.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the command.
    fn set_volume(&mut self, volume: f64) -> BackendResult<()>;

    /// Seconds played of the loaded track
    fn elapsed(&self) -> f64;

    /// Whether the source for `path` is present
    fn source_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

impl<B: PlaybackBackend + ?Sized> PlaybackBackend for Box<B> {
    fn load(&mut self, path: &str) -> BackendResult<()> {
        (**self).load(path)
    }

    fn play(&mut self) -> BackendResult<()> {
        (**self).play()
    }

    fn pause(&mut self) -> BackendResult<()> {
        (**self).pause()
    }

    fn teardown(&mut self) -> BackendResult<()> {
        (**self).teardown()
    }

    fn set_volume(&mut self, volume: f64) -> BackendResult<()> {
        (**self).set_volume(volume)
    }

    fn elapsed(&self) -> f64 {
        (**self).elapsed()
    }

    fn source_exists(&self, path: &str) -> bool {
        (**self).source_exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_event_path() {
        let event = BackendEvent::DurationKnown {
            path: "A/1.mp3".to_string(),
            seconds: 12.0,
        };
        assert_eq!(event.path(), "A/1.mp3");
    }

    #[test]
    fn test_channel_sink_wraps_events() {
        let (tx, rx) = mpsc::channel();
        let sink = channel_sink(tx, |event| ("wrapped", event));
        sink(BackendEvent::TrackEnded { path: "A/2.mp3".to_string() });

        let (tag, event) = rx.recv().unwrap();
        assert_eq!(tag, "wrapped");
        assert_eq!(event, BackendEvent::TrackEnded { path: "A/2.mp3".to_string() });
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::channel::<BackendEvent>();
        drop(rx);
        let sink = channel_sink(tx, |event| event);
        sink(BackendEvent::TrackEnded { path: String::new() });
    }
}
