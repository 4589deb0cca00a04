//! Error and outcome types for queue and playback commands.
//!
//! Library glue (config, SQLite, scanning) reports through `anyhow`; the
//! coordinator's own commands use the typed [`PlayerError`] so callers can
//! tell a rejected index apart from a backend failure.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by queue and coordinator commands
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Index outside the active queue
    #[error("Queue index {index} out of range (queue length {len})")]
    InvalidIndex { index: usize, len: usize },

    /// Album id not present in the catalog snapshot
    #[error("Album not found in catalog: {0}")]
    UnknownAlbum(String),

    /// Track file vanished between scan and load
    #[error("Track file missing: {}", .0.display())]
    MissingFile(PathBuf),

    /// Failure reported by the playback backend
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for coordinator commands
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Why a command was accepted without changing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Nothing queued to act on
    EmptyQueue,
    /// A backend load is still awaiting acknowledgement
    LoadInFlight,
    /// Command needs an active track but playback is not running
    NotPlaying,
    /// Requested track is already loaded and running
    AlreadyPlaying,
    /// Track path already present in the queue
    Duplicate,
}

/// Result of a command that was not rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
}

impl Outcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_index_message() {
        let err = PlayerError::InvalidIndex { index: 7, len: 3 };
        assert_eq!(err.to_string(), "Queue index 7 out of range (queue length 3)");
    }

    #[test]
    fn test_backend_error_converts() {
        let err: PlayerError = BackendError::Load("decode failed".to_string()).into();
        assert!(matches!(err, PlayerError::Backend(_)));
        assert!(err.to_string().contains("decode failed"));
    }

    #[test]
    fn test_outcome_is_applied() {
        assert!(Outcome::Applied.is_applied());
        assert!(!Outcome::Ignored(IgnoreReason::EmptyQueue).is_applied());
    }
}
