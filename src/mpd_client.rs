//! # MPD Playback Backend
//!
//! Drives Music Player Daemon through the `mpc` command-line client. Each
//! load replaces MPD's queue with the single requested track, so MPD never
//! advances on its own; the coordinator decides what plays next.
//!
//! ## Design Decision: mpc vs Direct Protocol
//!
//! This backend shells out to `mpc` instead of speaking the MPD protocol:
//! - No protocol parsing beyond the human-readable `mpc status` output
//! - Works with any MPD version `mpc` supports
//! - `mpc` error messages are passed through as-is
//!
//! ## Paths
//!
//! MPD addresses files relative to its `music_directory`. When
//! [`MpdBackend::with_music_dir`] is set, track paths under that directory
//! are sent relative to it; anything else is sent as a `file://` URI, which
//! MPD accepts from local clients.
//!
//! ## Example Status Output
//!
//! ```text
//! artist/album/song.mp3
//! [playing] #1/1   1:23/3:45 (37%)
//! volume: 80%   repeat: off   random: off   single: off   consume: off
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::backend::{BackendError, BackendEvent, BackendResult, EventSink, PlaybackBackend};

/// Parsed `mpc status` output
#[derive(Debug, Clone, PartialEq)]
pub struct MpdStatus {
    /// Current file (MPD relative), None when stopped
    pub current_song: Option<String>,
    /// Elapsed seconds
    pub elapsed: f64,
    /// Total seconds, None for streams or unknown
    pub duration: Option<f64>,
    pub state: MpdState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpdState {
    Play,
    Pause,
    Stop,
}

/// Playback backend talking to MPD via `mpc`
pub struct MpdBackend {
    music_dir: Option<PathBuf>,
    sink: EventSink,
}

impl MpdBackend {
    /// Backend delivering its acknowledgements into `sink`
    pub fn new(sink: EventSink) -> Self {
        Self { music_dir: None, sink }
    }

    /// Sets MPD's music directory for relative path translation
    #[must_use]
    pub fn with_music_dir(mut self, music_dir: Option<PathBuf>) -> Self {
        self.music_dir = music_dir;
        self
    }

    /// Verifies that `mpc` is installed and MPD answers.
    ///
    /// # Errors
    ///
    /// `Unavailable` when `mpc` cannot be run or MPD refuses the connection.
    pub fn check_connection(&self) -> BackendResult<()> {
        mpc(&["version"]).map(|_| ()).map_err(|e| match e {
            BackendError::Control(msg) => BackendError::Unavailable(format!(
                "Failed to connect to MPD. Make sure MPD is running on localhost:6600.\nError: {msg}"
            )),
            other => other,
        })
    }

    /// Path as MPD should receive it
    #[must_use]
    pub fn to_mpd_path(&self, path: &str) -> String {
        let file = Path::new(path);
        if let Some(relative) = self.music_dir.as_deref().and_then(|root| file.strip_prefix(root).ok()) {
            return relative.to_string_lossy().replace('\\', "/");
        }
        if file.is_absolute() {
            format!("file://{path}")
        } else {
            path.to_string()
        }
    }

    /// Current MPD status.
    ///
    /// # Errors
    ///
    /// Returns an error if `mpc status` cannot be run.
    pub fn status(&self) -> BackendResult<MpdStatus> {
        let output = mpc(&["status", "-f", "%file%"])?;
        Ok(parse_status(&output))
    }
}

impl PlaybackBackend for MpdBackend {
    fn load(&mut self, path: &str) -> BackendResult<()> {
        let mpd_path = self.to_mpd_path(path);
        debug!("Translated path: {path} -> {mpd_path}");

        mpc(&["clear"])?;
        mpc(&["add", &mpd_path]).map_err(|e| BackendError::Load(format!("{mpd_path}: {e}")))?;
        mpc(&["play"]).map_err(|e| BackendError::Load(format!("{mpd_path}: {e}")))?;

        match self.status() {
            Ok(status) if status.state == MpdState::Play => {
                info!("MPD playing {mpd_path}");
                (self.sink)(BackendEvent::Started {
                    path: path.to_string(),
                    duration: status.duration,
                });
            }
            Ok(status) => {
                (self.sink)(BackendEvent::Error {
                    path: path.to_string(),
                    reason: format!("MPD did not start playback (state {:?})", status.state),
                });
            }
            Err(e) => {
                (self.sink)(BackendEvent::Error {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn play(&mut self) -> BackendResult<()> {
        mpc(&["play"]).map(|_| ())
    }

    fn pause(&mut self) -> BackendResult<()> {
        mpc(&["pause"]).map(|_| ())
    }

    fn teardown(&mut self) -> BackendResult<()> {
        mpc(&["stop"])?;
        mpc(&["clear"]).map(|_| ())
    }

    fn set_volume(&mut self, volume: f64) -> BackendResult<()> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round() as u8;
        mpc(&["volume", &percent.to_string()]).map(|_| ())
    }

    fn elapsed(&self) -> f64 {
        match self.status() {
            Ok(status) => status.elapsed,
            Err(e) => {
                warn!("Could not read MPD position: {e}");
                0.0
            }
        }
    }
}

/// Runs `mpc` with `args`, returning stdout
fn mpc(args: &[&str]) -> BackendResult<String> {
    let output = Command::new("mpc")
        .args(args)
        .output()
        .map_err(|e| BackendError::Unavailable(format!("Failed to execute mpc. Please install mpc (MPD client): {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::Control(format!("mpc {}: {}", args.join(" "), stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `mpc status -f %file%` output.
///
/// The first line is the file when something is loaded; a status line in the
/// form `[playing] #1/50   0:32/3:45 (13%)` carries state and times.
#[must_use]
pub fn parse_status(text: &str) -> MpdStatus {
    let lines: Vec<&str> = text.lines().collect();
    let has_status_line = lines.iter().any(|l| l.starts_with('['));

    let current_song = match lines.first() {
        Some(first) if has_status_line && !first.trim().is_empty() && !first.starts_with('[') => {
            Some(first.trim().to_string())
        }
        _ => None,
    };

    let mut elapsed = 0.0;
    let mut duration = None;
    let mut state = MpdState::Stop;

    for line in lines.iter().filter(|l| l.starts_with('[')) {
        if line.starts_with("[playing]") {
            state = MpdState::Play;
        } else if line.starts_with("[paused]") {
            state = MpdState::Pause;
        }

        // Skip the "#1/50" queue position, take the "0:32/3:45" pair
        if let Some(times) = line.split_whitespace().find(|s| s.contains('/') && s.contains(':')) {
            if let Some((left, right)) = times.split_once('/') {
                if let Some(secs) = parse_time(left) {
                    elapsed = secs;
                }
                duration = parse_time(right).filter(|d| *d > 0.0);
            }
        }
    }

    MpdStatus {
        current_song,
        elapsed,
        duration,
        state,
    }
}

/// Parses `M:SS` or `H:MM:SS` into seconds
fn parse_time(time_str: &str) -> Option<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    parts
        .iter()
        .try_fold(0.0, |acc, part| part.parse::<f64>().ok().map(|v| acc * 60.0 + v))
}
