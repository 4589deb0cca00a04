//! Library scanning.
//!
//! Walks the music directory, buckets audio files by their parent directory
//! and publishes catalog snapshots while the walk is still running. Discovery
//! events go through a [`Debouncer`], so a large scan produces one update per
//! quiet period instead of one per file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::{album_id_for, Catalog};

/// Scanner settings
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    /// Extensions to keep, compared case-insensitively
    pub extensions: Vec<String>,
    /// Quiet period after the last discovery before publishing
    pub debounce: Duration,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: ["mp3", "ogg", "flac", "m4a"].iter().map(ToString::to_string).collect(),
            debounce: Duration::from_millis(250),
        }
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
    }
}

/// Coalesces bursts of pings into one callback per quiet period.
///
/// Runs `on_settle` on a background thread once no ping has arrived for the
/// quiet duration. Dropping the debouncer flushes a pending ping and joins
/// the thread.
pub struct Debouncer {
    tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Starts the debounce thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn new<F>(quiet: Duration, mut on_settle: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("scan-debounce".into())
            .spawn(move || {
                let mut pending = false;
                loop {
                    let received = if pending {
                        rx.recv_timeout(quiet)
                    } else {
                        rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
                    };
                    match received {
                        Ok(()) => pending = true,
                        Err(RecvTimeoutError::Timeout) => {
                            pending = false;
                            on_settle();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            if pending {
                                on_settle();
                            }
                            break;
                        }
                    }
                }
            })
            .context("Failed to spawn debounce thread")?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn ping(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(());
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Debounce thread panicked");
            }
        }
    }
}

fn snapshot(found: &Mutex<BTreeMap<String, Vec<String>>>) -> Catalog {
    match found.lock() {
        Ok(albums) => Catalog::new(albums.clone()),
        Err(poisoned) => Catalog::new(poisoned.into_inner().clone()),
    }
}

/// Scans `config.root`, calling `publish` with growing snapshots as the walk
/// proceeds. Returns the complete catalog.
///
/// Unreadable entries are logged and skipped.
///
/// # Errors
///
/// Returns an error if the root does not exist or the debounce thread cannot start.
pub fn scan_library<F>(config: &ScanConfig, publish: F) -> Result<Catalog>
where
    F: FnMut(Catalog) + Send + 'static,
{
    if !config.root.is_dir() {
        anyhow::bail!("Music directory {} does not exist", config.root.display());
    }
    info!("Scanning {}", config.root.display());

    let found: Arc<Mutex<BTreeMap<String, Vec<String>>>> = Arc::default();
    let debouncer = {
        let found = Arc::clone(&found);
        let mut publish = publish;
        Debouncer::new(config.debounce, move || {
            let catalog = snapshot(&found);
            debug!("Publishing scan snapshot with {} tracks", catalog.track_count());
            publish(catalog);
        })?
    };

    for entry in WalkDir::new(&config.root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !config.is_audio(path) {
            continue;
        }
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            continue;
        };

        if let Ok(mut albums) = found.lock() {
            albums
                .entry(album_id_for(parent))
                .or_default()
                .push(name.to_string_lossy().into_owned());
        }
        debouncer.ping();
    }

    drop(debouncer);
    let catalog = snapshot(&found);
    info!(
        "Scan finished: {} albums, {} tracks",
        catalog.album_count(),
        catalog.track_count()
    );
    Ok(catalog)
}

/// Runs [`scan_library`] on a named background thread.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_scan<F>(config: ScanConfig, publish: F) -> Result<JoinHandle<Result<Catalog>>>
where
    F: FnMut(Catalog) + Send + 'static,
{
    thread::Builder::new()
        .name("library-scan".into())
        .spawn(move || scan_library(&config, publish))
        .context("Failed to spawn library scan thread")
}
