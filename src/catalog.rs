//! # Catalog Snapshot
//!
//! Immutable mapping from album id to the ordered file names inside it. A
//! rescan builds a fresh [`Catalog`] and swaps it into the [`CatalogProvider`];
//! readers holding an older `Arc<Catalog>` keep a consistent view.
//!
//! ## Track identity
//!
//! A track is addressed by its album id plus file name. The album id is the
//! album directory written with `/` separators, so the track path
//! `album_id + "/" + file_name` is also the file's location on disk.
//!
//! ```
//! use cadence::catalog::{Catalog, TrackRef};
//!
//! let catalog = Catalog::from_albums([("A", vec!["1.mp3", "2.mp3"])]);
//! let track = catalog.resolve("A", 1)?;
//! assert_eq!(track, TrackRef::new("A", "2.mp3"));
//! assert_eq!(track.path(), "A/2.mp3");
//! assert_eq!(track.display_name(), "2");
//! # Ok::<(), cadence::error::PlayerError>(())
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::error::{PlayerError, PlayerResult};

/// Reference to one track in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef {
    album_id: String,
    file_name: String,
    display_name: String,
}

impl TrackRef {
    pub fn new(album_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        let album_id = album_id.into();
        let file_name = file_name.into();
        let display_name = strip_extension(&file_name).to_string();
        Self {
            album_id,
            file_name,
            display_name,
        }
    }

    #[must_use]
    pub fn album_id(&self) -> &str {
        &self.album_id
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without its final extension
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Unique key of the track, `album_id/file_name`
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.album_id, self.file_name)
    }

    /// Compares against a track path without allocating
    #[must_use]
    pub fn has_path(&self, path: &str) -> bool {
        path.strip_prefix(self.album_id.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            == Some(self.file_name.as_str())
    }
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    }
}

/// Album id to ordered file names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    albums: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    #[must_use]
    pub fn new(albums: BTreeMap<String, Vec<String>>) -> Self {
        Self { albums }
    }

    /// Convenience constructor for literal catalogs
    pub fn from_albums<A, F, I>(albums: I) -> Self
    where
        A: Into<String>,
        F: Into<String>,
        I: IntoIterator<Item = (A, Vec<F>)>,
    {
        Self {
            albums: albums
                .into_iter()
                .map(|(album, files)| (album.into(), files.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    pub fn albums(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.albums.iter().map(|(id, files)| (id.as_str(), files.as_slice()))
    }

    #[must_use]
    pub fn album(&self, album_id: &str) -> Option<&[String]> {
        self.albums.get(album_id).map(Vec::as_slice)
    }

    /// Resolves one file of an album into a [`TrackRef`].
    ///
    /// # Errors
    ///
    /// `UnknownAlbum` when the album is absent, `InvalidIndex` when the
    /// album has fewer than `file_index + 1` files.
    pub fn resolve(&self, album_id: &str, file_index: usize) -> PlayerResult<TrackRef> {
        let files = self
            .album(album_id)
            .ok_or_else(|| PlayerError::UnknownAlbum(album_id.to_string()))?;
        let file = files.get(file_index).ok_or(PlayerError::InvalidIndex {
            index: file_index,
            len: files.len(),
        })?;
        Ok(TrackRef::new(album_id, file.as_str()))
    }

    /// Every track, album order then file order
    pub fn tracks(&self) -> impl Iterator<Item = TrackRef> + '_ {
        self.albums
            .iter()
            .flat_map(|(album, files)| files.iter().map(move |file| TrackRef::new(album.as_str(), file.as_str())))
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.albums.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.track_count() == 0
    }
}

/// Holder of the current snapshot, shared between the scanner and readers.
///
/// Snapshots are only ever replaced whole; `get_catalog` hands out the
/// `Arc` so a read never observes a half-built catalog.
#[derive(Debug, Default)]
pub struct CatalogProvider {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogProvider {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    #[must_use]
    pub fn get_catalog(&self) -> Arc<Catalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swaps in a new snapshot and returns it
    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let snapshot = Arc::new(catalog);
        debug!(
            "Catalog replaced: {} albums, {} tracks",
            snapshot.album_count(),
            snapshot.track_count()
        );
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&snapshot),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&snapshot),
        }
        snapshot
    }
}

/// Album id for a directory, `/`-separated regardless of platform
#[must_use]
pub fn album_id_for(dir: &Path) -> String {
    dir.to_string_lossy().replace('\\', "/")
}
