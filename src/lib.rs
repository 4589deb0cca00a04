//! Local-library music player core: queue, shuffle, listening-weighted
//! recommendations and a playback coordinator that learns from how much of
//! each track you actually hear.
//!
//! Core modules:
//! - [`catalog`] - Album snapshots and track identity
//! - [`queue`] - Ordered and active queue views with a current pointer
//! - [`shuffle`] - Fisher-Yates shuffle that keeps the current track
//! - [`algorithm`] - Listening-weighted queue sampler
//! - [`coordinator`] - Playback state machine
//! - [`runtime`] - Event loop feeding the coordinator
//!
//! ### Supporting Modules
//!
//! - [`scores`] / [`db`] - Listening scores in memory or SQLite
//! - [`backend`] / [`mpd_client`] - Playback backend contract and the MPD implementation
//! - [`scanner`] - Library walk with debounced catalog publication
//! - [`config`] - Data directory and `config.json`
//! - [`cli`] / [`completion`] - Command line and shell completion
//! - [`error`] - Error and outcome types
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadence::backend::BackendEvent;
//! use cadence::catalog::Catalog;
//! use cadence::coordinator::{Coordinator, CoordinatorSettings};
//! use cadence::db::SqliteScoreStore;
//! use cadence::mpd_client::MpdBackend;
//!
//! let catalog = Arc::new(Catalog::from_albums([("/music/Album", vec!["01.flac", "02.flac"])]));
//! let scores = SqliteScoreStore::open_in_memory()?;
//! let backend = MpdBackend::new(Box::new(|event: BackendEvent| println!("{event:?}")));
//!
//! let mut player = Coordinator::new(backend, scores, catalog, CoordinatorSettings::default());
//! player.add_album("/music/Album")?;
//! player.next();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Listening Scores
//!
//! Every track that is left after playing records `elapsed / duration` into
//! its score. The recommendation sampler accepts a random draw with
//! probability `base + (1 - base) * average_ratio`, so tracks you usually
//! finish come up more often while every track keeps a floor chance.
//!
//! ## Logging
//!
//! Uses `log` with `env_logger`; `RUST_LOG=cadence=debug` shows every
//! transition and ignored command.

pub mod algorithm;
pub mod backend;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod mpd_client;
pub mod queue;
pub mod runtime;
pub mod scanner;
pub mod scores;
pub mod shuffle;
