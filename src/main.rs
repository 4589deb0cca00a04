//! # Cadence
//!
//! Command-line front end. `play` wires the pieces together:
//!
//! - a background scan publishes catalog snapshots into the event channel
//! - MPD acknowledgements arrive on the same channel through the backend sink
//! - a stdin reader turns typed lines into commands
//! - the runtime loop owns the coordinator and processes everything in order
//!
//! ## Usage
//!
//! ```bash
//! cadence scan ~/Music
//! cadence play --dir ~/Music
//! cadence play --auto
//! cadence scores -n 50
//! ```

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, warn};

use cadence::backend::channel_sink;
use cadence::catalog::CatalogProvider;
use cadence::cli;
use cadence::completion;
use cadence::config::{self, Config};
use cadence::coordinator::Coordinator;
use cadence::db::SqliteScoreStore;
use cadence::mpd_client::MpdBackend;
use cadence::runtime::{self, Command, Event, Runtime};
use cadence::scanner::{self, ScanConfig};

/// Main entry point.
///
/// Logging is controlled with `RUST_LOG`:
/// - `RUST_LOG=debug cadence play` - everything
/// - `RUST_LOG=cadence::coordinator=debug cadence play` - state transitions only
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Scan { dir } => scan(dir)?,
        cli::Command::Play { dir, auto, album } => play(dir, auto, album)?,
        cli::Command::Scores { limit } => list_scores(limit)?,
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
        cli::Command::CompleteAlbums { shell } => completion::print_album_completions(shell)?,
    }

    Ok(())
}

fn music_dir(config: &Config, dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.or_else(|| config.music_dir.clone()).ok_or_else(|| {
        anyhow::anyhow!("No music directory given. Pass one on the command line or set music_dir in config.json")
    })
}

fn scan_config(config: &Config, root: PathBuf) -> ScanConfig {
    ScanConfig {
        root,
        extensions: config.extensions.clone(),
        debounce: config.debounce(),
    }
}

fn scan(dir: Option<PathBuf>) -> Result<()> {
    let config = config::load_config()?;
    let root = music_dir(&config, dir)?;
    let catalog = scanner::scan_library(&scan_config(&config, root), |_| {})?;

    println!("{}", runtime::describe_albums(&catalog));
    println!();
    println!("{} albums, {} tracks", catalog.album_count(), catalog.track_count());
    Ok(())
}

fn list_scores(limit: usize) -> Result<()> {
    let config = config::load_config()?;
    let store = SqliteScoreStore::open(&config.scores_db_path()?)?;

    if store.is_empty() {
        println!("No listening scores recorded yet.");
        return Ok(());
    }

    println!("{:>6}  {:>5}  path", "score", "plays");
    for (path, score) in store.ranked().into_iter().take(limit) {
        println!("{:>6.3}  {:>5}  {path}", score.score(), score.count);
    }
    Ok(())
}

fn play(dir: Option<PathBuf>, auto: bool, album: Option<String>) -> Result<()> {
    let mut config = config::load_config()?;
    let root = music_dir(&config, dir)?;
    let scan_config = scan_config(&config, root);

    let scores = SqliteScoreStore::open(&config.scores_db_path()?)?;

    let (tx, rx) = mpsc::channel();
    let backend =
        MpdBackend::new(channel_sink(tx.clone(), Event::Backend)).with_music_dir(config.mpd_music_dir.clone());
    backend.check_connection()?;

    let provider = Arc::new(CatalogProvider::default());

    // A startup action needs the whole library; otherwise scan in the background
    let scan_handle = if auto || album.is_some() {
        provider.replace(scanner::scan_library(&scan_config, |_| {})?);
        None
    } else {
        let provider = Arc::clone(&provider);
        let tx = tx.clone();
        Some(scanner::spawn_scan(scan_config, move |catalog| {
            let snapshot = provider.replace(catalog);
            let _ = tx.send(Event::CatalogChanged(snapshot));
        })?)
    };

    let mut coordinator = Coordinator::new(backend, scores, provider.get_catalog(), config.coordinator_settings());
    coordinator.set_volume(config.volume);

    let startup = match (auto, album) {
        (true, _) => Some(Command::Auto),
        (false, Some(album)) => Some(Command::AddAlbum(album)),
        (false, None) => None,
    };
    if let Some(command) = startup {
        runtime::apply(&mut coordinator, &command).with_context(|| format!("Startup command {command:?} failed"))?;
    }

    runtime::spawn_command_reader(BufReader::new(io::stdin()), tx)?;
    println!("Type `help` for commands.");

    let coordinator = Runtime::new(coordinator, rx, io::stdout()).announce_changes(true).run()?;

    if let Some(handle) = scan_handle {
        if handle.is_finished() {
            match handle.join() {
                Ok(Err(e)) => warn!("Library scan failed: {e:#}"),
                Err(_) => warn!("Library scan thread panicked"),
                Ok(Ok(_)) => {}
            }
        }
    }

    if (coordinator.volume() - config.volume).abs() > f64::EPSILON {
        config.volume = coordinator.volume();
        config::save_config(&config)?;
    }
    info!("Goodbye");
    Ok(())
}
