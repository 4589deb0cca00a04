//! # Command-Line Interface Module
//!
//! Defines the `cadence` command line with Clap derive macros.
//!
//! ## Commands
//!
//! - `scan`: Walk the music directory and list the albums found
//! - `play`: Start an interactive session driving MPD
//! - `scores`: Show recorded listening scores, best first
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! cadence scan ~/Music
//! cadence play --auto
//! cadence play --album "/home/me/Music/Artist/Album"
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence: a local-library player that learns what you finish listening to")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a music directory and list its albums
    ///
    /// Every directory holding audio files becomes one album. Without a
    /// path, the `music_dir` from config.json is scanned.
    Scan {
        /// Music directory to scan
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Start an interactive playback session
    ///
    /// Scans the library in the background and reads commands from stdin
    /// (`help` lists them). Playback goes through MPD via `mpc`.
    Play {
        /// Music directory, overriding config.json
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Start with a listening-weighted automatic queue
        #[arg(long, conflicts_with = "album")]
        auto: bool,

        /// Queue this album and start playing it
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        album: Option<String>,
    },

    /// List listening scores, best first
    Scores {
        /// Show at most this many entries
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Generate shell completions
    ///
    /// Usage: cadence completion bash > ~/.local/share/bash-completion/completions/cadence
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List album ids for completion (hidden command)
    #[command(hide = true)]
    CompleteAlbums {
        /// Format for this shell's completion machinery
        #[arg(long)]
        shell: Option<Shell>,
    },
}
