//! # Shell Completion Module
//!
//! Completion script generation through `clap_complete`, plus the album id
//! listing that scripts can call for dynamic completion of `play --album`.
//!
//! ## Usage
//!
//! ```bash
//! cadence completion bash > ~/.local/share/bash-completion/completions/cadence
//! cadence completion zsh > ~/.config/zsh/completions/_cadence
//! ```

use std::io;

use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};

use crate::catalog::Catalog;
use crate::cli::Shell;
use crate::config;
use crate::scanner::{scan_library, ScanConfig};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: &Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Album ids of the configured music directory.
///
/// Completion must never fail loudly, so a missing config or directory
/// yields an empty list.
#[must_use]
pub fn get_album_completions() -> Vec<String> {
    let Some(music_dir) = config::load_config().ok().and_then(|c| c.music_dir) else {
        return Vec::new();
    };
    scan_library(&ScanConfig::new(music_dir), |_| {})
        .map(|catalog| album_ids(&catalog))
        .unwrap_or_default()
}

fn album_ids(catalog: &Catalog) -> Vec<String> {
    catalog.albums().map(|(album, _)| album.to_string()).collect()
}

/// Quotes a completion entry for `shell`
#[must_use]
pub fn format_completion(entry: &str, shell: Option<Shell>) -> String {
    match shell {
        // Fish handles escaping itself
        Some(Shell::Fish) => entry.to_string(),
        _ if entry.contains([' ', '\t', '\n']) => format!("\"{}\"", entry.replace('"', "\\\"")),
        _ => entry.to_string(),
    }
}

/// Print album ids, one per line, formatted for `shell`
///
/// # Errors
///
/// Currently infallible; kept fallible for the command dispatcher.
pub fn print_album_completions(shell: Option<Shell>) -> Result<()> {
    for album in get_album_completions() {
        println!("{}", format_completion(&album, shell));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(shell_to_completion_shell(&Shell::Bash), CompletionShell::Bash);
        assert_eq!(shell_to_completion_shell(&Shell::Zsh), CompletionShell::Zsh);
        assert_eq!(shell_to_completion_shell(&Shell::Elvish), CompletionShell::Elvish);
    }

    #[test]
    fn test_format_completion_quoting() {
        assert_eq!(format_completion("/music/Album", None), "/music/Album");
        assert_eq!(format_completion("/music/Some Album", Some(Shell::Bash)), "\"/music/Some Album\"");
        assert_eq!(format_completion("/music/Some Album", Some(Shell::Fish)), "/music/Some Album");
        assert_eq!(format_completion("a \"b\"", None), "\"a \\\"b\\\"\"");
    }

    #[test]
    fn test_album_ids_follow_catalog_order() {
        let catalog = Catalog::from_albums([("B", vec!["1.mp3"]), ("A", vec!["2.mp3"])]);
        assert_eq!(album_ids(&catalog), vec!["A".to_string(), "B".to_string()]);
    }
}
