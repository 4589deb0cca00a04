//! Single-threaded event loop around the [`Coordinator`].
//!
//! Commands, backend events and catalog updates arrive on one channel; the
//! loop waits on it until the coordinator's next timer deadline and fires the
//! timer when the wait runs out. Only this loop touches coordinator state, so
//! the coordinator itself needs no locking.
//!
//! ```text
//! stdin reader ──Command──┐
//! backend sink ──Backend──┼──> mpsc ──> Runtime::run ──> Coordinator
//! scanner ──CatalogChanged┘                  │
//!                                   recv_timeout(timer deadline)
//! ```

use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::backend::{BackendEvent, PlaybackBackend};
use crate::catalog::Catalog;
use crate::coordinator::{Coordinator, Notification, PlaybackStatus};
use crate::error::{Outcome, PlayerResult};
use crate::scores::ScoreStore;

/// Everything the loop reacts to
#[derive(Debug, Clone)]
pub enum Event {
    Command(Command),
    Backend(BackendEvent),
    CatalogChanged(Arc<Catalog>),
    Shutdown,
}

/// User commands accepted by an interactive session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Previous,
    Choose(usize),
    Remove(usize),
    Clear,
    Shuffle,
    Auto,
    AddAlbum(String),
    AddTrack(String, usize),
    VolumeUp,
    VolumeDown,
    Volume(f64),
    Status,
    Queue,
    Albums,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause | toggle | stop     playback control
  next | prev                      move through the queue
  choose N | remove N              jump to / drop queue entry N
  add ALBUM [N]                    queue an album, or file N of it
  auto                             listening-weighted queue
  shuffle | clear                  toggle shuffle / empty the queue
  vol+ | vol- | vol X              volume (X from 0 to 100)
  status | queue | albums          show state
  quit";

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let index = |what: &str| -> Result<usize> {
            rest.parse()
                .with_context(|| format!("`{what}` needs a queue index, got `{rest}`"))
        };

        let command = match word {
            "play" | "p" => Self::Play,
            "pause" => Self::Pause,
            "toggle" | "t" => Self::Toggle,
            "stop" => Self::Stop,
            "next" | "n" => Self::Next,
            "prev" | "previous" => Self::Previous,
            "choose" | "c" => Self::Choose(index("choose")?),
            "remove" | "rm" => Self::Remove(index("remove")?),
            "clear" => Self::Clear,
            "shuffle" | "s" => Self::Shuffle,
            "auto" => Self::Auto,
            "add" => parse_add(rest)?,
            "vol+" | "+" => Self::VolumeUp,
            "vol-" | "-" => Self::VolumeDown,
            "vol" => {
                let percent: f64 = rest
                    .parse()
                    .with_context(|| format!("`vol` needs a number from 0 to 100, got `{rest}`"))?;
                Self::Volume(percent / 100.0)
            }
            "status" | "st" => Self::Status,
            "queue" | "q" => Self::Queue,
            "albums" | "ls" => Self::Albums,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "" => anyhow::bail!("Empty command"),
            other => anyhow::bail!("Unknown command `{other}` (try `help`)"),
        };
        Ok(command)
    }
}

/// `add ALBUM` or `add ALBUM N`; album ids may contain spaces
fn parse_add(rest: &str) -> Result<Command> {
    if rest.is_empty() {
        anyhow::bail!("`add` needs an album id");
    }
    if let Some((album, last)) = rest.rsplit_once(char::is_whitespace) {
        if let Ok(index) = last.parse::<usize>() {
            return Ok(Command::AddTrack(album.trim().to_string(), index));
        }
    }
    Ok(Command::AddAlbum(rest.to_string()))
}

/// Runs one state-changing command against the coordinator.
///
/// Read-only commands (`status`, `queue`, `albums`, `help`, `quit`) are no-ops here.
///
/// # Errors
///
/// Propagates `InvalidIndex` and `UnknownAlbum` rejections.
pub fn apply<B: PlaybackBackend, S: ScoreStore>(
    coordinator: &mut Coordinator<B, S>,
    command: &Command,
) -> PlayerResult<Outcome> {
    Ok(match command {
        Command::Play => coordinator.play(),
        Command::Pause => coordinator.pause(),
        Command::Toggle => coordinator.toggle(),
        Command::Stop => coordinator.stop(),
        Command::Next => coordinator.next(),
        Command::Previous => coordinator.previous(),
        Command::Choose(index) => coordinator.choose_track(*index)?,
        Command::Remove(index) => coordinator.remove_at(*index)?,
        Command::Clear => coordinator.clear(),
        Command::Shuffle => coordinator.toggle_shuffle(),
        Command::Auto => coordinator.auto_queue(),
        Command::AddAlbum(album) => coordinator.add_album(album)?,
        Command::AddTrack(album, index) => coordinator.add_track(album, *index)?,
        Command::VolumeUp => coordinator.volume_up(),
        Command::VolumeDown => coordinator.volume_down(),
        Command::Volume(volume) => coordinator.set_volume(*volume),
        Command::Status | Command::Queue | Command::Albums | Command::Help | Command::Quit => Outcome::Applied,
    })
}

/// One-line summary of the session
#[must_use]
pub fn describe_status<B: PlaybackBackend, S: ScoreStore>(coordinator: &Coordinator<B, S>) -> String {
    let state = match coordinator.status() {
        PlaybackStatus::Idle => "stopped",
        PlaybackStatus::Loading => "loading",
        PlaybackStatus::Playing => "playing",
        PlaybackStatus::Paused => "paused",
    };
    let position = match coordinator.duration() {
        Some(duration) => format!(" {}/{}", format_time(coordinator.elapsed()), format_time(duration)),
        None if coordinator.status() == PlaybackStatus::Idle => String::new(),
        None => format!(" {}", format_time(coordinator.elapsed())),
    };
    format!(
        "[{state}] {}{position}  #{}/{}  vol {:.0}%{}",
        coordinator.current_title().unwrap_or("-"),
        coordinator.current_index().map_or(0, |i| i + 1),
        coordinator.queue().len(),
        coordinator.volume() * 100.0,
        if coordinator.is_shuffled() { "  shuffle" } else { "" }
    )
}

/// Numbered listing of the active queue, current entry marked
#[must_use]
pub fn describe_queue<B: PlaybackBackend, S: ScoreStore>(coordinator: &Coordinator<B, S>) -> String {
    if coordinator.queue().is_empty() {
        return "queue is empty".to_string();
    }
    let mut out = String::new();
    for (i, title) in coordinator.queue().titles().into_iter().enumerate() {
        let marker = if coordinator.current_index() == Some(i) { '>' } else { ' ' };
        let _ = writeln!(out, "{marker}{i:4}  {title}");
    }
    out.trim_end().to_string()
}

/// Album ids with their track counts
#[must_use]
pub fn describe_albums(catalog: &Catalog) -> String {
    if catalog.is_empty() {
        return "catalog is empty".to_string();
    }
    catalog
        .albums()
        .map(|(album, files)| format!("{album}  ({} tracks)", files.len()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_time(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Event loop driving a coordinator
pub struct Runtime<B: PlaybackBackend, S: ScoreStore, W: Write> {
    coordinator: Coordinator<B, S>,
    events: Receiver<Event>,
    notifications: Receiver<Notification>,
    announce: bool,
    out: W,
}

impl<B: PlaybackBackend, S: ScoreStore, W: Write> Runtime<B, S, W> {
    pub fn new(mut coordinator: Coordinator<B, S>, events: Receiver<Event>, out: W) -> Self {
        let notifications = coordinator.subscribe();
        Self {
            coordinator,
            events,
            notifications,
            announce: false,
            out,
        }
    }

    /// Print the status line whenever the playback state changes
    #[must_use]
    pub fn announce_changes(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator<B, S> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator<B, S> {
        &mut self.coordinator
    }

    /// Processes events until `Quit`, `Shutdown` or every sender is gone,
    /// then hands the coordinator back.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to the output fails.
    pub fn run(mut self) -> Result<Coordinator<B, S>> {
        loop {
            let event = match self.coordinator.pending_timer() {
                Some(timer) => {
                    let wait = timer.deadline.saturating_duration_since(Instant::now());
                    match self.events.recv_timeout(wait) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            self.coordinator.fire_due_timer(Instant::now());
                            self.announce_pending()?;
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.events.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };

            if !self.handle(event)? {
                break;
            }
            self.announce_pending()?;
        }
        info!("Session ended");
        Ok(self.coordinator)
    }

    /// Applies one event; false means stop
    ///
    /// # Errors
    ///
    /// Returns an error if writing a report fails.
    pub fn handle(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Command(Command::Quit) | Event::Shutdown => {
                self.coordinator.stop();
                return Ok(false);
            }
            Event::Command(command) => self.handle_command(&command)?,
            Event::Backend(event) => self.coordinator.on_backend_event(event),
            Event::CatalogChanged(catalog) => self.coordinator.replace_catalog(catalog),
        }
        Ok(true)
    }

    /// Drains notifications, printing one status line if playback changed
    fn announce_pending(&mut self) -> Result<()> {
        let changed = self
            .notifications
            .try_iter()
            .fold(false, |changed, n| changed || n == Notification::PlaybackStateChanged);
        if changed && self.announce {
            writeln!(self.out, "{}", describe_status(&self.coordinator))?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn handle_command(&mut self, command: &Command) -> Result<()> {
        match apply(&mut self.coordinator, command) {
            Ok(Outcome::Applied) => debug!("{command:?} applied"),
            Ok(Outcome::Ignored(reason)) => {
                debug!("{command:?} ignored: {reason:?}");
            }
            Err(e) => {
                warn!("{command:?} rejected: {e}");
                writeln!(self.out, "error: {e}")?;
            }
        }

        let report = match command {
            Command::Status => Some(describe_status(&self.coordinator)),
            Command::Queue => Some(describe_queue(&self.coordinator)),
            Command::Albums => Some(describe_albums(self.coordinator.catalog())),
            Command::Help => Some(HELP.to_string()),
            _ => None,
        };
        if let Some(report) = report {
            writeln!(self.out, "{report}")?;
            self.out.flush()?;
        }
        Ok(())
    }
}

/// Reads commands line by line on a background thread.
///
/// Unparseable lines are reported on stderr. End of input sends `Shutdown`.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_command_reader<R>(input: R, events: Sender<Event>) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("command-reader".into())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        let quit = command == Command::Quit;
                        if events.send(Event::Command(command)).is_err() || quit {
                            return;
                        }
                    }
                    Err(e) => eprintln!("{e:#}"),
                }
            }
            let _ = events.send(Event::Shutdown);
        })
        .context("Failed to spawn command reader thread")
}
