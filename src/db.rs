//! # SQLite Listening Score Store
//!
//! Persists [`ListeningScore`] entries in a single `listening_scores` table.
//! The whole table is read into memory when the store opens, reads are
//! served from that cache, and every `put` writes through with an upsert.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE listening_scores (
//!     path      TEXT PRIMARY KEY,
//!     count     INTEGER NOT NULL CHECK (count >= 0),
//!     score_sum REAL    NOT NULL CHECK (score_sum >= 0)
//! )
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{params, Connection};

use crate::scores::{ListeningScore, ScoreStore};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS listening_scores (
    path      TEXT PRIMARY KEY,
    count     INTEGER NOT NULL CHECK (count >= 0),
    score_sum REAL    NOT NULL CHECK (score_sum >= 0)
)";

/// Write-through score store backed by SQLite
#[derive(Debug)]
pub struct SqliteScoreStore {
    conn: Connection,
    cache: HashMap<String, ListeningScore>,
}

impl SqliteScoreStore {
    /// Opens (creating if needed) the database at `db_path` and loads every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, the schema cannot be
    /// created, or existing rows cannot be read.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open score database at {}", db_path.display()))?;
        Self::with_connection(conn)
    }

    /// Store over an in-memory database
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory score database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to create listening_scores table")?;

        let cache = load_all(&conn)?;
        info!("Loaded {} listening scores", cache.len());

        Ok(Self { conn, cache })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// All entries sorted by score, best first
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, ListeningScore)> {
        let mut entries: Vec<(&str, ListeningScore)> = self
            .cache
            .iter()
            .map(|(path, score)| (path.as_str(), *score))
            .collect();
        entries.sort_by(|(pa, a), (pb, b)| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| pa.cmp(pb))
        });
        entries
    }
}

fn load_all(conn: &Connection) -> Result<HashMap<String, ListeningScore>> {
    let mut stmt = conn
        .prepare("SELECT path, count, score_sum FROM listening_scores")
        .context("Failed to prepare score query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                ListeningScore {
                    count: row.get(1)?,
                    score_sum: row.get(2)?,
                },
            ))
        })
        .context("Failed to query listening scores")?;

    // Could collect directly, but then a bad row hides which one failed.
    let mut cache = HashMap::new();
    for row in rows {
        let (path, score) = row.context("Failed to read listening score row")?;
        cache.insert(path, score);
    }
    Ok(cache)
}

impl ScoreStore for SqliteScoreStore {
    fn get(&self, path: &str) -> Option<ListeningScore> {
        self.cache.get(path).copied()
    }

    fn put(&mut self, path: &str, score: ListeningScore) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO listening_scores (path, count, score_sum) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET count = excluded.count, score_sum = excluded.score_sum",
                params![path, score.count, score.score_sum],
            )
            .with_context(|| format!("Failed to store listening score for {path}"))?;
        debug!("Stored score for {path}: {}/{:.3}", score.count, score.score_sum);
        self.cache.insert(path.to_string(), score);
        Ok(())
    }
}
