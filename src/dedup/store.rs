// src/dedup/store.rs
//! Time-bounded, append-only log of published items.
//!
//! On-disk format (kept bit-compatible with logs written by earlier bots):
//! one UTF-8 line per record, pipe-delimited:
//!
//! ```text
//! <ISO-8601 timestamp>|<normalized URL>|<normalized title>|<hex content hash>
//! ```
//!
//! The title may itself contain `|`; the parser takes the first field as the
//! timestamp, the last as the hash, and joins everything between back into
//! the title. Loading prunes records past the retention horizon and rewrites
//! the file, so the log is self-pruning across runs.
//!
//! Single-writer: the store is owned by one bot process per run. Overlapping
//! runs against a shared file are a scheduling error, not something this
//! module guards against.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ingest::parse_timestamp;

/// One published item, persisted exactly once per successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub published_at: DateTime<Utc>,
    pub normalized_url: String,
    pub normalized_title: String,
    pub content_hash: String,
}

impl PublishedRecord {
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.published_at.to_rfc3339(),
            self.normalized_url,
            self.normalized_title,
            self.content_hash
        )
    }

    /// Parse one log line. `None` for malformed input (wrong field count,
    /// unparseable timestamp); callers skip such lines rather than fail.
    pub fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.trim().split('|').collect();
        if parts.len() < 4 {
            return None;
        }
        let published_at = parse_timestamp(parts[0])?;
        Some(Self {
            published_at,
            normalized_url: parts[1].to_string(),
            normalized_title: parts[2..parts.len() - 1].join("|"),
            content_hash: parts[parts.len() - 1].to_string(),
        })
    }
}

/// In-memory sets over the live log, for O(1) membership tests.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    urls: HashSet<String>,
    titles: HashSet<String>,
    hashes: HashSet<String>,
}

impl DedupStore {
    /// Load the log at `path`, discarding records older than
    /// `now - retention` and rewriting the file with only retained lines.
    /// A missing file yields an empty store (and an empty file on disk).
    pub fn load(path: impl AsRef<Path>, retention: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let horizon = Utc::now() - retention;

        let mut store = Self {
            path: path.clone(),
            urls: HashSet::new(),
            titles: HashSet::new(),
            hashes: HashSet::new(),
        };

        let mut retained: Vec<String> = Vec::new();
        let mut expired = 0usize;
        let mut malformed = 0usize;

        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading dedup log {}", path.display()))?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match PublishedRecord::parse_line(line) {
                    Some(rec) if rec.published_at > horizon => {
                        store.remember(&rec);
                        // Keep the original bytes so interop logs round-trip.
                        retained.push(line.to_string());
                    }
                    Some(_) => expired += 1,
                    None => {
                        debug!(line, "skipping malformed dedup line");
                        malformed += 1;
                    }
                }
            }
        }

        let mut body = retained.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        fs::write(&path, body)
            .with_context(|| format!("rewriting dedup log {}", path.display()))?;

        info!(
            retained = retained.len(),
            expired, malformed, "loaded dedup log"
        );
        Ok(store)
    }

    /// Append one record and update the in-memory sets. Call only after the
    /// corresponding publish succeeded; the log must never claim an item was
    /// surfaced when it wasn't.
    pub fn append(&mut self, rec: &PublishedRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening dedup log {}", self.path.display()))?;
        writeln!(f, "{}", rec.to_line())
            .with_context(|| format!("appending to dedup log {}", self.path.display()))?;
        self.remember(rec);
        Ok(())
    }

    fn remember(&mut self, rec: &PublishedRecord) {
        self.urls.insert(rec.normalized_url.clone());
        self.titles.insert(rec.normalized_title.clone());
        self.hashes.insert(rec.content_hash.clone());
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Stored normalized titles, for fuzzy matching.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.titles.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
