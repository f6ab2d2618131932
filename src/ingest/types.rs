// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// An inbound news item pulled from one feed. Ephemeral: constructed per
/// fetch, discarded after processing or promoted into the dedup log.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// Absolute URL of the story.
    pub link: String,
    /// Feed summary; possibly HTML-escaped or truncated, possibly empty.
    pub summary: String,
    /// UTC publish instant; `None` when the feed gave nothing parseable.
    pub published_at: Option<DateTime<Utc>>,
    /// Label of the originating feed, e.g. "BBC UK".
    pub source: String,
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}
