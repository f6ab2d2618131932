// src/ingest/mod.rs
//! Feed intake: the `FeedSource` trait, the RSS provider, the article-text
//! fetcher, and timestamp parsing shared with the dedup log loader.

pub mod article;
pub mod rss;
pub mod types;

use chrono::{DateTime, NaiveDateTime, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

/// Parse a timestamp string as found in feeds (`pubDate`, `dc:date`) or in
/// the dedup log. Tries RFC 3339, then RFC 2822, then a bare ISO datetime
/// treated as UTC. Returns `None` rather than failing; an entry without a
/// parseable instant simply has no publish time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        let unix = dt.to_offset(UtcOffset::UTC).unix_timestamp();
        return DateTime::<Utc>::from_timestamp(unix, 0);
    }

    // Naive "2025-08-29T12:00:00[.123]" with no offset: assume UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}
