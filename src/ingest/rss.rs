// src/ingest/rss.rs
//! RSS feed provider. Supports an HTTP mode for real runs and a fixture mode
//! so pipeline tests can feed canned XML without a network.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::parse_timestamp;
use crate::ingest::types::{Candidate, FeedSource};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date")]
    dc_date: Option<String>,
    description: Option<String>,
}

pub struct RssFeedSource {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedSource {
    pub fn from_url(name: impl Into<String>, url: impl Into<String>, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    /// Parse from a canned XML string; used by tests and offline runs.
    pub fn from_fixture_str(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items(&self, body: &str) -> Result<Vec<Candidate>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(body);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = it.title.unwrap_or_default();
            let link = it.link.unwrap_or_default();
            if title.trim().is_empty() || link.trim().is_empty() {
                continue;
            }
            let published_at = it
                .pub_date
                .as_deref()
                .or(it.dc_date.as_deref())
                .and_then(parse_timestamp);
            out.push(Candidate {
                title,
                link: link.trim().to_string(),
                summary: it.description.unwrap_or_default(),
                published_at,
                source: self.name.clone(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("curator_feed_parse_ms").record(ms);
        counter!("curator_feed_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self) -> Result<Vec<Candidate>> {
        match &self.mode {
            Mode::Fixture(xml) => self.parse_items(xml),
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp.text().await.context("reading feed body")?,
                    Err(e) => {
                        tracing::warn!(error = ?e, feed = %self.name, "feed http error");
                        counter!("curator_feed_errors_total").increment(1);
                        return Err(e).context("feed http get");
                    }
                };
                self.parse_items(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// quick-xml chokes on bare HTML entities inside descriptions; replace the
// common ones before deserializing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>First story</title>
      <link>https://example.org/one?utm=x</link>
      <description>Something happened.</description>
      <pubDate>Fri, 29 Aug 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No date story</title>
      <link>https://example.org/two</link>
      <description>Undated.</description>
    </item>
    <item>
      <title></title>
      <link>https://example.org/skipped</link>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn fixture_parses_items_and_dates() {
        let src = RssFeedSource::from_fixture_str("Test", FIXTURE);
        let got = src.fetch().await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].title, "First story");
        assert_eq!(got[0].source, "Test");
        assert!(got[0].published_at.is_some());
        assert!(got[1].published_at.is_none());
    }

    #[tokio::test]
    async fn broken_xml_is_an_error_not_a_panic() {
        let src = RssFeedSource::from_fixture_str("Test", "<rss><channel><item>");
        assert!(src.fetch().await.is_err());
    }
}
