// src/ingest/article.rs
//! Article-text collaborator: fetches a story URL and returns a cleaned
//! excerpt for the threaded reply. This boundary never raises; any failure
//! degrades to an empty string and the post simply goes out without a quote.

use async_trait::async_trait;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Paragraphs shorter than this are navigation crumbs, captions, or bylines.
const MIN_PARAGRAPH_CHARS: usize = 40;

/// How many paragraphs make up the excerpt in the default mode.
const EXCERPT_PARAGRAPHS: usize = 3;

static RE_BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(copyright|all rights reserved|cookie|subscribe|sign up|newsletter|^by\s+\w+\s+\w+$)")
        .expect("boilerplate regex")
});

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Cleaned body text for `url`, or an empty string on any failure.
    async fn first_paragraphs(&self, url: &str) -> String;
}

pub struct HttpArticleFetcher {
    client: reqwest::Client,
    /// `None` means full-text mode: return every qualifying paragraph.
    max_paragraphs: Option<usize>,
}

impl HttpArticleFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building article http client")?;
        Ok(Self {
            client,
            max_paragraphs: Some(EXCERPT_PARAGRAPHS),
        })
    }

    /// Switch to full-text mode (all qualifying paragraphs, not just 3).
    pub fn full_text(mut self) -> Self {
        self.max_paragraphs = None;
        self
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn first_paragraphs(&self, url: &str) -> String {
        let body = match self.client.get(url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(ok) => match ok.text().await {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(error = ?e, url, "article body read failed");
                        return String::new();
                    }
                },
                Err(e) => {
                    tracing::warn!(error = ?e, url, "article fetch rejected");
                    return String::new();
                }
            },
            Err(e) => {
                tracing::warn!(error = ?e, url, "article fetch failed");
                return String::new();
            }
        };
        extract_paragraphs(&body, self.max_paragraphs)
    }
}

/// Pull qualifying `<p>` texts out of an HTML document and join the first
/// `max` (or all of them) with blank lines.
pub fn extract_paragraphs(html: &str, max: Option<usize>) -> String {
    static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("p selector"));
    static SKIP_PARENTS: Lazy<Selector> = Lazy::new(|| {
        Selector::parse("nav p, footer p, header p, aside p, figure p").expect("skip selector")
    });

    let doc = Html::parse_document(html);

    // Collect boilerplate-container paragraphs once so the main pass can
    // skip them without walking ancestors per node.
    let skipped: Vec<_> = doc.select(&SKIP_PARENTS).map(|el| el.id()).collect();

    let mut paras = Vec::new();
    for el in doc.select(&P) {
        if skipped.contains(&el.id()) {
            continue;
        }
        let text = el.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        if RE_BOILERPLATE.is_match(&text) {
            continue;
        }
        paras.push(text);
        if let Some(limit) = max {
            if paras.len() >= limit {
                break;
            }
        }
    }
    paras.join("\n\n")
}
