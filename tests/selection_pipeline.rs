// tests/selection_pipeline.rs
//! End-to-end pipeline runs against fixture feeds and a recording
//! publisher: filtering, dedup, window expansion, ranking, quota.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

use newsfeed_curator::ingest::article::ArticleFetcher;
use newsfeed_curator::publish::{PostContent, PublishError, Publisher, Sleeper, SubmissionId};
use newsfeed_curator::{
    BotConfig, Candidate, Curator, DedupStore, FeedSource, PublishedRecord,
};

const CONFIG: &str = r#"
[bot]
name = "testbot"
user_agent = "testbot/0.1"
title_suffix = "| UK News"
quota = 2
post_delay_secs = 40

[window]
mode = "expanding"
hours = 3
step_hours = 3
ceiling_hours = 12

[dedup]
log_path = "unused.txt"
mode = "fuzzy"
fuzzy_threshold = 0.9

[relevance]
threshold = 3
strong = ["breaking"]

[relevance.levels]
low = 2
medium = 4
high = 7
very_high = 10

[weights.positive]
nhs = 3
parliament = 3

[weights.negative]
gossip = 5

[[filters.promotional]]
keyword = "giveaway"
"#;

struct StaticFeed {
    name: String,
    items: Vec<Candidate>,
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> anyhow::Result<Vec<Candidate>> {
        Ok(self.items.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct FixedArticle(&'static str);

#[async_trait]
impl ArticleFetcher for FixedArticle {
    async fn first_paragraphs(&self, _url: &str) -> String {
        self.0.to_string()
    }
}

#[derive(Default)]
struct RecordingPublisher {
    submissions: Mutex<Vec<PostContent>>,
    replies: Mutex<Vec<(String, String)>>,
    next_id: AtomicUsize,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn submit(&self, post: &PostContent) -> Result<SubmissionId, PublishError> {
        self.submissions.lock().push(post.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SubmissionId(format!("s{id}")))
    }

    async fn reply(&self, parent: &SubmissionId, body: &str) -> Result<(), PublishError> {
        self.replies.lock().push((parent.0.clone(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<std::time::Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: std::time::Duration) {
        self.delays.lock().push(d);
    }
}

fn candidate(title: &str, link: &str, summary: &str, age: Option<Duration>) -> Candidate {
    Candidate {
        title: title.to_string(),
        link: link.to_string(),
        summary: summary.to_string(),
        published_at: age.map(|d| Utc::now() - d),
        source: "Test".to_string(),
    }
}

#[tokio::test]
async fn full_pass_filters_dedups_expands_and_publishes() {
    let dir = tempdir().unwrap();
    let mut store = DedupStore::load(dir.path().join("posted.log"), Duration::days(7)).unwrap();
    // Pre-seed a published story so its URL collides.
    store
        .append(&PublishedRecord {
            published_at: Utc::now(),
            normalized_url: "https://example.org/dup".into(),
            normalized_title: "an older headline entirely".into(),
            content_hash: "0123456789abcdef0123456789abcdef".into(),
        })
        .unwrap();

    let feed = StaticFeed {
        name: "Test".into(),
        items: vec![
            candidate(
                "NHS waiting lists fall sharply",
                "https://example.org/a",
                "New NHS figures show progress.",
                Some(Duration::hours(1)),
            ),
            candidate(
                "Parliament debates budget",
                "https://example.org/b",
                "A long sitting.",
                Some(Duration::hours(8)),
            ),
            candidate(
                "Quiet day in town",
                "https://example.org/c",
                "Nothing notable.",
                Some(Duration::hours(1)),
            ),
            candidate(
                "Big giveaway today",
                "https://example.org/d",
                "Enter now.",
                Some(Duration::hours(1)),
            ),
            candidate(
                "Stamped from the future",
                "https://example.org/e",
                "Clock noise.",
                Some(Duration::hours(-2)),
            ),
            candidate("Undated story", "https://example.org/f", "No clock.", None),
            candidate(
                "Dup story resurfaces",
                "https://example.org/dup?utm=x",
                "Same link again.",
                Some(Duration::hours(1)),
            ),
        ],
    };
    let feeds: Vec<Box<dyn FeedSource>> = vec![Box::new(feed)];

    let curator = Curator::new(BotConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let publisher = RecordingPublisher::default();
    let sleeper = RecordingSleeper::default();
    let report = curator
        .run_once(&feeds, &FixedArticle("Quoted paragraph."), &publisher, &mut store, &sleeper)
        .await
        .unwrap();

    assert_eq!(report.fetched, 7);
    assert_eq!(report.rejected_recency, 2);
    assert_eq!(report.rejected_filter, 1);
    assert_eq!(report.rejected_duplicate, 1);
    assert_eq!(report.rejected_relevance, 1);
    assert_eq!(report.selected, 2);
    assert_eq!(report.published, 2);
    assert_eq!(report.publish_failures, 0);
    // The 3h and 6h windows hold one survivor each; 9h finally fits both.
    assert_eq!(report.window_hours, 9);

    let subs = publisher.submissions.lock();
    assert_eq!(subs.len(), 2);
    // Ranked by score: the double NHS mention outranks parliament.
    assert_eq!(subs[0].title, "NHS waiting lists fall sharply | UK News");
    assert_eq!(subs[1].title, "Parliament debates budget | UK News");

    let replies = publisher.replies.lock();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].1.starts_with("> Quoted paragraph."));
    assert!(replies[0].1.contains("[Read more](https://example.org/a)"));

    // One inter-post delay between the two publishes.
    assert_eq!(
        *sleeper.delays.lock(),
        vec![std::time::Duration::from_secs(40)]
    );

    // Both winners landed in the dedup log; the seed makes three.
    assert_eq!(store.len(), 3);
    assert!(store.contains_url("https://example.org/a"));
    assert!(store.contains_url("https://example.org/b"));
}

#[tokio::test]
async fn strong_keyword_rescues_low_score() {
    let dir = tempdir().unwrap();
    let mut store = DedupStore::load(dir.path().join("posted.log"), Duration::days(7)).unwrap();

    let feed = StaticFeed {
        name: "Test".into(),
        items: vec![candidate(
            "Breaking: incident at local depot",
            "https://example.org/strong",
            "Few details yet.",
            Some(Duration::hours(1)),
        )],
    };
    let feeds: Vec<Box<dyn FeedSource>> = vec![Box::new(feed)];

    let curator = Curator::new(BotConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let publisher = RecordingPublisher::default();
    let report = curator
        .run_once(
            &feeds,
            &FixedArticle(""),
            &publisher,
            &mut store,
            &RecordingSleeper::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.rejected_relevance, 0);
    assert_eq!(report.published, 1);
    // Empty excerpt means no reply thread.
    assert!(publisher.replies.lock().is_empty());
}

#[tokio::test]
async fn near_duplicate_title_never_reaches_the_publisher() {
    let dir = tempdir().unwrap();
    let mut store = DedupStore::load(dir.path().join("posted.log"), Duration::days(7)).unwrap();
    store
        .append(&PublishedRecord {
            published_at: Utc::now(),
            normalized_url: "https://other-outlet.org/story".into(),
            normalized_title: "nhs waiting lists fall sharply in england".into(),
            content_hash: "fedcba9876543210fedcba9876543210".into(),
        })
        .unwrap();

    // Same story from a second outlet: different URL, slightly reworded
    // headline, similarity above the 0.9 threshold.
    let feed = StaticFeed {
        name: "Test".into(),
        items: vec![candidate(
            "NHS waiting lists fall sharply in England again",
            "https://example.org/same-story",
            "Figures out today.",
            Some(Duration::hours(1)),
        )],
    };
    let feeds: Vec<Box<dyn FeedSource>> = vec![Box::new(feed)];

    let curator = Curator::new(BotConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let publisher = RecordingPublisher::default();
    let report = curator
        .run_once(
            &feeds,
            &FixedArticle(""),
            &publisher,
            &mut store,
            &RecordingSleeper::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.rejected_duplicate, 1);
    assert_eq!(report.published, 0);
    assert!(publisher.submissions.lock().is_empty());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn schedule_exhaustion_publishes_what_exists() {
    let dir = tempdir().unwrap();
    let mut store = DedupStore::load(dir.path().join("posted.log"), Duration::days(7)).unwrap();

    // Only one survivor against a quota of two; the window expands to its
    // ceiling and the run publishes the single story rather than nothing.
    let feed = StaticFeed {
        name: "Test".into(),
        items: vec![candidate(
            "NHS report published",
            "https://example.org/only",
            "Steady figures.",
            Some(Duration::hours(1)),
        )],
    };
    let feeds: Vec<Box<dyn FeedSource>> = vec![Box::new(feed)];

    let curator = Curator::new(BotConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let publisher = RecordingPublisher::default();
    let report = curator
        .run_once(
            &feeds,
            &FixedArticle(""),
            &publisher,
            &mut store,
            &RecordingSleeper::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.selected, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.window_hours, 12);
}
