// tests/publish_retry.rs
//! Rate-limit backoff behavior through a full pipeline pass: delays follow
//! the 40s/80s schedule, and the dedup log only records stories that
//! actually went out.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

use newsfeed_curator::ingest::article::ArticleFetcher;
use newsfeed_curator::publish::{PostContent, PublishError, Publisher, Sleeper, SubmissionId};
use newsfeed_curator::{BotConfig, Candidate, Curator, DedupStore, FeedSource};

const CONFIG: &str = r#"
[bot]
name = "testbot"
user_agent = "testbot/0.1"
quota = 1
post_delay_secs = 40

[window]
mode = "fixed"
hours = 3

[dedup]
log_path = "unused.txt"

[relevance]
threshold = 1
strong = []

[relevance.levels]
low = 1
medium = 2
high = 3
very_high = 4

[weights.positive]
nhs = 3

[publish]
max_attempts = 3
base_delay_secs = 40
"#;

struct OneStory;

#[async_trait]
impl FeedSource for OneStory {
    async fn fetch(&self) -> anyhow::Result<Vec<Candidate>> {
        Ok(vec![Candidate {
            title: "NHS announcement".into(),
            link: "https://example.org/story".into(),
            summary: "Details inside.".into(),
            published_at: Some(Utc::now() - Duration::hours(1)),
            source: "Test".into(),
        }])
    }

    fn name(&self) -> &str {
        "Test"
    }
}

struct NoArticle;

#[async_trait]
impl ArticleFetcher for NoArticle {
    async fn first_paragraphs(&self, _url: &str) -> String {
        String::new()
    }
}

/// Rate-limits the first `limit_count` submissions, then accepts.
struct ThrottledPublisher {
    remaining_limits: AtomicUsize,
    accepted: Mutex<Vec<PostContent>>,
}

#[async_trait]
impl Publisher for ThrottledPublisher {
    async fn submit(&self, post: &PostContent) -> Result<SubmissionId, PublishError> {
        let before = self
            .remaining_limits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if before > 0 {
            return Err(PublishError::RateLimited);
        }
        self.accepted.lock().push(post.clone());
        Ok(SubmissionId("ok".into()))
    }

    async fn reply(&self, _parent: &SubmissionId, _body: &str) -> Result<(), PublishError> {
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

#[tokio::test]
async fn two_rate_limits_back_off_then_succeed() {
    let dir = tempdir().unwrap();
    let mut store = DedupStore::load(dir.path().join("posted.log"), Duration::days(7)).unwrap();
    let feeds: Vec<Box<dyn FeedSource>> = vec![Box::new(OneStory)];

    let publisher = ThrottledPublisher {
        remaining_limits: AtomicUsize::new(2),
        accepted: Mutex::new(Vec::new()),
    };
    let sleeper = RecordingSleeper::default();

    let curator = Curator::new(BotConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let report = curator
        .run_once(&feeds, &NoArticle, &publisher, &mut store, &sleeper)
        .await
        .unwrap();

    assert_eq!(report.published, 1);
    assert_eq!(report.publish_failures, 0);
    assert_eq!(
        *sleeper.delays.lock(),
        vec![
            std::time::Duration::from_secs(40),
            std::time::Duration::from_secs(80)
        ]
    );
    assert_eq!(publisher.accepted.lock().len(), 1);
    assert_eq!(store.len(), 1);
    assert!(store.contains_url("https://example.org/story"));
}

#[tokio::test]
async fn exhausted_retries_leave_no_dedup_record() {
    let dir = tempdir().unwrap();
    let mut store = DedupStore::load(dir.path().join("posted.log"), Duration::days(7)).unwrap();
    let feeds: Vec<Box<dyn FeedSource>> = vec![Box::new(OneStory)];

    // Always rate-limited: 3 attempts, then the story is dropped unlogged
    // so a later run can try it again.
    let publisher = ThrottledPublisher {
        remaining_limits: AtomicUsize::new(usize::MAX),
        accepted: Mutex::new(Vec::new()),
    };
    let sleeper = RecordingSleeper::default();

    let curator = Curator::new(BotConfig::from_toml_str(CONFIG).unwrap()).unwrap();
    let report = curator
        .run_once(&feeds, &NoArticle, &publisher, &mut store, &sleeper)
        .await
        .unwrap();

    assert_eq!(report.published, 0);
    assert_eq!(report.publish_failures, 1);
    assert_eq!(sleeper.delays.lock().len(), 2);
    assert!(store.is_empty());
}
