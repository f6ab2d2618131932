// src/publish.rs
//! Publishing boundary: the `Publisher` trait, rate-limit retry with
//! exponential backoff, and a dry-run implementation for local runs and
//! tests. Real destinations (a subreddit, a webhook) implement `Publisher`
//! outside this crate's concern for scoring and dedup.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// A fully assembled post, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent {
    pub title: String,
    pub link: String,
    /// Threaded reply body (article excerpt); skipped when `None` or empty.
    pub body: Option<String>,
    pub flair: Option<String>,
}

/// Opaque handle to a submitted post, used to attach the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionId(pub String);

#[derive(Debug, Error)]
pub enum PublishError {
    /// The destination asked us to slow down. Retryable.
    #[error("rate limited by destination")]
    RateLimited,
    /// The destination refused the content. Not retryable.
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("transport failure")]
    Transport(#[source] anyhow::Error),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn submit(&self, post: &PostContent) -> Result<SubmissionId, PublishError>;
    async fn reply(&self, parent: &SubmissionId, body: &str) -> Result<(), PublishError>;
}

/// Injectable clock-sleep so tests assert on delays instead of waiting
/// through them.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Backoff schedule for rate-limited submissions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after attempt number `attempt` (0-based):
    /// `base * 2^attempt`, so 40s, 80s, 160s with the default base.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(40),
        }
    }
}

/// Submit with retry on rate limiting only. Rejections and transport
/// failures surface immediately; a rate limit sleeps per the policy and
/// tries again until attempts run out.
pub async fn submit_with_retry(
    publisher: &dyn Publisher,
    post: &PostContent,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<SubmissionId, PublishError> {
    let mut attempt = 0u32;
    loop {
        match publisher.submit(post).await {
            Ok(id) => return Ok(id),
            Err(PublishError::RateLimited) if attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    title = %post.title,
                    "rate limited, backing off"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Publisher that logs instead of posting. Used for dry runs and as the
/// default destination until a real one is wired in.
#[derive(Default)]
pub struct DryRunPublisher {
    next_id: AtomicUsize,
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn submit(&self, post: &PostContent) -> Result<SubmissionId, PublishError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(
            title = %post.title,
            link = %post.link,
            flair = post.flair.as_deref().unwrap_or("-"),
            "dry-run submit"
        );
        Ok(SubmissionId(format!("dryrun-{id}")))
    }

    async fn reply(&self, parent: &SubmissionId, body: &str) -> Result<(), PublishError> {
        info!(parent = %parent.0, chars = body.len(), "dry-run reply");
        Ok(())
    }
}
