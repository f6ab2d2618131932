// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod dedup;
pub mod engine;
pub mod fingerprint;
pub mod ingest;
pub mod normalize;
pub mod publish;
pub mod relevance;

// ---- Re-exports for stable public API ----
pub use crate::config::BotConfig;
pub use crate::dedup::detect::{find_duplicate, CandidateSignature, DuplicateReason, MatchMode};
pub use crate::dedup::store::{DedupStore, PublishedRecord};
pub use crate::engine::{Curator, RunReport};
pub use crate::ingest::types::{Candidate, FeedSource};
pub use crate::publish::{PostContent, PublishError, Publisher, RetryPolicy, Sleeper, SubmissionId};
