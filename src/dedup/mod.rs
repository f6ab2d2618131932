// src/dedup/mod.rs
//! Duplicate suppression: the persistent published-item log and the
//! multi-signal detector that consults it.

pub mod detect;
pub mod store;

pub use detect::{find_duplicate, sequence_ratio, CandidateSignature, DuplicateReason, MatchMode};
pub use store::{DedupStore, PublishedRecord};
