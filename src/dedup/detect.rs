// src/dedup/detect.rs
//! Multi-signal duplicate detection over the published log.
//!
//! A candidate is reduced to a [`CandidateSignature`] (normalized URL,
//! normalized title, content hash) and checked against the store in a fixed
//! order: URL, then title (exact or fuzzy per [`MatchMode`]), then content
//! hash. The first matching signal wins and names the reason, so reject
//! logs stay stable across runs.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use crate::dedup::store::{DedupStore, PublishedRecord};
use crate::fingerprint::content_hash;
use crate::normalize::{normalize_title, normalize_url};

/// How stored titles are compared against a candidate's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchMode {
    /// Set membership on the normalized title only.
    Exact,
    /// Exact membership first, then pairwise similarity; a stored title
    /// with `sequence_ratio` strictly above `threshold` is a duplicate.
    Fuzzy { threshold: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    Url,
    Title,
    TitleFuzzy,
    ContentHash,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DuplicateReason::Url => "duplicate URL",
            DuplicateReason::Title => "duplicate title",
            DuplicateReason::TitleFuzzy => "near-duplicate title",
            DuplicateReason::ContentHash => "duplicate content hash",
        };
        f.write_str(s)
    }
}

/// The three dedup signals for one candidate, computed once and reused for
/// both the lookup and the post-publish log append.
#[derive(Debug, Clone)]
pub struct CandidateSignature {
    pub normalized_url: String,
    pub normalized_title: String,
    pub content_hash: String,
}

impl CandidateSignature {
    pub fn new(title: &str, link: &str, summary: &str) -> Self {
        Self {
            normalized_url: normalize_url(link),
            normalized_title: normalize_title(title),
            content_hash: content_hash(title, summary),
        }
    }

    pub fn to_record(&self, at: DateTime<Utc>) -> PublishedRecord {
        PublishedRecord {
            published_at: at,
            normalized_url: self.normalized_url.clone(),
            normalized_title: self.normalized_title.clone(),
            content_hash: self.content_hash.clone(),
        }
    }
}

/// Check one candidate against the store. `None` means fresh.
pub fn find_duplicate(
    sig: &CandidateSignature,
    store: &DedupStore,
    mode: MatchMode,
) -> Option<DuplicateReason> {
    if store.contains_url(&sig.normalized_url) {
        return Some(DuplicateReason::Url);
    }

    if store.contains_title(&sig.normalized_title) {
        return Some(DuplicateReason::Title);
    }
    if let MatchMode::Fuzzy { threshold } = mode {
        for stored in store.titles() {
            if sequence_ratio(&sig.normalized_title, stored) > threshold {
                return Some(DuplicateReason::TitleFuzzy);
            }
        }
    }

    if store.contains_hash(&sig.content_hash) {
        return Some(DuplicateReason::ContentHash);
    }

    None
}

/// Ratcliff/Obershelp similarity over characters: twice the total length of
/// matching blocks divided by the combined length. 1.0 for identical
/// strings, 0.0 for disjoint ones. Raising a threshold can only shrink the
/// set of accepted pairs, so fuzzy matching tightens monotonically.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matches = matching_total(&a, &b, 0, a.len(), 0, b.len());
    2.0 * matches as f64 / (a.len() + b.len()) as f64
}

/// Total matched characters: find the longest common block in the window,
/// then recurse on the unmatched pieces to either side.
fn matching_total(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> usize {
    let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
    if size == 0 {
        return 0;
    }
    size + matching_total(a, b, alo, i, blo, j) + matching_total(a, b, i + size, ahi, j + size, bhi)
}

/// Longest matching block within `a[alo..ahi]` and `b[blo..bhi]`. Ties go
/// to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &ch) in b[blo..bhi].iter().enumerate() {
        b2j.entry(ch).or_default().push(blo + j);
    }

    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0usize);
    // j2len[j] = length of the match ending at a[i], b[j].
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        if let Some(js) = b2j.get(&a[i]) {
            for &j in js {
                let k = j2len.get(&(j.wrapping_sub(1))).copied().unwrap_or(0) + 1;
                new_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = new_j2len;
    }
    (best_i, best_j, best_size)
}
