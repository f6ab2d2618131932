// src/fingerprint.rs
//! Content fingerprinting: a fixed-length digest over a headline plus a
//! bounded summary prefix. Two items with the same title and opening summary
//! text collide on purpose; this is a fuzzy-equivalence signal for the
//! duplicate detector, not a cryptographic identity.

use sha2::{Digest, Sha256};

/// Characters of the summary that participate in the fingerprint. Outlets
/// append ever-changing boilerplate past the lede, so only the opening is
/// hashed.
pub const SUMMARY_PREFIX_CHARS: usize = 300;

/// 128-bit hex digest over unescaped `title + " " + summary[..300]`.
pub fn content_hash(title: &str, summary: &str) -> String {
    let prefix: String = summary.chars().take(SUMMARY_PREFIX_CHARS).collect();
    let blob = html_escape::decode_html_entities(&format!("{title} {prefix}")).to_string();

    let digest = Sha256::digest(blob.as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
