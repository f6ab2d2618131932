// src/normalize.rs
//! URL and title canonicalization used by the duplicate detector and the
//! persisted dedup log. Both functions are deterministic and idempotent so
//! that records written by earlier runs keep matching.

use once_cell::sync::OnceCell;
use regex::Regex;
use url::Url;

/// Canonicalize a URL for comparison: keep scheme + host + path, drop the
/// query string and fragment, and strip trailing slashes from the path.
/// Two links differing only in tracking parameters normalize identically.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(u) if u.has_host() => {
            let mut out = String::with_capacity(raw.len());
            out.push_str(u.scheme());
            out.push_str("://");
            out.push_str(u.host_str().unwrap_or_default());
            if let Some(port) = u.port() {
                out.push(':');
                out.push_str(&port.to_string());
            }
            out.push_str(u.path().trim_end_matches('/'));
            out
        }
        _ => {
            // Not an absolute URL; best-effort textual cleanup.
            let cut = raw.trim();
            let cut = cut.split('#').next().unwrap_or(cut);
            let cut = cut.split('?').next().unwrap_or(cut);
            cut.trim_end_matches('/').to_string()
        }
    }
}

fn re_punct() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s£$€]").expect("punctuation regex"))
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Canonicalize a headline for comparison: HTML-unescape, drop punctuation
/// (currency symbols survive, headlines like "£2bn deal" stay distinct),
/// collapse whitespace runs, lowercase, trim.
pub fn normalize_title(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let stripped = re_punct().replace_all(&decoded, "");
    let collapsed = re_ws().replace_all(&stripped, " ");
    collapsed.trim().to_lowercase()
}
