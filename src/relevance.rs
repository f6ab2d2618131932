// src/relevance.rs
//! Keyword relevance scoring and the content filters that run before it.
//!
//! All tables are compiled once from config into anchored, case-insensitive
//! word-boundary regexes; scoring a candidate is then a linear scan with no
//! allocation beyond the match map.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Title and summary folded into the single lowercase haystack every table
/// matches against. HTML entities are decoded first so `&amp;co` scores
/// like `&co`.
pub fn combined_text(title: &str, summary: &str) -> String {
    let raw = format!("{} {}", title, summary);
    html_escape::decode_html_entities(&raw).to_lowercase()
}

fn word_re(keyword: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
        .with_context(|| format!("compiling keyword pattern for {keyword:?}"))
}

/// One weighted keyword table, positive or negative weights alike.
pub struct KeywordSet {
    entries: Vec<(String, Regex, i32)>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub score: i32,
    /// Positive-weight keywords that matched, with occurrence counts.
    pub matched: BTreeMap<String, usize>,
}

impl KeywordSet {
    pub fn compile(weights: &BTreeMap<String, i32>) -> Result<Self> {
        let mut entries = Vec::with_capacity(weights.len());
        for (kw, &w) in weights {
            entries.push((kw.clone(), word_re(kw)?, w));
        }
        Ok(Self { entries })
    }

    /// Score `text` by counting occurrences of each keyword and summing
    /// `count * weight`. Repeated mentions compound, so a story that keeps
    /// hammering a topic outranks a passing reference.
    pub fn score(&self, text: &str) -> ScoreResult {
        let mut result = ScoreResult::default();
        for (kw, re, weight) in &self.entries {
            let count = re.find_iter(text).count();
            if count == 0 {
                continue;
            }
            result.score += count as i32 * weight;
            if *weight > 0 {
                *result.matched.entry(kw.clone()).or_insert(0) += count;
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keywords whose mere presence marks a story as must-see regardless of its
/// numeric score.
pub struct StrongKeywords {
    entries: Vec<(String, Regex)>,
}

impl StrongKeywords {
    pub fn compile(keywords: &[String]) -> Result<Self> {
        let mut entries = Vec::with_capacity(keywords.len());
        for kw in keywords {
            entries.push((kw.clone(), word_re(kw)?));
        }
        Ok(Self { entries })
    }

    /// First strong keyword present in `text`, if any.
    pub fn first_hit(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(kw, _)| kw.as_str())
    }
}

/// Flat bonus for links hosted on (or under) a whitelisted domain.
pub fn domain_bonus(link: &str, whitelist: &[String], bonus: i32) -> i32 {
    let host = match Url::parse(link).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(h) => h,
        None => return 0,
    };
    for dom in whitelist {
        let dom = dom.to_lowercase();
        if host == dom || host.ends_with(&format!(".{dom}")) {
            return bonus;
        }
    }
    0
}

/// A free-form regex bonus, applied at most once per candidate.
pub struct PatternBonus {
    pub label: String,
    re: Regex,
    pub bonus: i32,
}

impl PatternBonus {
    pub fn compile(label: &str, pattern: &str, bonus: i32) -> Result<Self> {
        Ok(Self {
            label: label.to_string(),
            re: Regex::new(pattern)
                .with_context(|| format!("compiling bonus pattern {label:?}"))?,
            bonus,
        })
    }

    pub fn apply(&self, text: &str) -> i32 {
        if self.re.is_match(text) {
            self.bonus
        } else {
            0
        }
    }
}

/// Ordinal relevance bands. `Ord` follows declaration order, so
/// `VeryLow < Low < Medium < High < VeryHigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RelevanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelevanceLevel::VeryLow => "very_low",
            RelevanceLevel::Low => "low",
            RelevanceLevel::Medium => "medium",
            RelevanceLevel::High => "high",
            RelevanceLevel::VeryHigh => "very_high",
        }
    }
}

/// Score cutoffs for each band; a score below `low` is `VeryLow`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub low: i32,
    pub medium: i32,
    pub high: i32,
    pub very_high: i32,
}

/// Map a score to its band. A strong-keyword hit floors the result at
/// `High` no matter how low the numeric score landed.
pub fn classify(score: i32, has_strong: bool, t: &LevelThresholds) -> RelevanceLevel {
    let by_score = if score >= t.very_high {
        RelevanceLevel::VeryHigh
    } else if score >= t.high {
        RelevanceLevel::High
    } else if score >= t.medium {
        RelevanceLevel::Medium
    } else if score >= t.low {
        RelevanceLevel::Low
    } else {
        RelevanceLevel::VeryLow
    };
    if has_strong {
        by_score.max(RelevanceLevel::High)
    } else {
        by_score
    }
}

/// One reject rule: a trigger substring plus exception substrings that
/// rescue the candidate ("offer" rejects, unless "charity" also appears).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterRule {
    pub keyword: String,
    #[serde(default)]
    pub unless_any: Vec<String>,
}

/// Ordered substring filter; the first triggering rule names the reject.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    rules: Vec<FilterRule>,
}

impl ContentFilter {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    /// Returns the keyword of the first rule that fires on the (already
    /// lowercased) text, or `None` if the candidate is clean.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        for rule in &self.rules {
            if !text.contains(rule.keyword.as_str()) {
                continue;
            }
            let rescued = rule
                .unless_any
                .iter()
                .any(|exc| text.contains(exc.as_str()));
            if !rescued {
                return Some(&rule.keyword);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Ordered category rules mapping keyword hits to a label (used for post
/// flair). First rule with any hit wins; otherwise the default label.
pub struct CategoryRules {
    rules: Vec<(String, Vec<Regex>)>,
    default_label: Option<String>,
}

impl CategoryRules {
    pub fn compile(
        rules: &[(String, Vec<String>)],
        default_label: Option<String>,
    ) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (label, keywords) in rules {
            let mut res = Vec::with_capacity(keywords.len());
            for kw in keywords {
                res.push(word_re(kw)?);
            }
            compiled.push((label.clone(), res));
        }
        Ok(Self {
            rules: compiled,
            default_label,
        })
    }

    pub fn label_for(&self, text: &str) -> Option<&str> {
        for (label, res) in &self.rules {
            if res.iter().any(|re| re.is_match(text)) {
                return Some(label);
            }
        }
        self.default_label.as_deref()
    }
}

static METRICS_READY: OnceCell<()> = OnceCell::new();

/// Register metric descriptions once per process.
pub fn ensure_metrics_described() {
    METRICS_READY.get_or_init(|| {
        metrics::describe_counter!(
            "curator_scored_total",
            "Candidates that reached relevance scoring"
        );
        metrics::describe_counter!(
            "curator_filtered_total",
            "Candidates rejected by content filters"
        );
        metrics::describe_counter!(
            "curator_duplicates_total",
            "Candidates rejected as duplicates"
        );
        metrics::describe_counter!(
            "curator_published_total",
            "Candidates successfully published"
        );
        metrics::describe_histogram!(
            "curator_feed_parse_ms",
            "Milliseconds spent parsing one feed document"
        );
    });
}
