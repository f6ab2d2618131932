// src/engine.rs
//! The run pipeline: fetch, filter, dedup, score, select, publish.
//!
//! One `run_once` call performs one curation pass. Collaborators (feeds,
//! article fetcher, publisher, sleeper) come in as trait objects so the
//! whole pipeline runs against fixtures in tests.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::{BotConfig, WindowConfig};
use crate::dedup::detect::{find_duplicate, CandidateSignature, MatchMode};
use crate::dedup::store::DedupStore;
use crate::ingest::article::ArticleFetcher;
use crate::ingest::types::{Candidate, FeedSource};
use crate::publish::{submit_with_retry, PostContent, Publisher, RetryPolicy, Sleeper};
use crate::relevance::{
    classify, combined_text, domain_bonus, ensure_metrics_described, CategoryRules, ContentFilter,
    KeywordSet, PatternBonus, RelevanceLevel, StrongKeywords,
};

/// Entries stamped further than this into the future are treated as clock
/// noise from the feed, not news.
fn future_skew() -> Duration {
    Duration::minutes(5)
}

/// Tally of one curation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub rejected_recency: usize,
    pub rejected_filter: usize,
    pub rejected_duplicate: usize,
    pub rejected_relevance: usize,
    pub selected: usize,
    pub published: usize,
    pub publish_failures: usize,
    /// The window that finally satisfied (or capped) the selection.
    pub window_hours: i64,
}

struct Scored {
    candidate: Candidate,
    signature: CandidateSignature,
    score: i32,
    level: RelevanceLevel,
}

/// Compiled pipeline state for one bot persona.
pub struct Curator {
    cfg: BotConfig,
    keywords: KeywordSet,
    strong: StrongKeywords,
    bonus_patterns: Vec<PatternBonus>,
    promotional: ContentFilter,
    opinion: ContentFilter,
    excluded: ContentFilter,
    fluff: ContentFilter,
    categories: CategoryRules,
    match_mode: MatchMode,
    retry: RetryPolicy,
}

impl Curator {
    /// Compile all keyword tables up front so a bad pattern fails the run
    /// at startup instead of mid-pass.
    pub fn new(cfg: BotConfig) -> Result<Self> {
        let mut combined = cfg.weights.positive.clone();
        for (kw, penalty) in &cfg.weights.negative {
            combined.insert(kw.clone(), -penalty);
        }
        let keywords = KeywordSet::compile(&combined).context("compiling keyword weights")?;
        let strong =
            StrongKeywords::compile(&cfg.relevance.strong).context("compiling strong keywords")?;

        let mut bonus_patterns = Vec::with_capacity(cfg.bonus_patterns.len());
        for bp in &cfg.bonus_patterns {
            bonus_patterns.push(PatternBonus::compile(&bp.label, &bp.pattern, bp.bonus)?);
        }

        let category_rules: Vec<(String, Vec<String>)> = cfg
            .category
            .rules
            .iter()
            .map(|r| (r.label.clone(), r.keywords.clone()))
            .collect();
        let categories = CategoryRules::compile(&category_rules, cfg.category.default.clone())
            .context("compiling category rules")?;

        Ok(Self {
            promotional: ContentFilter::new(cfg.filters.promotional.clone()),
            opinion: ContentFilter::new(cfg.filters.opinion.clone()),
            excluded: ContentFilter::new(cfg.filters.excluded.clone()),
            fluff: ContentFilter::new(cfg.filters.fluff.clone()),
            match_mode: cfg.dedup.match_mode(),
            retry: cfg.publish.retry_policy(),
            keywords,
            strong,
            bonus_patterns,
            categories,
            cfg,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.cfg
    }

    /// Post title with the configured suffix appended unless the headline
    /// already carries it.
    pub fn post_title(&self, title: &str) -> String {
        match &self.cfg.bot.title_suffix {
            Some(suffix) if !title.trim_end().ends_with(suffix.as_str()) => {
                format!("{} {}", title.trim_end(), suffix)
            }
            _ => title.trim_end().to_string(),
        }
    }

    /// The first content filter that fires, with its stage name.
    fn filter_verdict(&self, text: &str) -> Option<(&'static str, &str)> {
        if let Some(kw) = self.promotional.first_match(text) {
            return Some(("promotional", kw));
        }
        if let Some(kw) = self.opinion.first_match(text) {
            return Some(("opinion", kw));
        }
        if let Some(kw) = self.excluded.first_match(text) {
            return Some(("excluded_topic", kw));
        }
        if let Some(kw) = self.fluff.first_match(text) {
            return Some(("fluff", kw));
        }
        None
    }

    fn score_candidate(&self, candidate: &Candidate, text: &str) -> (i32, RelevanceLevel, bool) {
        let base = self.keywords.score(text);
        let mut score = base.score;
        score += domain_bonus(
            &candidate.link,
            &self.cfg.domains.whitelist,
            self.cfg.domains.bonus,
        );
        for bp in &self.bonus_patterns {
            score += bp.apply(text);
        }
        let strong_hit = self.strong.first_hit(text);
        let level = classify(score, strong_hit.is_some(), &self.cfg.relevance.levels);
        debug!(
            title = %candidate.title,
            score,
            level = level.as_str(),
            strong = strong_hit.unwrap_or("-"),
            matched = ?base.matched,
            "scored candidate"
        );
        (score, level, strong_hit.is_some())
    }

    /// One full curation pass. Collaborator failures inside the pass are
    /// logged and counted, never fatal; only store and compile errors abort.
    pub async fn run_once(
        &self,
        feeds: &[Box<dyn FeedSource>],
        articles: &dyn ArticleFetcher,
        publisher: &dyn Publisher,
        store: &mut DedupStore,
        sleeper: &dyn Sleeper,
    ) -> Result<RunReport> {
        ensure_metrics_described();
        let now = Utc::now();
        let mut report = RunReport::default();

        // Intake. A failing feed is skipped, the rest of the pass continues.
        let mut candidates: Vec<Candidate> = Vec::new();
        for feed in feeds {
            match feed.fetch().await {
                Ok(mut items) => {
                    debug!(feed = feed.name(), count = items.len(), "feed fetched");
                    candidates.append(&mut items);
                }
                Err(e) => {
                    warn!(feed = feed.name(), error = ?e, "feed fetch failed");
                }
            }
        }
        report.fetched = candidates.len();

        // Filter, dedup, score. Survivors keep their signature so the
        // publish stage can log them without recomputing.
        let mut survivors: Vec<Scored> = Vec::new();
        for candidate in candidates {
            let published_at = match candidate.published_at {
                Some(ts) if ts <= now + future_skew() => ts,
                Some(_) => {
                    debug!(title = %candidate.title, "future-dated entry skipped");
                    report.rejected_recency += 1;
                    continue;
                }
                None => {
                    report.rejected_recency += 1;
                    continue;
                }
            };

            let text = combined_text(&candidate.title, &candidate.summary);
            if let Some((stage, keyword)) = self.filter_verdict(&text) {
                debug!(title = %candidate.title, stage, keyword, "filtered out");
                counter!("curator_filtered_total").increment(1);
                report.rejected_filter += 1;
                continue;
            }

            let signature =
                CandidateSignature::new(&candidate.title, &candidate.link, &candidate.summary);
            if let Some(reason) = find_duplicate(&signature, store, self.match_mode) {
                debug!(title = %candidate.title, %reason, "duplicate skipped");
                counter!("curator_duplicates_total").increment(1);
                report.rejected_duplicate += 1;
                continue;
            }

            counter!("curator_scored_total").increment(1);
            let (score, level, strong_hit) = self.score_candidate(&candidate, &text);
            if score < self.cfg.relevance.threshold && !strong_hit {
                report.rejected_relevance += 1;
                continue;
            }

            // Keep the validated timestamp so selection never re-unwraps.
            let mut candidate = candidate;
            candidate.published_at = Some(published_at);
            survivors.push(Scored {
                candidate,
                signature,
                score,
                level,
            });
        }

        // Selection: walk the window schedule until a window holds enough
        // survivors to fill the quota (or the schedule runs out), then rank
        // within that window and cut.
        let quota = self.cfg.bot.quota;
        let schedule = window_schedule(&self.cfg.window);
        let widest = schedule.last().copied().unwrap_or(0);
        let mut final_window = widest;
        for hours in schedule {
            let cutoff = now - Duration::hours(hours);
            let in_window = survivors
                .iter()
                .filter(|s| s.candidate.published_at.map_or(false, |ts| ts >= cutoff))
                .count();
            if in_window >= quota {
                final_window = hours;
                break;
            }
        }
        let cutoff = now - Duration::hours(final_window);
        survivors.retain(|s| s.candidate.published_at.map_or(false, |ts| ts >= cutoff));
        rank(&mut survivors);
        survivors.truncate(quota);
        let picked = survivors;
        report.selected = picked.len();
        report.window_hours = final_window;
        info!(
            selected = picked.len(),
            window_hours = final_window,
            "selection complete"
        );

        // Publish in rank order. Each success is logged to the dedup store
        // before the inter-post delay.
        let total = picked.len();
        for (i, item) in picked.into_iter().enumerate() {
            let text = combined_text(&item.candidate.title, &item.candidate.summary);
            let post = PostContent {
                title: self.post_title(&item.candidate.title),
                link: item.candidate.link.clone(),
                body: None,
                flair: self.categories.label_for(&text).map(str::to_string),
            };

            match submit_with_retry(publisher, &post, &self.retry, sleeper).await {
                Ok(id) => {
                    info!(
                        title = %post.title,
                        score = item.score,
                        level = item.level.as_str(),
                        submission = %id.0,
                        "published"
                    );
                    counter!("curator_published_total").increment(1);
                    report.published += 1;

                    let excerpt = articles.first_paragraphs(&item.candidate.link).await;
                    if !excerpt.is_empty() {
                        let body = excerpt_reply(&excerpt, &item.candidate.link);
                        if let Err(e) = publisher.reply(&id, &body).await {
                            warn!(error = ?e, submission = %id.0, "excerpt reply failed");
                        }
                    }

                    // Record regardless of the reply outcome; the story is
                    // out once the submission landed.
                    if let Err(e) = store.append(&item.signature.to_record(Utc::now())) {
                        warn!(error = ?e, "dedup log append failed");
                    }
                }
                Err(e) => {
                    warn!(title = %post.title, error = %e, "publish failed");
                    report.publish_failures += 1;
                }
            }

            if i + 1 < total {
                sleeper
                    .sleep(std::time::Duration::from_secs(self.cfg.bot.post_delay_secs))
                    .await;
            }
        }

        info!(?report, "run complete");
        Ok(report)
    }
}

/// Quote the excerpt line by line and close with a source link.
fn excerpt_reply(excerpt: &str, link: &str) -> String {
    let mut out = String::new();
    for line in excerpt.lines() {
        if line.trim().is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&format!("\n[Read more]({link})"));
    out
}

/// Window sizes to try, in hours. Fixed mode is a single window; expanding
/// mode widens by `step_hours` up to (and clamped at) the ceiling.
fn window_schedule(cfg: &WindowConfig) -> Vec<i64> {
    match *cfg {
        WindowConfig::Fixed { hours } => vec![hours],
        WindowConfig::Expanding {
            hours,
            step_hours,
            ceiling_hours,
        } => {
            let mut out = Vec::new();
            let mut h = hours;
            loop {
                out.push(h.min(ceiling_hours));
                if h >= ceiling_hours {
                    break;
                }
                h += step_hours;
            }
            out
        }
    }
}

/// Score descending, newest first within equal scores.
fn rank(items: &mut [Scored]) {
    items.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.candidate.published_at.cmp(&a.candidate.published_at))
    });
}
