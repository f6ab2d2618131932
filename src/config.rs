// src/config.rs
//! Bot configuration, loaded from a TOML file. Every editorial table
//! (keyword weights, filters, categories, feeds) lives here so a new bot
//! persona is a config file, not a code change.
//!
//! The config path resolves in order: explicit argument, the
//! `CURATOR_CONFIG_PATH` env var, then the default path.

use anyhow::{bail, Context, Result};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::detect::MatchMode;
use crate::publish::RetryPolicy;
use crate::relevance::{FilterRule, LevelThresholds};

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/uknews.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub bot: BotSection,
    pub window: WindowConfig,
    pub dedup: DedupSection,
    pub relevance: RelevanceSection,
    pub weights: WeightsSection,
    #[serde(default)]
    pub domains: DomainsSection,
    #[serde(default)]
    pub bonus_patterns: Vec<BonusPatternSection>,
    #[serde(default)]
    pub filters: FiltersSection,
    #[serde(default)]
    pub category: CategorySection,
    #[serde(default)]
    pub feeds: Vec<FeedSection>,
    #[serde(default)]
    pub publish: PublishSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotSection {
    pub name: String,
    pub user_agent: String,
    /// Appended to post titles unless already present, e.g. "| UK News".
    pub title_suffix: Option<String>,
    pub quota: usize,
    #[serde(default = "default_post_delay")]
    pub post_delay_secs: u64,
    /// Env vars that must be set before a run starts; checked up front so a
    /// misconfigured deploy fails before any network traffic.
    #[serde(default)]
    pub required_env: Vec<String>,
    /// Where to drop the JSON tally of the last run; omit to skip.
    pub metrics_path: Option<PathBuf>,
}

fn default_post_delay() -> u64 {
    40
}

/// Recency window for feed entries.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WindowConfig {
    Fixed {
        hours: i64,
    },
    /// Start at `hours`, widen by `step_hours` whenever the quota is not
    /// met, stop at `ceiling_hours`.
    Expanding {
        hours: i64,
        step_hours: i64,
        ceiling_hours: i64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupSection {
    pub log_path: PathBuf,
    #[serde(default = "default_dedup_mode")]
    pub mode: DedupMode,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    Exact,
    Fuzzy,
}

fn default_dedup_mode() -> DedupMode {
    DedupMode::Fuzzy
}

fn default_fuzzy_threshold() -> f64 {
    0.9
}

fn default_retention_days() -> i64 {
    7
}

impl DedupSection {
    pub fn match_mode(&self) -> MatchMode {
        match self.mode {
            DedupMode::Exact => MatchMode::Exact,
            DedupMode::Fuzzy => MatchMode::Fuzzy {
                threshold: self.fuzzy_threshold,
            },
        }
    }

    pub fn retention(&self) -> ChronoDuration {
        ChronoDuration::days(self.retention_days)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceSection {
    /// Minimum score to accept a candidate without a strong-keyword hit.
    pub threshold: i32,
    #[serde(default)]
    pub strong: Vec<String>,
    pub levels: LevelThresholds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsSection {
    pub positive: BTreeMap<String, i32>,
    /// Penalty magnitudes; subtracted from the score per occurrence.
    #[serde(default)]
    pub negative: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainsSection {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub bonus: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BonusPatternSection {
    pub label: String,
    pub pattern: String,
    pub bonus: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltersSection {
    #[serde(default)]
    pub promotional: Vec<FilterRule>,
    #[serde(default)]
    pub opinion: Vec<FilterRule>,
    #[serde(default)]
    pub excluded: Vec<FilterRule>,
    #[serde(default)]
    pub fluff: Vec<FilterRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategorySection {
    pub default: Option<String>,
    #[serde(default)]
    pub rules: Vec<CategoryRuleSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRuleSection {
    pub label: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PublishSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    40
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
        }
    }
}

impl PublishSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.base_delay_secs),
        }
    }
}

impl BotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parsing bot config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("in config {}", path.display()))
    }

    /// Resolve the config path from an optional CLI argument, then the env
    /// var, then the default.
    pub fn from_env_or_default(arg: Option<&str>) -> Result<Self> {
        let path = match arg {
            Some(p) => PathBuf::from(p),
            None => std::env::var(ENV_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };
        Self::from_path(path)
    }

    fn validate(&self) -> Result<()> {
        if self.bot.quota == 0 {
            bail!("bot.quota must be at least 1");
        }
        if let WindowConfig::Expanding {
            hours,
            step_hours,
            ceiling_hours,
        } = self.window
        {
            if step_hours <= 0 {
                bail!("window.step_hours must be positive");
            }
            if ceiling_hours < hours {
                bail!("window.ceiling_hours must not be below window.hours");
            }
        }
        if !(0.0..=1.0).contains(&self.dedup.fuzzy_threshold) {
            bail!("dedup.fuzzy_threshold must be between 0 and 1");
        }
        Ok(())
    }

    /// Fail fast if any required env var is missing.
    pub fn require_env(&self) -> Result<()> {
        let missing: Vec<&str> = self
            .bot
            .required_env
            .iter()
            .filter(|k| std::env::var(k.as_str()).is_err())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            bail!("missing required environment variables: {}", missing.join(", "));
        }
        Ok(())
    }
}
