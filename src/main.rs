// src/main.rs
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use newsfeed_curator::ingest::article::HttpArticleFetcher;
use newsfeed_curator::ingest::rss::RssFeedSource;
use newsfeed_curator::ingest::types::FeedSource;
use newsfeed_curator::publish::{DryRunPublisher, TokioSleeper};
use newsfeed_curator::{BotConfig, Curator, DedupStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    fmt()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let arg = std::env::args().nth(1);
    let cfg = BotConfig::from_env_or_default(arg.as_deref())?;
    cfg.require_env()?;
    info!(bot = %cfg.bot.name, feeds = cfg.feeds.len(), "starting curation run");

    let mut feeds: Vec<Box<dyn FeedSource>> = Vec::with_capacity(cfg.feeds.len());
    for f in &cfg.feeds {
        feeds.push(Box::new(
            RssFeedSource::from_url(&f.name, &f.url, &cfg.bot.user_agent)
                .with_context(|| format!("configuring feed {}", f.name))?,
        ));
    }

    let articles = HttpArticleFetcher::new(&cfg.bot.user_agent)?;
    let publisher = DryRunPublisher::default();
    let mut store = DedupStore::load(&cfg.dedup.log_path, cfg.dedup.retention())?;
    let metrics_path = cfg.bot.metrics_path.clone();

    let curator = Curator::new(cfg)?;
    let report = curator
        .run_once(&feeds, &articles, &publisher, &mut store, &TokioSleeper)
        .await?;

    if let Some(path) = metrics_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing run metrics to {}", path.display()))?;
    }

    info!(
        fetched = report.fetched,
        selected = report.selected,
        published = report.published,
        failures = report.publish_failures,
        window_hours = report.window_hours,
        "run finished"
    );
    Ok(())
}
