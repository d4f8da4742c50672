mod boundary;
mod cli;
mod commands;
mod crawl;
mod intel;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

// mimalloc avoids glibc malloc's memory bloat under the worker pool's
// concurrency (teacher's comment, carried forward unchanged).
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use onionwatch_alerts::AlertManager;
use onionwatch_core::AppConfig;
use onionwatch_frontier::Frontier;
use onionwatch_graph::EntityGraph;
use onionwatch_store::Store;

use crate::cli::{Cli, Commands};
use crate::crawl::CrawlEngine;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using embedded defaults");
        include_str!("../config/default.toml").to_string()
    });
    let config: AppConfig = toml::from_str(&config_str)?;

    match cli.command {
        Commands::Crawl { seeds, seed, depth } => {
            let seed_urls = collect_seed_urls(seeds, seed)?;
            run_crawl(config, seed_urls, depth).await?;
        }
        Commands::Stats => commands::run_stats(&config).await?,
        Commands::Export { format, output } => commands::run_export(&config, &format, output).await?,
        Commands::AddSeeds { urls } => commands::run_add_seeds(&config, &urls).await?,
        Commands::MarkIntel { url, label, value } => commands::run_mark_intel(&config, &url, &label, value).await?,
        Commands::Blacklist { domain, reason } => commands::run_blacklist(&config, &domain, &reason).await?,
        Commands::Whitelist { domain } => commands::run_whitelist(&config, &domain).await?,
        Commands::BoostDomain { domain, .. } | Commands::FreezeDomain { domain } | Commands::UnfreezeDomain { domain } => {
            println!("{domain}: domain priority/freeze is live-process state (boundary API), not persisted across runs; use `blacklist`/`whitelist` for a persistent policy");
        }
        Commands::Purge { days, anonymize } => commands::run_purge(&config, days, anonymize).await?,
        Commands::Vacuum => commands::run_vacuum(&config).await?,
    }

    Ok(())
}

fn collect_seed_urls(seeds: Option<String>, seed: Option<String>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    if let Some(s) = seed {
        out.push(s);
    }
    if let Some(seeds_arg) = seeds {
        if std::path::Path::new(&seeds_arg).exists() {
            let content = std::fs::read_to_string(&seeds_arg)?;
            out.extend(content.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()));
        } else {
            out.extend(seeds_arg.split(',').map(|s| s.trim().to_string()));
        }
    }
    Ok(out)
}

async fn run_crawl(config: AppConfig, seed_urls: Vec<String>, depth: Option<u32>) -> Result<()> {
    let store = Arc::new(Store::new(&config.database.path).await?);
    let graph = Arc::new(EntityGraph::new());
    let alerts = Arc::new(AlertManager::new(config.alerts.clone()));
    let frontier = Arc::new(Frontier::new());

    let engine = CrawlEngine::new(config, store, graph, alerts, frontier);
    engine.run(seed_urls, depth).await
}
