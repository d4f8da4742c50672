//! CLI subcommand handlers, built against `onionwatch-store` directly
//! (no HTTP layer) — the teacher's `run_search`/`run_status`/`run_export`
//! shape, rebuilt against this repo's SQLite store instead of the
//! teacher's Postgres `Storage`/`SearchEngine`.

use anyhow::Result;
use onionwatch_core::AppConfig;
use onionwatch_store::{ExportFilters, Store};
use tracing::info;

async fn open_store(config: &AppConfig) -> Result<Store> {
    Store::new(&config.database.path).await
}

pub async fn run_stats(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.get_stats().await?;
    println!("total pages:       {}", stats.total);
    println!("successful:        {}", stats.success);
    println!("distinct domains:  {}", stats.domains);
    println!("pages w/ secrets:  {}", stats.with_secrets);
    println!("pages w/ crypto:   {}", stats.with_crypto);
    println!("pages w/ emails:   {}", stats.with_emails);
    println!("avg risk score:    {:.1}", stats.avg_risk);
    println!("max risk score:    {}", stats.max_risk);
    println!("store size (MB):   {:.2}", stats.total_size_mb);
    println!("unread alerts:     {}", stats.unread_alerts);
    println!("top domains:");
    for d in &stats.top_domains {
        println!("  {:<40} pages={:<6} risk={:.1}", d.domain, d.pages, d.risk);
    }
    Ok(())
}

pub async fn run_export(config: &AppConfig, format: &str, output: Option<String>) -> Result<()> {
    let store = open_store(config).await?;
    let filters = ExportFilters::default();
    let n = match format {
        "json" => {
            let path = output.unwrap_or_else(|| config.export.json_path.clone());
            let n = store.export_json(&path, &filters).await?;
            info!(path, n, "exported json");
            n
        }
        "csv" => {
            let path = output.unwrap_or_else(|| config.export.csv_path.clone());
            let n = store.export_csv(&path, true).await?;
            info!(path, n, "exported csv");
            n
        }
        "emails" => {
            let path = output.unwrap_or_else(|| config.export.emails_path.clone());
            let n = store.export_emails(&path).await?;
            info!(path, n, "exported emails");
            n
        }
        "crypto" => {
            let path = output.unwrap_or_else(|| config.export.crypto_path.clone());
            let n = store.export_crypto(&path).await?;
            info!(path, n, "exported crypto");
            n
        }
        other => anyhow::bail!("unknown export format '{other}' (expected json|csv|emails|crypto)"),
    };
    println!("exported {n} row(s)");
    Ok(())
}

pub async fn run_add_seeds(config: &AppConfig, urls: &[String]) -> Result<()> {
    let store = open_store(config).await?;
    let mut accepted = 0usize;
    for raw in urls {
        let normalized = onionwatch_analyzer::normalize_url(raw);
        if !onionwatch_analyzer::is_valid_onion_url(&normalized, &config.http.ignored_extensions) {
            println!("rejected (invalid .onion URL): {raw}");
            continue;
        }
        let Some(domain) = url::Url::parse(&normalized).ok().and_then(|u| u.host_str().map(str::to_string)) else {
            println!("rejected (unparseable): {raw}");
            continue;
        };
        if store.queue_seed(&normalized, &domain).await? {
            accepted += 1;
        }
    }
    println!("{accepted} seed(s) queued");
    Ok(())
}

pub async fn run_mark_intel(config: &AppConfig, url: &str, label: &str, value: bool) -> Result<()> {
    if label != "important" && label != "false_positive" {
        anyhow::bail!("label must be 'important' or 'false_positive'");
    }
    let store = open_store(config).await?;
    if store.mark_intel(url, label, value).await? {
        println!("updated");
    } else {
        println!("url not found");
    }
    Ok(())
}

pub async fn run_blacklist(config: &AppConfig, domain: &str, reason: &str) -> Result<()> {
    let store = open_store(config).await?;
    store.blacklist_add(domain, reason).await?;
    println!("{domain} blacklisted");
    Ok(())
}

pub async fn run_whitelist(config: &AppConfig, domain: &str) -> Result<()> {
    let store = open_store(config).await?;
    store.whitelist_add(domain, "").await?;
    println!("{domain} whitelisted");
    Ok(())
}

pub async fn run_purge(config: &AppConfig, days: i64, anonymize: bool) -> Result<()> {
    let store = open_store(config).await?;
    let n = store.purge(days, anonymize).await?;
    println!("purged {n} row(s)");
    Ok(())
}

pub async fn run_vacuum(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    store.vacuum().await?;
    println!("vacuumed");
    Ok(())
}
