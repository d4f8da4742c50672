//! The crawl state machine (spec.md §4.6): {INIT → VERIFY_PROXY →
//! LOAD_STATE → SEED → RUN → DRAIN → STOP}, grounded on the teacher's
//! `run_crawl`/worker-loop shape, generalized from five network drivers
//! down to the single Tor SOCKS path this repo supports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use onionwatch_alerts::AlertManager;
use onionwatch_core::{AppConfig, FetchConfig, Page};
use onionwatch_frontier::Frontier;
use onionwatch_graph::EntityGraph;
use onionwatch_store::Store;
use onionwatch_transport::TorClient;
use scraper::Html;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const MAX_BOOTSTRAP_RECRAWL: i64 = 50;
const MAX_BOOTSTRAP_NEW_LINKS: usize = 200;

#[derive(Default)]
struct EngineCounters {
    requests: AtomicU64,
    success: AtomicU64,
    errors: AtomicU64,
}

/// Everything the RUN state needs, shared read-only (aside from its own
/// internal synchronization) across the worker pool (spec.md §5's
/// custodian table).
pub struct CrawlEngine {
    config: AppConfig,
    store: Arc<Store>,
    graph: Arc<EntityGraph>,
    alerts: Arc<AlertManager>,
    frontier: Arc<Frontier>,
    visited: Arc<Mutex<std::collections::HashSet<String>>>,
    active_workers: Arc<AtomicI64>,
    stop: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    counters: Arc<EngineCounters>,
    last_domain_fetch: Arc<DashMap<String, Instant>>,
}

impl CrawlEngine {
    pub fn new(
        config: AppConfig,
        store: Arc<Store>,
        graph: Arc<EntityGraph>,
        alerts: Arc<AlertManager>,
        frontier: Arc<Frontier>,
    ) -> Self {
        Self {
            config,
            store,
            graph,
            alerts,
            frontier,
            visited: Arc::new(Mutex::new(std::collections::HashSet::new())),
            active_workers: Arc::new(AtomicI64::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
            draining: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(EngineCounters::default()),
            last_domain_fetch: Arc::new(DashMap::new()),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn request_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    /// Drives the engine through every state, returning once STOP is
    /// reached. `max_depth` overrides `config.crawl`-implied depth when
    /// given (the CLI's `--depth` flag); domains otherwise crawl to
    /// whatever `DomainPolicy::max_depth` allows, unbounded by default.
    pub async fn run(&self, seed_urls: Vec<String>, max_depth: Option<u32>) -> Result<()> {
        // --- VERIFY_PROXY ---
        let timeout = Duration::from_secs(self.config.crawl.timeout_secs);
        let (proxy_addr, verification) =
            onionwatch_transport::verify_proxy_with_fallback(&self.config.tor, timeout)
                .await
                .map_err(|e| anyhow!("proxy verification failed, engine will not start: {e}"))?;
        info!(proxy = %proxy_addr, exit_ip = %verification.exit_ip, "tor proxy verified");

        // --- LOAD_STATE ---
        let known = self.store.visited_urls().await?;
        info!(count = known.len(), "loaded visited-set from store");
        {
            let mut visited = self.visited.lock().await;
            visited.extend(known.iter().cloned());
        }

        // --- SEED ---
        self.bootstrap(seed_urls, &known).await?;

        if self.frontier.is_empty() {
            info!("frontier is empty after bootstrap, parking until seeded externally");
        }

        // --- RUN ---
        let worker_count = self.config.crawl.max_workers.max(1);
        info!(worker_count, "spawning crawl workers");
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let engine = self.clone_shared();
            let proxy_addr = proxy_addr.clone();
            let max_depth = max_depth;
            handles.push(tokio::spawn(async move {
                if let Err(e) = engine.worker_loop(worker_id, proxy_addr, max_depth).await {
                    error!(worker_id, error = %e, "worker exited with error");
                }
            }));
        }

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    info!("shutdown signal received");
                }
                self.request_stop();
            }
            _ = self.wait_for_natural_stop() => {
                info!("frontier drained with no active workers, stopping");
            }
        }

        // --- DRAIN ---
        self.request_drain();
        let drained = tokio::time::timeout(Duration::from_secs(30), async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            warn!("drain window elapsed before all workers finished");
        }

        // --- STOP ---
        info!(
            requests = self.counters.requests.load(Ordering::SeqCst),
            success = self.counters.success.load(Ordering::SeqCst),
            errors = self.counters.errors.load(Ordering::SeqCst),
            "crawl engine stopped"
        );
        Ok(())
    }

    /// Cheap `Arc`-clone bundle for handing this engine's shared state
    /// into a spawned worker task.
    fn clone_shared(&self) -> Arc<Self> {
        Arc::new(Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            graph: Arc::clone(&self.graph),
            alerts: Arc::clone(&self.alerts),
            frontier: Arc::clone(&self.frontier),
            visited: Arc::clone(&self.visited),
            active_workers: Arc::clone(&self.active_workers),
            stop: Arc::clone(&self.stop),
            draining: Arc::clone(&self.draining),
            counters: Arc::clone(&self.counters),
            last_domain_fetch: Arc::clone(&self.last_domain_fetch),
        })
    }

    /// Resolves once the frontier has been empty with zero active
    /// workers for a full `queue_timeout` tick — the natural-completion
    /// half of the shutdown decision (spec.md §4.6).
    async fn wait_for_natural_stop(&self) {
        let tick = Duration::from_secs(self.config.crawl.queue_timeout_secs.max(1));
        loop {
            tokio::time::sleep(tick).await;
            if self.frontier.is_empty() && self.active_workers.load(Ordering::SeqCst) == 0 {
                return;
            }
        }
    }

    async fn bootstrap(&self, seed_urls: Vec<String>, known: &std::collections::HashSet<String>) -> Result<()> {
        let seed_urls = if seed_urls.is_empty() {
            if self.config.seeds.is_empty() {
                onionwatch_core::config::default_seeds()
            } else {
                self.config.seeds.clone()
            }
        } else {
            seed_urls
        };

        let mut injected = 0usize;
        for raw in &seed_urls {
            let normalized = onionwatch_analyzer::normalize_url(raw);
            if !onionwatch_analyzer::is_valid_onion_url(&normalized, &self.config.http.ignored_extensions) {
                continue;
            }
            if known.contains(&normalized) {
                continue;
            }
            let priority = self.config.frontier.default_priority + self.config.frontier.seed_priority_boost;
            if self.frontier.enqueue(normalized, 0, priority).await {
                injected += 1;
            }
        }
        info!(injected, "seed URLs injected");

        if self.frontier.is_empty() {
            let pending = self.store.pending_urls(500).await?;
            info!(count = pending.len(), "refilling frontier from pending urls");
            for (url, depth) in pending {
                self.frontier.enqueue(url, depth, self.config.frontier.default_priority).await;
            }
        }

        if self.frontier.is_empty() {
            self.bootstrap_mine().await;
        }

        Ok(())
    }

    /// Opens a short-lived session to re-fetch up to
    /// `MAX_BOOTSTRAP_RECRAWL` previously-successful URLs purely to mine
    /// fresh links from them, capped at `MAX_BOOTSTRAP_NEW_LINKS` new
    /// enqueues (spec.md §4.6 bootstrap step 4).
    async fn bootstrap_mine(&self) {
        let candidates = match self.store.successful_urls_for_recrawl(0, MAX_BOOTSTRAP_RECRAWL).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "bootstrap mining: failed to load recrawl candidates");
                return;
            }
        };
        if candidates.is_empty() {
            return;
        }
        let timeout = Duration::from_secs(self.config.crawl.timeout_secs);
        let (proxy_addr, _) = match onionwatch_transport::verify_proxy_with_fallback(&self.config.tor, timeout).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "bootstrap mining: proxy unavailable");
                return;
            }
        };
        let client = match TorClient::new(
            proxy_addr,
            self.config.http.clone(),
            FetchConfig {
                timeout,
                max_body_size: 10 * 1024 * 1024,
                follow_redirects: true,
            },
            self.config.crawl.session_recycle,
        ) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "bootstrap mining: failed to build client");
                return;
            }
        };

        let mut mined = 0usize;
        for url_str in candidates {
            if mined >= MAX_BOOTSTRAP_NEW_LINKS {
                break;
            }
            let Ok(url) = url::Url::parse(&url_str) else { continue };
            let fetch_config = FetchConfig {
                timeout,
                max_body_size: 10 * 1024 * 1024,
                follow_redirects: true,
            };
            let resp = match client.fetch(&url, &fetch_config).await {
                Ok(r) => r,
                Err(_) => continue,
            };
            let raw_html = String::from_utf8_lossy(&resp.body).into_owned();
            let document = Html::parse_document(&raw_html);
            let links = onionwatch_analyzer::extract_links(&document, &url, &self.config.http.ignored_extensions);

            for link in links {
                if mined >= MAX_BOOTSTRAP_NEW_LINKS {
                    break;
                }
                if self
                    .dispatch_link(&link, 0, self.config.crawl.max_pages)
                    .await
                {
                    mined += 1;
                }
            }
        }
        info!(mined, "bootstrap mining enqueued links");
    }

    /// Normalize, validate, visited-set dedup, `max_pages` backpressure,
    /// per-domain `max_depth` — the link dispatch rules (spec.md §4.6).
    async fn dispatch_link(&self, raw_url: &str, depth: u32, max_pages: u64) -> bool {
        let normalized = onionwatch_analyzer::normalize_url(raw_url);
        if !onionwatch_analyzer::is_valid_onion_url(&normalized, &self.config.http.ignored_extensions) {
            return false;
        }
        {
            let mut visited = self.visited.lock().await;
            if visited.len() as u64 >= max_pages {
                return false;
            }
            if !visited.insert(normalized.clone()) {
                return false;
            }
        }

        let next_depth = depth + 1;
        if let Some(domain) = url::Url::parse(&normalized).ok().and_then(|u| u.host_str().map(str::to_string)) {
            if let Some(policy) = self.frontier.domain_policy(&domain) {
                if let Some(max_depth) = policy.max_depth {
                    if next_depth > max_depth {
                        return false;
                    }
                }
            }
        }

        self.frontier
            .enqueue(normalized, next_depth, self.config.frontier.default_priority)
            .await
    }

    /// Worker-local sleep honoring a domain's `delay_ms`, consulted
    /// against a shared last-dispatch timestamp map (spec.md §4.6).
    async fn respect_domain_delay(&self, domain: &str) {
        let Some(policy) = self.frontier.domain_policy(domain) else { return };
        if policy.delay_ms == 0 {
            return;
        }
        let now = Instant::now();
        let wait = self.last_domain_fetch.get(domain).and_then(|last| {
            let elapsed = now.saturating_duration_since(*last);
            let required = Duration::from_millis(policy.delay_ms);
            required.checked_sub(elapsed)
        });
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
        self.last_domain_fetch.insert(domain.to_string(), Instant::now());
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize, proxy_addr: String, max_depth_override: Option<u32>) -> Result<()> {
        let fetch_config = FetchConfig {
            timeout: Duration::from_secs(self.config.crawl.timeout_secs),
            max_body_size: 10 * 1024 * 1024,
            follow_redirects: true,
        };
        let client = TorClient::new(
            proxy_addr,
            self.config.http.clone(),
            fetch_config.clone(),
            self.config.crawl.session_recycle,
        )?;

        let queue_timeout = Duration::from_secs(self.config.crawl.queue_timeout_secs.max(1));
        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            if self.draining.load(Ordering::SeqCst) && self.frontier.is_empty() {
                break;
            }

            let Some(job) = self.frontier.dequeue(queue_timeout).await else {
                if self.draining.load(Ordering::SeqCst) {
                    break;
                }
                continue;
            };

            self.active_workers.fetch_add(1, Ordering::SeqCst);
            let max_depth = max_depth_override;
            if let Err(e) = self
                .process_one(worker_id, &client, &job.url, job.depth, &fetch_config, max_depth)
                .await
            {
                warn!(worker_id, url = %job.url, error = %e, "per-url processing error");
            }
            self.active_workers.fetch_sub(1, Ordering::SeqCst);
        }

        info!(worker_id, "worker stopped");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_one(
        &self,
        worker_id: usize,
        client: &TorClient,
        url_str: &str,
        depth: u32,
        fetch_config: &FetchConfig,
        max_depth_override: Option<u32>,
    ) -> Result<()> {
        let Ok(url) = url::Url::parse(url_str) else {
            return Ok(());
        };
        let domain = url.host_str().unwrap_or("unknown").to_string();

        if let Some(policy) = self.frontier.domain_policy(&domain) {
            if policy.status == onionwatch_core::DomainStatus::Frozen {
                debug!(worker_id, url = %url_str, "domain frozen, discarding");
                return Ok(());
            }
        }
        if self.store.is_blacklisted(&domain).await.unwrap_or(false) {
            return Ok(());
        }

        self.respect_domain_delay(&domain).await;

        self.counters.requests.fetch_add(1, Ordering::SeqCst);
        let max_retries = self.config.crawl.max_retries;
        let mut attempt = 0u32;
        let resp = loop {
            match client.fetch(&url, fetch_config).await {
                Ok(resp) => break Some(resp),
                Err(e) => {
                    if attempt >= max_retries {
                        warn!(worker_id, url = %url_str, retries = attempt, error = %e, "fetch failed permanently");
                        self.counters.errors.fetch_add(1, Ordering::SeqCst);
                        let page = empty_page(url_str, &domain, 0, depth);
                        let _ = self.store.save_page(&page).await;
                        break None;
                    }
                    let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
                    debug!(worker_id, url = %url_str, attempt, backoff_secs = backoff.as_secs(), error = %e, "retrying fetch");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        };
        let Some(resp) = resp else {
            return Ok(());
        };

        let is_html = resp.content_type.as_deref().map(|ct| ct.contains("text/html")).unwrap_or(true);
        if resp.status != 200 || !is_html {
            self.counters.errors.fetch_add(1, Ordering::SeqCst);
            let page = empty_page(url_str, &domain, resp.status, depth);
            self.store.save_page(&page).await?;
            return Ok(());
        }

        let raw_html = String::from_utf8_lossy(&resp.body).into_owned();
        let page = match self.build_and_ingest_page(&url, &domain, depth, &raw_html, &resp.headers).await {
            Ok(page) => page,
            Err(e) => {
                warn!(worker_id, url = %url_str, error = %e, "parse error, recording empty intel");
                self.counters.errors.fetch_add(1, Ordering::SeqCst);
                let page = empty_page(url_str, &domain, resp.status, depth);
                self.store.save_page(&page).await?;
                return Ok(());
            }
        };

        self.counters.success.fetch_add(1, Ordering::SeqCst);
        self.store.save_page(&page).await?;

        let entities_json = page_entities_json(&page);
        let alerts = self
            .alerts
            .run_all_checks(&raw_html, &entities_json, &page.category, page.risk_score, &domain, url_str, &page.title)
            .await;
        for alert in &alerts {
            info!(worker_id, trigger = %alert.trigger, severity = alert.severity.as_str(), url = %url_str, "alert fired");
        }

        let links_enqueued = self.dispatch_links(depth, &page, max_depth_override).await;
        debug!(worker_id, url = %url_str, links_enqueued, "page processed");
        Ok(())
    }

    async fn build_and_ingest_page(
        &self,
        url: &url::Url,
        domain: &str,
        depth: u32,
        raw_html: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Page> {
        let document = Html::parse_document(raw_html);
        let title = onionwatch_analyzer::page_title(&document);
        let text = onionwatch_analyzer::html_to_text(&document);
        let tech_stack = onionwatch_analyzer::extract_tech_stack(headers);
        let language = onionwatch_analyzer::detect_language(&text);
        let category = onionwatch_analyzer::detect_category(&text, &title);
        let keywords = onionwatch_analyzer::extract_keywords(&text, &title, 15);
        let json_data = onionwatch_analyzer::extract_json_ld(&document);
        let onion_links = onionwatch_analyzer::extract_links(&document, url, &self.config.http.ignored_extensions);
        let has_pgp = text.contains("BEGIN PGP PUBLIC KEY");

        let entities = onionwatch_extractor::extract_entities(&text);
        self.graph.ingest_page(&entities, domain, url.as_str()).await;

        let input = crate::intel::PageInput {
            url: url.to_string(),
            domain: domain.to_string(),
            status: 200,
            depth,
            content_length: raw_html.len() as u64,
            title,
            entities: &entities,
            tech_stack,
            onion_links,
            language,
            category,
            keywords,
            has_pgp,
            json_data,
        };
        Ok(crate::intel::build_page(input))
    }

    /// Runs the page's extracted anchor links through the link dispatch
    /// rules, returning the count actually enqueued. Only links Analyzer
    /// found in the page itself feed the frontier (spec.md §4.6) — the
    /// engine never invents URLs the page didn't link to.
    async fn dispatch_links(&self, depth: u32, page: &Page, max_depth_override: Option<u32>) -> usize {
        if let Some(cap) = max_depth_override {
            if depth >= cap {
                return 0;
            }
        }

        let mut discovered = page.onion_links.clone();
        let mut seen = std::collections::HashSet::with_capacity(discovered.len());
        discovered.retain(|u| seen.insert(u.clone()));

        let mut enqueued = 0usize;
        for link in &discovered {
            if self.dispatch_link(link, depth, self.config.crawl.max_pages).await {
                enqueued += 1;
            }
        }
        enqueued
    }
}

fn empty_page(url: &str, domain: &str, status: u16, depth: u32) -> Page {
    let now = chrono::Utc::now();
    Page {
        url: url.to_string(),
        domain: domain.to_string(),
        status,
        depth,
        found_at: now,
        last_crawl: now,
        ..Page::default()
    }
}

fn page_entities_json(page: &Page) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("emails".to_string(), json!(page.emails)),
        ("cryptos".to_string(), json!(page.cryptos)),
        ("socials".to_string(), json!(page.socials)),
        ("secrets".to_string(), json!(page.secrets)),
        ("phones".to_string(), json!(page.phones)),
        ("ip_leaks".to_string(), json!(page.ip_leaks)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_carries_status_and_depth_with_blank_fields() {
        let page = empty_page("http://x.onion/", "x.onion", 503, 2);
        assert_eq!(page.status, 503);
        assert_eq!(page.depth, 2);
        assert_eq!(page.url, "http://x.onion/");
        assert!(page.title.is_empty());
        assert_eq!(page.risk_score, 0);
        assert!(!page.is_queued());
    }

    #[test]
    fn permanent_fetch_failure_uses_status_zero() {
        let page = empty_page("http://x.onion/", "x.onion", 0, 0);
        assert!(page.is_queued());
    }

    #[test]
    fn page_entities_json_surfaces_every_alert_relevant_field() {
        let mut page = Page::default();
        page.emails = vec!["a@b.com".to_string()];
        page.cryptos = HashMap::from([("bitcoin".to_string(), vec!["bc1q...".to_string()])]);

        let entities = page_entities_json(&page);
        assert_eq!(entities["emails"], json!(["a@b.com"]));
        assert_eq!(entities["cryptos"]["bitcoin"], json!(["bc1q..."]));
        assert!(entities.contains_key("secrets"));
        assert!(entities.contains_key("ip_leaks"));
    }
}
