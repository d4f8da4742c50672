//! Read/write seam for an external dashboard process (spec.md §4.7):
//! every write here is routed through `Store`/`Frontier`, never mutating
//! `Graph` directly. Not an HTTP server — a future dashboard process
//! calls into this module.

use std::sync::Arc;

use onionwatch_alerts::{AlertManager, AlertStats};
use onionwatch_analyzer::{is_valid_onion_url, normalize_url};
use onionwatch_core::{BoundaryResult, DomainPolicy};
use onionwatch_frontier::{Frontier, QueueSort};
use onionwatch_graph::{CorrelationEngine, CorrelationResult, EntityGraph, GraphStats};
use onionwatch_store::{DomainLists, ExportFilters, HighRiskSite, Stats, Store, TimelineBucket};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct BoundaryStats {
    pub store: Stats,
    pub graph: GraphStats,
    pub alerts: AlertStats,
    pub queue_len: u64,
    pub paused: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DomainProfile {
    pub domain: String,
    pub list_type: Option<String>,
    pub policy: Option<DomainPolicy>,
}

pub struct Boundary {
    pub store: Arc<Store>,
    pub graph: Arc<EntityGraph>,
    pub alerts: Arc<AlertManager>,
    pub frontier: Arc<Frontier>,
    pub ignored_extensions: Vec<String>,
}

impl Boundary {
    pub fn new(
        store: Arc<Store>,
        graph: Arc<EntityGraph>,
        alerts: Arc<AlertManager>,
        frontier: Arc<Frontier>,
        ignored_extensions: Vec<String>,
    ) -> Self {
        Self {
            store,
            graph,
            alerts,
            frontier,
            ignored_extensions,
        }
    }

    // --- reads ---

    pub async fn stats(&self) -> anyhow::Result<BoundaryStats> {
        Ok(BoundaryStats {
            store: self.store.get_stats().await?,
            graph: self.graph.stats().await,
            alerts: self.alerts.stats().await,
            queue_len: self.frontier.len(),
            paused: self.frontier.is_paused(),
        })
    }

    pub async fn recent_pages(&self, limit: i64) -> anyhow::Result<Vec<HighRiskSite>> {
        self.store.recent_pages(limit).await
    }

    pub async fn queue_contents(&self, sort: QueueSort, limit: usize) -> Vec<onionwatch_core::FrontierEntry> {
        self.frontier.snapshot(sort, limit).await
    }

    pub async fn domain_list(&self) -> anyhow::Result<DomainLists> {
        self.store.domain_lists().await
    }

    pub async fn domain_profile(&self, domain: &str) -> anyhow::Result<DomainProfile> {
        let lists = self.store.domain_lists().await?;
        let list_type = lists
            .blacklist
            .iter()
            .chain(lists.whitelist.iter())
            .find(|e| e.domain == domain)
            .map(|e| e.list_type.clone());
        Ok(DomainProfile {
            domain: domain.to_string(),
            list_type,
            policy: self.frontier.domain_policy(domain),
        })
    }

    pub async fn entities_by_type(&self, entity_type: &str) -> Vec<onionwatch_core::Entity> {
        self.graph.get_entities_by_type(entity_type).await
    }

    pub async fn timeline(&self, days: i64) -> anyhow::Result<Vec<TimelineBucket>> {
        self.store.timeline_stats(days).await
    }

    /// Correlations scoring above `min_score` among wallets seen on
    /// multiple domains and emails seen on 5+ domains (spec.md §4.4).
    pub async fn correlations_above(&self, min_score: f64) -> Vec<CorrelationResult> {
        CorrelationEngine::find_high_risk_correlations(&self.graph, min_score).await
    }

    // --- writes, always routed through Store/Frontier ---

    pub async fn add_seeds(&self, urls: &[String]) -> BoundaryResult<usize> {
        let mut accepted = 0usize;
        let mut rejected = Vec::new();
        for raw in urls {
            let normalized = normalize_url(raw);
            if !is_valid_onion_url(&normalized, &self.ignored_extensions) {
                rejected.push(raw.clone());
                continue;
            }
            let domain = match url::Url::parse(&normalized).ok().and_then(|u| u.host_str().map(str::to_string)) {
                Some(d) => d,
                None => {
                    rejected.push(raw.clone());
                    continue;
                }
            };
            match self.store.queue_seed(&normalized, &domain).await {
                Ok(true) => {
                    self.frontier.enqueue_default(normalized, 0).await;
                    accepted += 1;
                }
                Ok(false) => {}
                Err(_) => rejected.push(raw.clone()),
            }
        }
        if rejected.is_empty() {
            BoundaryResult::ok(format!("{accepted} seed(s) queued"), accepted)
        } else {
            BoundaryResult::ok(format!("{accepted} seed(s) queued, {} rejected", rejected.len()), accepted)
        }
    }

    pub async fn mark_intel(&self, url: &str, label: &str, value: bool) -> BoundaryResult<()> {
        if label != "important" && label != "false_positive" {
            return BoundaryResult::err(format!("unknown label '{label}'"));
        }
        match self.store.mark_intel(url, label, value).await {
            Ok(true) => BoundaryResult::ok_empty("updated"),
            Ok(false) => BoundaryResult::err("url not found"),
            Err(e) => BoundaryResult::err(e.to_string()),
        }
    }

    pub fn update_domain_policy(&self, policy: DomainPolicy) -> BoundaryResult<()> {
        self.frontier.set_domain_policy(policy);
        BoundaryResult::ok_empty("domain policy updated")
    }

    pub fn boost_domain(&self, domain: &str, boost: f64) -> BoundaryResult<()> {
        self.frontier.boost_domain(domain, boost);
        BoundaryResult::ok_empty(format!("{domain} boosted by {boost}"))
    }

    pub fn freeze_domain(&self, domain: &str) -> BoundaryResult<()> {
        self.frontier.freeze_domain(domain);
        BoundaryResult::ok_empty(format!("{domain} frozen"))
    }

    pub fn unfreeze_domain(&self, domain: &str) -> BoundaryResult<()> {
        self.frontier.unfreeze_domain(domain);
        BoundaryResult::ok_empty(format!("{domain} unfrozen"))
    }

    pub fn control_crawler(&self, action: &str) -> BoundaryResult<()> {
        match action {
            "pause" => {
                self.frontier.pause();
                BoundaryResult::ok_empty("paused")
            }
            "resume" => {
                self.frontier.resume();
                BoundaryResult::ok_empty("resumed")
            }
            // Draining is a property of the engine loop (stop accepting new
            // links, finish in-flight work); pausing the frontier is the
            // boundary-visible half of it.
            "drain" => {
                self.frontier.pause();
                BoundaryResult::ok_empty("draining")
            }
            other => BoundaryResult::err(format!("unknown control action '{other}'")),
        }
    }

    pub async fn export(&self, kind: &str, path: &str, filters: &ExportFilters) -> BoundaryResult<usize> {
        let result = match kind {
            "json" => self.store.export_json(path, filters).await,
            "csv" => self.store.export_csv(path, filters.has_crypto || filters.has_secrets).await,
            "emails" => self.store.export_emails(path).await,
            "crypto" => self.store.export_crypto(path).await,
            other => return BoundaryResult::err(format!("unknown export kind '{other}'")),
        };
        match result {
            Ok(n) => BoundaryResult::ok(format!("exported {n} row(s) to {path}"), n),
            Err(e) => BoundaryResult::err(e.to_string()),
        }
    }

    pub async fn purge(&self, days: i64, anonymize: bool) -> BoundaryResult<u64> {
        match self.store.purge(days, anonymize).await {
            Ok(n) => BoundaryResult::ok(format!("purged {n} row(s)"), n),
            Err(e) => BoundaryResult::err(e.to_string()),
        }
    }

    pub async fn vacuum(&self) -> BoundaryResult<()> {
        match self.store.vacuum().await {
            Ok(()) => BoundaryResult::ok_empty("vacuumed"),
            Err(e) => BoundaryResult::err(e.to_string()),
        }
    }
}
