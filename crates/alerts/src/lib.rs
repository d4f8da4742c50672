//! Real-time alert triggers and webhook fanout (spec.md §4.5), grounded
//! on `alert_manager.py`'s `AlertManager`/`AlertTriggers`/`WebhookSender`.

mod triggers;
mod webhook;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use onionwatch_core::config::AlertsConfig;
use onionwatch_core::{Alert, AlertSeverity};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

pub use triggers::*;
pub use webhook::WebhookSender;

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct AlertStats {
    pub total: usize,
    pub unacknowledged: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub recent_24h: usize,
}

pub struct AlertManager {
    alerts: Mutex<VecDeque<Alert>>,
    alert_count: AtomicU64,
    max_history: usize,
    config: AlertsConfig,
    webhook: WebhookSender,
    seen_emails: Mutex<HashSet<String>>,
}

impl AlertManager {
    pub fn new(config: AlertsConfig) -> Self {
        let webhook = WebhookSender::from_env(config.webhook_rate_limit, config.webhook_cooldown_secs);
        Self {
            alerts: Mutex::new(VecDeque::with_capacity(config.max_history)),
            alert_count: AtomicU64::new(0),
            max_history: config.max_history,
            config,
            webhook,
            seen_emails: Mutex::new(HashSet::new()),
        }
    }

    fn generate_alert_id(&self) -> String {
        let n = self.alert_count.fetch_add(1, Ordering::SeqCst) + 1;
        format!("ALT-{}-{:05}", Utc::now().format("%Y%m%d%H%M%S"), n)
    }

    fn notify_enabled(&self, severity: AlertSeverity) -> bool {
        match severity {
            AlertSeverity::Critical => self.config.notify_critical,
            AlertSeverity::High => self.config.notify_high,
            AlertSeverity::Medium => self.config.notify_medium,
            AlertSeverity::Low => self.config.notify_low,
        }
    }

    /// Append to the bounded FIFO history and, when the severity is gated
    /// in, dispatch webhooks off-thread (teacher's `threading.Thread`
    /// fire-and-forget, carried forward as `tokio::spawn`).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_alert(
        &self,
        severity: AlertSeverity,
        trigger: &str,
        title: &str,
        description: &str,
        domain: &str,
        url: &str,
        entities: HashMap<String, Value>,
        metadata: HashMap<String, Value>,
    ) -> Alert {
        let alert = Alert {
            id: self.generate_alert_id(),
            severity,
            trigger: trigger.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            timestamp: Utc::now(),
            domain: domain.to_string(),
            url: url.to_string(),
            entities,
            metadata,
            acknowledged: false,
            acknowledged_by: String::new(),
            acknowledged_at: None,
        };

        {
            let mut alerts = self.alerts.lock().await;
            alerts.push_front(alert.clone());
            while alerts.len() > self.max_history {
                alerts.pop_back();
            }
        }

        warn!(severity = severity.as_str(), title = %alert.title, "alert raised");

        alert
    }

    /// Webhook fanout gated by severity, called by every trigger check
    /// right after `create_alert`. Kept as a separate awaited call rather
    /// than an internal spawn so a caller wrapping the manager in `Arc`
    /// can choose to run it on a background task itself.
    async fn dispatch_webhook(&self, alert: &Alert) {
        if self.notify_enabled(alert.severity) {
            self.webhook.send_all(alert).await;
        }
    }

    pub async fn get_alerts(
        &self,
        severity: Option<AlertSeverity>,
        acknowledged: Option<bool>,
        limit: usize,
        since: Option<chrono::DateTime<Utc>>,
    ) -> Vec<Alert> {
        let alerts = self.alerts.lock().await;
        alerts
            .iter()
            .filter(|a| severity.map(|s| a.severity == s).unwrap_or(true))
            .filter(|a| acknowledged.map(|ack| a.acknowledged == ack).unwrap_or(true))
            .filter(|a| since.map(|s| a.timestamp >= s).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn acknowledge(&self, alert_id: &str, acknowledged_by: &str) -> bool {
        let mut alerts = self.alerts.lock().await;
        for alert in alerts.iter_mut() {
            if alert.id == alert_id {
                alert.acknowledged = true;
                alert.acknowledged_by = acknowledged_by.to_string();
                alert.acknowledged_at = Some(Utc::now());
                return true;
            }
        }
        false
    }

    pub async fn get_unacknowledged_count(&self, severity: Option<AlertSeverity>) -> usize {
        let alerts = self.alerts.lock().await;
        alerts
            .iter()
            .filter(|a| !a.acknowledged)
            .filter(|a| severity.map(|s| a.severity == s).unwrap_or(true))
            .count()
    }

    pub async fn stats(&self) -> AlertStats {
        let alerts = self.alerts.lock().await;
        let now = Utc::now();
        let mut stats = AlertStats {
            total: alerts.len(),
            ..Default::default()
        };
        for a in alerts.iter() {
            if !a.acknowledged {
                stats.unacknowledged += 1;
            }
            match a.severity {
                AlertSeverity::Critical => stats.critical += 1,
                AlertSeverity::High => stats.high += 1,
                AlertSeverity::Medium => stats.medium += 1,
                AlertSeverity::Low => stats.low += 1,
            }
            if (now - a.timestamp).num_hours() < 24 {
                stats.recent_24h += 1;
            }
        }
        stats
    }

    // ===== trigger checks =====

    pub async fn check_ransomware(&self, content: &str, domain: &str, url: &str) -> Option<Alert> {
        let lower = content.to_lowercase();
        let keyword = RANSOMWARE_KEYWORDS.iter().find(|k| lower.contains(**k))?;
        let alert = self
            .create_alert(
                AlertSeverity::Critical,
                "ransomware_group_mentioned",
                &format!("Ransomware Group Detected: {}", keyword.to_uppercase()),
                &format!("Ransomware group '{keyword}' mentioned in content"),
                domain,
                url,
                HashMap::from([("ransomware_group".to_string(), Value::String(keyword.to_string()))]),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    /// "any indicator term appears in any entity value" — a case-insensitive
    /// substring scan over the entity map's flattened string leaves.
    pub async fn check_credentials_dump(
        &self,
        entities: &HashMap<String, Value>,
        domain: &str,
        url: &str,
    ) -> Option<Alert> {
        let values_lower: Vec<String> = flatten_strings(entities).into_iter().map(|s| s.to_lowercase()).collect();
        let count = CREDENTIALS_DUMP_INDICATORS
            .iter()
            .filter(|ind| values_lower.iter().any(|v| v.contains(**ind)))
            .count();
        if count < CREDENTIALS_DUMP_MIN_COUNT {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::Critical,
                "credentials_dump_detected",
                "Credentials Dump Detected",
                &format!("Possible credentials dump with {count} indicators"),
                domain,
                url,
                entities.clone(),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_internal_domain(&self, content: &str, domain: &str, url: &str) -> Option<Alert> {
        let lower = content.to_lowercase();
        let hit = self.config.internal_domains.iter().find(|d| lower.contains(&d.to_lowercase()))?;
        let alert = self
            .create_alert(
                AlertSeverity::Critical,
                "internal_domain_found",
                &format!("Internal Domain Found: {hit}"),
                &format!("Internal domain '{hit}' mentioned on darknet"),
                domain,
                url,
                HashMap::from([("internal_domain".to_string(), Value::String(hit.clone()))]),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    /// Hook point for a future populated IOC list; empty by default.
    pub async fn check_known_malware_c2(&self, content: &str, iocs: &[String], domain: &str, url: &str) -> Option<Alert> {
        let lower = content.to_lowercase();
        let hit = iocs.iter().find(|ioc| lower.contains(&ioc.to_lowercase()))?;
        let alert = self
            .create_alert(
                AlertSeverity::Critical,
                "known_malware_c2",
                &format!("Known Malware C2: {hit}"),
                &format!("Known malware C2 infrastructure indicator '{hit}' found"),
                domain,
                url,
                HashMap::from([("ioc".to_string(), Value::String(hit.clone()))]),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    /// Caller supplies the observed transaction amount; compared against
    /// the fixed 10.0 BTC threshold.
    pub async fn check_wallet_major_transaction(&self, amount_btc: f64, wallet: &str, domain: &str, url: &str) -> Option<Alert> {
        if amount_btc < WALLET_MAJOR_TRANSACTION_BTC {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::Critical,
                "wallet_major_transaction",
                &format!("Major Wallet Transaction: {amount_btc} BTC"),
                &format!("Wallet '{wallet}' shows a transaction of {amount_btc} BTC"),
                domain,
                url,
                HashMap::from([("wallet".to_string(), Value::String(wallet.to_string()))]),
                HashMap::from([("amount_btc".to_string(), serde_json::json!(amount_btc))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_watchlist_domain(&self, found_domain: &str, url: &str) -> Option<Alert> {
        if !self.config.watchlist_domains.iter().any(|d| d == found_domain) {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::High,
                "domain_in_watchlist",
                &format!("Watchlist Domain: {found_domain}"),
                &format!("Monitored domain '{found_domain}' detected"),
                found_domain,
                url,
                HashMap::new(),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_new_breach_site(&self, site_type: &str, title: &str, domain: &str, url: &str) -> Option<Alert> {
        if site_type != "breach_market" {
            return None;
        }
        let short_title: String = title.chars().take(50).collect();
        let alert = self
            .create_alert(
                AlertSeverity::High,
                "new_breach_site",
                &format!("New Breach Site: {short_title}"),
                &format!("New breach/leak site discovered: {title}"),
                domain,
                url,
                HashMap::new(),
                HashMap::from([("site_type".to_string(), Value::String(site_type.to_string()))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_multiple_patterns(&self, pattern_count: usize, domain: &str, url: &str) -> Option<Alert> {
        if pattern_count < MULTIPLE_PATTERNS_THRESHOLD {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::High,
                "multiple_patterns_same_domain",
                &format!("Multiple Patterns: {pattern_count} detected"),
                &format!("{pattern_count} patterns detected on same domain"),
                domain,
                url,
                HashMap::new(),
                HashMap::from([("pattern_count".to_string(), serde_json::json!(pattern_count))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    /// Hook point; callers supply the mirror-domain set from whatever
    /// correlation pass found them. Minimal by design — matches the
    /// source's stub-level check.
    pub async fn check_domain_mirrors_found(&self, mirror_domains: &[String], domain: &str, url: &str) -> Option<Alert> {
        if mirror_domains.is_empty() {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::High,
                "domain_mirrors_found",
                &format!("Domain Mirrors Found: {}", mirror_domains.len()),
                &format!("{} mirror domain(s) detected for {domain}", mirror_domains.len()),
                domain,
                url,
                HashMap::new(),
                HashMap::from([("mirrors".to_string(), serde_json::json!(mirror_domains))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_new_marketplace_vendor(&self, content: &str, domain: &str, url: &str) -> Option<Alert> {
        let lower = content.to_lowercase();
        if !MARKETPLACE_VENDOR_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::High,
                "new_marketplace_vendor",
                "New Marketplace Vendor Detected",
                "Marketplace vendor keywords detected on page",
                domain,
                url,
                HashMap::new(),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_unusual_crawl_activity(&self, pages_in_window: u64, domain: &str, url: &str) -> Option<Alert> {
        if pages_in_window < UNUSUAL_ACTIVITY_PAGE_THRESHOLD {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::Medium,
                "unusual_crawl_activity",
                "Unusual Crawl Activity Detected",
                &format!("{pages_in_window} pages crawled in the observation window"),
                domain,
                url,
                HashMap::new(),
                HashMap::from([("pages".to_string(), serde_json::json!(pages_in_window))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_domain_content_changed(&self, previous_len: u64, current_len: u64, domain: &str, url: &str) -> Option<Alert> {
        if previous_len == 0 {
            return None;
        }
        let delta_pct = ((current_len as f64 - previous_len as f64).abs() / previous_len as f64) * 100.0;
        if delta_pct < CONTENT_CHANGE_PERCENT_THRESHOLD {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::Medium,
                "domain_content_changed",
                "Major Content Change Detected",
                &format!("Content length changed by {delta_pct:.1}%"),
                domain,
                url,
                HashMap::new(),
                HashMap::from([("delta_percent".to_string(), serde_json::json!(delta_pct))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    /// First sighting of a previously-unseen email value.
    pub async fn check_new_email_pattern(&self, email: &str, domain: &str, url: &str) -> Option<Alert> {
        let key = email.to_lowercase();
        let mut seen = self.seen_emails.lock().await;
        if !seen.insert(key) {
            return None;
        }
        drop(seen);
        let alert = self
            .create_alert(
                AlertSeverity::Medium,
                "new_email_pattern",
                "New Email Pattern Detected",
                &format!("First sighting of email '{email}'"),
                domain,
                url,
                HashMap::from([("email".to_string(), Value::String(email.to_string()))]),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn check_high_risk_score(&self, risk_score: u8, domain: &str, url: &str) -> Option<Alert> {
        if risk_score < HIGH_RISK_SCORE_THRESHOLD {
            return None;
        }
        let alert = self
            .create_alert(
                AlertSeverity::Medium,
                "high_risk_score",
                &format!("High Risk Score: {risk_score}"),
                &format!("Page with risk score {risk_score}/100"),
                domain,
                url,
                HashMap::new(),
                HashMap::from([("risk_score".to_string(), serde_json::json!(risk_score))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    pub async fn record_crawler_stats_update(&self, pages_crawled: u64, queue_size: u64) -> Alert {
        let alert = self
            .create_alert(
                AlertSeverity::Low,
                "crawler_stats_update",
                "Crawler Statistics Update",
                &format!("{pages_crawled} pages crawled, {queue_size} queued"),
                "",
                "",
                HashMap::new(),
                HashMap::from([
                    ("pages_crawled".to_string(), serde_json::json!(pages_crawled)),
                    ("queue_size".to_string(), serde_json::json!(queue_size)),
                ]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        alert
    }

    pub async fn record_pattern_detected(&self, subtype: &str, domain: &str, url: &str) -> Alert {
        let alert = self
            .create_alert(
                AlertSeverity::Low,
                "pattern_detected",
                &format!("Pattern Detected: {subtype}"),
                &format!("Pattern '{subtype}' detected"),
                domain,
                url,
                HashMap::new(),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        alert
    }

    pub async fn record_domain_new_page(&self, domain: &str, url: &str) -> Alert {
        let alert = self
            .create_alert(
                AlertSeverity::Low,
                "domain_new_page",
                "New Page Discovered",
                &format!("New page discovered on {domain}"),
                domain,
                url,
                HashMap::new(),
                HashMap::new(),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        alert
    }

    /// Fires once per crossed milestone in `QUEUE_MILESTONES`.
    pub async fn check_queue_milestone(&self, queue_size: u64) -> Option<Alert> {
        let milestone = QUEUE_MILESTONES.iter().rev().find(|&&m| queue_size == m)?;
        let alert = self
            .create_alert(
                AlertSeverity::Low,
                "queue_milestone",
                &format!("Queue Milestone: {milestone}"),
                &format!("Crawl queue reached {milestone} URLs"),
                "",
                "",
                HashMap::new(),
                HashMap::from([("milestone".to_string(), serde_json::json!(milestone))]),
            )
            .await;
        self.dispatch_webhook(&alert).await;
        Some(alert)
    }

    /// Runs every wired CRITICAL/HIGH/MEDIUM check (`new_domain_discovered`
    /// is declared in the trigger taxonomy but has no evaluator, per the
    /// open question it was left under) and returns whatever fired.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_all_checks(
        &self,
        content: &str,
        entities: &HashMap<String, Value>,
        site_type: &str,
        risk_score: u8,
        domain: &str,
        url: &str,
        title: &str,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(a) = self.check_ransomware(content, domain, url).await {
            alerts.push(a);
        }
        if let Some(a) = self.check_credentials_dump(entities, domain, url).await {
            alerts.push(a);
        }
        if let Some(a) = self.check_internal_domain(content, domain, url).await {
            alerts.push(a);
        }

        if let Some(a) = self.check_watchlist_domain(domain, url).await {
            alerts.push(a);
        }
        if let Some(a) = self.check_new_breach_site(site_type, title, domain, url).await {
            alerts.push(a);
        }
        let entity_count: usize = entities
            .values()
            .map(|v| match v {
                Value::Array(items) => items.len(),
                _ => 1,
            })
            .sum();
        if let Some(a) = self.check_multiple_patterns(entity_count, domain, url).await {
            alerts.push(a);
        }
        if let Some(a) = self.check_new_marketplace_vendor(content, domain, url).await {
            alerts.push(a);
        }

        if let Some(a) = self.check_high_risk_score(risk_score, domain, url).await {
            alerts.push(a);
        }

        alerts
    }
}

fn flatten_strings(entities: &HashMap<String, Value>) -> Vec<String> {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    for v in entities.values() {
        walk(v, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlertsConfig {
        AlertsConfig {
            max_history: 5,
            notify_critical: false,
            notify_high: false,
            notify_medium: false,
            notify_low: false,
            webhook_rate_limit: 10,
            webhook_cooldown_secs: 60,
            watchlist_domains: vec!["bad.onion".to_string()],
            watchlist_emails: vec![],
            watchlist_wallets: vec![],
            internal_domains: vec!["corp-internal.example".to_string()],
        }
    }

    #[tokio::test]
    async fn ransomware_keyword_triggers_critical() {
        let manager = AlertManager::new(config());
        let alert = manager.check_ransomware("we are lockbit group", "x.onion", "http://x.onion/").await.unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.trigger, "ransomware_group_mentioned");
    }

    #[tokio::test]
    async fn credentials_dump_needs_three_indicators() {
        let manager = AlertManager::new(config());
        let entities = HashMap::from([(
            "notes".to_string(),
            Value::Array(vec![
                Value::String("dump".to_string()),
                Value::String("leak".to_string()),
            ]),
        )]);
        assert!(manager.check_credentials_dump(&entities, "x.onion", "u").await.is_none());

        let entities = HashMap::from([(
            "notes".to_string(),
            Value::Array(vec![
                Value::String("dump".to_string()),
                Value::String("leak".to_string()),
                Value::String("breach".to_string()),
            ]),
        )]);
        assert!(manager.check_credentials_dump(&entities, "x.onion", "u").await.is_some());
    }

    #[tokio::test]
    async fn history_is_bounded_by_max_history() {
        let manager = AlertManager::new(config());
        for i in 0..10 {
            manager
                .record_pattern_detected(&format!("p{i}"), "x.onion", "u")
                .await;
        }
        let alerts = manager.get_alerts(None, None, 100, None).await;
        assert_eq!(alerts.len(), 5);
    }

    #[tokio::test]
    async fn acknowledge_flips_flag_once() {
        let manager = AlertManager::new(config());
        let alert = manager.record_pattern_detected("p", "x.onion", "u").await;
        assert!(manager.acknowledge(&alert.id, "analyst").await);
        let alerts = manager.get_alerts(None, Some(true), 10, None).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].acknowledged_by, "analyst");
    }

    #[tokio::test]
    async fn watchlist_domain_triggers_high() {
        let manager = AlertManager::new(config());
        assert!(manager.check_watchlist_domain("bad.onion", "u").await.is_some());
        assert!(manager.check_watchlist_domain("ok.onion", "u").await.is_none());
    }

    #[tokio::test]
    async fn new_email_pattern_fires_only_once() {
        let manager = AlertManager::new(config());
        assert!(manager.check_new_email_pattern("a@b.com", "x.onion", "u").await.is_some());
        assert!(manager.check_new_email_pattern("a@b.com", "x.onion", "u").await.is_none());
    }

    #[tokio::test]
    async fn queue_milestone_fires_on_exact_match_only() {
        let manager = AlertManager::new(config());
        assert!(manager.check_queue_milestone(100).await.is_some());
        assert!(manager.check_queue_milestone(101).await.is_none());
    }
}
