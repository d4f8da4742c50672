use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use onionwatch_core::{Alert, AlertSeverity};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

/// Four outbound formats from `alert_manager.py::WebhookSender`, all
/// sharing one token-bucket rate limiter (10/minute default, resetting
/// every cooldown window).
pub struct WebhookSender {
    client: reqwest::Client,
    generic_url: Option<String>,
    slack_url: Option<String>,
    discord_url: Option<String>,
    telegram_token: Option<String>,
    telegram_chat_id: Option<String>,
    rate_limit: u32,
    cooldown_secs: u64,
    sent_count: AtomicU32,
    last_reset: Mutex<chrono::DateTime<Utc>>,
}

impl WebhookSender {
    /// Reads webhook destinations from the environment, following the
    /// teacher's `WebhookConfig` pattern.
    pub fn from_env(rate_limit: u32, cooldown_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            generic_url: non_empty_env("CRAWLER_WEBHOOK_URL"),
            slack_url: non_empty_env("CRAWLER_SLACK_WEBHOOK"),
            discord_url: non_empty_env("CRAWLER_DISCORD_WEBHOOK"),
            telegram_token: non_empty_env("CRAWLER_TELEGRAM_TOKEN"),
            telegram_chat_id: non_empty_env("CRAWLER_TELEGRAM_CHAT"),
            rate_limit,
            cooldown_secs,
            sent_count: AtomicU32::new(0),
            last_reset: Mutex::new(Utc::now()),
        }
    }

    async fn check_rate_limit(&self) -> bool {
        let mut last_reset = self.last_reset.lock().await;
        let now = Utc::now();
        if (now - *last_reset).num_seconds() >= self.cooldown_secs as i64 {
            self.sent_count.store(0, Ordering::SeqCst);
            *last_reset = now;
        }
        if self.sent_count.load(Ordering::SeqCst) >= self.rate_limit {
            return false;
        }
        self.sent_count.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn send_generic(&self, url: &str, payload: serde_json::Value) -> bool {
        if url.is_empty() || !self.check_rate_limit().await {
            return false;
        }
        match self.client.post(url).json(&payload).timeout(std::time::Duration::from_secs(10)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "webhook delivery failed");
                false
            }
        }
    }

    async fn send_slack(&self, alert: &Alert) -> bool {
        let Some(url) = &self.slack_url else { return false };
        let color = slack_color(alert.severity);
        let payload = json!({
            "attachments": [{
                "color": color,
                "title": format!("{}: {}", alert.severity.as_str(), alert.title),
                "text": alert.description,
                "fields": [
                    {"title": "Trigger", "value": alert.trigger, "short": true},
                    {"title": "Domain", "value": if alert.domain.is_empty() { "N/A" } else { &alert.domain }, "short": true},
                ],
                "footer": "Darknet Crawler",
                "ts": Utc::now().timestamp(),
            }]
        });
        self.send_generic(url, payload).await
    }

    async fn send_discord(&self, alert: &Alert) -> bool {
        let Some(url) = &self.discord_url else { return false };
        let color = discord_color(alert.severity);
        let payload = json!({
            "embeds": [{
                "title": format!("{}: {}", alert.severity.as_str(), alert.title),
                "description": alert.description,
                "color": color,
                "fields": [
                    {"name": "Trigger", "value": alert.trigger, "inline": true},
                    {"name": "Domain", "value": if alert.domain.is_empty() { "N/A" } else { &alert.domain }, "inline": true},
                ],
                "footer": {"text": "Darknet Crawler"},
                "timestamp": Utc::now().to_rfc3339(),
            }]
        });
        self.send_generic(url, payload).await
    }

    async fn send_telegram(&self, alert: &Alert) -> bool {
        let (Some(token), Some(chat_id)) = (&self.telegram_token, &self.telegram_chat_id) else {
            return false;
        };
        let message = format!(
            "*{}*: {}\n\n{}\n\n*Trigger*: `{}`\n*Domain*: `{}`\n*Time*: {}",
            alert.severity.as_str(),
            alert.title,
            alert.description,
            alert.trigger,
            if alert.domain.is_empty() { "N/A" } else { &alert.domain },
            alert.timestamp,
        );
        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let payload = json!({
            "chat_id": chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });
        self.send_generic(&url, payload).await
    }

    /// Fan out to every configured destination concurrently.
    pub async fn send_all(&self, alert: &Alert) {
        if let Some(url) = self.generic_url.clone() {
            let payload = json!({
                "timestamp": alert.timestamp,
                "severity": alert.severity.as_str(),
                "trigger": alert.trigger,
                "title": alert.title,
                "description": alert.description,
                "domain": alert.domain,
                "url": alert.url,
                "entities": alert.entities,
                "metadata": alert.metadata,
            });
            self.send_generic(&url, payload).await;
        }
        self.send_slack(alert).await;
        self.send_discord(alert).await;
        self.send_telegram(alert).await;
    }
}

fn slack_color(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "#ff0000",
        AlertSeverity::High => "#ff8800",
        AlertSeverity::Medium => "#ffff00",
        AlertSeverity::Low => "#00ff00",
    }
}

fn discord_color(severity: AlertSeverity) -> u32 {
    match severity {
        AlertSeverity::Critical => 0xff0000,
        AlertSeverity::High => 0xff8800,
        AlertSeverity::Medium => 0xffff00,
        AlertSeverity::Low => 0x00ff00,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
