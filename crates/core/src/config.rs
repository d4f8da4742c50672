use serde::Deserialize;

/// Top-level, immutable runtime configuration. Loaded from TOML with
/// `#[serde(default = ...)]` on every field added after the first release,
/// so older config files keep loading unchanged.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub seeds: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_session_recycle")]
    pub session_recycle: u32,
    #[serde(default = "default_queue_timeout_secs")]
    pub queue_timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            session_recycle: default_session_recycle(),
            queue_timeout_secs: default_queue_timeout_secs(),
        }
    }
}

fn default_max_workers() -> usize {
    15
}
fn default_max_pages() -> u64 {
    50_000
}
fn default_timeout_secs() -> u64 {
    90
}
fn default_max_retries() -> u32 {
    5
}
fn default_session_recycle() -> u32 {
    40
}
fn default_queue_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct TorConfig {
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    #[serde(default)]
    pub control_password: String,
    #[serde(default = "default_fallback_port")]
    pub fallback_port: u16,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            socks_port: default_socks_port(),
            control_port: default_control_port(),
            control_password: String::new(),
            fallback_port: default_fallback_port(),
        }
    }
}

fn default_socks_port() -> u16 {
    9050
}
fn default_control_port() -> u16 {
    9051
}
fn default_fallback_port() -> u16 {
    9150
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "onionwatch.db".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_json_path")]
    pub json_path: String,
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    #[serde(default = "default_emails_path")]
    pub emails_path: String,
    #[serde(default = "default_crypto_path")]
    pub crypto_path: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            json_path: default_json_path(),
            csv_path: default_csv_path(),
            emails_path: default_emails_path(),
            crypto_path: default_crypto_path(),
        }
    }
}

fn default_json_path() -> String {
    "onionwatch_report.json".to_string()
}
fn default_csv_path() -> String {
    "onionwatch_report.csv".to_string()
}
fn default_emails_path() -> String {
    "onionwatch_emails.txt".to_string()
}
fn default_crypto_path() -> String {
    "onionwatch_crypto.txt".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrontierConfig {
    #[serde(default = "default_frontier_priority")]
    pub default_priority: f64,
    #[serde(default = "default_seed_boost")]
    pub seed_priority_boost: f64,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            default_priority: default_frontier_priority(),
            seed_priority_boost: default_seed_boost(),
        }
    }
}

fn default_frontier_priority() -> f64 {
    50.0
}
fn default_seed_boost() -> f64 {
    10.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_true")]
    pub notify_critical: bool,
    #[serde(default = "default_true")]
    pub notify_high: bool,
    #[serde(default)]
    pub notify_medium: bool,
    #[serde(default)]
    pub notify_low: bool,
    #[serde(default = "default_webhook_rate_limit")]
    pub webhook_rate_limit: u32,
    #[serde(default = "default_webhook_cooldown")]
    pub webhook_cooldown_secs: u64,
    #[serde(default)]
    pub watchlist_domains: Vec<String>,
    #[serde(default)]
    pub watchlist_emails: Vec<String>,
    #[serde(default)]
    pub watchlist_wallets: Vec<String>,
    #[serde(default)]
    pub internal_domains: Vec<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            notify_critical: true,
            notify_high: true,
            notify_medium: false,
            notify_low: false,
            webhook_rate_limit: default_webhook_rate_limit(),
            webhook_cooldown_secs: default_webhook_cooldown(),
            watchlist_domains: Vec::new(),
            watchlist_emails: Vec::new(),
            watchlist_wallets: Vec::new(),
            internal_domains: Vec::new(),
        }
    }
}

fn default_max_history() -> usize {
    1000
}
fn default_true() -> bool {
    true
}
fn default_webhook_rate_limit() -> u32 {
    10
}
fn default_webhook_cooldown() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default = "default_referers")]
    pub referers: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ignored_extensions: default_ignored_extensions(),
            user_agents: default_user_agents(),
            referers: default_referers(),
        }
    }
}

fn default_ignored_extensions() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".pdf", ".css", ".ico", ".svg", ".mp4", ".zip",
        ".tar", ".gz", ".iso", ".xml", ".json", ".woff", ".woff2", ".ttf", ".eot",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_referers() -> Vec<String> {
    [
        "https://www.google.com/",
        "https://duckduckgo.com/",
        "http://dark.fail/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Stable seed list used to bootstrap a fresh database.
pub fn default_seeds() -> Vec<String> {
    [
        "http://msydqstlz2kzerdg.onion/",
        "http://zqktlwiuavvvqqt4ybvgvi7tyo4hjl5xgfuvpdf6otjiycgwqbym2qad.onion/",
        "http://torlinkbgs6aabns.onion/",
        "http://darkfailenbsdla5mal2mxn2uz66odwpkrnwyvrmiowcrs6hu2ioytpvcr5ye.onion/",
        "http://deepweblinksqhm6bctaokyg3l2zvcqh6gktuyumchoxl7tivuzqywb6tid.onion/",
        "http://pwoah7foa6au2pul.onion/",
        "http://hss3uro2hsxfogfq.onion/",
        "http://xmh57jrzrnw6insl.onion/",
        "http://torchdeedp3i2jigzjdmfpn5ttjhthh5wbmda2rr3jvqjg5p77c54dqd.onion/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_fills_in_every_default() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.crawl.max_workers, 15);
        assert_eq!(cfg.tor.socks_port, 9050);
        assert_eq!(cfg.database.path, "onionwatch.db");
        assert_eq!(cfg.http.user_agents.len(), 5);
        assert_eq!(cfg.http.referers.len(), 3);
        assert!(cfg.alerts.notify_critical);
        assert!(!cfg.alerts.notify_low);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [crawl]
            max_workers = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.crawl.max_workers, 4);
        assert_eq!(cfg.crawl.max_pages, 50_000);
    }
}
