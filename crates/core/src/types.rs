use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

/// Parameters governing a single outbound fetch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_body_size: usize,
    pub follow_redirects: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            max_body_size: 10 * 1024 * 1024,
            follow_redirects: true,
        }
    }
}

/// Raw bytes and metadata returned by a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub response_time_ms: u64,
    pub domain: String,
}

/// A unit of crawl work: a URL waiting to be fetched.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub url: Url,
    pub depth: u32,
    pub source_url: Option<String>,
    pub priority: f64,
    pub retry_count: u32,
}

/// `intel` table row — the primary crawl record, keyed by canonical URL.
///
/// `risk_score` is recomputed on every write; it is never read back and
/// reused as an input (§8 invariant 3: risk scoring is a pure function of
/// the other fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub status: u16,
    pub depth: u32,
    pub content_length: u64,
    pub tech_stack: Vec<String>,
    pub secrets: HashMap<String, Vec<String>>,
    pub ip_leaks: Vec<String>,
    pub emails: Vec<String>,
    pub comments: Vec<String>,
    pub cryptos: HashMap<String, Vec<String>>,
    pub socials: HashMap<String, Vec<String>>,
    pub json_data: Vec<String>,
    pub onion_links: Vec<String>,
    pub phones: Vec<String>,
    pub has_pgp: bool,
    pub language: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub risk_score: u8,
    pub found_at: chrono::DateTime<chrono::Utc>,
    pub last_crawl: chrono::DateTime<chrono::Utc>,
}

impl Page {
    pub fn is_queued(&self) -> bool {
        self.status == 0
    }
}

/// A canonical extracted atom, identified by `(type, lowercased value)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub value: String,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub occurrence_count: u64,
    pub source_domains: HashSet<String>,
    pub source_urls: HashSet<String>,
    pub risk_score: f64,
    pub tags: HashSet<String>,
    pub confidence: f64,
}

impl Entity {
    pub fn node_id(entity_type: &str, value: &str) -> String {
        format!("{}:{}", entity_type, value.to_lowercase())
    }
}

/// Undirected co-occurrence or typed relation between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub entity_id_a: String,
    pub entity_id_b: String,
    pub relationship: String,
    pub weight: f64,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub occurrence_count: u64,
    pub evidence: Vec<String>,
}

impl Edge {
    /// Edges are keyed by the alphabetically-ordered pair so lookup by
    /// `(a,b)` and `(b,a)` resolve to the same record (§8 invariant 5).
    pub fn edge_id(a: &str, b: &str) -> String {
        if a <= b {
            format!("{}--{}", a, b)
        } else {
            format!("{}--{}", b, a)
        }
    }
}

pub const MAX_EDGE_EVIDENCE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Critical => "CRITICAL",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::Low => "LOW",
        }
    }
}

/// An immutable event, unless acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub trigger: String,
    pub title: String,
    pub description: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub domain: String,
    pub url: String,
    pub entities: HashMap<String, serde_json::Value>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub acknowledged: bool,
    pub acknowledged_by: String,
    pub acknowledged_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Normal,
    Frozen,
    Priority,
}

/// Per-domain crawl behavior. `Frozen` means no URL from this domain is
/// dispatched, regardless of frontier contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPolicy {
    pub domain: String,
    pub status: DomainStatus,
    pub trust_level: i32,
    pub max_depth: Option<u32>,
    pub delay_ms: u64,
    pub priority_boost: f64,
    pub notes: String,
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self {
            domain: String::new(),
            status: DomainStatus::Normal,
            trust_level: 0,
            max_depth: None,
            delay_ms: 0,
            priority_boost: 0.0,
            notes: String::new(),
        }
    }
}

/// `(URL, depth, priority_score)` — frontier default priority is 50,
/// modified by domain priority_boost and trigger heuristics.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
    pub priority_score: f64,
}

pub const DEFAULT_PRIORITY: f64 = 50.0;

/// Structured result shape for every boundary-facing write operation
/// (§7: "user-visible failures at the boundary always return a structured
/// `{success, message, details?}` tuple").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryResult<T> {
    pub success: bool,
    pub message: String,
    pub details: Option<T>,
}

impl<T> BoundaryResult<T> {
    pub fn ok(message: impl Into<String>, details: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn ok_empty(message: impl Into<String>) -> BoundaryResult<()> {
        BoundaryResult {
            success: true,
            message: message.into(),
            details: Some(()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
        }
    }
}
