/// Keyword/threshold tables grounded one-for-one on `alert_manager.py`'s
/// `AlertTriggers` dicts. These are the authority for "fixed keyword list"
/// since spec.md itself doesn't enumerate them.
pub const RANSOMWARE_KEYWORDS: &[&str] =
    &["lockbit", "blackcat", "alphv", "conti", "revil", "akira", "blackbasta", "hive"];

pub const CREDENTIALS_DUMP_INDICATORS: &[&str] = &["dump", "leak", "breach", "credentials", "database"];
pub const CREDENTIALS_DUMP_MIN_COUNT: usize = 3;

pub const MARKETPLACE_VENDOR_KEYWORDS: &[&str] = &["vendor", "seller", "shop"];

pub const MULTIPLE_PATTERNS_THRESHOLD: usize = 5;
pub const HIGH_RISK_SCORE_THRESHOLD: u8 = 70;
pub const UNUSUAL_ACTIVITY_PAGE_THRESHOLD: u64 = 100;
pub const CONTENT_CHANGE_PERCENT_THRESHOLD: f64 = 50.0;
pub const WALLET_MAJOR_TRANSACTION_BTC: f64 = 10.0;

pub const QUEUE_MILESTONES: &[u64] = &[100, 500, 1000, 5000];
