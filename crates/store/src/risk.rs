use onionwatch_core::Page;

const SUSPICIOUS_TITLE_WORDS: &[&str] = &[
    "market", "shop", "buy", "sell", "drug", "weapon", "hack", "leak", "dump", "card", "fraud",
    "exploit",
];

/// Deterministic 0-100 score, a pure function of the page's already-extracted
/// fields. Never reads a previously stored risk_score as an input.
pub fn calculate_risk_score(page: &Page) -> u8 {
    let mut score: i32 = 0;

    if !page.secrets.is_empty() {
        score += (page.secrets.len() as i32 * 10).min(30);
    }

    if !page.cryptos.is_empty() {
        let crypto_count: i32 = page.cryptos.values().map(|v| v.len() as i32).sum();
        score += (crypto_count * 2).min(20);
    }

    if !page.emails.is_empty() {
        score += (page.emails.len() as i32).min(10);
    }

    if !page.ip_leaks.is_empty() {
        score += 20;
    }

    let title = page.title.to_lowercase();
    for word in SUSPICIOUS_TITLE_WORDS {
        if title.contains(word) {
            score += 5;
        }
    }

    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_page() -> Page {
        Page {
            url: "http://example.onion/".into(),
            domain: "example.onion".into(),
            ..Default::default()
        }
    }

    #[test]
    fn clean_page_scores_zero() {
        assert_eq!(calculate_risk_score(&base_page()), 0);
    }

    #[test]
    fn secrets_cap_at_thirty() {
        let mut page = base_page();
        let mut secrets = HashMap::new();
        for i in 0..10 {
            secrets.insert(format!("key{i}"), vec!["x".to_string()]);
        }
        page.secrets = secrets;
        assert_eq!(calculate_risk_score(&page), 30);
    }

    #[test]
    fn ip_leak_adds_twenty_flat() {
        let mut page = base_page();
        page.ip_leaks = vec!["1.2.3.4".to_string()];
        assert_eq!(calculate_risk_score(&page), 20);
    }

    #[test]
    fn suspicious_title_words_stack() {
        let mut page = base_page();
        page.title = "Best Market to Buy and Sell Drugs".to_string();
        assert_eq!(calculate_risk_score(&page), 20);
    }

    #[test]
    fn total_clamped_to_hundred() {
        let mut page = base_page();
        let mut secrets = HashMap::new();
        for i in 0..10 {
            secrets.insert(format!("key{i}"), vec!["x".to_string()]);
        }
        page.secrets = secrets;
        page.ip_leaks = vec!["1.2.3.4".to_string()];
        page.emails = (0..20).map(|i| format!("a{i}@x.onion")).collect();
        let mut cryptos = HashMap::new();
        cryptos.insert("bitcoin".to_string(), (0..20).map(|_| "addr".to_string()).collect());
        page.cryptos = cryptos;
        page.title = "market shop buy sell drug weapon hack leak dump card fraud exploit".to_string();
        assert_eq!(calculate_risk_score(&page), 100);
    }
}
