//! Folds raw extractor hits into the `intel` row shape (spec.md §3/§4.3),
//! grounded on `analyzer.py`'s per-group field population (`secrets`,
//! `cryptos`, `socials` as kind→values maps, each capped).

use std::collections::HashMap;

use onionwatch_core::Page;
use onionwatch_extractor::ExtractedEntity;

const SECRETS_CAP: usize = 10;
const CRYPTO_CAP: usize = 20;
const SOCIALS_CAP: usize = 10;
const IP_CAP: usize = 20;
const PHONE_CAP: usize = 10;
const EMAIL_CAP: usize = 50;

fn group_values(entities: &[ExtractedEntity], group: &str, cap: usize) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for e in entities.iter().filter(|e| e.group == group) {
        let bucket = out.entry(e.subtype.clone()).or_default();
        if bucket.len() < cap && !bucket.contains(&e.value) {
            bucket.push(e.value.clone());
        }
    }
    out
}

fn subtype_values(entities: &[ExtractedEntity], subtypes: &[&str], cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for e in entities.iter().filter(|e| subtypes.contains(&e.subtype.as_str())) {
        if out.len() >= cap {
            break;
        }
        if !out.contains(&e.value) {
            out.push(e.value.clone());
        }
    }
    out
}

/// `ip_leaks` only counts addresses actually routable on the public
/// internet — RFC1918/loopback/link-local hits are page noise, not a
/// leak, and spec.md's risk formula gates its +20 bonus on a *public* IP.
fn is_public_ip(value: &str) -> bool {
    match value.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(v4)) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified() || v4.is_broadcast())
        }
        Ok(std::net::IpAddr::V6(v6)) => {
            let segments = v6.segments();
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            let is_unicast_link_local = (segments[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || is_unique_local || is_unicast_link_local)
        }
        Err(_) => false,
    }
}

/// secrets = credential-shaped hits from the `username`/`document` groups
/// that are flagged sensitive (keys, tokens, session ids, dumped PII).
fn secrets(entities: &[ExtractedEntity]) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for e in entities.iter().filter(|e| e.sensitive && e.group != "crypto" && e.subtype != "email") {
        let bucket = out.entry(e.subtype.clone()).or_default();
        if bucket.len() < SECRETS_CAP && !bucket.contains(&e.value) {
            bucket.push(e.value.clone());
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
pub struct PageInput<'a> {
    pub url: String,
    pub domain: String,
    pub status: u16,
    pub depth: u32,
    pub content_length: u64,
    pub title: String,
    pub entities: &'a [ExtractedEntity],
    pub tech_stack: Vec<String>,
    pub onion_links: Vec<String>,
    pub language: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub has_pgp: bool,
    pub json_data: Vec<String>,
}

pub fn build_page(input: PageInput<'_>) -> Page {
    let now = chrono::Utc::now();
    let emails = subtype_values(input.entities, &["email", "email_obfuscated", "jabber_xmpp"], EMAIL_CAP);
    let ip_leaks = subtype_values(input.entities, &["ip_address", "ipv6_address"], IP_CAP)
        .into_iter()
        .filter(|ip| is_public_ip(ip))
        .collect();
    let phones = subtype_values(
        input.entities,
        &["phone_us", "phone_fr", "phone_de", "phone_uk", "phone_intl"],
        PHONE_CAP,
    );
    let cryptos = group_values(input.entities, "crypto", CRYPTO_CAP);
    let socials = group_values(input.entities, "social", SOCIALS_CAP);
    let tags: Vec<String> = input
        .entities
        .iter()
        .filter(|e| e.confidence >= 0.8)
        .map(|e| e.subtype.clone())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();

    let mut page = Page {
        url: input.url,
        domain: input.domain,
        title: input.title.chars().take(200).collect(),
        status: input.status,
        depth: input.depth,
        content_length: input.content_length,
        tech_stack: input.tech_stack,
        secrets: secrets(input.entities),
        ip_leaks,
        emails,
        comments: Vec::new(),
        cryptos,
        socials,
        json_data: input.json_data,
        onion_links: input.onion_links,
        phones,
        has_pgp: input.has_pgp,
        language: input.language,
        keywords: input.keywords,
        category: input.category,
        tags,
        risk_score: 0,
        found_at: now,
        last_crawl: now,
    };
    page.risk_score = onionwatch_store::calculate_risk_score(&page);
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(subtype: &str, group: &str, value: &str, confidence: f64, sensitive: bool) -> ExtractedEntity {
        ExtractedEntity {
            subtype: subtype.to_string(),
            group: group.to_string(),
            value: value.to_string(),
            description: String::new(),
            confidence,
            sensitive,
            context: String::new(),
            position: 0,
        }
    }

    #[test]
    fn groups_crypto_hits_by_coin() {
        let entities = vec![entity("bitcoin", "crypto", "bc1q...", 0.9, true)];
        let input = PageInput {
            url: "http://a.onion/".into(),
            domain: "a.onion".into(),
            status: 200,
            depth: 0,
            content_length: 10,
            title: "t".into(),
            entities: &entities,
            tech_stack: vec![],
            onion_links: vec![],
            language: "en".into(),
            category: "unknown".into(),
            keywords: vec![],
            has_pgp: false,
            json_data: vec![],
        };
        let page = build_page(input);
        assert_eq!(page.cryptos.get("bitcoin").unwrap(), &vec!["bc1q...".to_string()]);
        assert!(page.risk_score > 0);
    }

    #[test]
    fn emails_and_secrets_are_separated() {
        let entities = vec![
            entity("email", "contact", "a@b.com", 0.9, true),
            entity("aws_access_key", "username", "AKIA000000000000", 0.9, true),
        ];
        let input = PageInput {
            url: "u".into(),
            domain: "d".into(),
            status: 200,
            depth: 0,
            content_length: 1,
            title: "t".into(),
            entities: &entities,
            tech_stack: vec![],
            onion_links: vec![],
            language: "en".into(),
            category: "unknown".into(),
            keywords: vec![],
            has_pgp: false,
            json_data: vec![],
        };
        let page = build_page(input);
        assert_eq!(page.emails, vec!["a@b.com".to_string()]);
        assert!(page.secrets.contains_key("aws_access_key"));
        assert!(!page.secrets.contains_key("email"));
    }

    #[test]
    fn private_ip_hits_are_dropped_public_ones_kept() {
        let entities = vec![
            entity("ip_address", "document", "10.0.0.5", 0.7, true),
            entity("ip_address", "document", "192.168.1.1", 0.7, true),
            entity("ip_address", "document", "8.8.8.8", 0.7, true),
        ];
        let input = PageInput {
            url: "u".into(),
            domain: "d".into(),
            status: 200,
            depth: 0,
            content_length: 1,
            title: "t".into(),
            entities: &entities,
            tech_stack: vec![],
            onion_links: vec![],
            language: "en".into(),
            category: "unknown".into(),
            keywords: vec![],
            has_pgp: false,
            json_data: vec![],
        };
        let page = build_page(input);
        assert_eq!(page.ip_leaks, vec!["8.8.8.8".to_string()]);
    }
}
