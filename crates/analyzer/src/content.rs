use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Per-language stopword sets, carried forward in full from the original
/// indicator table rather than trimmed to spec.md's named examples.
static LANGUAGE_INDICATORS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        (
            "en",
            vec!["the", "and", "for", "with", "you", "this", "that", "have", "from"],
        ),
        (
            "ru",
            vec!["и", "в", "не", "что", "он", "на", "я", "с", "как"],
        ),
        (
            "de",
            vec!["und", "die", "der", "das", "ist", "nicht", "mit", "auf", "fur"],
        ),
        (
            "fr",
            vec!["et", "le", "la", "les", "de", "des", "un", "une", "pour", "que"],
        ),
        (
            "es",
            vec!["el", "la", "de", "que", "y", "en", "un", "una", "los", "las"],
        ),
        (
            "zh",
            vec!["的", "是", "我", "你", "他", "们", "这", "那", "在"],
        ),
        (
            "pt",
            vec!["de", "que", "e", "do", "da", "em", "um", "para", "com"],
        ),
    ])
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").unwrap());

static KEYWORD_STOPWORDS: Lazy<std::collections::HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "you", "this", "that", "have", "from", "are", "was", "were",
        "been", "being", "has", "had", "will", "would", "could", "should", "may", "might", "must",
        "can", "not", "all", "any", "some", "more", "most", "other",
    ]
    .into_iter()
    .collect()
});

/// Weighted regex groups, in spec-defined order; title text is counted at
/// 3x and a category is chosen by total match count (argmax, first group
/// wins ties in iteration order).
static CATEGORY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("marketplace", Regex::new(r"(?i)\b(market|shop|store|buy|sell|vendor|listing|cart|checkout)\b").unwrap()),
        ("forum", Regex::new(r"(?i)\b(forum|thread|post|topic|reply|member|board)\b").unwrap()),
        ("leak_dump", Regex::new(r"(?i)\b(leak|dump|breach|database|combo|collection)\b").unwrap()),
        ("hacking", Regex::new(r"(?i)\b(hack|exploit|vulnerability|0day|zero.?day|malware|rat|botnet)\b").unwrap()),
        ("carding", Regex::new(r"(?i)\b(card|cvv|fullz|bin|bank|cc|credit|debit)\b").unwrap()),
        ("drugs", Regex::new(r"(?i)\b(weed|cocaine|mdma|lsd|pills|pharma|cannabis|marijuana)\b").unwrap()),
        ("documents", Regex::new(r"(?i)\b(passport|id|license|ssn|identity|document|fake)\b").unwrap()),
        ("weapons", Regex::new(r"(?i)\b(weapon|gun|firearm|ammo|ammunition|explosive)\b").unwrap()),
        ("crypto_service", Regex::new(r"(?i)\b(mixer|tumbler|exchange|wallet|swap|launder)\b").unwrap()),
        ("hosting", Regex::new(r"(?i)\b(hosting|vps|server|domain|bulletproof|offshore)\b").unwrap()),
    ]
});

/// `""` when the text is under 50 chars or no indicator scores at all
/// (spec.md is followed literally here rather than the Python fallback of
/// defaulting to `"en"` on a genuine zero-score tie — see DESIGN.md).
pub fn detect_language(text: &str) -> String {
    if text.len() < 50 {
        return String::new();
    }
    let lower = text.to_lowercase();
    let words: Vec<&str> = WORD_RE.find_iter(&lower).map(|m| m.as_str()).collect();
    if words.is_empty() {
        return String::new();
    }

    let mut best: Option<(&str, usize)> = None;
    for (lang, indicators) in LANGUAGE_INDICATORS.iter() {
        let score = words.iter().filter(|w| indicators.contains(w)).count();
        if score > 0 && best.map(|(_, b)| score > b).unwrap_or(true) {
            best = Some((lang, score));
        }
    }

    best.map(|(lang, _)| lang.to_string()).unwrap_or_default()
}

pub fn detect_category(text: &str, title: &str) -> String {
    let combined = format!("{title} {text}").to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (category, pattern) in CATEGORY_PATTERNS.iter() {
        let count = pattern.find_iter(&combined).count();
        if count > 0 && best.map(|(_, b)| count > b).unwrap_or(true) {
            best = Some((category, count));
        }
    }
    best.map(|(c, _)| c.to_string()).unwrap_or_default()
}

pub fn extract_keywords(text: &str, title: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let combined = format!("{} {}", title.repeat(3), text).to_lowercase();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for m in KEYWORD_RE.find_iter(&combined) {
        let word = m.as_str();
        if word.len() <= 3 || KEYWORD_STOPWORDS.contains(word) {
            continue;
        }
        if !counts.contains_key(word) {
            order.push(word.to_string());
        }
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }

    let mut words: Vec<String> = order;
    words.sort_by(|a, b| counts[b].cmp(&counts[a]));
    words.truncate(limit);
    words
}

const TECH_STACK_HEADERS: &[(&str, &str)] = &[
    ("server", "Server"),
    ("x-powered-by", "PoweredBy"),
    ("x-aspnet-version", "ASP.NET"),
    ("x-generator", "Generator"),
];

const COOKIE_INDICATORS: &[(&str, &str)] = &[
    ("PHPSESSID", "PHP"),
    ("JSESSIONID", "Java"),
    ("csrftoken", "Django"),
    ("laravel_session", "Laravel"),
    ("rack.session", "Ruby"),
    ("connect.sid", "Express.js"),
    ("XSRF-TOKEN", "Angular/Laravel"),
];

/// Header/cookie fingerprint mapping, exactly spec.md §4.2's table.
pub fn extract_tech_stack(headers: &HashMap<String, String>) -> Vec<String> {
    let mut stack: std::collections::HashSet<String> = std::collections::HashSet::new();

    for (header, label) in TECH_STACK_HEADERS {
        if let Some(value) = headers.get(*header) {
            stack.insert(format!("{label}:{value}"));
        }
    }

    if let Some(cookies) = headers.get("set-cookie") {
        for (indicator, tech) in COOKIE_INDICATORS {
            if cookies.contains(indicator) {
                stack.insert(tech.to_string());
            }
        }
    }

    let mut result: Vec<String> = stack.into_iter().collect();
    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_has_no_language() {
        assert_eq!(detect_language("too short"), "");
    }

    #[test]
    fn english_text_detected() {
        let text = "the cat and the dog went to the park with you and this is from that place".repeat(2);
        assert_eq!(detect_language(&text), "en");
    }

    #[test]
    fn no_hits_returns_empty_not_en() {
        let text = "xyzzy plugh qwerty zxcvb mnbvc asdfg hjklo poiuy lkjhg mnbvc".repeat(3);
        assert_eq!(detect_language(&text), "");
    }

    #[test]
    fn category_matches_marketplace() {
        assert_eq!(detect_category("buy and sell on our market", "Vendor Shop"), "marketplace");
    }

    #[test]
    fn category_empty_when_no_match() {
        assert_eq!(detect_category("nothing relevant here", ""), "");
    }

    #[test]
    fn keywords_filters_stopwords_and_short_words() {
        let kws = extract_keywords("bitcoin bitcoin escrow the and for", "vendor", 5);
        assert!(kws.contains(&"bitcoin".to_string()));
        assert!(!kws.iter().any(|w| w == "the" || w == "and" || w == "for"));
    }

    #[test]
    fn tech_stack_from_headers_and_cookies() {
        let mut headers = HashMap::new();
        headers.insert("server".to_string(), "nginx".to_string());
        headers.insert("set-cookie".to_string(), "PHPSESSID=abc123".to_string());
        let stack = extract_tech_stack(&headers);
        assert!(stack.contains(&"Server:nginx".to_string()));
        assert!(stack.contains(&"PHP".to_string()));
    }
}
