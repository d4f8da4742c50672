use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::url_rules::{is_valid_onion_url, normalize_url};

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href], link[href]").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static LD_JSON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

pub fn page_title(document: &Html) -> String {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Strip tags and collapse whitespace down to a single-space-joined string.
pub fn html_to_text(document: &Html) -> String {
    document
        .select(&BODY_SELECTOR)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| document.root_element().text().collect::<Vec<_>>().join(" "))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Walk `<a>`/`<link>` hrefs, resolve relative to `base_url`, discard
/// non-crawlable schemes, keep only normalized `.onion` URLs that pass
/// `is_valid_onion_url`.
pub fn extract_links(document: &Html, base_url: &Url, ignored_extensions: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for el in document.select(&LINK_SELECTOR) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }
        let Ok(joined) = base_url.join(href) else {
            continue;
        };
        let normalized = normalize_url(joined.as_str());
        if is_valid_onion_url(&normalized, ignored_extensions) {
            out.push(normalized);
        }
    }
    out
}

/// Raw bodies of embedded `<script type="application/ld+json">` blocks,
/// capped at 5 per page.
pub fn extract_json_ld(document: &Html) -> Vec<String> {
    document
        .select(&LD_JSON_SELECTOR)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .take(5)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> String {
        "a".repeat(16)
    }

    #[test]
    fn extracts_and_normalizes_onion_links() {
        let addr = addr();
        let html = format!(
            r#"<html><body><a href="http://{addr}.onion/page">x</a><a href="#">skip</a><a href="mailto:a@b.com">skip</a></body></html>"#
        );
        let document = Html::parse_document(&html);
        let base = Url::parse(&format!("http://{addr}.onion/")).unwrap();
        let links = extract_links(&document, &base, &[".jpg".to_string()]);
        assert_eq!(links, vec![format!("http://{addr}.onion/page")]);
    }

    #[test]
    fn html_to_text_strips_tags() {
        let document = Html::parse_document("<html><body><p>Hello</p>  <p>World</p></body></html>");
        assert_eq!(html_to_text(&document), "Hello World");
    }

}
