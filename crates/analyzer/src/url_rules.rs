use url::Url;

/// `true` when `host` is a syntactically valid v2 (16-char) or v3 (56-char)
/// base32 onion label, case-insensitively.
fn has_valid_onion_label(host: &str) -> bool {
    let Some(label) = host.strip_suffix(".onion") else {
        return false;
    };
    let label = label.to_lowercase();
    label.len() == 16 || label.len() == 56
}

/// Scheme ∈ {http, https}; host ends `.onion` with a v2/v3-shaped label;
/// doesn't end in an ignored binary-asset extension.
pub fn is_valid_onion_url(url: &str, ignored_extensions: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if !host.ends_with(".onion") || !has_valid_onion_label(host) {
        return false;
    }
    let lower = url.to_lowercase();
    if ignored_extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
        return false;
    }
    true
}

/// Drop fragment, drop long (>100 char) query strings, and append a
/// trailing slash when the last path segment carries no dot (i.e. looks
/// like a directory, not a file).
pub fn normalize_url(url: &str) -> String {
    let mut url = url.split('#').next().unwrap_or(url).to_string();

    if let Some(q_pos) = url.find('?') {
        if url[q_pos + 1..].len() > 100 {
            url.truncate(q_pos);
        }
    }

    let last_segment = url.rsplit('/').next().unwrap_or("");
    if !url.ends_with('/') && !last_segment.contains('.') {
        url.push('/');
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec![".jpg".into(), ".css".into()]
    }

    #[test]
    fn accepts_v3_address() {
        let addr = "a".repeat(56);
        let url = format!("http://{addr}.onion/page");
        assert!(is_valid_onion_url(&url, &exts()));
    }

    #[test]
    fn accepts_v2_address() {
        let addr = "a".repeat(16);
        let url = format!("http://{addr}.onion/");
        assert!(is_valid_onion_url(&url, &exts()));
    }

    #[test]
    fn rejects_non_onion_host() {
        assert!(!is_valid_onion_url("http://example.com/", &exts()));
    }

    #[test]
    fn rejects_ignored_extension() {
        let addr = "a".repeat(16);
        let url = format!("http://{addr}.onion/logo.jpg");
        assert!(!is_valid_onion_url(&url, &exts()));
    }

    #[test]
    fn rejects_bad_scheme() {
        let addr = "a".repeat(16);
        let url = format!("ftp://{addr}.onion/");
        assert!(!is_valid_onion_url(&url, &exts()));
    }

    #[test]
    fn normalize_strips_fragment() {
        assert_eq!(normalize_url("http://x.onion/page#section"), "http://x.onion/page");
    }

    #[test]
    fn normalize_drops_long_query() {
        let long_q = "a=".to_string() + &"x".repeat(150);
        let input = format!("http://x.onion/page?{long_q}");
        assert_eq!(normalize_url(&input), "http://x.onion/page");
    }

    #[test]
    fn normalize_adds_trailing_slash_to_directory() {
        assert_eq!(normalize_url("http://x.onion/dir"), "http://x.onion/dir/");
    }

    #[test]
    fn normalize_leaves_file_paths_alone() {
        assert_eq!(normalize_url("http://x.onion/page.html"), "http://x.onion/page.html");
    }
}
