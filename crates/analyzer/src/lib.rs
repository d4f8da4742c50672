pub mod content;
pub mod html;
pub mod url_rules;

pub use content::{detect_category, detect_language, extract_keywords, extract_tech_stack};
pub use html::{extract_json_ld, extract_links, html_to_text, page_title};
pub use url_rules::{is_valid_onion_url, normalize_url};
