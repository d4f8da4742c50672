use once_cell::sync::Lazy;
use regex::Regex;

/// The seven pattern groups spec.md §4.3 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Crypto,
    Contact,
    Document,
    Social,
    Username,
    Address,
    Hash,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Crypto => "crypto",
            Group::Contact => "contact",
            Group::Document => "document",
            Group::Social => "social",
            Group::Username => "username",
            Group::Address => "address",
            Group::Hash => "hash",
        }
    }
}

pub struct CompiledPattern {
    pub subtype: &'static str,
    pub group: Group,
    pub description: &'static str,
    pub base_confidence: f64,
    pub sensitive: bool,
    pub regex: Regex,
    /// Index of the capture group carrying the value, 0 = whole match.
    pub value_group: usize,
}

/// `(subtype, group, regex, description, base_confidence, sensitive, value_group)`.
///
/// The flat compile-time table spec.md §9's "Pattern registry" redesign note
/// asks for: the catalog is testable in isolation and the Graph/AlertManager
/// depend only on the stable subtype strings, never the regex internals.
/// AWS key, GitHub token, JWT, bearer token, IBAN, BIC, Luhn-validated card,
/// Monero, Bitcoin (bech32+legacy), Ethereum, Session ID, Tox ID, and
/// Telegram handle keep the exact semantics spec.md §4.3 mandates as a
/// closed set; the rest of the catalog, carried from
/// `entity_extractor.py`, is refined but keeps the same subtype names.
type Raw = (&'static str, Group, &'static str, &'static str, f64, bool, usize);

static RAW_TABLE: &[Raw] = &[
    // crypto
    ("bitcoin", Group::Crypto, r"\bbc1[a-z0-9]{39,59}\b", "Bitcoin bech32 address", 0.85, true, 0),
    ("bitcoin_legacy", Group::Crypto, r"\b[13][1-9A-HJ-NP-Za-km-z]{25,34}\b", "Bitcoin legacy address", 0.7, true, 0),
    ("monero", Group::Crypto, r"\b4[0-9AB][1-9A-HJ-NP-Za-km-z]{93}\b", "Monero address", 0.9, true, 0),
    ("ethereum", Group::Crypto, r"\b0x[a-fA-F0-9]{40}\b", "Ethereum address", 0.85, true, 0),
    ("zcash_transparent", Group::Crypto, r"\bt1[0-9A-Za-z]{33}\b", "Zcash transparent address", 0.7, true, 0),
    ("zcash_shielded", Group::Crypto, r"\bzs1[0-9a-z]{73,77}\b", "Zcash shielded address", 0.75, true, 0),
    ("dash", Group::Crypto, r"\bX[1-9A-HJ-NP-Za-km-z]{33}\b", "Dash address", 0.6, true, 0),
    ("dogecoin", Group::Crypto, r"\bD[5-9A-HJ-NP-U][1-9A-HJ-NP-Za-km-z]{32}\b", "Dogecoin address", 0.6, true, 0),
    ("litecoin", Group::Crypto, r"\b[LM][1-9A-HJ-NP-Za-km-z]{26,33}\b", "Litecoin address", 0.55, true, 0),
    ("ripple", Group::Crypto, r"\br[0-9A-HJ-NP-Za-km-z]{24,34}\b", "Ripple (XRP) address", 0.5, true, 0),
    ("tron", Group::Crypto, r"\bT[1-9A-HJ-NP-Za-km-z]{33}\b", "Tron address", 0.6, true, 0),
    ("solana", Group::Crypto, r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b", "Solana address", 0.3, true, 0),
    // contact
    ("email", Group::Contact, r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b", "Email address", 0.9, true, 0),
    (
        "email_obfuscated",
        Group::Contact,
        r"(?i)\b[A-Za-z0-9._%+-]+\s*(?:\[at\]|\(at\)|\s+at\s+)\s*[A-Za-z0-9.-]+\s*(?:\[dot\]|\(dot\)|\s+dot\s+)\s*[A-Za-z]{2,}\b",
        "Obfuscated email address",
        0.6,
        true,
        0,
    ),
    ("phone_us", Group::Contact, r"\b\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b", "US phone number", 0.5, true, 0),
    ("phone_fr", Group::Contact, r"\b0[1-9](?:[ .-]?\d{2}){4}\b", "French phone number", 0.45, true, 0),
    ("phone_de", Group::Contact, r"\b0\d{2,4}[-.\s]\d{6,8}\b", "German phone number", 0.4, true, 0),
    ("phone_uk", Group::Contact, r"\b(?:\+44\s?7\d{3}|0\s?7\d{3})[-.\s]?\d{3}[-.\s]?\d{3}\b", "UK mobile number", 0.45, true, 0),
    ("phone_intl", Group::Contact, r"\+\d{1,3}[-.\s]?\d{2,4}[-.\s]?\d{3,4}[-.\s]?\d{3,4}\b", "International phone number", 0.4, true, 0),
    ("telegram", Group::Contact, r"(?:@|t\.me/)([A-Za-z0-9_]{5,32})\b", "Telegram handle", 0.6, false, 1),
    ("discord_user", Group::Contact, r"\b[A-Za-z0-9_.]{2,32}#\d{4}\b", "Discord user (legacy tag)", 0.6, false, 0),
    ("discord_new", Group::Contact, r"(?i)\bdiscord\s*[:=]\s*([a-z0-9_.]{2,32})\b", "Discord handle (new format)", 0.5, false, 1),
    ("jabber_xmpp", Group::Contact, r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}/[A-Za-z0-9_-]+\b", "Jabber/XMPP JID", 0.6, true, 0),
    ("session_id", Group::Contact, r"\b05[0-9a-fA-F]{64}\b", "Session messenger ID", 0.85, true, 0),
    ("tox_id", Group::Contact, r"\b[0-9A-Fa-f]{76}\b", "Tox ID", 0.85, true, 0),
    // document
    ("ssn_us", Group::Document, r"\b\d{3}-\d{2}-\d{4}\b", "US Social Security Number", 0.7, true, 0),
    ("passport_generic", Group::Document, r"\b[A-Z]{1,2}\d{6,9}\b", "Passport number", 0.3, true, 0),
    ("credit_card", Group::Document, r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b", "Credit card number", 0.6, true, 0),
    ("iban", Group::Document, r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b", "IBAN", 0.75, true, 0),
    ("bic_swift", Group::Document, r"\b[A-Z]{6}[A-Z0-9]{2}(?:[A-Z0-9]{3})?\b", "BIC/SWIFT code", 0.4, true, 0),
    ("drivers_license_us", Group::Document, r"\b[A-Z]\d{7,8}\b", "US driver's license number", 0.3, true, 0),
    ("national_id_fr", Group::Document, r"\b[12]\d{12}\b", "French national ID (INSEE)", 0.4, true, 0),
    (
        "ip_address",
        Group::Document,
        r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d?\d)\b",
        "IPv4 address",
        0.7,
        true,
        0,
    ),
    ("ipv6_address", Group::Document, r"\b(?:[A-Fa-f0-9]{1,4}:){7}[A-Fa-f0-9]{1,4}\b", "IPv6 address", 0.7, true, 0),
    ("mac_address", Group::Document, r"\b(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}\b", "MAC address", 0.6, true, 0),
    // social
    ("twitter", Group::Social, r"(?:twitter\.com/|x\.com/)([A-Za-z0-9_]{1,15})\b", "Twitter/X profile", 0.7, false, 1),
    ("reddit", Group::Social, r"(?:reddit\.com/u(?:ser)?/)([A-Za-z0-9_-]{3,20})\b", "Reddit profile", 0.7, false, 1),
    ("telegram_channel", Group::Social, r"t\.me/([A-Za-z0-9_]{5,32})\b", "Telegram channel/group", 0.7, false, 1),
    ("discord_invite", Group::Social, r"(?:discord\.gg/|discord\.com/invite/)([A-Za-z0-9]{2,32})\b", "Discord invite", 0.7, false, 1),
    ("instagram", Group::Social, r"instagram\.com/([A-Za-z0-9_.]{1,30})\b", "Instagram profile", 0.7, false, 1),
    ("facebook", Group::Social, r"facebook\.com/([A-Za-z0-9.]{5,50})\b", "Facebook profile", 0.65, false, 1),
    ("youtube", Group::Social, r"youtube\.com/(?:channel/|c/|@)([A-Za-z0-9_-]{3,40})\b", "YouTube channel", 0.65, false, 1),
    ("github", Group::Social, r"github\.com/([A-Za-z0-9-]{1,39})\b", "GitHub profile", 0.7, false, 1),
    ("linkedin", Group::Social, r"linkedin\.com/in/([A-Za-z0-9-]{3,100})\b", "LinkedIn profile", 0.65, false, 1),
    ("keybase", Group::Social, r"keybase\.io/([A-Za-z0-9_]{1,50})\b", "Keybase profile", 0.7, false, 1),
    // username
    ("username_labeled", Group::Username, r#"(?i)\busername\s*[:=]\s*["']?([A-Za-z0-9_.-]{3,32})["']?"#, "Labeled username", 0.5, false, 1),
    ("password_labeled", Group::Username, r#"(?i)\bpassword\s*[:=]\s*["']?(\S{4,64})["']?"#, "Labeled password", 0.5, true, 1),
    ("api_key_generic", Group::Username, r#"(?i)\bapi[_-]?key\s*[:=]\s*["']?([A-Za-z0-9_\-]{16,64})["']?"#, "Generic API key", 0.6, true, 1),
    ("bearer_token", Group::Username, r"(?i)bearer\s+([A-Za-z0-9\-._~+/]+=*)", "Bearer token", 0.7, true, 1),
    ("private_key", Group::Username, r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----", "Private key block", 0.95, true, 0),
    ("aws_access_key", Group::Username, r"\bAKIA[0-9A-Z]{16}\b", "AWS access key ID", 0.9, true, 0),
    (
        "aws_secret_key",
        Group::Username,
        r#"(?i)aws_secret_access_key\s*[:=]\s*["']?([A-Za-z0-9/+=]{40})["']?"#,
        "AWS secret access key",
        0.9,
        true,
        1,
    ),
    ("github_token", Group::Username, r"\bgh[pousr]_[A-Za-z0-9]{36}\b", "GitHub personal access token", 0.95, true, 0),
    ("jwt_token", Group::Username, r"\beyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b", "JWT", 0.85, true, 0),
    // address
    (
        "us_address",
        Group::Address,
        r"\b\d{1,5}\s[A-Za-z0-9.\s]{3,30}\s(?:Street|St|Avenue|Ave|Boulevard|Blvd|Road|Rd|Lane|Ln|Drive|Dr)\b",
        "US street address",
        0.4,
        true,
        0,
    ),
    ("zip_code_us", Group::Address, r"\b\d{5}(?:-\d{4})?\b", "US ZIP code", 0.2, false, 0),
    ("postal_code_uk", Group::Address, r"\b[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}\b", "UK postal code", 0.3, false, 0),
    // hash
    ("md5", Group::Hash, r"\b[a-fA-F0-9]{32}\b", "MD5 hash", 0.4, false, 0),
    ("sha1", Group::Hash, r"\b[a-fA-F0-9]{40}\b", "SHA-1 hash", 0.4, false, 0),
    ("sha256", Group::Hash, r"\b[a-fA-F0-9]{64}\b", "SHA-256 hash", 0.5, false, 0),
    ("sha512", Group::Hash, r"\b[a-fA-F0-9]{128}\b", "SHA-512 hash", 0.5, false, 0),
    ("bcrypt", Group::Hash, r"\$2[aby]\$\d{2}\$[./A-Za-z0-9]{53}", "bcrypt hash", 0.9, true, 0),
    ("ntlm", Group::Hash, r"(?i)\bntlm\s*[:=]\s*([a-fA-F0-9]{32})\b", "NTLM hash", 0.6, true, 1),
];

pub static PATTERNS: Lazy<Vec<CompiledPattern>> = Lazy::new(|| {
    RAW_TABLE
        .iter()
        .map(|(subtype, group, pattern, description, confidence, sensitive, value_group)| {
            CompiledPattern {
                subtype,
                group: *group,
                description,
                base_confidence: *confidence,
                sensitive: *sensitive,
                regex: Regex::new(pattern).unwrap_or_else(|e| panic!("bad pattern for {subtype}: {e}")),
                value_group: *value_group,
            }
        })
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subtype_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for p in PATTERNS.iter() {
            assert!(seen.insert(p.subtype), "duplicate subtype {}", p.subtype);
        }
    }

    #[test]
    fn all_patterns_compile() {
        assert!(PATTERNS.len() >= 50);
    }
}
