/// Maps an extractor subtype/group pair onto one of spec.md §3's closed
/// Entity `type` vocabulary (email, domain, wallet-coin, ip, phone,
/// username, hash, social-network-handle, document-kind).
pub fn canonical_entity_type(subtype: &str, group: &str) -> &'static str {
    match subtype {
        "email" | "email_obfuscated" | "jabber_xmpp" => "email",
        "ip_address" | "ipv6_address" => "ip",
        "phone_us" | "phone_fr" | "phone_de" | "phone_uk" | "phone_intl" => "phone",
        "telegram" | "discord_user" | "discord_new" | "twitter" | "reddit" | "telegram_channel"
        | "discord_invite" | "instagram" | "facebook" | "youtube" | "github" | "linkedin" | "keybase" => {
            "social-network-handle"
        }
        "username_labeled" | "password_labeled" | "api_key_generic" | "bearer_token" | "private_key"
        | "aws_access_key" | "aws_secret_key" | "github_token" | "jwt_token" | "session_id" | "tox_id" => {
            "username"
        }
        "md5" | "sha1" | "sha256" | "sha512" | "bcrypt" | "ntlm" => "hash",
        "ssn_us" | "passport_generic" | "drivers_license_us" | "national_id_fr" | "us_address" | "zip_code_us"
        | "postal_code_uk" | "credit_card" | "iban" | "bic_swift" | "mac_address" => "document-kind",
        _ if group == "crypto" => "wallet-coin",
        _ => "username",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_subtypes_map_to_email() {
        assert_eq!(canonical_entity_type("email", "contact"), "email");
    }

    #[test]
    fn crypto_group_maps_to_wallet_coin() {
        assert_eq!(canonical_entity_type("bitcoin", "crypto"), "wallet-coin");
    }

    #[test]
    fn hash_subtypes_map_to_hash() {
        assert_eq!(canonical_entity_type("sha256", "hash"), "hash");
    }
}
