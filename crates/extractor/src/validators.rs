/// Standard Luhn checksum: sum of doubled alternating digits mod 10 == 0.
pub fn luhn_check(digits: &str) -> bool {
    let digits: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 2 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Confidence-adjusting validators (spec.md §4.3). Each returns the
/// multiplier/override to apply to a hit's base confidence; `None` means
/// "no validator for this subtype, leave confidence as-is".
pub fn adjust_confidence(subtype: &str, raw_value: &str, base_confidence: f64) -> f64 {
    match subtype {
        "credit_card" => {
            let digits: String = raw_value.chars().filter(char::is_ascii_digit).collect();
            if luhn_check(&digits) {
                0.95
            } else {
                base_confidence * 0.3
            }
        }
        "bitcoin" | "bitcoin_legacy" => {
            if (26..=35).contains(&raw_value.len()) {
                base_confidence
            } else {
                base_confidence * 0.5
            }
        }
        "ethereum" => {
            if raw_value.starts_with("0x") {
                base_confidence
            } else {
                base_confidence * 0.5
            }
        }
        "email" => {
            if raw_value.split('@').nth(1).is_some_and(|domain| domain.contains('.')) {
                base_confidence
            } else {
                base_confidence * 0.5
            }
        }
        _ => base_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_known_valid_card() {
        assert!(luhn_check("4111111111111111"));
    }

    #[test]
    fn luhn_rejects_invalid_card() {
        assert!(!luhn_check("4111111111111112"));
    }

    #[test]
    fn valid_card_gets_high_confidence() {
        assert_eq!(adjust_confidence("credit_card", "4111111111111111", 0.6), 0.95);
    }

    #[test]
    fn invalid_card_gets_discounted() {
        assert!((adjust_confidence("credit_card", "4111111111111112", 0.6) - 0.18).abs() < 1e-9);
    }

    #[test]
    fn short_bitcoin_address_discounted() {
        assert_eq!(adjust_confidence("bitcoin", "bc1short", 0.85), 0.425);
    }

    #[test]
    fn email_without_dot_after_at_discounted() {
        assert_eq!(adjust_confidence("email", "user@localhost", 0.9), 0.45);
    }
}
