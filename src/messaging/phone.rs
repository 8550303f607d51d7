//! Carrier phone numbers arrive in whatever shape the back office typed them
//! in, while the messaging gateway always reports one canonical form
//! (`+549...`). Matching works by generating the plausible stored variants of
//! the inbound number and trying them in a fixed priority order.

/// Variants of an inbound number to test against stored carrier numbers,
/// most specific first. The first stored hit wins.
pub fn match_variants(raw: &str) -> Vec<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut variants = vec![
        raw.to_string(),
        raw.trim_start_matches('+').to_string(),
        strip_prefix(raw, "+549"),
        strip_prefix(raw, "+54"),
        strip_prefix(raw, "+5491"),
    ];

    // Last 10 digits covers numbers stored as bare local (area code + line).
    if digits.len() >= 10 {
        variants.push(digits[digits.len() - 10..].to_string());
    }

    variants.dedup();
    variants
}

fn strip_prefix(raw: &str, prefix: &str) -> String {
    raw.strip_prefix(prefix).unwrap_or(raw).to_string()
}

/// Canonical outbound-addressable form: `whatsapp:+549...`.
///
/// Argentine mobiles need the `9` between country code and area code; numbers
/// stored as bare local (starting with the area code) get the full prefix.
pub fn outbound(raw: &str) -> String {
    let mut clean: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if let Some(rest) = clean.strip_prefix("whatsapp:") {
        clean = rest.to_string();
    }
    if let Some(rest) = clean.strip_prefix('+') {
        clean = rest.to_string();
    }

    if clean.starts_with("54") {
        if !clean.starts_with("549") {
            clean = format!("549{}", &clean[2..]);
        }
    } else {
        clean = format!("549{clean}");
    }

    format!("whatsapp:+{clean}")
}
