//! Pure functions over feature values.
//!
//! Everything here is stateless and string-in, value-out:
//! - Value codec (display value + optional price annotation <-> stored string)
//! - Trend classification between consecutive chain values
//! - Best-effort numeric extraction from free-text values
//! - Link-feature detection and http(s) URL validation

use comparekit_model::Trend;

/// Literal separator between the display value and the price annotation in
/// the stored chain form.
///
/// A value that itself contains this text is split anyway; the ambiguity is
/// accepted for storage compatibility.
const PRICE_SEPARATOR: &str = " ||price|| ";

/// Encode a display value and an optional price annotation into one
/// storable string.
///
/// An empty (or whitespace-only) price encodes to the trimmed value alone.
pub fn encode_value(value: &str, price: &str) -> String {
    let value = value.trim();
    let price = price.trim();
    if price.is_empty() {
        return value.to_string();
    }
    format!("{value}{PRICE_SEPARATOR}{price}")
}

/// Decode a stored chain string back into `(value, price)`.
///
/// `None` decodes to `("", None)`. The split is on the first separator
/// occurrence only.
pub fn decode_value(stored: Option<&str>) -> (String, Option<String>) {
    let Some(stored) = stored else {
        return (String::new(), None);
    };
    match stored.split_once(PRICE_SEPARATOR) {
        Some((value, price)) => (value.to_string(), Some(price.to_string())),
        None => (stored.to_string(), None),
    }
}

/// Classify the change between two consecutive chain values.
///
/// With no previous value, or an exactly equal one, the trend is `Same`.
/// Otherwise the comparison is case-insensitive lexicographic: current
/// sorting after previous is `Up`, else `Down`. This is deliberately a
/// string comparison, so "12 GB" reads as a drop from "8 GB".
pub fn resolve_trend(previous: Option<&str>, current: &str) -> Trend {
    let Some(previous) = previous else {
        return Trend::Same;
    };
    if previous == current {
        return Trend::Same;
    }
    if current.to_lowercase() > previous.to_lowercase() {
        Trend::Up
    } else {
        Trend::Down
    }
}

/// Extract a leading numeric token from a free-text feature value.
///
/// Every character that is not a digit or `.` becomes whitespace; the first
/// remaining token is parsed as a float. "8 GB" -> 8.0, "5000 mAh" -> 5000.0.
pub fn extract_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_digit() || c == '.' { c } else { ' ' })
        .collect();
    let token = cleaned.split_whitespace().next()?;
    token.parse::<f64>().ok()
}

/// Whether a feature name denotes a link-type feature (purchase links,
/// store URLs) whose values must be valid URLs.
pub fn is_link_feature(name: &str) -> bool {
    let normalized = name.trim().to_lowercase();
    ["link", "url", "buy", "purchase", "store"]
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// Parse `raw` as an absolute `http`/`https` URL with a non-blank host,
/// returning the host on success.
pub fn parse_http_host(raw: &str) -> Option<&str> {
    let rest = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    // Strip userinfo and port; the host itself must be non-blank.
    let host_port = authority.rsplit('@').next()?;
    let host = host_port.split(':').next()?;
    if host.trim().is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Whether a raw value is acceptable for a link-type feature.
///
/// Accepts a well-formed http(s) URL, or a bare `www.` address that becomes
/// one once `https://` is prepended.
pub fn is_valid_link_value(value: &str) -> bool {
    if parse_http_host(value).is_some() {
        return true;
    }
    value.starts_with("www.") && parse_http_host(&format!("https://{value}")).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_without_price() {
        assert_eq!(encode_value("  8 GB  ", ""), "8 GB");
        assert_eq!(encode_value("8 GB", "   "), "8 GB");
    }

    #[test]
    fn test_encode_with_price() {
        assert_eq!(encode_value("8 GB", " 120 "), "8 GB ||price|| 120");
    }

    #[test]
    fn test_decode_roundtrip() {
        let stored = encode_value("OLED 6.1\"", "999");
        assert_eq!(
            decode_value(Some(&stored)),
            ("OLED 6.1\"".to_string(), Some("999".to_string()))
        );

        let stored = encode_value("OLED 6.1\"", "");
        assert_eq!(decode_value(Some(&stored)), ("OLED 6.1\"".to_string(), None));
    }

    #[test]
    fn test_decode_none() {
        assert_eq!(decode_value(None), (String::new(), None));
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        let (value, price) = decode_value(Some("a ||price|| b ||price|| c"));
        assert_eq!(value, "a");
        assert_eq!(price, Some("b ||price|| c".to_string()));
    }

    #[test]
    fn test_trend_no_baseline_is_same() {
        assert_eq!(resolve_trend(None, "anything"), Trend::Same);
    }

    #[test]
    fn test_trend_equal_is_same() {
        assert_eq!(resolve_trend(Some("8 GB"), "8 GB"), Trend::Same);
    }

    #[test]
    fn test_trend_is_case_insensitive_lexicographic() {
        assert_eq!(resolve_trend(Some("a"), "B"), Trend::Up);
        assert_eq!(resolve_trend(Some("B"), "a"), Trend::Down);
    }

    #[test]
    fn test_trend_opposite_for_swapped_inputs() {
        let forward = resolve_trend(Some("alpha"), "beta");
        let backward = resolve_trend(Some("beta"), "alpha");
        assert_eq!(forward, Trend::Up);
        assert_eq!(backward, Trend::Down);
    }

    #[test]
    fn test_trend_numeric_text_is_lexicographic() {
        // "12 gb" sorts before "8 gb", so the numerically larger value
        // reads as a drop. Documented quirk, preserved on purpose.
        assert_eq!(resolve_trend(Some("8 GB"), "12 GB"), Trend::Down);
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number("8 GB"), Some(8.0));
        assert_eq!(extract_number("5000 mAh"), Some(5000.0));
        assert_eq!(extract_number("6.1 inch OLED"), Some(6.1));
        assert_eq!(extract_number("about 128GB"), Some(128.0));
    }

    #[test]
    fn test_extract_number_no_digits() {
        assert_eq!(extract_number("octa-core"), None);
        assert_eq!(extract_number(""), None);
        assert_eq!(extract_number("..."), None);
    }

    #[test]
    fn test_is_link_feature() {
        assert!(is_link_feature("Purchase Link"));
        assert!(is_link_feature("buy URL"));
        assert!(is_link_feature("  STORE page "));
        assert!(!is_link_feature("RAM"));
        assert!(!is_link_feature("Battery"));
    }

    #[test]
    fn test_parse_http_host() {
        assert_eq!(parse_http_host("https://example.com/p/1"), Some("example.com"));
        assert_eq!(parse_http_host("http://shop.example.com:8080"), Some("shop.example.com"));
        assert_eq!(parse_http_host("ftp://example.com"), None);
        assert_eq!(parse_http_host("https://"), None);
        assert_eq!(parse_http_host("example.com"), None);
    }

    #[test]
    fn test_link_value_accepts_www_shorthand() {
        assert!(is_valid_link_value("https://example.com/buy"));
        assert!(is_valid_link_value("www.example.com/buy"));
        assert!(!is_valid_link_value("example.com/buy"));
        assert!(!is_valid_link_value("not a url"));
    }
}
