//! Target-independent request helpers shared by the browser adapters.

use core::time::Duration;

/// Header sent with every request so the server can tell XHR from navigation.
pub const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// Content type of settings writes.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Form-encode `pairs` as `name=value` joined by `&`, applying `encode` to
/// every name and value.
pub fn encode_pairs(pairs: &[(&str, &str)], mut encode: impl FnMut(&str) -> String) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append an encoded query string to `url`, keeping any query it already has.
#[must_use]
pub fn with_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_owned()
    } else if url.contains('?') {
        format!("{url}&{query}")
    } else {
        format!("{url}?{query}")
    }
}

/// Whether an HTTP status counts as success.
#[must_use]
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// `setTimeout` delay in whole milliseconds, saturating at `i32::MAX`.
#[must_use]
pub fn timeout_millis(delay: Duration) -> i32 {
    i32::try_from(delay.as_millis()).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pairs_are_encoded_and_joined() {
        let body = encode_pairs(&[("a", "1"), ("b c", "{}")], |s| s.replace(' ', "%20"));
        assert_eq!(body, "a=1&b%20c={}");
        assert_eq!(encode_pairs(&[], str::to_owned), "");
    }

    #[test]
    fn query_appends_with_right_separator() {
        assert_eq!(with_query("/r/", ""), "/r/");
        assert_eq!(with_query("/r/", "pk=1"), "/r/?pk=1");
        assert_eq!(with_query("/r/?lang=en", "pk=1"), "/r/?lang=en&pk=1");
    }

    #[test]
    fn success_range() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(304));
        assert!(!is_success(0));
    }

    #[test]
    fn timeout_saturates() {
        assert_eq!(timeout_millis(Duration::from_millis(250)), 250);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), i32::MAX);
    }
}
