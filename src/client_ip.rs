//! Client IP resolution from proxy headers.

use http::HeaderMap;

/// Fallback key for clients whose address cannot be determined.
///
/// All such clients share one rate-limit bucket.
pub const UNKNOWN: &str = "unknown";

/// Resolve the client IP from request headers.
///
/// Resolution order is load-bearing (it determines rate-limit keying and
/// the audit trail): `CF-Connecting-IP` first, then the first entry of
/// `X-Forwarded-For`, then [`UNKNOWN`].
pub fn resolve(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_string();
    }

    UNKNOWN.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_cf_connecting_ip_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "203.0.113.9"),
            ("x-forwarded-for", "198.51.100.1, 10.0.0.1"),
        ]);
        assert_eq!(resolve(&map), "203.0.113.9");
    }

    #[test]
    fn test_first_forwarded_for_entry() {
        let map = headers(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1, 172.16.0.1")]);
        assert_eq!(resolve(&map), "198.51.100.1");
    }

    #[test]
    fn test_forwarded_for_entry_is_trimmed() {
        let map = headers(&[("x-forwarded-for", "  198.51.100.1 , 10.0.0.1")]);
        assert_eq!(resolve(&map), "198.51.100.1");
    }

    #[test]
    fn test_unknown_when_no_headers() {
        assert_eq!(resolve(&HeaderMap::new()), UNKNOWN);
    }

    #[test]
    fn test_unknown_when_forwarded_for_empty() {
        let map = headers(&[("x-forwarded-for", "")]);
        assert_eq!(resolve(&map), UNKNOWN);
    }
}
