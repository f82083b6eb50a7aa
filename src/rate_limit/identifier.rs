//! Caller identity resolution from request headers.

use axum::http::HeaderMap;

/// Shared bucket for callers without any identifying header.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Default header carrying the authenticated user id.
pub const DEFAULT_USER_HEADER: &str = "x-authenticated-user";

/// Resolve the client network identity.
///
/// Uses the leftmost `X-Forwarded-For` entry, then `X-Real-IP`, then
/// [`UNKNOWN_IDENTIFIER`].
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip")
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    UNKNOWN_IDENTIFIER.to_string()
}

/// Resolve the authenticated user id forwarded by the auth layer.
///
/// Anonymous when the header is absent, blank, or holds bytes outside
/// visible ASCII (which `HeaderValue::to_str` rejects).
pub fn authenticated_user(headers: &HeaderMap, header_name: &str) -> Option<String> {
    header_str(headers, header_name)
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_uses_first_entry() {
        let h = headers(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_identifier(&h), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_real_ip() {
        let h = headers(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_identifier(&h), "198.51.100.4");

        let h = headers(&[("x-forwarded-for", " , 10.0.0.1"), ("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_identifier(&h), "198.51.100.4");
    }

    #[test]
    fn test_unknown_without_headers() {
        assert_eq!(client_identifier(&HeaderMap::new()), UNKNOWN_IDENTIFIER);
    }

    #[test]
    fn test_authenticated_user() {
        let h = headers(&[("x-authenticated-user", "user-42")]);
        assert_eq!(
            authenticated_user(&h, DEFAULT_USER_HEADER),
            Some("user-42".to_string())
        );
        assert_eq!(authenticated_user(&h, "x-other"), None);

        let h = headers(&[("x-authenticated-user", "  ")]);
        assert_eq!(authenticated_user(&h, DEFAULT_USER_HEADER), None);
    }

    #[test]
    fn test_opaque_user_header_is_anonymous() {
        let mut h = HeaderMap::new();
        h.insert(
            DEFAULT_USER_HEADER,
            HeaderValue::from_bytes(b"caf\xe9").unwrap(),
        );
        assert_eq!(authenticated_user(&h, DEFAULT_USER_HEADER), None);
    }
}
