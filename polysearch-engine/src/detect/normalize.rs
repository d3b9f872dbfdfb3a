//! URL parsing and normalisation for detection.
//!
//! Canonicalises URLs so that equivalent inputs (differing only in
//! query-parameter order, tracking parameters, fragments, default ports, or
//! capitalisation) share one detection cache entry.

use url::Url;

/// Tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

/// Parse user input as a URL.
///
/// Bare hosts such as `example.com/search` or `localhost:9200` are read as
/// `https://`. Returns `None` for input that cannot name an endpoint.
pub fn parse_input(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) if is_bare_host(&url, trimmed) => {
            Url::parse(&format!("https://{trimmed}")).ok()?
        }
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).ok()?
        }
        Err(_) => return None,
    };

    let needs_host = matches!(parsed.scheme(), "http" | "https" | "ws" | "wss");
    if needs_host && parsed.host_str().is_none_or(str::is_empty) {
        return None;
    }
    Some(parsed)
}

/// `host:port` input parses with the host as its scheme. A dotted scheme or
/// a port right after the colon means the user typed a bare host.
fn is_bare_host(url: &Url, raw: &str) -> bool {
    let scheme = url.scheme();
    if url.is_special() {
        return false;
    }
    if scheme.contains('.') {
        return true;
    }
    let rest = &raw[scheme.len() + 1..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && matches!(rest.as_bytes().get(digits), None | Some(b'/' | b'?'))
}

/// Normalise a parsed URL into a cache key.
///
/// 1. Remove the fragment.
/// 2. Remove default ports (`:80` for HTTP, `:443` for HTTPS).
/// 3. Strip tracking parameters and sort the rest by key.
/// 4. Remove a trailing slash (unless the path is exactly `"/"`).
///
/// Scheme and host are already lowercased by [`Url::parse`].
pub fn normalize(url: &Url) -> String {
    let mut parsed = url.clone();
    parsed.set_fragment(None);

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}

fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> String {
        normalize(&parse_input(raw).expect("parse"))
    }

    #[test]
    fn bare_host_defaults_to_https() {
        let url = parse_input("example.com/search").expect("parse");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn rejects_unusable_input() {
        assert!(parse_input("").is_none());
        assert!(parse_input("not a url").is_none());
        assert!(parse_input("https://").is_none());
    }

    #[test]
    fn bare_host_with_port_defaults_to_https() {
        let url = parse_input("localhost:9200").expect("parse");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(9200));

        let url = parse_input("search.example.com:8080/api/v1").expect("parse");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("search.example.com"));
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.path(), "/api/v1");
    }

    #[test]
    fn accepts_non_http_schemes() {
        assert!(parse_input("postgres://db.internal:5432/app").is_some());
        assert!(parse_input("file:///srv/docs").is_some());
    }

    #[test]
    fn equivalent_urls_share_a_key() {
        assert_eq!(
            norm("https://Example.COM:443/path/?b=2&a=1&utm_source=x#top"),
            norm("https://example.com/path?a=1&b=2")
        );
    }

    #[test]
    fn preserves_root_slash_and_custom_port() {
        assert_eq!(norm("https://example.com/"), "https://example.com/");
        assert_eq!(norm("http://example.com:8080/x/"), "http://example.com:8080/x");
    }
}
