//! URL canonicalization.
//!
//! Canonical form: lowercase scheme and host, default ports removed,
//! fragment stripped, query string preserved. URLs are unique by this
//! form across the store.

use url::Url;

use crate::error::{Error, Result};

/// Canonicalize an absolute URL string.
///
/// Idempotent: `canonicalize(canonicalize(u)) == canonicalize(u)`.
pub fn canonicalize(raw: &str) -> Result<String> {
    let mut parsed = Url::parse(raw.trim())
        .map_err(|e| Error::permanent("url", format!("invalid url {raw:?}: {e}")))?;

    if !parsed.has_host() {
        return Err(Error::permanent("url", format!("url has no host: {raw:?}")));
    }

    parsed.set_fragment(None);

    // Url::parse already lowercases scheme and host and elides default
    // ports for known schemes; serializing gives the canonical text.
    Ok(parsed.to_string())
}

/// Hostname of a canonical URL, if present.
pub fn hostname(canonical: &str) -> Option<String> {
    Url::parse(canonical)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lowercases_scheme_and_host() {
        let c = canonicalize("HTTPS://ExAmPle.COM/Path").unwrap();
        assert_eq!(c, "https://example.com/Path");
    }

    #[test]
    fn test_strips_default_port() {
        assert_eq!(
            canonicalize("http://example.com:80/a").unwrap(),
            "http://example.com/a"
        );
        assert_eq!(
            canonicalize("https://example.com:443/a").unwrap(),
            "https://example.com/a"
        );
        // Non-default ports survive.
        assert_eq!(
            canonicalize("http://example.com:8080/a").unwrap(),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn test_strips_fragment_keeps_query() {
        let c = canonicalize("https://example.com/doc?page=2&q=rust#section-3").unwrap();
        assert_eq!(c, "https://example.com/doc?page=2&q=rust");
    }

    #[test]
    fn test_rejects_relative_and_hostless() {
        assert!(canonicalize("not a url").is_err());
        assert!(canonicalize("/relative/path").is_err());
        assert!(canonicalize("data:text/plain,hello").is_err());
    }

    #[test]
    fn test_hostname_extraction() {
        let c = canonicalize("https://Docs.Example.com/x").unwrap();
        assert_eq!(hostname(&c).as_deref(), Some("docs.example.com"));
    }

    proptest! {
        #[test]
        fn prop_idempotent(
            host in "[a-z][a-z0-9]{0,10}\\.(com|org|io)",
            path in "(/[a-zA-Z0-9_-]{0,8}){0,3}",
            query in "([a-z]{1,5}=[a-z0-9]{1,5}(&[a-z]{1,5}=[a-z0-9]{1,5}){0,2})?",
        ) {
            let raw = if query.is_empty() {
                format!("https://{host}{path}")
            } else {
                format!("https://{host}{path}?{query}")
            };
            let once = canonicalize(&raw).unwrap();
            let twice = canonicalize(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
