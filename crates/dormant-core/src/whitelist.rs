//! Whitelist policy gating suspension.
//!
//! Patterns are evaluated in order and the first match wins:
//!
//! 1. Patterns containing `*` are compiled to a case-insensitive, anchored
//!    regular expression where `*` matches any sequence.
//! 2. Patterns containing `://` match as a literal prefix of the URL.
//! 3. Other patterns are read as `domain[/path]`: the URL's host must equal
//!    the domain or be a subdomain of it, and its path must start with the
//!    given path.
//! 4. Failing that, the pattern matches as a literal prefix of the raw URL.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::warn;
use url::Url;

static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?(?::\d+)?(?:/.*)?$").unwrap()
});

/// Whether `url` is protected from suspension by any of `patterns`.
pub fn is_whitelisted(url: &str, patterns: &[String]) -> bool {
    matching_pattern(url, patterns).is_some()
}

/// The first pattern protecting `url`, if any.
pub fn matching_pattern<'a>(url: &str, patterns: &'a [String]) -> Option<&'a str> {
    let parsed = Url::parse(url).ok();
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .find(|pattern| pattern_matches(pattern, url, parsed.as_ref()))
}

fn pattern_matches(pattern: &str, url: &str, parsed: Option<&Url>) -> bool {
    if pattern.contains('*') {
        return match wildcard_regex(pattern) {
            Some(re) => re.is_match(url),
            None => false,
        };
    }

    if pattern.contains("://") {
        return url.starts_with(pattern);
    }

    if DOMAIN_PATTERN.is_match(pattern) {
        if let Some(parsed) = parsed {
            if domain_matches(pattern, parsed) {
                return true;
            }
        }
    }

    url.starts_with(pattern)
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(target: "dormant::whitelist", "Skipping whitelist pattern '{}': {}", pattern, e);
            None
        }
    }
}

fn domain_matches(pattern: &str, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let (domain, path) = match pattern.split_once('/') {
        Some((domain, path)) => (domain, Some(path)),
        None => (pattern, None),
    };
    // A port in the pattern is ignored for host comparison.
    let domain = domain.split(':').next().unwrap_or(domain).to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    let host_ok = host == domain || host.ends_with(&format!(".{}", domain));
    if !host_ok {
        return false;
    }
    match path {
        Some(path) if !path.is_empty() => url.path().starts_with(&format!("/{}", path)),
        _ => true,
    }
}

/// Suggest a whitelist pattern for a page: its host, without a leading `www.`.
pub fn pattern_for_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn list(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_wildcard_pattern() {
        let patterns = list(&["https://*.example.com/*"]);
        assert!(is_whitelisted("https://foo.example.com/page", &patterns));
        assert!(is_whitelisted("HTTPS://FOO.EXAMPLE.COM/Page", &patterns));
        assert!(!is_whitelisted("https://example.org/", &patterns));
        // Dots are literal, not regex wildcards.
        assert!(!is_whitelisted("https://fooXexampleYcom/page", &patterns));
    }

    #[test]
    fn test_scheme_prefix_pattern() {
        let patterns = list(&["https://mail.test/inbox"]);
        assert!(is_whitelisted("https://mail.test/inbox/42", &patterns));
        assert!(!is_whitelisted("http://mail.test/inbox/42", &patterns));
        assert!(!is_whitelisted("https://mail.test/sent", &patterns));
    }

    #[test]
    fn test_domain_and_path_pattern() {
        let patterns = list(&["example.com/docs"]);
        assert!(is_whitelisted("https://example.com/docs/intro", &patterns));
        assert!(is_whitelisted("https://api.example.com/docs", &patterns));
        assert!(!is_whitelisted("https://example.com/blog", &patterns));
        assert!(!is_whitelisted("https://notexample.com/docs", &patterns));
    }

    #[test]
    fn test_literal_prefix_fallback() {
        let patterns = list(&["about:"]);
        assert!(is_whitelisted("about:config", &patterns));
        assert!(!is_whitelisted("https://about.test/", &patterns));
    }

    #[test]
    fn test_first_match_wins_and_blank_patterns_skipped() {
        let patterns = list(&["  ", "b.test", "https://a.test/"]);
        assert_eq!(matching_pattern("https://a.test/x", &patterns), Some("https://a.test/"));
        assert_eq!(matching_pattern("https://sub.b.test/", &patterns), Some("b.test"));
        assert_eq!(matching_pattern("https://c.test/", &patterns), None);
        assert!(!is_whitelisted("https://a.test/", &[]));
    }

    #[test]
    fn test_pattern_for_url() {
        assert_eq!(pattern_for_url("https://www.Example.com/a").as_deref(), Some("example.com"));
        assert_eq!(pattern_for_url("not a url"), None);
    }

    proptest! {
        #[test]
        fn prop_subdomains_match_bare_domain(sub in "[a-z][a-z0-9]{0,10}", path in "[a-z0-9/]{0,20}") {
            let patterns = vec!["example.com".to_string()];
            let url = format!("https://{}.example.com/{}", sub, path);
            prop_assert!(is_whitelisted(&url, &patterns));
        }

        #[test]
        fn prop_lookalike_domains_do_not_match(prefix in "[a-z]{1,10}") {
            let patterns = vec!["example.com".to_string()];
            let url = format!("https://{}example.com/", prefix);
            prop_assert!(!is_whitelisted(&url, &patterns));
        }
    }
}
