//! Placeholder page URLs.
//!
//! `<base>?url=<original>&title=<title>&favicon=<favicon>`, each value
//! percent-encoded the way `encodeURIComponent` does it.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

/// Characters left unescaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Parameters carried by a placeholder URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderParams {
    pub url: String,
    pub title: String,
    pub favicon: String,
}

/// Whether `url` is a placeholder page under `base`.
pub fn is_placeholder(base: &str, url: &str) -> bool {
    url.starts_with(base)
}

/// Build the placeholder URL for a page.
pub fn build(base: &str, original_url: &str, title: &str, favicon: &str) -> String {
    format!(
        "{}?url={}&title={}&favicon={}",
        base,
        utf8_percent_encode(original_url, COMPONENT),
        utf8_percent_encode(title, COMPONENT),
        utf8_percent_encode(favicon, COMPONENT),
    )
}

/// Extract the parameters of a placeholder URL.
///
/// Returns `None` when `url` is not under `base`. Missing parameters come
/// back empty.
pub fn parse(base: &str, url: &str) -> Option<PlaceholderParams> {
    let rest = url.strip_prefix(base)?;
    let query = rest.split_once('?').map(|(_, q)| q).unwrap_or("");
    let query = query.split('#').next().unwrap_or("");

    let mut params = PlaceholderParams::default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "url" => params.url = value.into_owned(),
            "title" => params.title = value.into_owned(),
            "favicon" => params.favicon = value.into_owned(),
            _ => {}
        }
    }
    Some(params)
}
