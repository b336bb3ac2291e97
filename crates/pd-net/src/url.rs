//! URL parsing and scheme classification for request descriptors.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use url::Url;

/// Schemes the prefetch layer is willing to hold responses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_url(url: &Url) -> Option<Self> {
        match url.scheme() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

/// Parses a request URL without restricting its scheme.
///
/// Scheme policy belongs to the consumer; this only rejects URLs that can never
/// identify a fetchable resource.
pub fn parse_request_url(input: &str) -> BrowserResult<Url> {
    let mut parsed = Url::parse(input).map_err(|error| {
        BrowserError::new(
            "net.url.invalid",
            format!("failed to parse URL `{input}`: {error}"),
        )
    })?;

    if parsed.cannot_be_a_base() {
        return Err(BrowserError::new(
            "net.url.invalid_base",
            format!("URL `{input}` cannot be used as a request target"),
        ));
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(BrowserError::new(
            "net.url.credentials_disallowed",
            "URL userinfo (`username:password@`) is not allowed",
        ));
    }

    // Fragments never reach the network, so they must not split cache keys.
    parsed.set_fragment(None);

    Ok(parsed)
}
