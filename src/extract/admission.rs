use reqwest::Url;

use crate::error::ExtractError;
use crate::models::Platform;

const MISSING_URL: &str = "URL parameter is required";
const WHITESPACE_IN_URL: &str = "URL contains invalid characters or multiple links.";
const MALFORMED_URL: &str = "Invalid URL format provided.";

/// Host suffixes a retrieval path may fetch from, plus the message shown
/// when a URL falls outside them.
#[derive(Debug, Clone, Copy)]
pub struct AllowList {
    pub domains: &'static [&'static str],
    pub rejection: &'static str,
}

pub const EVENT_HOSTS: AllowList = AllowList {
    domains: &["meetup.com", "luma.com"],
    rejection: "A valid Meetup or Luma URL is required",
};

pub const READER_HOSTS: AllowList = AllowList {
    domains: &[
        "meetup.com",
        "luma.com",
        "eventbrite.com",
        "linkedin.com",
        "facebook.com",
    ],
    rejection: "A valid Meetup, Luma, Eventbrite, LinkedIn, or Facebook URL is required",
};

impl AllowList {
    /// `host` is the domain itself or one of its subdomains.
    pub fn permits(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Validates a user-supplied URL against `allow`. Nothing here touches the
/// network.
pub fn admit(raw: &str, allow: &AllowList) -> Result<Url, ExtractError> {
    if raw.is_empty() {
        return Err(ExtractError::InvalidInput(MISSING_URL.to_string()));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(ExtractError::InvalidInput(WHITESPACE_IN_URL.to_string()));
    }
    let url = Url::parse(raw).map_err(|_| ExtractError::InvalidInput(MALFORMED_URL.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidInput(MALFORMED_URL.to_string()));
    }
    match url.host_str() {
        Some(host) if allow.permits(host) => Ok(url),
        _ => Err(ExtractError::DisallowedHost(allow.rejection.to_string())),
    }
}

/// Every admitted host that is not Luma is scraped as Meetup.
pub fn classify(url: &Url) -> Platform {
    match url.host_str() {
        Some(host) if host.contains("luma.com") => Platform::Luma,
        _ => Platform::Meetup,
    }
}
