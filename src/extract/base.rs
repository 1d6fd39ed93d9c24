use std::{future::Future, time::Duration};

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::{header, Client, Url};
use scraper::{ElementRef, Selector};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::ExtractError;

pub const UNTITLED_EVENT: &str = "Untitled Event";
pub const LUMA_HOST: &str = "Luma Host";
pub const MEETUP_HOST: &str = "Meetup Host";
pub const DATE_NOT_FOUND: &str = "Date not found";
pub const TIME_NOT_FOUND: &str = "Time not found";
pub const ONLINE_EVENT: &str = "Online Event";
pub const LOCATION_TBD: &str = "Location TBD";
pub const NO_DESCRIPTION: &str = "No description provided.";

const DATE_FORMAT: &str = "%A, %B %-d, %Y";
const TIME_FORMAT: &str = "%-I:%M %p %Z";

/// Network seam used by every strategy and by the reader passthrough.
pub trait PageFetcher: Send + Sync {
    /// GET a page as text. Non-success statuses are errors.
    fn get_text(&self, url: &Url) -> impl Future<Output = Result<String, ExtractError>> + Send;

    fn get_json(
        &self,
        url: &Url,
        bearer: Option<&str>,
    ) -> impl Future<Output = Result<Value, ExtractError>> + Send;

    fn post_json(
        &self,
        url: &Url,
        body: &Value,
    ) -> impl Future<Output = Result<Value, ExtractError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, ExtractError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| ExtractError::UpstreamFetchFailed(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn get_text(&self, url: &Url) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| ExtractError::UpstreamFetchFailed(format!("request failed for {url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::UpstreamFetchFailed(format!(
                "Failed to fetch the page with status: {}",
                status.as_u16()
            )));
        }
        response.text().await.map_err(|err| {
            ExtractError::UpstreamFetchFailed(format!("unable to read response body for {url}: {err}"))
        })
    }

    async fn get_json(&self, url: &Url, bearer: Option<&str>) -> Result<Value, ExtractError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ExtractError::UpstreamFetchFailed(format!("request failed for {url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::UpstreamFetchFailed(format!(
                "Request failed with status: {}",
                status.as_u16()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| ExtractError::UpstreamFetchFailed(format!("invalid json from {url}: {err}")))
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, ExtractError> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|err| ExtractError::UpstreamFetchFailed(format!("request failed for {url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::UpstreamFetchFailed(format!(
                "Request failed with status: {}",
                status.as_u16()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| ExtractError::UpstreamFetchFailed(format!("invalid json from {url}: {err}")))
    }
}

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Non-empty string at `key`, trimmed.
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parses an event start timestamp. Values without an offset are read as
/// wall-clock time in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&tz));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return match tz.from_local_datetime(&naive) {
                LocalResult::Single(dt) => Some(dt),
                LocalResult::Ambiguous(dt, _) => Some(dt),
                LocalResult::None => None,
            };
        }
    }
    None
}

/// Long display date and short time-with-zone, e.g.
/// `("Saturday, October 4, 2025", "6:00 PM UTC")`.
pub fn format_start(raw: Option<&str>, tz: Tz) -> (String, String) {
    match raw.and_then(|value| parse_timestamp(value, tz)) {
        Some(start) => (
            start.format(DATE_FORMAT).to_string(),
            start.format(TIME_FORMAT).to_string(),
        ),
        None => (DATE_NOT_FOUND.to_string(), TIME_NOT_FOUND.to_string()),
    }
}
