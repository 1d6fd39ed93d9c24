use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};

use super::base::{self, PageFetcher};
use super::EventSource;
use crate::config::{AppConfig, MeetupSelectors, SelectorRule};
use crate::error::ExtractError;
use crate::models::{EventRecord, Platform};

const OPERATION_NAME: &str = "getEventByIdForAttendees";

static EVENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/events/(\d+)").expect("valid meetup event id regex"));
static OG_URL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:url"]"#).expect("meetup og:url selector"));

/// A [`SelectorRule`] with its selector and pattern already parsed.
#[derive(Debug)]
struct CompiledRule {
    selector: Selector,
    attribute: Option<String>,
    pattern: Option<Regex>,
}

impl CompiledRule {
    fn compile(rule: &SelectorRule, field: &str) -> Result<Self, ExtractError> {
        let selector = Selector::parse(&rule.selector).map_err(|err| {
            ExtractError::UnparsableSource(format!("invalid selector for {field}: {err:?}"))
        })?;
        let pattern = rule
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|err| {
                ExtractError::UnparsableSource(format!("invalid pattern for {field}: {err}"))
            })?;
        Ok(Self {
            selector,
            attribute: rule.attribute.clone(),
            pattern,
        })
    }

    /// First match in the document, or `None` when nothing matches.
    fn apply(&self, root: &ElementRef<'_>) -> Option<String> {
        let value = match self.attribute.as_deref() {
            Some(attr) => base::first_attr(root, &self.selector, attr),
            None => base::first_text(root, &self.selector),
        }?;
        match &self.pattern {
            Some(re) => re
                .captures(&value)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str().to_string()),
            None => Some(value),
        }
    }
}

/// The configured Meetup selectors, parsed once so a bad config fails
/// before any page is fetched.
#[derive(Debug)]
pub struct MeetupRules {
    title: CompiledRule,
    hosted_by: CompiledRule,
    location_name: CompiledRule,
    image_url: CompiledRule,
    description: CompiledRule,
    attendees: CompiledRule,
}

impl MeetupRules {
    pub fn compile(selectors: &MeetupSelectors) -> Result<Self, ExtractError> {
        Ok(Self {
            title: CompiledRule::compile(&selectors.title, "title")?,
            hosted_by: CompiledRule::compile(&selectors.hosted_by, "hostedBy")?,
            location_name: CompiledRule::compile(&selectors.location_name, "locationName")?,
            image_url: CompiledRule::compile(&selectors.image_url, "imageUrl")?,
            description: CompiledRule::compile(&selectors.description, "description")?,
            attendees: CompiledRule::compile(&selectors.attendees, "attendees")?,
        })
    }
}

/// Scrapes the event page markup, then asks the GraphQL endpoint for the
/// start time. Only the second step is allowed to fail quietly.
pub struct Meetup<'a> {
    rules: &'a MeetupRules,
    gql_endpoint: &'a str,
    query_hash: &'a str,
    tz: Tz,
}

/// Fields read from the page itself, before the metadata call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Markup {
    pub title: String,
    pub hosted_by: String,
    pub location_name: String,
    pub image_url: String,
    pub description: String,
    pub attendees: u32,
    pub event_id: Option<String>,
}

impl<'a> Meetup<'a> {
    pub fn new(config: &'a AppConfig, rules: &'a MeetupRules) -> Self {
        Self {
            rules,
            gql_endpoint: &config.meetup_gql_endpoint,
            query_hash: &config.meetup_persisted_query_hash,
            tz: config.display_tz(),
        }
    }

    pub(crate) fn parse_document(&self, html: &str, url: &Url) -> Markup {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let rules = self.rules;

        let attendees = rules
            .attendees
            .apply(&root)
            .map(|count| attendee_count(&count))
            .unwrap_or(0);

        let event_id = event_id_from_path(url.path()).or_else(|| {
            base::first_attr(&root, &OG_URL_SELECTOR, "content")
                .and_then(|og| Url::parse(&og).ok())
                .and_then(|og| event_id_from_path(og.path()))
        });

        Markup {
            title: rules
                .title
                .apply(&root)
                .unwrap_or_else(|| base::UNTITLED_EVENT.to_string()),
            hosted_by: rules
                .hosted_by
                .apply(&root)
                .unwrap_or_else(|| base::MEETUP_HOST.to_string()),
            location_name: rules
                .location_name
                .apply(&root)
                .unwrap_or_else(|| base::LOCATION_TBD.to_string()),
            image_url: rules.image_url.apply(&root).unwrap_or_default(),
            description: rules
                .description
                .apply(&root)
                .unwrap_or_else(|| base::NO_DESCRIPTION.to_string()),
            attendees,
            event_id,
        }
    }

    /// Start timestamp from the persisted query, or `None` on any failure.
    async fn fetch_start<F: PageFetcher>(&self, fetcher: &F, event_id: &str) -> Option<String> {
        let endpoint = match Url::parse(self.gql_endpoint) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                tracing::warn!(endpoint = self.gql_endpoint, "invalid meetup gql endpoint: {err}");
                return None;
            }
        };
        let body = json!({
            "operationName": OPERATION_NAME,
            "variables": { "eventId": event_id },
            "extensions": {
                "persistedQuery": { "version": 1, "sha256Hash": self.query_hash }
            }
        });

        match fetcher.post_json(&endpoint, &body).await {
            Ok(reply) => {
                let start = reply
                    .pointer("/data/event/dateTime")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if start.is_none() {
                    tracing::warn!(event_id, "meetup metadata had no dateTime");
                }
                start
            }
            Err(err) => {
                tracing::warn!(event_id, "meetup metadata call failed: {err}");
                None
            }
        }
    }
}

impl EventSource for Meetup<'_> {
    fn platform(&self) -> Platform {
        Platform::Meetup
    }

    async fn extract<F: PageFetcher>(
        &self,
        fetcher: &F,
        url: &Url,
    ) -> Result<EventRecord, ExtractError> {
        let html = fetcher.get_text(url).await?;
        let markup = self.parse_document(&html, url);

        let start = match markup.event_id.as_deref() {
            Some(event_id) => self.fetch_start(fetcher, event_id).await,
            None => {
                tracing::debug!(%url, "no meetup event id, skipping metadata call");
                None
            }
        };
        let (date, time) = base::format_start(start.as_deref(), self.tz);

        Ok(EventRecord {
            platform: Platform::Meetup,
            title: markup.title,
            hosted_by: markup.hosted_by,
            date,
            time,
            location_name: markup.location_name,
            image_url: markup.image_url,
            description: markup.description,
            attendees: markup.attendees,
            map_embed_url: None,
            source_url: url.to_string(),
        })
    }
}

pub(crate) fn event_id_from_path(path: &str) -> Option<String> {
    EVENT_ID_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Digits too large for `u32` saturate; anything else that is not a
/// number counts as no count at all.
fn attendee_count(text: &str) -> u32 {
    let digits = text.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    digits
        .parse::<u64>()
        .ok()
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::base::testing::FakeFetcher;

    const EVENT_URL: &str = "https://www.meetup.com/rust-boise/events/305123456/";

    fn page(attendee_heading: &str) -> String {
        format!(
            r#"<html><head>
              <meta property="og:image" content="https://secure.meetupstatic.com/photos/event.jpeg">
              <meta property="og:description" content="Monthly Rust hack night.">
            </head><body>
            <div id="main">
              <div class="px-5 w-full bg-white border-b border-shadowColor py-2">
                <div>
                  <h1>  Rust Hack Night  </h1>
                  <a href="/rust-boise/"><div><div class="ml-6">
                    <div>Hosted By</div>
                    <div><span>Ferris C.</span></div>
                  </div></div></a>
                </div>
              </div>
            </div>
            <div id="event-info"><div>
              <div>
                <div class="flex flex-col"><div>
                  <div class="overflow-hidden pl-4">
                    <div>Boise Public Library</div>
                    <div>715 S Capitol Blvd</div>
                  </div>
                </div></div>
              </div>
            </div></div>
            <section id="attendees">
              <div class="flex items-center justify-between"><h2>{attendee_heading}</h2></div>
            </section>
            </body></html>"#
        )
    }

    fn rules(config: &AppConfig) -> MeetupRules {
        MeetupRules::compile(&config.meetup_selectors).expect("default rules compile")
    }

    fn parse(html: &str, url: &str) -> Markup {
        let config = AppConfig::default();
        let rules = rules(&config);
        let url = Url::parse(url).expect("url");
        Meetup::new(&config, &rules).parse_document(html, &url)
    }

    #[test]
    fn scrapes_markup_fields() {
        let markup = parse(&page("Attendees (42)"), EVENT_URL);
        assert_eq!(markup.title, "Rust Hack Night");
        assert_eq!(markup.hosted_by, "Ferris C.");
        assert_eq!(markup.location_name, "Boise Public Library");
        assert_eq!(
            markup.image_url,
            "https://secure.meetupstatic.com/photos/event.jpeg"
        );
        assert_eq!(markup.description, "Monthly Rust hack night.");
        assert_eq!(markup.attendees, 42);
        assert_eq!(markup.event_id.as_deref(), Some("305123456"));
    }

    #[test]
    fn attendees_default_to_zero_without_parenthesized_count() {
        let markup = parse(&page("Attendees"), EVENT_URL);
        assert_eq!(markup.attendees, 0);
    }

    #[test]
    fn oversized_attendee_count_saturates() {
        let markup = parse(&page("Attendees (4294967296)"), EVENT_URL);
        assert_eq!(markup.attendees, u32::MAX);
        let markup = parse(&page("Attendees (99999999999999999999999)"), EVENT_URL);
        assert_eq!(markup.attendees, u32::MAX);
    }

    #[test]
    fn attendee_count_parsing() {
        assert_eq!(attendee_count("4294967295"), u32::MAX);
        assert_eq!(attendee_count(" 12 "), 12);
        assert_eq!(attendee_count("12 going"), 0);
        assert_eq!(attendee_count(""), 0);
    }

    #[test]
    fn empty_page_uses_fallbacks() {
        let markup = parse("<html><body></body></html>", "https://www.meetup.com/rust-boise/");
        assert_eq!(markup.title, base::UNTITLED_EVENT);
        assert_eq!(markup.hosted_by, base::MEETUP_HOST);
        assert_eq!(markup.location_name, base::LOCATION_TBD);
        assert_eq!(markup.image_url, "");
        assert_eq!(markup.description, base::NO_DESCRIPTION);
        assert_eq!(markup.attendees, 0);
        assert_eq!(markup.event_id, None);
    }

    #[test]
    fn event_id_falls_back_to_og_url() {
        let html = r#"<meta property="og:url" content="https://www.meetup.com/rust-boise/events/311000222/">"#;
        let markup = parse(html, "https://meetup.com/e/abcd");
        assert_eq!(markup.event_id.as_deref(), Some("311000222"));
    }

    #[test]
    fn selectors_come_from_config() {
        let mut config = AppConfig::default();
        config.meetup_selectors.title = SelectorRule::text("h2.event-name");
        config.meetup_selectors.attendees =
            SelectorRule::attr("[data-rsvp-count]", "data-rsvp-count");
        let rules = rules(&config);
        let url = Url::parse(EVENT_URL).expect("url");
        let markup = Meetup::new(&config, &rules).parse_document(
            r#"<h2 class="event-name">Renamed</h2><span data-rsvp-count="17"></span>"#,
            &url,
        );
        assert_eq!(markup.title, "Renamed");
        assert_eq!(markup.attendees, 17);
    }

    #[test]
    fn broken_selector_config_is_reported_at_compile() {
        let mut selectors = MeetupSelectors::default();
        selectors.hosted_by = SelectorRule::text("div[[");
        let err = MeetupRules::compile(&selectors).expect_err("bad selector");
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
        assert!(err.message().contains("invalid selector for hostedBy"));
    }

    #[test]
    fn broken_pattern_config_is_reported_at_compile() {
        let mut selectors = MeetupSelectors::default();
        selectors.attendees = SelectorRule::text("h2").with_pattern(r"\((\d+");
        let err = MeetupRules::compile(&selectors).expect_err("bad pattern");
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
        assert!(err.message().contains("invalid pattern for attendees"));
    }

    #[tokio::test]
    async fn metadata_supplies_date_and_time() {
        let config = AppConfig::default();
        let mut fetcher = FakeFetcher::with_page(EVENT_URL, &page("Attendees (7)"));
        fetcher.post_reply = Some(json!({
            "data": { "event": { "dateTime": "2025-10-04T14:00-04:00" } }
        }));
        let url = Url::parse(EVENT_URL).expect("url");

        let rules = rules(&config);
        let record = Meetup::new(&config, &rules)
            .extract(&fetcher, &url)
            .await
            .expect("extract");

        assert_eq!(record.platform, Platform::Meetup);
        assert_eq!(record.date, "Saturday, October 4, 2025");
        assert_eq!(record.time, "6:00 PM UTC");
        assert_eq!(record.attendees, 7);
        assert_eq!(record.map_embed_url, None);
        assert_eq!(record.source_url, EVENT_URL);

        let posted = fetcher.posted.lock().expect("posted lock");
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["operationName"], OPERATION_NAME);
        assert_eq!(posted[0]["variables"]["eventId"], "305123456");
        assert_eq!(
            posted[0]["extensions"]["persistedQuery"]["sha256Hash"],
            config.meetup_persisted_query_hash
        );
    }

    #[tokio::test]
    async fn failed_metadata_call_degrades_to_fallbacks() {
        let config = AppConfig::default();
        let fetcher = FakeFetcher::with_page(EVENT_URL, &page("Attendees (42)"));
        let url = Url::parse(EVENT_URL).expect("url");

        let rules = rules(&config);
        let record = Meetup::new(&config, &rules)
            .extract(&fetcher, &url)
            .await
            .expect("extraction survives metadata failure");

        assert_eq!(record.date, base::DATE_NOT_FOUND);
        assert_eq!(record.time, base::TIME_NOT_FOUND);
        assert_eq!(record.title, "Rust Hack Night");
        assert_eq!(record.attendees, 42);
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn metadata_without_timestamp_degrades_to_fallbacks() {
        let config = AppConfig::default();
        let mut fetcher = FakeFetcher::with_page(EVENT_URL, &page("Attendees (1)"));
        fetcher.post_reply = Some(json!({ "data": { "event": null } }));
        let url = Url::parse(EVENT_URL).expect("url");

        let rules = rules(&config);
        let record = Meetup::new(&config, &rules)
            .extract(&fetcher, &url)
            .await
            .expect("extract");
        assert_eq!(record.date, base::DATE_NOT_FOUND);
        assert_eq!(record.time, base::TIME_NOT_FOUND);
    }

    #[tokio::test]
    async fn page_fetch_failure_is_fatal() {
        let config = AppConfig::default();
        let fetcher = FakeFetcher::default();
        let url = Url::parse(EVENT_URL).expect("url");
        let rules = rules(&config);
        let err = Meetup::new(&config, &rules)
            .extract(&fetcher, &url)
            .await
            .expect_err("no page");
        assert_eq!(err.kind(), crate::error::ErrorKind::Upstream);
    }
}
