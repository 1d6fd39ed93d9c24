use chrono_tz::Tz;
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{Html, Selector};
use serde_json::Value;

use super::base::{self, PageFetcher};
use super::map_embed::{self, GeoPoint};
use super::EventSource;
use crate::error::ExtractError;
use crate::models::{EventRecord, Platform};

const MISSING_JSON_LD: &str = "Could not find Luma JSON-LD data.";

static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("luma json-ld selector")
});

/// Reads the page's embedded schema.org event. There is no markup fallback.
pub struct Luma {
    tz: Tz,
}

impl Luma {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub(crate) fn parse_document(&self, html: &str, url: &Url) -> Result<EventRecord, ExtractError> {
        let data = structured_data(html)?;
        Ok(self.map_event(&data, url))
    }

    fn map_event(&self, data: &Value, url: &Url) -> EventRecord {
        let null = Value::Null;
        let location = data.get("location").unwrap_or(&null);
        let (date, time) = base::format_start(base::str_field(data, "startDate"), self.tz);

        let geo = location.get("geo").and_then(GeoPoint::from_json);
        let address = location.get("address").and_then(address_text);

        EventRecord {
            platform: Platform::Luma,
            title: base::str_field(data, "name")
                .unwrap_or(base::UNTITLED_EVENT)
                .to_string(),
            hosted_by: organizer_names(data).unwrap_or_else(|| base::LUMA_HOST.to_string()),
            date,
            time,
            location_name: base::str_field(location, "name")
                .unwrap_or(base::ONLINE_EVENT)
                .to_string(),
            image_url: image_url(data.get("image")),
            description: base::str_field(data, "description")
                .unwrap_or(base::NO_DESCRIPTION)
                .to_string(),
            attendees: 0,
            map_embed_url: map_embed::map_embed_url(address.as_deref(), geo),
            source_url: base::str_field(data, "@id")
                .map(str::to_string)
                .unwrap_or_else(|| url.to_string()),
        }
    }
}

impl EventSource for Luma {
    fn platform(&self) -> Platform {
        Platform::Luma
    }

    async fn extract<F: PageFetcher>(
        &self,
        fetcher: &F,
        url: &Url,
    ) -> Result<EventRecord, ExtractError> {
        let html = fetcher.get_text(url).await?;
        self.parse_document(&html, url)
    }
}

fn structured_data(html: &str) -> Result<Value, ExtractError> {
    let document = Html::parse_document(html);
    let raw = document
        .select(&JSON_LD_SELECTOR)
        .next()
        .map(|node| node.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ExtractError::UnparsableSource(MISSING_JSON_LD.to_string()))?;

    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| ExtractError::UnparsableSource(format!("{MISSING_JSON_LD} ({err})")))?;

    // Some pages wrap the event in a top-level array.
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(items) => items
            .into_iter()
            .find(Value::is_object)
            .ok_or_else(|| ExtractError::UnparsableSource(MISSING_JSON_LD.to_string())),
        _ => Err(ExtractError::UnparsableSource(MISSING_JSON_LD.to_string())),
    }
}

fn organizer_names(data: &Value) -> Option<String> {
    let organizers = data.get("organizer")?.as_array()?;
    let names = organizers
        .iter()
        .filter_map(|org| base::str_field(org, "name"))
        .collect::<Vec<_>>();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn image_url(image: Option<&Value>) -> String {
    let candidate = match image {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    match candidate {
        Some(Value::String(url)) => url.trim().to_string(),
        Some(obj @ Value::Object(_)) => base::str_field(obj, "url").unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

/// Plain string addresses pass through; `PostalAddress` objects are
/// flattened into one line.
fn address_text(address: &Value) -> Option<String> {
    match address {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Object(_) => {
            let country = address
                .get("addressCountry")
                .and_then(|c| c.as_str().or_else(|| c.get("name").and_then(Value::as_str)));
            let parts = [
                base::str_field(address, "streetAddress"),
                base::str_field(address, "addressLocality"),
                base::str_field(address, "addressRegion"),
                base::str_field(address, "postalCode"),
                country.map(str::trim).filter(|c| !c.is_empty()),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::base::testing::FakeFetcher;
    use serde_json::json;

    const EVENT_URL: &str = "https://luma.com/rust-night";

    fn page(data: &Value) -> String {
        format!(
            r#"<html><head>
            <script type="application/ld+json">{data}</script>
            </head><body><h1>ignored</h1></body></html>"#
        )
    }

    fn parse(data: Value) -> EventRecord {
        let url = Url::parse(EVENT_URL).expect("url");
        Luma::new(Tz::UTC)
            .parse_document(&page(&data), &url)
            .expect("parse luma page")
    }

    #[test]
    fn maps_full_event() {
        let record = parse(json!({
            "@id": "https://luma.com/evt-abc123",
            "name": "Rust Night",
            "startDate": "2025-10-04T18:00:00.000Z",
            "organizer": [{ "name": "X" }, { "name": "Y" }],
            "image": ["a", "b"],
            "description": "<p>Talks and pizza</p>",
            "location": {
                "name": "Boise Library",
                "geo": { "latitude": 10, "longitude": 20 }
            }
        }));

        assert_eq!(record.platform, Platform::Luma);
        assert_eq!(record.title, "Rust Night");
        assert_eq!(record.hosted_by, "X, Y");
        assert_eq!(record.date, "Saturday, October 4, 2025");
        assert_eq!(record.time, "6:00 PM UTC");
        assert_eq!(record.location_name, "Boise Library");
        assert_eq!(record.image_url, "a");
        assert_eq!(record.description, "<p>Talks and pizza</p>");
        assert_eq!(record.attendees, 0);
        let map = record.map_embed_url.expect("map url");
        assert!(map.contains("bbox=19.99,9.99,20.01,10.01"));
        assert!(map.contains("marker=10,20"));
        assert_eq!(record.source_url, "https://luma.com/evt-abc123");
    }

    #[test]
    fn empty_structured_data_uses_fallbacks() {
        let record = parse(json!({}));
        assert_eq!(record.title, base::UNTITLED_EVENT);
        assert_eq!(record.hosted_by, base::LUMA_HOST);
        assert_eq!(record.date, base::DATE_NOT_FOUND);
        assert_eq!(record.time, base::TIME_NOT_FOUND);
        assert_eq!(record.location_name, base::ONLINE_EVENT);
        assert_eq!(record.image_url, "");
        assert_eq!(record.description, base::NO_DESCRIPTION);
        assert_eq!(record.map_embed_url, None);
        assert_eq!(record.source_url, EVENT_URL);
    }

    #[test]
    fn scalar_image_and_empty_organizers() {
        let record = parse(json!({
            "image": "https://images.lumacdn.com/cover.png",
            "organizer": []
        }));
        assert_eq!(record.image_url, "https://images.lumacdn.com/cover.png");
        assert_eq!(record.hosted_by, base::LUMA_HOST);
    }

    #[test]
    fn address_without_geo_becomes_query() {
        let record = parse(json!({
            "location": { "name": "HQ", "address": "123 Main St" }
        }));
        let map = record.map_embed_url.expect("map url");
        assert!(map.contains("query=123%20Main%20St"));
        assert!(!map.contains("bbox"));
    }

    #[test]
    fn postal_address_is_flattened() {
        let record = parse(json!({
            "location": {
                "address": {
                    "@type": "PostalAddress",
                    "streetAddress": "1 Grove Plaza",
                    "addressLocality": "Boise",
                    "addressCountry": { "name": "US" }
                }
            }
        }));
        let map = record.map_embed_url.expect("map url");
        assert!(map.ends_with("query=1%20Grove%20Plaza%2C%20Boise%2C%20US"));
    }

    #[test]
    fn missing_json_ld_is_a_parse_error() {
        let url = Url::parse(EVENT_URL).expect("url");
        let err = Luma::new(Tz::UTC)
            .parse_document("<html><body><h1>Rust Night</h1></body></html>", &url)
            .expect_err("no json-ld");
        assert_eq!(err, ExtractError::UnparsableSource(MISSING_JSON_LD.to_string()));
    }

    #[test]
    fn invalid_json_ld_is_a_parse_error() {
        let url = Url::parse(EVENT_URL).expect("url");
        let html = r#"<script type="application/ld+json">{ "name": </script>"#;
        let err = Luma::new(Tz::UTC)
            .parse_document(html, &url)
            .expect_err("bad json");
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
        assert!(err.message().starts_with(MISSING_JSON_LD));
    }

    #[tokio::test]
    async fn extract_fetches_the_page_once() {
        let fetcher = FakeFetcher::with_page(EVENT_URL, &page(&json!({ "name": "Rust Night" })));
        let url = Url::parse(EVENT_URL).expect("url");
        let record = Luma::new(Tz::UTC)
            .extract(&fetcher, &url)
            .await
            .expect("extract");
        assert_eq!(record.title, "Rust Night");
        assert_eq!(fetcher.call_count(), 1);
    }
}
