use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Meetup,
    Luma,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Meetup => "Meetup",
            Platform::Luma => "Luma",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized event card produced by one extraction call.
///
/// Every field carries either scraped data or a fallback from
/// `extract::base`; `map_embed_url` is the only optional one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub platform: Platform,
    pub title: String,
    pub hosted_by: String,
    pub date: String,
    pub time: String,
    pub location_name: String,
    pub image_url: String,
    pub description: String,
    pub attendees: u32,
    pub map_embed_url: Option<String>,
    pub source_url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content_text: String,
    pub events: Vec<EventRecord>,
}

impl Post {
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.content_text.trim().is_empty()
    }
}
