use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_READER_ENDPOINT: &str = "https://r.jina.ai/";
const DEFAULT_MEETUP_GQL_ENDPOINT: &str = "https://www.meetup.com/gql2";
const DEFAULT_MEETUP_QUERY_HASH: &str =
    "06e14c0b9938b3f0cbd5f0ef3a4cf910d01285c8bcc6ebf76b0f0aafbf19b076";
const APP_DIR: &str = "event-embed";
const CONFIG_FILE: &str = "config.json";

/// Where the default config file and post database live.
/// `EVENT_EMBED_HOME` replaces the platform data directory.
pub fn data_dir() -> io::Result<PathBuf> {
    resolve_data_dir(std::env::var_os("EVENT_EMBED_HOME").map(PathBuf::from))
}

fn resolve_data_dir(home: Option<PathBuf>) -> io::Result<PathBuf> {
    match home.filter(|home| !home.as_os_str().is_empty()) {
        Some(home) => Ok(home),
        None => dirs::data_dir()
            .map(|base| base.join(APP_DIR))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "no data directory for this platform, set EVENT_EMBED_HOME",
                )
            }),
    }
}

/// How to pull one field out of a scraped document.
///
/// `selector` picks the first matching element. Its text is used unless
/// `attribute` names an attribute to read instead. When `pattern` is set,
/// the first capture group of the regex applied to that value wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorRule {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl SelectorRule {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: None,
            pattern: None,
        }
    }

    pub fn attr(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
            pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct MeetupSelectors {
    pub title: SelectorRule,
    pub hosted_by: SelectorRule,
    pub location_name: SelectorRule,
    pub image_url: SelectorRule,
    pub description: SelectorRule,
    pub attendees: SelectorRule,
}

impl Default for MeetupSelectors {
    fn default() -> Self {
        Self {
            title: SelectorRule::text(
                "#main > div.px-5.w-full.bg-white.border-b.border-shadowColor.py-2 > div > h1",
            ),
            hosted_by: SelectorRule::text(
                "#main > div.px-5.w-full.bg-white.border-b.border-shadowColor.py-2 > div > a > div > div.ml-6 > div:nth-child(2) > span",
            ),
            location_name: SelectorRule::text(
                "#event-info > div > div:nth-child(1) > div.flex.flex-col > div > div.overflow-hidden.pl-4 > div:nth-child(1)",
            ),
            image_url: SelectorRule::attr(r#"meta[property="og:image"]"#, "content"),
            description: SelectorRule::attr(r#"meta[property="og:description"]"#, "content"),
            attendees: SelectorRule::text("#attendees > div.flex.items-center.justify-between > h2")
                .with_pattern(r"\((\d+)\)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub user_agent: String,
    /// IANA zone used to render event dates and times.
    pub display_timezone: String,
    pub request_timeout_secs: Option<u64>,
    pub reader_endpoint: String,
    pub reader_api_key: Option<String>,
    pub meetup_gql_endpoint: String,
    pub meetup_persisted_query_hash: String,
    pub meetup_selectors: MeetupSelectors,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            display_timezone: DEFAULT_TIMEZONE.to_string(),
            request_timeout_secs: None,
            reader_endpoint: DEFAULT_READER_ENDPOINT.to_string(),
            reader_api_key: None,
            meetup_gql_endpoint: DEFAULT_MEETUP_GQL_ENDPOINT.to_string(),
            meetup_persisted_query_hash: DEFAULT_MEETUP_QUERY_HASH.to_string(),
            meetup_selectors: MeetupSelectors::default(),
        }
    }
}

impl AppConfig {
    /// Reads the config file (default location when `path` is `None`) and
    /// applies environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(path) => read_config(path)?,
            None => {
                let dir = data_dir().map_err(|err| err.to_string())?;
                read_config(&dir.join(CONFIG_FILE))?
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(agent) = std::env::var("EVENT_EMBED_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Ok(zone) = std::env::var("EVENT_EMBED_TIMEZONE") {
            self.display_timezone = zone;
        }
        if let Some(secs) = std::env::var("EVENT_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.request_timeout_secs = Some(secs);
        }
        if let Ok(endpoint) = std::env::var("READER_ENDPOINT") {
            self.reader_endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("JINA_API_KEY") {
            if !key.trim().is_empty() {
                self.reader_api_key = Some(key);
            }
        }
        if let Ok(endpoint) = std::env::var("MEETUP_GQL_ENDPOINT") {
            self.meetup_gql_endpoint = endpoint;
        }
    }

    pub fn display_tz(&self) -> Tz {
        match self.display_timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(err) => {
                tracing::warn!(zone = %self.display_timezone, "unknown display timezone, using UTC: {err}");
                Tz::UTC
            }
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| format!("{}: {err}", path.display()))
}
