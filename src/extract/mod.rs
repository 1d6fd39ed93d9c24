pub mod admission;
pub mod base;
pub mod luma;
pub mod map_embed;
pub mod meetup;

use std::future::Future;

use reqwest::Url;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::ExtractError;
use crate::models::{EventRecord, Platform};
use crate::reader;

pub use base::{HttpFetcher, PageFetcher};
pub use meetup::MeetupRules;

/// One platform's way of turning an admitted URL into an [`EventRecord`].
pub trait EventSource {
    fn platform(&self) -> Platform;

    fn extract<F: PageFetcher>(
        &self,
        fetcher: &F,
        url: &Url,
    ) -> impl Future<Output = Result<EventRecord, ExtractError>> + Send;
}

/// The closed set of strategies, picked by [`admission::classify`].
pub enum Source<'a> {
    Luma(luma::Luma),
    Meetup(meetup::Meetup<'a>),
}

impl<'a> Source<'a> {
    pub fn for_platform(
        platform: Platform,
        config: &'a AppConfig,
        meetup_rules: &'a MeetupRules,
    ) -> Self {
        match platform {
            Platform::Luma => Source::Luma(luma::Luma::new(config.display_tz())),
            Platform::Meetup => Source::Meetup(meetup::Meetup::new(config, meetup_rules)),
        }
    }
}

impl EventSource for Source<'_> {
    fn platform(&self) -> Platform {
        match self {
            Source::Luma(source) => source.platform(),
            Source::Meetup(source) => source.platform(),
        }
    }

    async fn extract<F: PageFetcher>(
        &self,
        fetcher: &F,
        url: &Url,
    ) -> Result<EventRecord, ExtractError> {
        match self {
            Source::Luma(source) => source.extract(fetcher, url).await,
            Source::Meetup(source) => source.extract(fetcher, url).await,
        }
    }
}

/// Entry point for both retrieval paths. Holds no per-call state, so one
/// instance can serve any number of concurrent extractions.
pub struct EventExtractor<F = HttpFetcher> {
    config: AppConfig,
    meetup_rules: MeetupRules,
    fetcher: F,
}

impl EventExtractor<HttpFetcher> {
    pub fn new(config: AppConfig) -> Result<Self, ExtractError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: PageFetcher> EventExtractor<F> {
    /// Fails when the configured Meetup selectors or patterns do not parse.
    pub fn with_fetcher(config: AppConfig, fetcher: F) -> Result<Self, ExtractError> {
        let meetup_rules = MeetupRules::compile(&config.meetup_selectors)?;
        Ok(Self {
            config,
            meetup_rules,
            fetcher,
        })
    }

    /// Validates `url`, picks the platform strategy and runs it.
    pub async fn extract(&self, url: &str) -> Result<EventRecord, ExtractError> {
        let url = admission::admit(url, &admission::EVENT_HOSTS)?;
        let source =
            Source::for_platform(admission::classify(&url), &self.config, &self.meetup_rules);
        tracing::info!(platform = %source.platform(), %url, "extracting event");
        source.extract(&self.fetcher, &url).await
    }

    /// Raw JSON from the reader service for any of the broader allow-listed hosts.
    pub async fn retrieve_raw_content(&self, url: &str) -> Result<Value, ExtractError> {
        reader::retrieve(&self.fetcher, &self.config, url).await
    }
}
