//! Passthrough to a hosted "reader" service that turns any page into JSON.
//!
//! Unlike the event strategies nothing is normalized here; the service's
//! reply is handed back as-is once it is known to carry data.

use reqwest::Url;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::ExtractError;
use crate::extract::admission::{self, READER_HOSTS};
use crate::extract::PageFetcher;

const EMPTY_READER_REPLY: &str = "Reader API did not return structured data.";

pub async fn retrieve<F: PageFetcher>(
    fetcher: &F,
    config: &AppConfig,
    raw_url: &str,
) -> Result<Value, ExtractError> {
    admission::admit(raw_url, &READER_HOSTS)?;

    // The service takes the target appended verbatim to its own URL.
    let endpoint = format!("{}{}", config.reader_endpoint, raw_url);
    let endpoint = Url::parse(&endpoint).map_err(|err| {
        ExtractError::UpstreamFetchFailed(format!("invalid reader endpoint {endpoint}: {err}"))
    })?;

    tracing::info!(url = raw_url, "retrieving raw content");
    let reply = fetcher
        .get_json(&endpoint, config.reader_api_key.as_deref())
        .await?;

    if has_data(&reply) {
        Ok(reply)
    } else {
        Err(ExtractError::EmptyResult(EMPTY_READER_REPLY.to_string()))
    }
}

fn has_data(reply: &Value) -> bool {
    match reply.get("data") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}
