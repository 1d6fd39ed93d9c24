mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod links;
pub mod models;
pub mod reader;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, PostCommand};
use config::AppConfig;
use db::Store;
use error::ExtractError;
use extract::{EventExtractor, PageFetcher};
use models::{EventRecord, Post};

/// Extracts every link concurrently. Results keep the order of `links`.
pub async fn extract_all<F>(
    extractor: Arc<EventExtractor<F>>,
    links: Vec<String>,
) -> Result<Vec<(String, Result<EventRecord, ExtractError>)>>
where
    F: PageFetcher + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, link) in links.into_iter().enumerate() {
        let extractor = Arc::clone(&extractor);
        tasks.spawn(async move {
            let result = extractor.extract(&link).await;
            (index, link, result)
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("extraction task panicked")?);
    }
    results.sort_by_key(|(index, _, _)| *index);
    Ok(results
        .into_iter()
        .map(|(_, link, result)| (link, result))
        .collect())
}

/// Builds a post from free-form text. Every event link in the text must
/// extract cleanly, otherwise nothing is returned.
pub async fn compose_post<F>(
    extractor: Arc<EventExtractor<F>>,
    id: String,
    text: String,
) -> Result<Post>
where
    F: PageFetcher + 'static,
{
    let links = links::extract_event_links(&text);
    let mut events = Vec::with_capacity(links.len());
    let mut failures = Vec::new();

    for (link, result) in extract_all(extractor, links).await? {
        match result {
            Ok(event) => events.push(event),
            Err(err) => failures.push(format!("{link}: {err}")),
        }
    }

    if !failures.is_empty() {
        return Err(anyhow!(
            "Couldn't fetch details for one or more links: {}",
            failures.join("; ")
        ));
    }

    Ok(Post {
        id,
        content_text: text,
        events,
    })
}

pub fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("event_embed_lib={level},event_embed={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn with_store<T, F>(path: Option<PathBuf>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<T> {
        let store = match path {
            Some(path) => Store::open(&path),
            None => Store::open_default(),
        }
        .context("failed to open post store")?;
        work(&store)
    })
    .await
    .context("store task failed")?
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = AppConfig::load(cli.config.as_deref())
        .map_err(|err| anyhow!("failed to load config: {err}"))?;
    let extractor = Arc::new(EventExtractor::new(config)?);
    let database = cli.database;

    match cli.command {
        Command::Extract { url } => {
            let event = extractor
                .extract(&url)
                .await
                .map_err(|err| anyhow!("Error getting event: {err}"))?;
            print_json(&event)
        }
        Command::Raw { url } => {
            let raw = extractor
                .retrieve_raw_content(&url)
                .await
                .map_err(|err| anyhow!("Error getting event: {err}"))?;
            print_json(&raw)
        }
        Command::Links { text } => {
            for link in links::extract_event_links(&text) {
                println!("{link}");
            }
            Ok(())
        }
        Command::Post(PostCommand::Create { id, text }) => {
            let post = compose_post(extractor, id, text).await?;
            let stored = post.clone();
            with_store(database, move |store| {
                store.create_post(&stored).context("Failed to create post")
            })
            .await?;
            print_json(&post)
        }
        Command::Post(PostCommand::List) => {
            let posts = with_store(database, |store| Ok(store.list_posts()?)).await?;
            print_json(&posts)
        }
        Command::Post(PostCommand::Show { id }) => {
            let lookup = id.clone();
            let post = with_store(database, move |store| Ok(store.get_post(&lookup)?)).await?;
            match post {
                Some(post) => print_json(&post),
                None => Err(anyhow!("Post not found: {id}")),
            }
        }
        Command::Post(PostCommand::Delete { id }) => {
            let target = id.clone();
            let deleted = with_store(database, move |store| Ok(store.delete_post(&target)?)).await?;
            if deleted {
                println!("Post deleted successfully");
                Ok(())
            } else {
                Err(anyhow!("Post not found or could not be deleted: {id}"))
            }
        }
    }
}
