use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Turn Meetup and Luma links into event cards and keep them as posts.
#[derive(Debug, Parser)]
#[command(name = "event-embed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "EVENT_EMBED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the post database
    #[arg(long, env = "EVENT_EMBED_DB")]
    pub database: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract one Meetup or Luma event as JSON
    Extract { url: String },
    /// Fetch a page through the reader service and print its raw JSON
    Raw { url: String },
    /// List the event links found in some text
    Links { text: String },
    /// Manage stored posts
    #[command(subcommand)]
    Post(PostCommand),
}

#[derive(Debug, Subcommand)]
pub enum PostCommand {
    /// Extract every event link in the text and store the post
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        text: String,
    },
    /// List posts, newest first
    List,
    /// Show one post
    Show { id: String },
    /// Delete one post
    Delete { id: String },
}
