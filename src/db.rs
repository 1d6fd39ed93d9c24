use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::config;
use crate::models::Post;

const DATABASE_FILE: &str = "posts.sqlite";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database path error: {0}")]
    Io(#[from] io::Error),
    #[error("post payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Invalid post data provided")]
    InvalidPost,
    #[error("post {0} already exists")]
    DuplicateId(String),
}

/// Durable list of posts. Posts are never updated in place; ordering is by
/// insertion, newest first.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&config::data_dir()?.join(DATABASE_FILE))
    }

    /// Opens (creating if needed) the database at `path` and its parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS posts(
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                created_at_utc TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn create_post(&self, post: &Post) -> Result<(), StoreError> {
        if !post.is_valid() {
            return Err(StoreError::InvalidPost);
        }
        let payload = serde_json::to_string(post)?;
        let inserted = self.conn.execute(
            "INSERT INTO posts (id, payload, created_at_utc)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO NOTHING",
            params![post.id, payload, Utc::now().to_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateId(post.id.clone()));
        }
        tracing::debug!(id = %post.id, events = post.events.len(), "stored post");
        Ok(())
    }

    pub fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM posts ORDER BY seq DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    pub fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM posts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// `false` when no post had this id.
    pub fn delete_post(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}
