use rusqlite::{Connection, OptionalExtension};

use crate::errors::FeedGraphError;

pub const SCHEMA_VERSION: i64 = 1;

/// Creates the tables if missing and checks the stored schema version.
///
/// `follows` is the only record of who follows whom; follower and following
/// lists are derived from it. Feed order is the `feed_entries` rowid order.
pub fn ensure_schema(conn: &Connection) -> Result<(), FeedGraphError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS feed_meta (
            id             INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS users (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS follows (
            follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            followed_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (follower_id, followed_id),
            CHECK (follower_id <> followed_id)
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS tweets (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message    TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT
        );
        CREATE TABLE IF NOT EXISTS feed_entries (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tweet_id     INTEGER NOT NULL,
            delivered_at TEXT NOT NULL,
            UNIQUE (user_id, tweet_id)
        );
        CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(followed_id, follower_id);
        CREATE INDEX IF NOT EXISTS idx_tweets_created ON tweets(created_at, id);
        CREATE INDEX IF NOT EXISTS idx_tweets_author ON tweets(author_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_feed_tweet ON feed_entries(tweet_id);
        "#,
    )
    .map_err(|e| FeedGraphError::fatal(format!("schema: {e}")))?;
    ensure_meta(conn)
}

pub fn read_schema_version(conn: &Connection) -> Result<i64, FeedGraphError> {
    conn.query_row(
        "SELECT schema_version FROM feed_meta WHERE id=1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| FeedGraphError::fatal(format!("schema: {e}")))
}

fn ensure_meta(conn: &Connection) -> Result<(), FeedGraphError> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT schema_version FROM feed_meta WHERE id=1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| FeedGraphError::fatal(format!("schema: {e}")))?;
    match version {
        Some(existing) if existing > SCHEMA_VERSION => Err(FeedGraphError::fatal(format!(
            "database schema version {existing} is newer than supported {SCHEMA_VERSION}"
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO feed_meta(id, schema_version) VALUES(1, ?1)",
                [SCHEMA_VERSION],
            )
            .map_err(|e| FeedGraphError::fatal(format!("schema: {e}")))?;
            Ok(())
        }
    }
}
