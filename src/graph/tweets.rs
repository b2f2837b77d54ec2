//! Tweet records. New tweets are only created by
//! [`FeedEngine::publish`](super::FeedEngine::publish), which fans them out
//! in the same transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::instrument;

use crate::{
    errors::FeedGraphError,
    ids::{TweetId, UserId},
    store::Store,
};

use super::{
    types::{Tweet, row_to_tweet, validate_message},
    users::ensure_user_found,
};

const TWEET_COLUMNS: &str = "id, author_id, message, created_at, updated_at";

#[derive(Clone)]
pub struct TweetStore {
    store: Arc<Store>,
    max_message_len: usize,
}

impl TweetStore {
    pub fn new(store: Arc<Store>, max_message_len: usize) -> Self {
        Self {
            store,
            max_message_len,
        }
    }

    pub fn validate_message(&self, message: &str) -> Result<(), FeedGraphError> {
        validate_message(message, self.max_message_len)
    }

    pub fn get(&self, id: TweetId) -> Result<Tweet, FeedGraphError> {
        self.store.read("get_tweet", |conn| fetch_tweet(conn, id))
    }

    /// All tweets, newest first.
    pub fn list(&self) -> Result<Vec<Tweet>, FeedGraphError> {
        self.store.read("list_tweets", |conn| {
            let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets ORDER BY created_at DESC, id DESC");
            collect_tweets(conn, &sql, [])
        })
    }

    /// Tweets by one author, newest first.
    pub fn list_by_author(&self, author: UserId) -> Result<Vec<Tweet>, FeedGraphError> {
        self.store.read("list_tweets_by_author", |conn| {
            ensure_user_found(conn, author)?;
            let sql = format!(
                "SELECT {TWEET_COLUMNS} FROM tweets WHERE author_id=?1 \
                 ORDER BY created_at DESC, id DESC"
            );
            collect_tweets(conn, &sql, params![author])
        })
    }

    /// Replaces the message text. `created_at` is left alone, so the
    /// tweet keeps its place in listings and feeds; the edit time goes to
    /// `updated_at`.
    #[instrument(skip(self, message))]
    pub fn update_message(&self, id: TweetId, message: &str) -> Result<Tweet, FeedGraphError> {
        self.validate_message(message)?;
        self.store.write("update_tweet", |conn| {
            let affected = conn
                .execute(
                    "UPDATE tweets SET message=?1, updated_at=?2 WHERE id=?3",
                    params![message, Utc::now(), id],
                )
                .map_err(FeedGraphError::store)?;
            if affected == 0 {
                return Err(FeedGraphError::not_found(format!("tweet {id}")));
            }
            fetch_tweet(conn, id)
        })
    }

    /// Removes the record only. Feeds that received the tweet keep its id;
    /// readers are expected to skip ids that no longer resolve.
    #[instrument(skip(self))]
    pub fn delete(&self, id: TweetId) -> Result<(), FeedGraphError> {
        self.store.write("delete_tweet", |conn| {
            let affected = conn
                .execute("DELETE FROM tweets WHERE id=?1", params![id])
                .map_err(FeedGraphError::store)?;
            if affected == 0 {
                return Err(FeedGraphError::not_found(format!("tweet {id}")));
            }
            Ok(())
        })
    }
}

pub(crate) fn insert_tweet(
    conn: &Connection,
    author: UserId,
    message: &str,
    created_at: DateTime<Utc>,
) -> Result<Tweet, FeedGraphError> {
    conn.prepare_cached("INSERT INTO tweets(author_id, message, created_at) VALUES(?1, ?2, ?3)")
        .and_then(|mut stmt| stmt.execute(params![author, message, created_at]))
        .map_err(FeedGraphError::store)?;
    Ok(Tweet {
        id: TweetId(conn.last_insert_rowid()),
        author_id: author,
        message: message.to_string(),
        created_at,
        updated_at: None,
    })
}

pub(crate) fn fetch_tweet(conn: &Connection, id: TweetId) -> Result<Tweet, FeedGraphError> {
    let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE id=?1");
    conn.query_row(&sql, params![id], row_to_tweet)
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => {
                FeedGraphError::not_found(format!("tweet {id}"))
            }
            other => FeedGraphError::store(other),
        })
}

fn collect_tweets<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Tweet>, FeedGraphError> {
    let mut stmt = conn.prepare_cached(sql).map_err(FeedGraphError::store)?;
    let rows = stmt
        .query_map(params, row_to_tweet)
        .map_err(FeedGraphError::store)?;
    let mut tweets = Vec::new();
    for tweet in rows {
        tweets.push(tweet.map_err(FeedGraphError::store)?);
    }
    Ok(tweets)
}
