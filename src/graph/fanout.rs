//! Fan-out on write.
//!
//! Publishing inserts the tweet, reads the author's followers and appends the
//! tweet id to each follower's feed, all inside one `BEGIN IMMEDIATE`
//! transaction. The write lock is held from the follower read to the last
//! append, so a concurrent follow/unfollow or another publish touching the
//! same feed is ordered entirely before or after this one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, instrument};

use crate::{
    errors::FeedGraphError,
    fault_injection::{self, FaultPoint},
    ids::{TweetId, UserId},
    metrics::StoreMetrics,
    store::Store,
};

use super::{
    follows::followers_of,
    tweets::{TweetStore, insert_tweet},
    users::{ensure_user_found, require_user},
};

#[derive(Clone)]
pub struct FeedEngine {
    store: Arc<Store>,
    tweets: TweetStore,
}

impl FeedEngine {
    pub fn new(store: Arc<Store>, tweets: TweetStore) -> Self {
        Self { store, tweets }
    }

    /// Creates a tweet and delivers it to every current follower of
    /// `author`.
    ///
    /// Either the tweet exists and every follower known at publish time has
    /// it at the end of their feed, or nothing was written. The author's
    /// own feed is untouched.
    #[instrument(skip(self, message))]
    pub fn publish(&self, author: UserId, message: &str) -> Result<TweetId, FeedGraphError> {
        self.tweets.validate_message(message)?;
        let metrics = self.store.metrics();
        let (tweet_id, delivered) = self.store.write("publish", |conn| {
            require_user(conn, author, "author")?;
            let now = Utc::now();
            let tweet = insert_tweet(conn, author, message, now)?;
            let followers = followers_of(conn, author)?;
            let mut delivered = 0usize;
            for follower in &followers {
                fault_injection::check_fault(FaultPoint::FeedAppend)?;
                if append_to_feed(conn, metrics, *follower, tweet.id, now)? {
                    delivered += 1;
                }
            }
            fault_injection::check_fault(FaultPoint::PublishBeforeCommit)?;
            Ok((tweet.id, delivered))
        })?;
        debug!(%tweet_id, delivered, "tweet published");
        Ok(tweet_id)
    }

    /// Tweet ids delivered to `user`, oldest delivery first.
    pub fn feed(&self, user: UserId) -> Result<Vec<TweetId>, FeedGraphError> {
        self.store.read("feed", |conn| {
            ensure_user_found(conn, user)?;
            feed_of(conn, user)
        })
    }
}

/// Appends `tweet` to the end of `user`'s feed unless it is already there.
///
/// The `(user_id, tweet_id)` unique key makes a repeated delivery a no-op,
/// so retried fan-out cannot duplicate entries. Returns whether a row was
/// added.
pub(crate) fn append_to_feed(
    conn: &Connection,
    metrics: &StoreMetrics,
    user: UserId,
    tweet: TweetId,
    delivered_at: DateTime<Utc>,
) -> Result<bool, FeedGraphError> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO feed_entries(user_id, tweet_id, delivered_at) \
             VALUES(?1, ?2, ?3)",
        )
        .and_then(|mut stmt| stmt.execute(params![user, tweet, delivered_at]))
        .map_err(FeedGraphError::store)?;
    let appended = inserted > 0;
    metrics.record_feed_append(appended);
    Ok(appended)
}

pub(crate) fn feed_of(conn: &Connection, user: UserId) -> Result<Vec<TweetId>, FeedGraphError> {
    let mut stmt = conn
        .prepare_cached("SELECT tweet_id FROM feed_entries WHERE user_id=?1 ORDER BY id")
        .map_err(FeedGraphError::store)?;
    let rows = stmt
        .query_map(params![user], |row| row.get(0))
        .map_err(FeedGraphError::store)?;
    let mut feed = Vec::new();
    for id in rows {
        feed.push(id.map_err(FeedGraphError::store)?);
    }
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeedConfig, FeedGraph};

    fn graph_with_follower() -> (FeedGraph, UserId, UserId) {
        let graph = FeedGraph::open_in_memory().unwrap();
        let author = graph.create_user("author").unwrap();
        let reader = graph.create_user("reader").unwrap();
        graph.follow(reader, author).unwrap();
        (graph, author, reader)
    }

    #[test]
    fn repeated_append_keeps_single_entry() {
        let (graph, author, reader) = graph_with_follower();
        let tweet = graph.publish(author, "once").unwrap();
        let store = graph.store();
        let appended_again = store
            .write("redeliver", |conn| {
                let first = append_to_feed(conn, store.metrics(), reader, tweet, Utc::now())?;
                let second = append_to_feed(conn, store.metrics(), reader, tweet, Utc::now())?;
                Ok((first, second))
            })
            .unwrap();
        assert_eq!(appended_again, (false, false));
        assert_eq!(graph.feed(reader).unwrap(), vec![tweet]);
        assert_eq!(store.metrics().snapshot().duplicate_deliveries, 2);
    }

    #[test]
    fn first_append_initializes_empty_feed() {
        let (graph, _author, reader) = graph_with_follower();
        assert!(graph.feed(reader).unwrap().is_empty());
        let store = graph.store();
        let appended = store
            .write("append", |conn| {
                append_to_feed(conn, store.metrics(), reader, TweetId(42), Utc::now())
            })
            .unwrap();
        assert!(appended);
        assert_eq!(graph.feed(reader).unwrap(), vec![TweetId(42)]);
    }

    #[test]
    fn publish_rejects_blank_and_oversized_messages() {
        let mut cfg = FeedConfig::default();
        cfg.max_message_len = 5;
        let graph = FeedGraph::open_in_memory_with_config(&cfg).unwrap();
        let author = graph.create_user("author").unwrap();
        let err = graph.publish(author, "   ").unwrap_err();
        assert!(matches!(err, FeedGraphError::Validation(_)));
        let err = graph.publish(author, "too long").unwrap_err();
        assert!(matches!(err, FeedGraphError::Validation(_)));
        assert!(graph.publish(author, "short").is_ok());
    }
}
