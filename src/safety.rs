use rusqlite::Connection;
use serde::Serialize;

use crate::{errors::FeedGraphError, ids::TweetId, store::Store};

/// Counts of records and of rows that break the graph/feed invariants.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub total_users: i64,
    pub total_follows: i64,
    pub total_tweets: i64,
    pub total_feed_entries: i64,
    pub self_follows: i64,
    pub orphan_follows: i64,
    pub duplicate_follows: i64,
    pub duplicate_feed_entries: i64,
    pub orphan_feed_owners: i64,
    /// Feed entries whose tweet was deleted. Expected after
    /// `delete_tweet`, so not counted as an issue.
    pub dangling_feed_tweets: Vec<TweetId>,
}

impl ConsistencyReport {
    pub fn has_issues(&self) -> bool {
        self.self_follows > 0
            || self.orphan_follows > 0
            || self.duplicate_follows > 0
            || self.duplicate_feed_entries > 0
            || self.orphan_feed_owners > 0
    }
}

/// Scans the whole store inside one read snapshot.
pub fn run_consistency_checks(store: &Store) -> Result<ConsistencyReport, FeedGraphError> {
    store.read("consistency_checks", |conn| {
        Ok(ConsistencyReport {
            total_users: query_single(conn, "SELECT COUNT(*) FROM users")?,
            total_follows: query_single(conn, "SELECT COUNT(*) FROM follows")?,
            total_tweets: query_single(conn, "SELECT COUNT(*) FROM tweets")?,
            total_feed_entries: query_single(conn, "SELECT COUNT(*) FROM feed_entries")?,
            self_follows: query_single(
                conn,
                "SELECT COUNT(*) FROM follows WHERE follower_id = followed_id",
            )?,
            orphan_follows: query_single(
                conn,
                "SELECT COUNT(*) FROM follows f \
                 LEFT JOIN users a ON a.id = f.follower_id \
                 LEFT JOIN users b ON b.id = f.followed_id \
                 WHERE a.id IS NULL OR b.id IS NULL",
            )?,
            duplicate_follows: query_single(
                conn,
                "SELECT COALESCE(SUM(cnt - 1), 0) FROM ( \
                     SELECT COUNT(*) AS cnt FROM follows \
                     GROUP BY follower_id, followed_id HAVING cnt > 1)",
            )?,
            duplicate_feed_entries: query_single(
                conn,
                "SELECT COALESCE(SUM(cnt - 1), 0) FROM ( \
                     SELECT COUNT(*) AS cnt FROM feed_entries \
                     GROUP BY user_id, tweet_id HAVING cnt > 1)",
            )?,
            orphan_feed_owners: query_single(
                conn,
                "SELECT COUNT(*) FROM feed_entries e \
                 LEFT JOIN users u ON u.id = e.user_id WHERE u.id IS NULL",
            )?,
            dangling_feed_tweets: dangling_feed_tweets(conn)?,
        })
    })
}

fn dangling_feed_tweets(conn: &Connection) -> Result<Vec<TweetId>, FeedGraphError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT DISTINCT e.tweet_id FROM feed_entries e \
             LEFT JOIN tweets t ON t.id = e.tweet_id \
             WHERE t.id IS NULL ORDER BY e.tweet_id",
        )
        .map_err(FeedGraphError::store)?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(FeedGraphError::store)?;
    let mut ids = Vec::new();
    for id in rows {
        ids.push(id.map_err(FeedGraphError::store)?);
    }
    Ok(ids)
}

fn query_single(conn: &Connection, sql: &str) -> Result<i64, FeedGraphError> {
    conn.query_row(sql, [], |row| row.get(0))
        .map_err(FeedGraphError::store)
}
