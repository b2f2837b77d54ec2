//! Follow edges and the follower/following views derived from them.
//!
//! The `follows` row is the edge. Both directional lists are read from that
//! one table, so creating or removing the row updates `following(follower)`
//! and `followers(followed)` in the same statement and they cannot diverge.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

use crate::{
    config::DuplicateFollowPolicy,
    errors::FeedGraphError,
    fault_injection::{self, FaultPoint},
    ids::UserId,
    store::Store,
};

use super::{
    types::{Follow, FollowOutcome, row_to_follow, validate_user_id},
    users::{ensure_user_found, require_user},
};

#[derive(Clone)]
pub struct AdjacencyRepository {
    store: Arc<Store>,
    policy: DuplicateFollowPolicy,
}

impl AdjacencyRepository {
    pub fn new(store: Arc<Store>, policy: DuplicateFollowPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> DuplicateFollowPolicy {
        self.policy
    }

    /// Makes `follower` follow `followed`.
    ///
    /// A repeated request never duplicates the edge: under
    /// [`DuplicateFollowPolicy::Ignore`] it reports
    /// [`FollowOutcome::AlreadyFollowing`], under `Reject` it fails with
    /// [`FeedGraphError::Conflict`].
    #[instrument(skip(self))]
    pub fn follow(
        &self,
        follower: UserId,
        followed: UserId,
    ) -> Result<FollowOutcome, FeedGraphError> {
        validate_edge(follower, followed)?;
        let policy = self.policy;
        let outcome = self.store.write("follow", |conn| {
            require_user(conn, follower, "follower")?;
            require_user(conn, followed, "followed user")?;
            let now = Utc::now();
            let inserted = conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO follows(follower_id, followed_id, created_at) \
                     VALUES(?1, ?2, ?3)",
                )
                .and_then(|mut stmt| stmt.execute(params![follower, followed, now]))
                .map_err(FeedGraphError::store)?;
            if inserted == 0 {
                let existing = fetch_follow(conn, follower, followed)?.ok_or_else(|| {
                    FeedGraphError::fatal(format!(
                        "edge {follower}->{followed} ignored on insert but not readable"
                    ))
                })?;
                return match policy {
                    DuplicateFollowPolicy::Ignore => Ok(FollowOutcome::AlreadyFollowing(existing)),
                    DuplicateFollowPolicy::Reject => Err(FeedGraphError::conflict(format!(
                        "user {follower} already follows user {followed}"
                    ))),
                };
            }
            fault_injection::check_fault(FaultPoint::FollowBeforeCommit)?;
            Ok(FollowOutcome::Created(Follow {
                follower_id: follower,
                followed_id: followed,
                created_at: now,
            }))
        })?;
        debug!(created = outcome.is_created(), "follow applied");
        Ok(outcome)
    }

    /// Removes the edge if present. Returns whether anything was removed.
    /// Feed entries already delivered from `followed` stay in place.
    #[instrument(skip(self))]
    pub fn unfollow(&self, follower: UserId, followed: UserId) -> Result<bool, FeedGraphError> {
        validate_user_id(follower, "follower")?;
        validate_user_id(followed, "followed user")?;
        self.store.write("unfollow", |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM follows WHERE follower_id=?1 AND followed_id=?2",
                    params![follower, followed],
                )
                .map_err(FeedGraphError::store)?;
            Ok(removed > 0)
        })
    }

    pub fn followers(&self, user: UserId) -> Result<Vec<UserId>, FeedGraphError> {
        self.store.read("followers", |conn| {
            ensure_user_found(conn, user)?;
            followers_of(conn, user)
        })
    }

    pub fn following(&self, user: UserId) -> Result<Vec<UserId>, FeedGraphError> {
        self.store.read("following", |conn| {
            ensure_user_found(conn, user)?;
            following_of(conn, user)
        })
    }

    pub fn get(&self, follower: UserId, followed: UserId) -> Result<Option<Follow>, FeedGraphError> {
        self.store
            .read("get_follow", |conn| fetch_follow(conn, follower, followed))
    }

    pub fn is_following(&self, follower: UserId, followed: UserId) -> Result<bool, FeedGraphError> {
        Ok(self.get(follower, followed)?.is_some())
    }

    pub fn list(&self) -> Result<Vec<Follow>, FeedGraphError> {
        self.store.read("list_follows", |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT follower_id, followed_id, created_at FROM follows \
                     ORDER BY follower_id, followed_id",
                )
                .map_err(FeedGraphError::store)?;
            let rows = stmt
                .query_map([], row_to_follow)
                .map_err(FeedGraphError::store)?;
            let mut follows = Vec::new();
            for follow in rows {
                follows.push(follow.map_err(FeedGraphError::store)?);
            }
            Ok(follows)
        })
    }
}

pub(crate) fn followers_of(conn: &Connection, user: UserId) -> Result<Vec<UserId>, FeedGraphError> {
    collect_ids(
        conn,
        "SELECT follower_id FROM follows WHERE followed_id=?1 ORDER BY follower_id",
        user,
    )
}

pub(crate) fn following_of(conn: &Connection, user: UserId) -> Result<Vec<UserId>, FeedGraphError> {
    collect_ids(
        conn,
        "SELECT followed_id FROM follows WHERE follower_id=?1 ORDER BY followed_id",
        user,
    )
}

pub(crate) fn fetch_follow(
    conn: &Connection,
    follower: UserId,
    followed: UserId,
) -> Result<Option<Follow>, FeedGraphError> {
    conn.prepare_cached(
        "SELECT follower_id, followed_id, created_at FROM follows \
         WHERE follower_id=?1 AND followed_id=?2",
    )
    .and_then(|mut stmt| {
        stmt.query_row(params![follower, followed], row_to_follow)
            .optional()
    })
    .map_err(FeedGraphError::store)
}

fn collect_ids(conn: &Connection, sql: &str, id: UserId) -> Result<Vec<UserId>, FeedGraphError> {
    let mut stmt = conn.prepare_cached(sql).map_err(FeedGraphError::store)?;
    let rows = stmt
        .query_map(params![id], |row| row.get(0))
        .map_err(FeedGraphError::store)?;
    let mut result = Vec::new();
    for item in rows {
        result.push(item.map_err(FeedGraphError::store)?);
    }
    Ok(result)
}

fn validate_edge(follower: UserId, followed: UserId) -> Result<(), FeedGraphError> {
    validate_user_id(follower, "follower")?;
    validate_user_id(followed, "followed user")?;
    if follower == followed {
        return Err(FeedGraphError::validation(format!(
            "user {follower} cannot follow themselves"
        )));
    }
    Ok(())
}
