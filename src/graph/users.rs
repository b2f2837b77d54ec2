//! User records and the existence checks other repositories rely on.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

use crate::{errors::FeedGraphError, ids::UserId, store::Store};

use super::types::{User, row_to_user, validate_name};

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<Store>,
}

impl UserRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub fn create(&self, name: &str) -> Result<UserId, FeedGraphError> {
        validate_name(name)?;
        let id = self.store.write("create_user", |conn| {
            conn.execute(
                "INSERT INTO users(name, created_at) VALUES(?1, ?2)",
                params![name, Utc::now()],
            )
            .map_err(FeedGraphError::store)?;
            Ok(UserId(conn.last_insert_rowid()))
        })?;
        debug!(%id, "user created");
        Ok(id)
    }

    pub fn get(&self, id: UserId) -> Result<User, FeedGraphError> {
        self.store.read("get_user", |conn| fetch_user(conn, id))
    }

    pub fn list(&self) -> Result<Vec<User>, FeedGraphError> {
        self.store.read("list_users", |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT id, name, created_at FROM users ORDER BY id")
                .map_err(FeedGraphError::store)?;
            let rows = stmt
                .query_map([], row_to_user)
                .map_err(FeedGraphError::store)?;
            let mut users = Vec::new();
            for user in rows {
                users.push(user.map_err(FeedGraphError::store)?);
            }
            Ok(users)
        })
    }

    pub fn rename(&self, id: UserId, name: &str) -> Result<(), FeedGraphError> {
        validate_name(name)?;
        self.store.write("rename_user", |conn| {
            let affected = conn
                .execute("UPDATE users SET name=?1 WHERE id=?2", params![name, id])
                .map_err(FeedGraphError::store)?;
            if affected == 0 {
                return Err(FeedGraphError::not_found(format!("user {id}")));
            }
            Ok(())
        })
    }

    /// Deletes the user, every edge touching them, their feed and their
    /// tweets in one transaction. Other feeds keep the ids of the deleted
    /// tweets.
    #[instrument(skip(self))]
    pub fn delete(&self, id: UserId) -> Result<(), FeedGraphError> {
        self.store.write("delete_user", |conn| {
            if !user_exists(conn, id)? {
                return Err(FeedGraphError::not_found(format!("user {id}")));
            }
            for sql in [
                "DELETE FROM follows WHERE follower_id=?1 OR followed_id=?1",
                "DELETE FROM feed_entries WHERE user_id=?1",
                "DELETE FROM tweets WHERE author_id=?1",
                "DELETE FROM users WHERE id=?1",
            ] {
                conn.execute(sql, params![id])
                    .map_err(FeedGraphError::store)?;
            }
            Ok(())
        })
    }

    pub fn exists(&self, id: UserId) -> Result<bool, FeedGraphError> {
        self.store.read("user_exists", |conn| user_exists(conn, id))
    }
}

pub(crate) fn fetch_user(conn: &Connection, id: UserId) -> Result<User, FeedGraphError> {
    conn.query_row(
        "SELECT id, name, created_at FROM users WHERE id=?1",
        params![id],
        row_to_user,
    )
    .map_err(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => FeedGraphError::not_found(format!("user {id}")),
        other => FeedGraphError::store(other),
    })
}

pub(crate) fn user_exists(conn: &Connection, id: UserId) -> Result<bool, FeedGraphError> {
    let exists: Option<i64> = conn
        .prepare_cached("SELECT 1 FROM users WHERE id=?1")
        .and_then(|mut stmt| stmt.query_row(params![id], |row| row.get(0)).optional())
        .map_err(FeedGraphError::store)?;
    Ok(exists.is_some())
}

/// Existence check for ids a mutation refers to; a missing user is a
/// validation failure, not a lookup miss.
pub(crate) fn require_user(conn: &Connection, id: UserId, role: &str) -> Result<(), FeedGraphError> {
    if !user_exists(conn, id)? {
        return Err(FeedGraphError::validation(format!(
            "{role} {id} does not exist"
        )));
    }
    Ok(())
}

/// Lookup-side existence check.
pub(crate) fn ensure_user_found(conn: &Connection, id: UserId) -> Result<(), FeedGraphError> {
    if !user_exists(conn, id)? {
        return Err(FeedGraphError::not_found(format!("user {id}")));
    }
    Ok(())
}
