use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::FeedGraphError,
    ids::{TweetId, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user together with the three derived collections, read in one
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: User,
    pub followers: Vec<UserId>,
    pub following: Vec<UserId>,
    pub feed: Vec<TweetId>,
}

/// Directed edge: `follower_id` follows `followed_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: UserId,
    pub followed_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowOutcome {
    Created(Follow),
    /// The edge already existed; nothing was written.
    AlreadyFollowing(Follow),
}

impl FollowOutcome {
    pub fn follow(&self) -> &Follow {
        match self {
            FollowOutcome::Created(follow) | FollowOutcome::AlreadyFollowing(follow) => follow,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, FollowOutcome::Created(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub author_id: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn row_to_follow(row: &rusqlite::Row<'_>) -> Result<Follow, rusqlite::Error> {
    Ok(Follow {
        follower_id: row.get(0)?,
        followed_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn row_to_tweet(row: &rusqlite::Row<'_>) -> Result<Tweet, rusqlite::Error> {
    Ok(Tweet {
        id: row.get(0)?,
        author_id: row.get(1)?,
        message: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub(crate) fn validate_user_id(id: UserId, role: &str) -> Result<(), FeedGraphError> {
    if id.0 <= 0 {
        return Err(FeedGraphError::validation(format!(
            "{role} id must be positive, got {id}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<(), FeedGraphError> {
    if name.trim().is_empty() {
        return Err(FeedGraphError::validation("user name must be set"));
    }
    Ok(())
}

pub(crate) fn validate_message(message: &str, max_len: usize) -> Result<(), FeedGraphError> {
    if message.trim().is_empty() {
        return Err(FeedGraphError::validation("tweet message must be set"));
    }
    let len = message.chars().count();
    if len > max_len {
        return Err(FeedGraphError::validation(format!(
            "tweet message is {len} characters, limit is {max_len}"
        )));
    }
    Ok(())
}
