//! The follow graph and its feeds.
//!
//! [`FeedGraph`] wires the repositories to one shared [`Store`] and is the
//! entry point callers use. Each repository can also be used on its own.

mod fanout;
mod follows;
mod tweets;
mod types;
mod users;

use std::path::Path;
use std::sync::Arc;

use crate::{
    config::FeedConfig,
    errors::FeedGraphError,
    ids::{TweetId, UserId},
    metrics::StoreMetricsSnapshot,
    safety::{ConsistencyReport, run_consistency_checks},
    store::Store,
};

pub use fanout::FeedEngine;
pub use follows::AdjacencyRepository;
pub use tweets::TweetStore;
pub use types::{Follow, FollowOutcome, Tweet, User, UserProfile};
pub use users::UserRepository;

/// Follow graph with fan-out-on-write feeds over a SQLite store.
///
/// Cloning is cheap; clones share the store and may be used from different
/// threads at the same time.
#[derive(Clone)]
pub struct FeedGraph {
    store: Arc<Store>,
    users: UserRepository,
    adjacency: AdjacencyRepository,
    tweets: TweetStore,
    feeds: FeedEngine,
}

impl FeedGraph {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FeedGraphError> {
        Self::open_with_config(path, &FeedConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        cfg: &FeedConfig,
    ) -> Result<Self, FeedGraphError> {
        let store = Store::open(path, cfg)?;
        Ok(Self::from_store(Arc::new(store), cfg))
    }

    pub fn open_in_memory() -> Result<Self, FeedGraphError> {
        Self::open_in_memory_with_config(&FeedConfig::default())
    }

    pub fn open_in_memory_with_config(cfg: &FeedConfig) -> Result<Self, FeedGraphError> {
        let store = Store::open_in_memory(cfg)?;
        Ok(Self::from_store(Arc::new(store), cfg))
    }

    pub fn from_store(store: Arc<Store>, cfg: &FeedConfig) -> Self {
        let tweets = TweetStore::new(Arc::clone(&store), cfg.max_message_len);
        Self {
            users: UserRepository::new(Arc::clone(&store)),
            adjacency: AdjacencyRepository::new(Arc::clone(&store), cfg.duplicate_follow),
            feeds: FeedEngine::new(Arc::clone(&store), tweets.clone()),
            tweets,
            store,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn adjacency(&self) -> &AdjacencyRepository {
        &self.adjacency
    }

    pub fn tweets(&self) -> &TweetStore {
        &self.tweets
    }

    pub fn feeds(&self) -> &FeedEngine {
        &self.feeds
    }

    // users

    pub fn create_user(&self, name: &str) -> Result<UserId, FeedGraphError> {
        self.users.create(name)
    }

    pub fn get_user(&self, id: UserId) -> Result<User, FeedGraphError> {
        self.users.get(id)
    }

    pub fn list_users(&self) -> Result<Vec<User>, FeedGraphError> {
        self.users.list()
    }

    pub fn rename_user(&self, id: UserId, name: &str) -> Result<(), FeedGraphError> {
        self.users.rename(id, name)
    }

    pub fn delete_user(&self, id: UserId) -> Result<(), FeedGraphError> {
        self.users.delete(id)
    }

    /// User record, followers, following and feed from a single snapshot.
    pub fn profile(&self, id: UserId) -> Result<UserProfile, FeedGraphError> {
        self.store.read("profile", |conn| {
            let user = users::fetch_user(conn, id)?;
            Ok(UserProfile {
                followers: follows::followers_of(conn, id)?,
                following: follows::following_of(conn, id)?,
                feed: fanout::feed_of(conn, id)?,
                user,
            })
        })
    }

    // follow graph

    pub fn follow(
        &self,
        follower: UserId,
        followed: UserId,
    ) -> Result<FollowOutcome, FeedGraphError> {
        self.adjacency.follow(follower, followed)
    }

    pub fn unfollow(&self, follower: UserId, followed: UserId) -> Result<bool, FeedGraphError> {
        self.adjacency.unfollow(follower, followed)
    }

    pub fn followers(&self, user: UserId) -> Result<Vec<UserId>, FeedGraphError> {
        self.adjacency.followers(user)
    }

    pub fn following(&self, user: UserId) -> Result<Vec<UserId>, FeedGraphError> {
        self.adjacency.following(user)
    }

    pub fn get_follow(
        &self,
        follower: UserId,
        followed: UserId,
    ) -> Result<Option<Follow>, FeedGraphError> {
        self.adjacency.get(follower, followed)
    }

    pub fn list_follows(&self) -> Result<Vec<Follow>, FeedGraphError> {
        self.adjacency.list()
    }

    // tweets and feeds

    pub fn publish(&self, author: UserId, message: &str) -> Result<TweetId, FeedGraphError> {
        self.feeds.publish(author, message)
    }

    pub fn feed(&self, user: UserId) -> Result<Vec<TweetId>, FeedGraphError> {
        self.feeds.feed(user)
    }

    pub fn get_tweet(&self, id: TweetId) -> Result<Tweet, FeedGraphError> {
        self.tweets.get(id)
    }

    pub fn list_tweets(&self) -> Result<Vec<Tweet>, FeedGraphError> {
        self.tweets.list()
    }

    pub fn list_tweets_by_author(&self, author: UserId) -> Result<Vec<Tweet>, FeedGraphError> {
        self.tweets.list_by_author(author)
    }

    pub fn update_tweet_message(&self, id: TweetId, message: &str) -> Result<Tweet, FeedGraphError> {
        self.tweets.update_message(id, message)
    }

    pub fn delete_tweet(&self, id: TweetId) -> Result<(), FeedGraphError> {
        self.tweets.delete(id)
    }

    // diagnostics

    pub fn metrics(&self) -> StoreMetricsSnapshot {
        self.store.metrics().snapshot()
    }

    pub fn check_consistency(&self) -> Result<ConsistencyReport, FeedGraphError> {
        run_consistency_checks(&self.store)
    }
}
