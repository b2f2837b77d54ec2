//! Follow graph with fan-out-on-write feeds, embedded on SQLite.
//!
//! feedgraph keeps a directed "who follows whom" graph and a materialized
//! feed of tweet ids per user. Publishing a tweet appends its id to the feed
//! of every current follower of the author in the same transaction that
//! creates the tweet.
//!
//! # Guarantees
//!
//! - `follows(a, b)` holds exactly when `b` is in `following(a)` and `a` is in
//!   `followers(b)`; no edge exists twice and nobody follows themselves.
//! - A feed holds a tweet exactly when its owner followed the author at the
//!   moment the tweet was published. Later follows do not backfill and later
//!   unfollows do not remove delivered entries.
//! - Every feed entry is unique, and feeds keep delivery order.
//! - Every multi-row mutation runs in one transaction holding SQLite's write
//!   lock; on any error nothing is written.
//!
//! # Quick Start
//!
//! ```rust
//! use feedgraph::FeedGraph;
//!
//! let graph = FeedGraph::open_in_memory()?;
//! let alice = graph.create_user("alice")?;
//! let bob = graph.create_user("bob")?;
//! graph.follow(bob, alice)?;
//!
//! let tweet = graph.publish(alice, "hello")?;
//! assert_eq!(graph.feed(bob)?, vec![tweet]);
//! assert!(graph.feed(alice)?.is_empty());
//! # Ok::<(), feedgraph::FeedGraphError>(())
//! ```

pub mod config;
pub mod errors;
pub mod fault_injection;
pub mod graph;
pub mod metrics;
pub mod safety;
pub mod schema;
pub mod store;

mod ids;

pub use config::{
    BootstrapPolicy, DuplicateFollowPolicy, FeedConfig, RetryPolicy, SqliteConfig, open_feed_graph,
};
pub use errors::FeedGraphError;
pub use graph::{
    AdjacencyRepository, FeedEngine, FeedGraph, Follow, FollowOutcome, Tweet, TweetStore, User,
    UserProfile, UserRepository,
};
pub use ids::{TweetId, UserId};
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use safety::{ConsistencyReport, run_consistency_checks};
pub use store::{Store, TransactionGuard, TransactionMode};
