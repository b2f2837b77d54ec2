//! Configuration for the store, transaction retries and write policies.
//!
//! Defaults are tuned for an embedded deployment: a small connection pool,
//! a generous busy timeout and a handful of transaction retries.

use std::collections::HashMap;
use std::path::Path;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::{FeedGraph, FeedGraphError};

/// What a repeated follow request does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateFollowPolicy {
    /// Leave the existing edge untouched and report `AlreadyFollowing`.
    #[default]
    Ignore,
    /// Fail with [`FeedGraphError::Conflict`].
    Reject,
}

/// SQLite connection options.
///
/// # Default Configuration
///
/// ```rust
/// use feedgraph::SqliteConfig;
/// let config = SqliteConfig::default();
/// assert_eq!(config.pool_size, 4);
/// assert!(config.pragma_settings.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// Connections kept open for file-backed stores. In-memory stores
    /// always use a single connection.
    pub pool_size: usize,

    /// How long a connection waits on SQLite's write lock before the
    /// attempt surfaces as [`FeedGraphError::Transient`].
    pub busy_timeout: Duration,

    /// Prepared statement cache capacity per connection.
    pub cache_size: usize,

    /// Additional PRAGMA settings applied to every pooled connection
    /// after the built-in ones.
    ///
    /// ```rust
    /// use feedgraph::FeedConfig;
    ///
    /// let mut cfg = FeedConfig::default();
    /// cfg.sqlite.pragma_settings.insert("cache_size".to_string(), "-16000".to_string());
    /// ```
    pub pragma_settings: HashMap<String, String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout: Duration::from_secs(5),
            cache_size: 128,
            pragma_settings: HashMap::new(),
        }
    }
}

/// Retry policy for whole transactions that failed with a transient error.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly per attempt.
    pub base_delay: Duration,
    /// Upper bound of the random jitter added to every delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let linear = self.base_delay.saturating_mul(attempt);
        if self.jitter.is_zero() {
            return linear;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_micros() as u64);
        linear + Duration::from_micros(extra)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
        }
    }
}

/// Complete configuration for a [`FeedGraph`].
///
/// ```rust
/// use feedgraph::{DuplicateFollowPolicy, FeedConfig};
///
/// let cfg = FeedConfig::default();
/// assert_eq!(cfg.duplicate_follow, DuplicateFollowPolicy::Ignore);
/// assert_eq!(cfg.max_message_len, 280);
/// ```
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub sqlite: SqliteConfig,
    pub retry: RetryPolicy,
    pub duplicate_follow: DuplicateFollowPolicy,
    /// Longest accepted tweet message, counted in characters.
    pub max_message_len: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sqlite: SqliteConfig::default(),
            retry: RetryPolicy::default(),
            duplicate_follow: DuplicateFollowPolicy::default(),
            max_message_len: 280,
        }
    }
}

/// How hard process startup tries to open the store before giving up.
#[derive(Clone, Debug)]
pub struct BootstrapPolicy {
    pub max_attempts: u32,
    /// Sleep after failed attempt `n` is `n * step`.
    pub step: Duration,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            step: Duration::from_secs(1),
        }
    }
}

/// Opens a file-backed graph, retrying with increasing backoff.
///
/// Returns the error of the last attempt once `bootstrap.max_attempts` is
/// exhausted.
pub fn open_feed_graph<P: AsRef<Path>>(
    path: P,
    cfg: &FeedConfig,
    bootstrap: &BootstrapPolicy,
) -> Result<FeedGraph, FeedGraphError> {
    let path = path.as_ref();
    let attempts = bootstrap.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match FeedGraph::open_with_config(path, cfg) {
            Ok(graph) => {
                info!(path = %path.display(), attempt, "feed store opened");
                return Ok(graph);
            }
            Err(err) => {
                warn!(attempt, attempts, error = %err, "could not open feed store");
                last_err = Some(err);
                if attempt < attempts {
                    thread::sleep(bootstrap.step.saturating_mul(attempt));
                }
            }
        }
    }
    let err = last_err.unwrap_or_else(|| FeedGraphError::fatal("no open attempt was made"));
    Err(FeedGraphError::fatal(format!(
        "failed to open feed store after {attempts} attempts: {err}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_feed_config_default() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.sqlite.pool_size, 4);
        assert_eq!(cfg.sqlite.busy_timeout, Duration::from_secs(5));
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.duplicate_follow, DuplicateFollowPolicy::Ignore);
    }

    #[test]
    fn test_backoff_grows_linearly_without_jitter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(3), Duration::from_millis(30));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for attempt in 1..=4 {
            let delay = policy.backoff(attempt);
            let floor = policy.base_delay * attempt;
            assert!(delay >= floor);
            assert!(delay <= floor + policy.jitter);
        }
    }

    #[test]
    fn test_open_feed_graph_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.db");
        let graph = open_feed_graph(&path, &FeedConfig::default(), &BootstrapPolicy::default());
        assert!(graph.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_open_feed_graph_gives_up_after_bounded_attempts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("feed.db");
        let bootstrap = BootstrapPolicy {
            max_attempts: 2,
            step: Duration::from_millis(1),
        };
        let err = open_feed_graph(&path, &FeedConfig::default(), &bootstrap)
            .err()
            .expect("missing directory cannot be opened");
        assert!(matches!(err, FeedGraphError::Fatal(_)));
        assert!(err.to_string().contains("after 2 attempts"));
    }
}
