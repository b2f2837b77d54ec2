use feedgraph::{FeedGraph, FeedGraphError, TweetId, UserId};

fn users(graph: &FeedGraph, names: &[&str]) -> Vec<UserId> {
    names
        .iter()
        .map(|name| graph.create_user(name).expect("user"))
        .collect()
}

#[test]
fn test_publish_delivers_to_every_follower() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["u1", "u2", "u3"]);
    graph.follow(ids[1], ids[0]).unwrap();
    graph.follow(ids[2], ids[0]).unwrap();

    let tweet = graph.publish(ids[0], "hello").expect("publish");

    assert_eq!(graph.feed(ids[1]).unwrap(), vec![tweet]);
    assert_eq!(graph.feed(ids[2]).unwrap(), vec![tweet]);
    assert!(graph.feed(ids[0]).unwrap().is_empty());
    let stored = graph.get_tweet(tweet).unwrap();
    assert_eq!(stored.author_id, ids[0]);
    assert_eq!(stored.message, "hello");
}

#[test]
fn test_publish_without_followers_still_creates_tweet() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["lonely", "other"]);
    let tweet = graph.publish(ids[0], "anyone?").expect("publish");
    assert_eq!(graph.get_tweet(tweet).unwrap().id, tweet);
    assert!(graph.feed(ids[0]).unwrap().is_empty());
    assert!(graph.feed(ids[1]).unwrap().is_empty());
    assert_eq!(graph.metrics().feed_appends, 0);
}

#[test]
fn test_publish_by_unknown_author_is_rejected() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let err = graph.publish(UserId(12), "ghost").expect_err("missing author");
    assert!(matches!(err, FeedGraphError::Validation(_)));
    assert!(graph.list_tweets().unwrap().is_empty());
}

#[test]
fn test_author_never_receives_own_tweet() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["author", "fan"]);
    graph.follow(ids[1], ids[0]).unwrap();
    graph.follow(ids[0], ids[1]).unwrap();
    let tweet = graph.publish(ids[0], "mine").unwrap();
    assert!(!graph.feed(ids[0]).unwrap().contains(&tweet));
    assert_eq!(graph.feed(ids[1]).unwrap(), vec![tweet]);
}

#[test]
fn test_later_follow_does_not_backfill() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["author", "late"]);
    let early = graph.publish(ids[0], "before").unwrap();
    graph.follow(ids[1], ids[0]).unwrap();
    let later = graph.publish(ids[0], "after").unwrap();
    assert_eq!(graph.feed(ids[1]).unwrap(), vec![later]);
    assert!(!graph.feed(ids[1]).unwrap().contains(&early));
}

#[test]
fn test_unfollow_stops_future_delivery_and_keeps_history() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["author", "reader"]);
    graph.follow(ids[1], ids[0]).unwrap();
    let kept = graph.publish(ids[0], "first").unwrap();
    graph.unfollow(ids[1], ids[0]).unwrap();
    let missed = graph.publish(ids[0], "second").unwrap();
    let feed = graph.feed(ids[1]).unwrap();
    assert_eq!(feed, vec![kept]);
    assert!(!feed.contains(&missed));
}

#[test]
fn test_feed_preserves_delivery_order_across_authors() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["a", "b", "reader"]);
    graph.follow(ids[2], ids[0]).unwrap();
    graph.follow(ids[2], ids[1]).unwrap();
    let expected: Vec<TweetId> = vec![
        graph.publish(ids[0], "a1").unwrap(),
        graph.publish(ids[1], "b1").unwrap(),
        graph.publish(ids[0], "a2").unwrap(),
        graph.publish(ids[1], "b2").unwrap(),
    ];
    assert_eq!(graph.feed(ids[2]).unwrap(), expected);
}

#[test]
fn test_deleted_tweet_stays_in_feed_as_dangling_id() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["author", "reader"]);
    graph.follow(ids[1], ids[0]).unwrap();
    let tweet = graph.publish(ids[0], "soon gone").unwrap();
    graph.delete_tweet(tweet).unwrap();
    assert_eq!(graph.feed(ids[1]).unwrap(), vec![tweet]);
    let err = graph.get_tweet(tweet).expect_err("deleted");
    assert!(matches!(err, FeedGraphError::NotFound(_)));
    let report = graph.check_consistency().unwrap();
    assert_eq!(report.dangling_feed_tweets, vec![tweet]);
    assert!(!report.has_issues());
}

#[test]
fn test_feed_of_unknown_user_is_not_found() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let err = graph.feed(UserId(3)).expect_err("missing");
    assert!(matches!(err, FeedGraphError::NotFound(_)));
}

#[test]
fn test_publish_metrics_count_appends() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let ids = users(&graph, &["author", "r1", "r2", "r3"]);
    for &reader in &ids[1..] {
        graph.follow(reader, ids[0]).unwrap();
    }
    graph.store().metrics().reset();
    graph.publish(ids[0], "count me").unwrap();
    let snapshot = graph.metrics();
    assert_eq!(snapshot.feed_appends, 3);
    assert_eq!(snapshot.duplicate_deliveries, 0);
    assert_eq!(snapshot.tx_commit_count, 1);
}
