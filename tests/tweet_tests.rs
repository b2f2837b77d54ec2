use feedgraph::{FeedGraph, FeedGraphError, TweetId};

#[test]
fn test_get_tweet_roundtrip() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let id = graph.publish(author, "first post").unwrap();
    let tweet = graph.get_tweet(id).expect("tweet");
    assert_eq!(tweet.id, id);
    assert_eq!(tweet.author_id, author);
    assert_eq!(tweet.message, "first post");
    assert!(tweet.updated_at.is_none());
}

#[test]
fn test_tweet_ids_increase_monotonically() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let ids: Vec<_> = (0..4)
        .map(|n| graph.publish(author, &format!("post {n}")).unwrap())
        .collect();
    assert_eq!(ids, vec![TweetId(1), TweetId(2), TweetId(3), TweetId(4)]);
}

#[test]
fn test_list_tweets_newest_first() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let a = graph.create_user("a").unwrap();
    let b = graph.create_user("b").unwrap();
    let first = graph.publish(a, "one").unwrap();
    let second = graph.publish(b, "two").unwrap();
    let third = graph.publish(a, "three").unwrap();
    let listed: Vec<_> = graph.list_tweets().unwrap().into_iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![third, second, first]);

    let by_a: Vec<_> = graph
        .list_tweets_by_author(a)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(by_a, vec![third, first]);
}

#[test]
fn test_update_message_keeps_creation_time_and_feed_position() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let reader = graph.create_user("reader").unwrap();
    graph.follow(reader, author).unwrap();
    let first = graph.publish(author, "orignal").unwrap();
    let second = graph.publish(author, "next").unwrap();
    let before = graph.get_tweet(first).unwrap();

    let updated = graph.update_tweet_message(first, "original").expect("update");

    assert_eq!(updated.message, "original");
    assert_eq!(updated.created_at, before.created_at);
    assert!(updated.updated_at.is_some());
    assert_eq!(graph.feed(reader).unwrap(), vec![first, second]);
    let listed: Vec<_> = graph.list_tweets().unwrap().into_iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![second, first]);
}

#[test]
fn test_update_missing_tweet_is_not_found() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let err = graph
        .update_tweet_message(TweetId(9), "nothing here")
        .expect_err("missing");
    assert!(matches!(err, FeedGraphError::NotFound(_)));
}

#[test]
fn test_update_validates_message() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let id = graph.publish(author, "fine").unwrap();
    let err = graph.update_tweet_message(id, "").expect_err("blank");
    assert!(matches!(err, FeedGraphError::Validation(_)));
    let long = "x".repeat(281);
    let err = graph.update_tweet_message(id, &long).expect_err("too long");
    assert!(matches!(err, FeedGraphError::Validation(_)));
    assert_eq!(graph.get_tweet(id).unwrap().message, "fine");
}

#[test]
fn test_message_limit_counts_characters() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let accented = "é".repeat(280);
    assert!(graph.publish(author, &accented).is_ok());
}

#[test]
fn test_delete_tweet() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let id = graph.publish(author, "bye").unwrap();
    graph.delete_tweet(id).expect("delete");
    assert!(graph.list_tweets().unwrap().is_empty());
    let err = graph.delete_tweet(id).expect_err("already deleted");
    assert!(matches!(err, FeedGraphError::NotFound(_)));
}

#[test]
fn test_tweet_serializes_with_plain_ids() {
    let graph = FeedGraph::open_in_memory().unwrap();
    let author = graph.create_user("author").unwrap();
    let id = graph.publish(author, "json").unwrap();
    let value = serde_json::to_value(graph.get_tweet(id).unwrap()).unwrap();
    assert_eq!(value["id"], serde_json::json!(id.as_i64()));
    assert_eq!(value["author_id"], serde_json::json!(author.as_i64()));
    assert_eq!(value["message"], "json");
    assert!(value["updated_at"].is_null());
}
