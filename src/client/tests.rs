use std::sync::Arc;

use super::pubsub_client::Client;
use crate::broker::{Message, Subscriber, Subscription, Topic, filter};
use tokio::sync::mpsc;

fn message(content: &str) -> Message {
    Message::builder(Topic::new("news").unwrap())
        .content(content)
        .build()
}

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::unbounded_channel::<Message>();
    let client = Client::new(tx);
    assert!(client.id.starts_with("client-"));
    assert_eq!(client.id(), client.id.as_str());
}

#[test]
fn test_client_notify_forwards_to_channel() {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client = Client::with_id("c1", tx);

    client.notify(&message("hello")).unwrap();

    let received = rx.try_recv().unwrap();
    assert_eq!(received.content(), "hello");
}

#[test]
fn test_client_notify_fails_on_closed_channel() {
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let client = Client::with_id("c1", tx);

    // Drop the receiver to close the channel
    drop(rx);

    let err = client.notify(&message("hello")).unwrap_err();
    assert_eq!(err.subscriber, "c1");
}

#[test]
fn test_client_subscriptions_are_independent() {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client = Arc::new(Client::with_id("c1", tx));

    let news = Subscription::new(
        Topic::new("news").unwrap(),
        client.clone(),
        Some(filter::from_fn(|m| m.content() == "keep")),
    );
    let sport = Subscription::new(Topic::new("sport").unwrap(), client.clone(), None);

    assert!(news.accept(&message("keep")));
    assert!(!news.accept(&message("drop")));
    assert!(sport.accept(&message("drop")));

    news.end();
    news.end();
    assert!(news.is_ended());
    assert!(!sport.is_ended());

    sport.notify(&message("still here")).unwrap();
    assert_eq!(rx.try_recv().unwrap().content(), "still here");
}
