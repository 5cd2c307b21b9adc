use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{DispatchExecutor, DispatchOutcome, MutationExecutor, WorkerPool};
use crate::broker::filter::{self, Operator};
use crate::broker::registry::{Registry, SubscriptionRef};
use crate::broker::{Message, Subscriber, Subscription, Topic};
use crate::utils::{BrokerError, DeliveryError};

#[derive(Clone, Copy)]
enum Mode {
    Record,
    Fail,
    Panic,
}

struct Peer {
    id: String,
    mode: Mode,
    received: Mutex<Vec<Message>>,
    releases: AtomicUsize,
}

impl Peer {
    fn new(id: &str, mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            mode,
            received: Mutex::new(Vec::new()),
            releases: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Subscriber for Peer {
    fn id(&self) -> &str {
        &self.id
    }

    fn notify(&self, message: &Message) -> Result<(), DeliveryError> {
        match self.mode {
            Mode::Record => {
                self.received.lock().unwrap().push(message.clone());
                Ok(())
            }
            Mode::Fail => Err(DeliveryError::new(&self.id, "peer went away")),
            Mode::Panic => panic!("notify exploded"),
        }
    }

    fn release(&self, _topic: &Topic) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn topic(name: &str) -> Topic {
    Topic::new(name).unwrap()
}

fn message(topic_name: &str, price: i32) -> Message {
    Message::builder(topic(topic_name))
        .property("price", price)
        .build()
}

fn register(registry: &Registry, t: &Topic, peer: &Arc<Peer>) -> SubscriptionRef {
    let sub = Arc::new(Subscription::new(t.clone(), peer.clone(), None));
    registry.put(sub.clone());
    sub
}

#[test]
fn test_pool_rejects_zero_parallelism() {
    assert!(matches!(
        WorkerPool::new("test", 0),
        Err(BrokerError::Validation(_))
    ));
}

#[tokio::test]
async fn test_pool_runs_submitted_work() {
    let pool = WorkerPool::new("test", 2).unwrap();
    let completion = pool.submit(async { 21 * 2 }).unwrap();
    assert_eq!(completion.await.unwrap(), 42);
}

#[tokio::test]
async fn test_pool_work_runs_off_the_caller_thread() {
    let pool = WorkerPool::new("test", 1).unwrap();
    let caller = std::thread::current().id();
    let worker = pool
        .submit(async { std::thread::current().id() })
        .unwrap()
        .await
        .unwrap();
    assert_ne!(caller, worker);
}

#[test]
fn test_completion_wait_from_plain_thread() {
    let pool = WorkerPool::new("test", 1).unwrap();
    let completion = pool.submit(async { "done" }).unwrap();
    assert_eq!(completion.wait().unwrap(), "done");
}

#[tokio::test]
async fn test_panicking_unit_reports_worker_panicked() {
    let pool = WorkerPool::new("test", 1).unwrap();
    let completion = pool
        .submit(async {
            panic!("boom");
        })
        .unwrap();

    match completion.await {
        Err(BrokerError::WorkerPanicked(reason)) => assert_eq!(reason, "boom"),
        other => panic!("unexpected result: {other:?}"),
    }

    // the pool survives a panicking unit
    assert_eq!(pool.submit(async { 1 }).unwrap().await.unwrap(), 1);
}

#[tokio::test]
async fn test_shutdown_rejects_new_work() {
    let pool = WorkerPool::new("test", 1).unwrap();
    pool.shutdown(Duration::from_millis(100)).await;

    assert!(!pool.is_accepting());
    assert!(matches!(pool.submit(async {}), Err(BrokerError::ShutDown)));

    // second shutdown is a no-op
    pool.shutdown(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_work() {
    let pool = WorkerPool::new("test", 1).unwrap();
    let finished = Arc::new(AtomicBool::new(false));

    let flag = finished.clone();
    let completion = pool
        .submit(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    pool.shutdown(Duration::from_secs(5)).await;

    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(pool.in_flight(), 0);
    assert!(completion.await.is_ok());
}

#[tokio::test]
async fn test_shutdown_cancels_work_past_the_grace_period() {
    let pool = WorkerPool::new("test", 1).unwrap();
    let completion = pool
        .submit(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        })
        .unwrap();

    pool.shutdown(Duration::from_millis(50)).await;

    let result = tokio::time::timeout(Duration::from_secs(5), completion)
        .await
        .expect("cancelled unit should resolve promptly");
    assert!(matches!(result, Err(BrokerError::Cancelled)));
}

#[tokio::test]
async fn test_dispatch_without_subscribers_drops_message() {
    let registry = Arc::new(Registry::new());
    let dispatcher = DispatchExecutor::new(registry, 2).unwrap();

    let outcome = dispatcher.publish(message("t1", 1)).unwrap().await.unwrap();
    assert_eq!(outcome, DispatchOutcome::default());
}

#[tokio::test]
async fn test_dispatch_counts_each_recipient() {
    let registry = Arc::new(Registry::new());
    let t1 = topic("t1");
    let plain = Peer::new("plain", Mode::Record);
    let picky = Peer::new("picky", Mode::Record);
    let broken = Peer::new("broken", Mode::Fail);

    register(&registry, &t1, &plain);
    let picky_sub = register(&registry, &t1, &picky);
    picky_sub.set_filter(Some(filter::by_int(Operator::Greater, "price", 100)));
    register(&registry, &t1, &broken);

    let dispatcher = DispatchExecutor::new(registry.clone(), 4).unwrap();
    let outcome = dispatcher.publish(message("t1", 5)).unwrap().await.unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome {
            attempted: 3,
            delivered: 1,
            rejected: 1,
            failed: 1,
        }
    );
    assert_eq!(plain.count(), 1);
    assert_eq!(picky.count(), 0);
}

#[tokio::test]
async fn test_dispatch_failure_ends_only_that_topic() {
    let registry = Arc::new(Registry::new());
    let (t1, t2) = (topic("t1"), topic("t2"));
    let broken = Peer::new("broken", Mode::Fail);
    let on_t1 = register(&registry, &t1, &broken);
    let on_t2 = register(&registry, &t2, &broken);

    let dispatcher = DispatchExecutor::new(registry.clone(), 2).unwrap();
    dispatcher.publish(message("t1", 1)).unwrap().await.unwrap();

    assert!(on_t1.is_ended());
    assert_eq!(broken.releases.load(Ordering::SeqCst), 1);
    assert!(!registry.is_subscribed_to(&t1, "broken"));

    assert!(!on_t2.is_ended());
    assert!(registry.is_subscribed_to(&t2, "broken"));
}

#[tokio::test]
async fn test_dispatch_survives_panicking_subscriber() {
    let registry = Arc::new(Registry::new());
    let t1 = topic("t1");
    let bomb = Peer::new("bomb", Mode::Panic);
    let good = Peer::new("good", Mode::Record);
    let bomb_sub = register(&registry, &t1, &bomb);
    register(&registry, &t1, &good);

    let dispatcher = DispatchExecutor::new(registry.clone(), 2).unwrap();
    let outcome = dispatcher.publish(message("t1", 1)).unwrap().await.unwrap();

    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.failed, 1);
    assert!(bomb_sub.is_ended());
    assert!(!registry.is_subscribed("bomb"));
    assert_eq!(good.count(), 1);
}

#[tokio::test]
async fn test_dispatch_skips_already_ended_subscription() {
    let registry = Arc::new(Registry::new());
    let t1 = topic("t1");
    let gone = Peer::new("gone", Mode::Record);
    register(&registry, &t1, &gone).end();

    let dispatcher = DispatchExecutor::new(registry, 1).unwrap();
    let outcome = dispatcher.publish(message("t1", 1)).unwrap().await.unwrap();

    assert_eq!(outcome.rejected, 1);
    assert_eq!(gone.count(), 0);
}

#[tokio::test]
async fn test_mutation_subscribe_creates_fresh_subscription() {
    let registry = Arc::new(Registry::new());
    let mutator = MutationExecutor::new(registry.clone(), 2).unwrap();
    let t1 = topic("t1");
    let peer = Peer::new("s1", Mode::Record);

    let first = mutator
        .subscribe(t1.clone(), peer.clone(), None)
        .unwrap()
        .await
        .unwrap();
    let second = mutator
        .subscribe(t1.clone(), peer.clone(), None)
        .unwrap()
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(first.is_ended());
    assert!(!second.is_ended());
    assert_eq!(registry.subscriber_count(&t1), 1);
    assert!(Arc::ptr_eq(&registry.get(&t1, "s1").unwrap(), &second));
}

#[tokio::test]
async fn test_mutation_resubscribe_after_unsubscribe_is_active() {
    let registry = Arc::new(Registry::new());
    let mutator = MutationExecutor::new(registry.clone(), 2).unwrap();
    let t1 = topic("t1");
    let peer = Peer::new("s1", Mode::Record);

    let old = mutator
        .subscribe(t1.clone(), peer.clone(), None)
        .unwrap()
        .await
        .unwrap();
    assert!(mutator
        .unsubscribe(t1.clone(), "s1".to_string())
        .unwrap()
        .await
        .unwrap());
    assert!(old.is_ended());

    let renewed = mutator
        .subscribe(t1.clone(), peer.clone(), None)
        .unwrap()
        .await
        .unwrap();
    assert!(!renewed.is_ended());
    assert!(registry.is_subscribed_to(&t1, "s1"));
}

#[tokio::test]
async fn test_mutation_unsubscribe_all_counts_topics() {
    let registry = Arc::new(Registry::new());
    let mutator = MutationExecutor::new(registry.clone(), 4).unwrap();
    let peer = Peer::new("s1", Mode::Record);
    let other = Peer::new("s2", Mode::Record);

    let mut subs = Vec::new();
    for name in ["t1", "t2", "t3"] {
        let sub = mutator
            .subscribe(topic(name), peer.clone(), None)
            .unwrap()
            .await
            .unwrap();
        subs.push(sub);
    }
    mutator
        .subscribe(topic("t1"), other.clone(), None)
        .unwrap()
        .await
        .unwrap();

    let removed = mutator
        .unsubscribe_all("s1".to_string())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(removed, 3);
    assert!(subs.iter().all(|s| s.is_ended()));
    assert_eq!(peer.releases.load(Ordering::SeqCst), 3);
    assert!(!registry.is_subscribed("s1"));
    assert!(registry.is_subscribed_to(&topic("t1"), "s2"));
}

#[tokio::test]
async fn test_mutation_update_filter_is_per_topic() {
    let registry = Arc::new(Registry::new());
    let mutator = MutationExecutor::new(registry.clone(), 1).unwrap();
    let (t1, t2) = (topic("t1"), topic("t2"));
    let peer = Peer::new("s1", Mode::Record);

    let updated = mutator
        .update_filter(t1.clone(), "s1".to_string(), filter::from_fn(|_| false))
        .unwrap()
        .await
        .unwrap();
    assert!(!updated);

    let on_t1 = mutator
        .subscribe(t1.clone(), peer.clone(), None)
        .unwrap()
        .await
        .unwrap();
    let on_t2 = mutator
        .subscribe(t2.clone(), peer.clone(), None)
        .unwrap()
        .await
        .unwrap();
    let updated = mutator
        .update_filter(t1, "s1".to_string(), filter::from_fn(|_| false))
        .unwrap()
        .await
        .unwrap();
    assert!(updated);
    assert!(!on_t1.accept(&message("t1", 1)));
    assert!(on_t2.accept(&message("t2", 1)));
}

#[tokio::test]
async fn test_mutation_remove_topic_ends_subscribers() {
    let registry = Arc::new(Registry::new());
    let mutator = MutationExecutor::new(registry.clone(), 1).unwrap();
    let t1 = topic("t1");
    let a = register(&registry, &t1, &Peer::new("a", Mode::Record));
    let b = register(&registry, &t1, &Peer::new("b", Mode::Record));

    let ended = mutator.remove_topic(t1.clone()).unwrap().await.unwrap();
    assert_eq!(ended, 2);
    assert!(a.is_ended() && b.is_ended());
    assert!(!registry.has_topic(&t1));

    let ended = mutator.remove_topic(t1).unwrap().await.unwrap();
    assert_eq!(ended, 0);
}
