// Persistence consumer tests: every published message reaches the durable
// log at least once, and log trouble never takes the subscription down.

mod utils;

use std::sync::Arc;
use std::time::Duration;

use chatbridge::bus::{BusClient, InMemoryBusClient};
use chatbridge::history::MessageStore;
use chatbridge::message::Message;
use chatbridge::persistence::PersistenceConsumer;
use tokio_util::sync::CancellationToken;
use utils::{spawn_consumer, wait_for_count, FlakyMessageStore};

fn message(room_id: &str, sequence: u64) -> Message {
    Message::new(
        room_id.to_string(),
        "alice".to_string(),
        format!("message {}", sequence),
        sequence,
    )
}

async fn publish(bus: &InMemoryBusClient, message: &Message) {
    let payload = serde_json::to_vec(message).unwrap();
    bus.publish(&format!("chat.{}", message.room_id), payload)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_every_published_message_is_persisted() {
    let bus = Arc::new(InMemoryBusClient::new());
    let store: Arc<dyn MessageStore + Send + Sync> = Arc::new(FlakyMessageStore::new());
    let (cancel, handle) = spawn_consumer(bus.clone(), store.clone()).await;

    for sequence in 1..=5 {
        publish(&bus, &message("r1", sequence)).await;
    }

    wait_for_count(store.as_ref(), "r1", 5).await;
    let page = store.read_page("r1", 10, None).await.unwrap();
    let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![5, 4, 3, 2, 1]);

    cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn test_transient_write_failures_are_retried() {
    let bus = Arc::new(InMemoryBusClient::new());
    let flaky = Arc::new(FlakyMessageStore::new());
    let store: Arc<dyn MessageStore + Send + Sync> = flaky.clone();
    let (cancel, handle) = spawn_consumer(bus.clone(), store.clone()).await;

    // the next two appends fail; the in-flight message must survive them
    flaky.fail_next_appends(2);
    publish(&bus, &message("r1", 1)).await;

    wait_for_count(store.as_ref(), "r1", 1).await;
    let page = store.read_page("r1", 10, None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].sequence, 1);

    cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn test_malformed_payloads_are_skipped() {
    let bus = Arc::new(InMemoryBusClient::new());
    let store: Arc<dyn MessageStore + Send + Sync> = Arc::new(FlakyMessageStore::new());
    let (cancel, handle) = spawn_consumer(bus.clone(), store.clone()).await;

    bus.publish("chat.r1", b"not a message".to_vec())
        .await
        .unwrap();
    publish(&bus, &message("r1", 1)).await;

    wait_for_count(store.as_ref(), "r1", 1).await;
    assert_eq!(store.message_count("r1").await.unwrap(), 1);

    cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn test_exhausted_retries_do_not_stall_the_subscription() {
    let bus = Arc::new(InMemoryBusClient::new());
    let flaky = Arc::new(FlakyMessageStore::new());
    flaky.always_fail_room("doomed");
    let store: Arc<dyn MessageStore + Send + Sync> = flaky.clone();

    let cancel = CancellationToken::new();
    let bus_client: Arc<dyn BusClient> = bus.clone();
    let consumer = PersistenceConsumer::new(bus_client, store.clone())
        .with_max_retries(1)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(2));
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { consumer.run(cancel).await }
    });

    // wait for the subscription via a probe on a healthy room
    for attempt in 0..200 {
        publish(&bus, &message("warmup", attempt + 1)).await;
        if store.message_count("warmup").await.unwrap() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(store.message_count("warmup").await.unwrap() > 0);

    publish(&bus, &message("doomed", 1)).await;
    publish(&bus, &message("r1", 1)).await;

    // the doomed message is given up on and the consumer moves along
    wait_for_count(store.as_ref(), "r1", 1).await;
    assert_eq!(store.message_count("doomed").await.unwrap(), 0);

    cancel.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn test_cancellation_stops_the_consumer() {
    let bus = Arc::new(InMemoryBusClient::new());
    let store: Arc<dyn MessageStore + Send + Sync> = Arc::new(FlakyMessageStore::new());
    let (cancel, handle) = spawn_consumer(bus.clone(), store.clone()).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("consumer did not stop on cancellation")
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_deliveries_collapse_at_read_time() {
    let bus = Arc::new(InMemoryBusClient::new());
    let store: Arc<dyn MessageStore + Send + Sync> = Arc::new(FlakyMessageStore::new());
    let (cancel, handle) = spawn_consumer(bus.clone(), store.clone()).await;

    // the bus redelivers: same message observed twice
    let duplicated = message("r1", 1);
    publish(&bus, &duplicated).await;
    publish(&bus, &duplicated).await;
    publish(&bus, &message("r1", 2)).await;

    wait_for_count(store.as_ref(), "r1", 3).await;
    let page = store.read_page("r1", 10, None).await.unwrap();
    let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![2, 1]);

    cancel.cancel();
    let _ = handle.await;
}
