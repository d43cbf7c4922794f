use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chatbridge::{
    bridge::{BridgeConfig, BridgeManager},
    bus::{BusClient, InMemoryBusClient},
    history::MessageStore,
    message::Message,
    persistence::PersistenceConsumer,
    room::{
        models::RoomModel,
        repository::{InMemoryRoomRepository, RoomRepository},
    },
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub bus: Arc<InMemoryBusClient>,
    pub room_repository: Arc<InMemoryRoomRepository>,
    pub bridge_manager: Arc<BridgeManager>,
}

pub struct TestSetupBuilder {
    room_ids: Vec<String>,
    bridge_config: BridgeConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            room_ids: vec!["r1".to_string()],
            bridge_config: BridgeConfig::default(),
        }
    }

    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    pub async fn build(self) -> TestSetup {
        let bus = Arc::new(InMemoryBusClient::new());
        let room_repository = Arc::new(InMemoryRoomRepository::new());
        for room_id in &self.room_ids {
            room_repository
                .create_room(&RoomModel {
                    id: room_id.clone(),
                    name: format!("Room {}", room_id),
                })
                .await
                .unwrap();
        }

        let bus_client: Arc<dyn BusClient> = bus.clone();
        let repository: Arc<dyn RoomRepository + Send + Sync> = room_repository.clone();
        let bridge_manager = Arc::new(BridgeManager::new(
            bus_client,
            repository,
            self.bridge_config,
        ));

        TestSetup {
            bus,
            room_repository,
            bridge_manager,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a persistence consumer and blocks until its subscription is
/// demonstrably live, by probing a throwaway room until a record lands.
pub async fn spawn_consumer(
    bus: Arc<InMemoryBusClient>,
    store: Arc<dyn MessageStore + Send + Sync>,
) -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let bus_client: Arc<dyn BusClient> = bus.clone();
    let consumer = PersistenceConsumer::new(bus_client, store.clone())
        .with_backoff(Duration::from_millis(1), Duration::from_millis(10));
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { consumer.run(cancel).await }
    });

    let probe = Message::new(
        "warmup".to_string(),
        "probe".to_string(),
        "probe".to_string(),
        1,
    );
    let payload = serde_json::to_vec(&probe).unwrap();
    for _ in 0..200 {
        bus.publish("chat.warmup", payload.clone()).await.unwrap();
        if store.message_count("warmup").await.unwrap() > 0 {
            // let straggler probes drain before the caller starts counting
            tokio::time::sleep(Duration::from_millis(20)).await;
            return (cancel, handle);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("persistence consumer never came up");
}

/// Polls until the room's durable record count reaches `expected`.
pub async fn wait_for_count(
    store: &(dyn MessageStore + Send + Sync),
    room_id: &str,
    expected: u64,
) {
    for _ in 0..500 {
        if store.message_count(room_id).await.unwrap() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "room {} never reached {} durable records",
        room_id, expected
    );
}
