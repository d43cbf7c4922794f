use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::room::{RoomBridge, Session};
use crate::bus::{subjects, BusClient};
use crate::config::Config;
use crate::message::Message;
use crate::room::repository::RoomRepository;
use crate::shared::AppError;

/// Per-room bridge behavior knobs, all taken from the configuration surface.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub replay_capacity: usize,
    pub session_buffer: usize,
    pub slow_consumer_timeout: Duration,
    pub echo_to_sender: bool,
    pub idle_teardown: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            replay_capacity: 50,
            session_buffer: 64,
            slow_consumer_timeout: Duration::from_secs(5),
            echo_to_sender: true,
            idle_teardown: true,
        }
    }
}

impl From<&Config> for BridgeConfig {
    fn from(config: &Config) -> Self {
        Self {
            replay_capacity: config.replay_capacity,
            session_buffer: config.session_buffer,
            slow_consumer_timeout: config.slow_consumer_timeout,
            echo_to_sender: config.echo_to_sender,
            idle_teardown: config.idle_teardown,
        }
    }
}

struct BridgeEntry {
    bridge: Arc<RoomBridge>,
    dispatch: JoinHandle<()>,
}

/// Owns the lazy room-id -> bridge map.
///
/// Bridges are created on first attach (together with their bus dispatch
/// task) and, when `idle_teardown` is set, removed once the last session
/// detaches. Different rooms never contend on each other's locks.
pub struct BridgeManager {
    bus: Arc<dyn BusClient>,
    room_repository: Arc<dyn RoomRepository + Send + Sync>,
    config: BridgeConfig,
    bridges: RwLock<HashMap<String, BridgeEntry>>,
}

impl BridgeManager {
    pub fn new(
        bus: Arc<dyn BusClient>,
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            bus,
            room_repository,
            config,
            bridges: RwLock::new(HashMap::new()),
        }
    }

    /// Attaches a new session to a room, creating the room's bridge if this
    /// is the first attachment. Fails with `RoomNotFound` for unknown rooms.
    pub async fn attach(&self, room_id: &str) -> Result<Session, AppError> {
        if self.room_repository.get_room(room_id).await?.is_none() {
            return Err(AppError::RoomNotFound(room_id.to_string()));
        }

        // fast path under the read lock; teardown needs the write lock, so
        // the bridge cannot be dropped out from under this attach
        {
            let bridges = self.bridges.read().await;
            if let Some(entry) = bridges.get(room_id) {
                return Ok(entry.bridge.attach().await);
            }
        }

        let mut bridges = self.bridges.write().await;
        if let Some(entry) = bridges.get(room_id) {
            return Ok(entry.bridge.attach().await);
        }

        let bridge = Arc::new(RoomBridge::new(
            room_id.to_string(),
            Arc::clone(&self.bus),
            self.config.clone(),
        ));
        let dispatch = spawn_dispatch(room_id.to_string(), Arc::clone(&bridge), Arc::clone(&self.bus));
        let session = bridge.attach().await;
        bridges.insert(room_id.to_string(), BridgeEntry { bridge, dispatch });

        Ok(session)
    }

    /// Publishes on behalf of an attached session.
    pub async fn publish(
        &self,
        room_id: &str,
        sender: &str,
        text: &str,
        origin: Option<Uuid>,
    ) -> Result<Message, AppError> {
        let bridge = self.bridge_for(room_id).await;
        match bridge {
            Some(bridge) => bridge.publish(sender, text, origin).await,
            None => Err(AppError::RoomNotFound(format!(
                "no active bridge for room {}",
                room_id
            ))),
        }
    }

    /// Detaches a session; tears the bridge down when it was the last one
    /// and idle teardown is enabled.
    pub async fn detach(&self, room_id: &str, session_id: Uuid) {
        let Some(bridge) = self.bridge_for(room_id).await else {
            return;
        };

        let remaining = bridge.detach(session_id).await;
        if remaining > 0 || !self.config.idle_teardown {
            return;
        }

        let mut bridges = self.bridges.write().await;
        // re-check under the write lock; a session may have attached meanwhile
        let still_idle = match bridges.get(room_id) {
            Some(entry) => {
                Arc::ptr_eq(&entry.bridge, &bridge) && entry.bridge.session_count().await == 0
            }
            None => false,
        };
        if still_idle {
            if let Some(entry) = bridges.remove(room_id) {
                entry.dispatch.abort();
                info!(room_id = %room_id, "Idle room bridge torn down");
            }
        }
    }

    /// Replay buffer contents for a room; empty when no bridge is active.
    pub async fn snapshot(&self, room_id: &str) -> Vec<Message> {
        match self.bridge_for(room_id).await {
            Some(bridge) => bridge.snapshot().await,
            None => Vec::new(),
        }
    }

    /// Detaches every session and unsubscribes every room, for process
    /// shutdown.
    pub async fn shutdown(&self) {
        let mut bridges = self.bridges.write().await;
        let rooms = bridges.len();
        for (_, entry) in bridges.drain() {
            entry.dispatch.abort();
            entry.bridge.close_all_sessions().await;
        }
        info!(rooms, "Bridge manager shut down");
    }

    async fn bridge_for(&self, room_id: &str) -> Option<Arc<RoomBridge>> {
        let bridges = self.bridges.read().await;
        bridges.get(room_id).map(|entry| Arc::clone(&entry.bridge))
    }
}

/// Dispatch task: one inbound bus stream per room, consumed by a single
/// task that routes into the bridge. Sessions never subscribe to the bus
/// directly.
fn spawn_dispatch(
    room_id: String,
    bridge: Arc<RoomBridge>,
    bus: Arc<dyn BusClient>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        use futures::StreamExt;

        let subject = subjects::room(&room_id);
        let mut stream = match bus.subscribe(&subject).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "Room subscription failed");
                return;
            }
        };
        info!(room_id = %room_id, "Room subscription started");

        while let Some(payload) = stream.next().await {
            let message: Message = match serde_json::from_slice(&payload) {
                Ok(message) => message,
                Err(err) => {
                    warn!(room_id = %room_id, error = %err, "Skipping non-message payload");
                    continue;
                }
            };
            if message.room_id != room_id {
                warn!(
                    room_id = %room_id,
                    payload_room = %message.room_id,
                    "Dropping message addressed to another room"
                );
                continue;
            }
            bridge.ingest(message).await;
        }

        warn!(room_id = %room_id, "Room subscription ended");
    })
}
