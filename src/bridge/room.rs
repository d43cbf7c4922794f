use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::manager::BridgeConfig;
use crate::bus::{subjects, BusClient};
use crate::history::ReplayBuffer;
use crate::message::Message;
use crate::shared::AppError;

/// One attached live client within one room.
///
/// `replay` must be delivered before `receiver` is drained: the receiver
/// starts buffering live messages from the moment of attach, so the
/// concatenation of the two is gap-free and duplicate-free.
pub struct Session {
    pub id: Uuid,
    pub room_id: String,
    /// Snapshot taken at attach time, ascending sequence order.
    pub replay: Vec<Message>,
    /// Live messages in arrival order, starting right after the replay tail.
    pub receiver: mpsc::Receiver<Message>,
}

struct RoomState {
    next_sequence: u64,
    replay: ReplayBuffer,
    sessions: HashMap<Uuid, mpsc::Sender<Message>>,
}

/// Per-room session manager: owns the room's sequence counter, replay
/// buffer and fan-out set. All mutation serializes through one mutex so
/// attach and publish for the same room never interleave partially; other
/// rooms are unaffected.
pub struct RoomBridge {
    room_id: String,
    bus: Arc<dyn BusClient>,
    config: BridgeConfig,
    state: Mutex<RoomState>,
}

impl RoomBridge {
    pub(super) fn new(room_id: String, bus: Arc<dyn BusClient>, config: BridgeConfig) -> Self {
        let replay = ReplayBuffer::new(config.replay_capacity);
        Self {
            room_id,
            bus,
            config,
            state: Mutex::new(RoomState {
                next_sequence: 1,
                replay,
                sessions: HashMap::new(),
            }),
        }
    }

    /// Registers a new session and snapshots the replay buffer under one
    /// lock hold, so every concurrent publish is either in the snapshot or
    /// delivered live through the channel, never both, never neither.
    pub async fn attach(&self) -> Session {
        let (sender, receiver) = mpsc::channel(self.config.session_buffer);
        let id = Uuid::new_v4();

        let mut state = self.state.lock().await;
        let replay = state.replay.snapshot();
        state.sessions.insert(id, sender);
        drop(state);

        info!(
            room_id = %self.room_id,
            session_id = %id,
            replayed = replay.len(),
            "Session attached"
        );

        Session {
            id,
            room_id: self.room_id.clone(),
            replay,
            receiver,
        }
    }

    /// Assigns the next sequence number, records the message in the replay
    /// buffer, fans it out to attached sessions and publishes it to the bus.
    ///
    /// A bus failure is reported as `PublishFailed` but does not roll back
    /// local delivery: attached sessions have already observed the message.
    pub async fn publish(
        &self,
        sender: &str,
        text: &str,
        origin: Option<Uuid>,
    ) -> Result<Message, AppError> {
        let mut state = self.state.lock().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let message = Message::new(
            self.room_id.clone(),
            sender.to_string(),
            text.to_string(),
            sequence,
        );
        state.replay.push(message.clone());
        self.fan_out(&mut state, &message, origin).await;

        // the bus publish stays inside the room lock so bus arrival order
        // matches sequence order
        let payload = serde_json::to_vec(&message).map_err(|_| AppError::Internal)?;
        let published = self.bus.publish(&subjects::room(&self.room_id), payload).await;
        drop(state);

        match published {
            Ok(()) => Ok(message),
            Err(err) => {
                warn!(
                    room_id = %self.room_id,
                    sequence,
                    error = %err,
                    "Bus publish failed; local fan-out already delivered"
                );
                Err(AppError::PublishFailed(err.to_string()))
            }
        }
    }

    /// Adopts a message delivered by the bus (published by another
    /// process). Sequences this bridge has already assigned were observed
    /// through local fan-out and are dropped.
    pub async fn ingest(&self, message: Message) {
        let mut state = self.state.lock().await;
        if message.sequence < state.next_sequence {
            return;
        }
        state.next_sequence = message.sequence + 1;
        state.replay.push(message.clone());
        self.fan_out(&mut state, &message, None).await;
    }

    /// Removes a session from the fan-out set; idempotent. Returns the
    /// number of sessions still attached.
    pub async fn detach(&self, session_id: Uuid) -> usize {
        let mut state = self.state.lock().await;
        if state.sessions.remove(&session_id).is_some() {
            debug!(
                room_id = %self.room_id,
                session_id = %session_id,
                "Session detached"
            );
        }
        state.sessions.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Current replay buffer contents, ascending sequence order.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.state.lock().await.replay.snapshot()
    }

    /// Drops every attached session, closing their live channels.
    pub(super) async fn close_all_sessions(&self) {
        let mut state = self.state.lock().await;
        state.sessions.clear();
    }

    async fn fan_out(&self, state: &mut RoomState, message: &Message, origin: Option<Uuid>) {
        let mut detached = Vec::new();

        for (id, session) in state.sessions.iter() {
            if Some(*id) == origin && !self.config.echo_to_sender {
                continue;
            }
            match session.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(queued)) => {
                    // one bounded wait; a session that cannot drain within
                    // the timeout is detached instead of stalling the room
                    match session
                        .send_timeout(queued, self.config.slow_consumer_timeout)
                        .await
                    {
                        Ok(()) => {}
                        Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                            warn!(
                                room_id = %self.room_id,
                                session_id = %id,
                                "Slow consumer, detaching session"
                            );
                            detached.push(*id);
                        }
                        Err(mpsc::error::SendTimeoutError::Closed(_)) => detached.push(*id),
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => detached.push(*id),
            }
        }

        for id in detached {
            state.sessions.remove(&id);
        }
    }
}
