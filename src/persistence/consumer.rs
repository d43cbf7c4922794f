use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{subjects, BusClient, BusStream};
use crate::history::store::MessageStore;
use crate::message::Message;
use crate::shared::AppError;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Long-lived subscriber covering every room's subject, appending each
/// observed message to the durable log.
///
/// Runs regardless of client activity and never feeds back into the live
/// fan-out path: a stalled log write delays only this consumer. Delivery to
/// the log is at-least-once; the consumer does not move past a message until
/// its append succeeds or retries are exhausted, and duplicates from bus
/// redelivery are left for the read side to collapse.
pub struct PersistenceConsumer {
    bus: Arc<dyn BusClient>,
    store: Arc<dyn MessageStore + Send + Sync>,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl PersistenceConsumer {
    pub fn new(bus: Arc<dyn BusClient>, store: Arc<dyn MessageStore + Send + Sync>) -> Self {
        Self {
            bus,
            store,
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }

    /// Set the number of append retries before a message is given up on
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the exponential backoff window for append retries
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Runs until cancelled, re-subscribing whenever the bus stream ends.
    /// An in-flight append always completes before cancellation takes
    /// effect, so an already-dequeued message is never dropped.
    pub async fn run(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            match self.bus.subscribe(subjects::ALL_ROOMS).await {
                Ok(stream) => {
                    info!(pattern = subjects::ALL_ROOMS, "Persistence consumer subscribed");
                    self.consume(stream, &cancel).await;
                }
                Err(err) => {
                    error!(error = %err, "Persistence subscription failed");
                }
            }
            if cancel.is_cancelled() {
                break;
            }
            warn!("Persistence subscription ended, re-subscribing");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
            }
        }
        info!("Persistence consumer stopped");
    }

    async fn consume(&self, mut stream: BusStream, cancel: &CancellationToken) {
        use futures::StreamExt;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                payload = stream.next() => {
                    match payload {
                        Some(payload) => self.handle_payload(&payload).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, payload: &[u8]) {
        let message: Message = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Skipping non-message payload");
                return;
            }
        };

        if let Err(err) = self.append_with_retry(&message).await {
            // surfaced for operational alerting; the consumer moves on
            // rather than deadlocking the subscription
            error!(
                room_id = %message.room_id,
                sequence = message.sequence,
                error = %err,
                "Durable append failed after retries, message not logged"
            );
        }
    }

    async fn append_with_retry(&self, message: &Message) -> Result<(), AppError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.store.append(&message.room_id, message).await {
                Ok(()) => {
                    debug!(
                        room_id = %message.room_id,
                        sequence = message.sequence,
                        "Message persisted"
                    );
                    return Ok(());
                }
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        room_id = %message.room_id,
                        sequence = message.sequence,
                        attempt,
                        error = %err,
                        "Durable append failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
