use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::warn;

use super::client::{BusClient, BusStream};
use crate::shared::AppError;

/// In-memory bus implementing the same contract as the NATS client.
///
/// One broadcast channel carries every (subject, payload) pair; each
/// subscription filters by its own pattern. Retains nothing: a publish with
/// no live subscribers is dropped, and a lagging subscriber loses the
/// overwritten messages, matching the at-least-once posture the rest of the
/// system already tolerates.
#[derive(Clone)]
pub struct InMemoryBusClient {
    sender: broadcast::Sender<(String, Vec<u8>)>,
}

impl InMemoryBusClient {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryBusClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusClient for InMemoryBusClient {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), AppError> {
        // send only errors when there are no receivers, which is not a
        // failure to reach the bus
        let _ = self.sender.send((subject.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<BusStream, AppError> {
        let receiver = self.sender.subscribe();
        let pattern = pattern.to_string();

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(item) => return Some((item, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "In-memory bus subscriber lagged, dropping messages");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream
            .filter_map(move |(subject, payload)| {
                let matched = subject_matches(&pattern, &subject);
                async move { matched.then_some(payload) }
            })
            .boxed())
    }
}

/// Token-wise subject matching: `*` matches exactly one token, a terminal
/// `>` matches one or more remaining tokens.
fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.').peekable();

    loop {
        match pattern_tokens.next() {
            None => return subject_tokens.next().is_none(),
            Some(">") => return subject_tokens.peek().is_some(),
            Some(token) => match subject_tokens.next() {
                Some(sub) if token == "*" || token == sub => continue,
                _ => return false,
            },
        }
    }
}
