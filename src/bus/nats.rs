use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use super::client::{BusClient, BusStream};
use crate::shared::AppError;

/// NATS-backed bus client.
///
/// Reconnection is delegated to the underlying client: it retries the
/// initial connect and re-establishes dropped connections on its own, and
/// live subscriptions resume receiving once reconnected. Messages published
/// by other processes while this client is disconnected are only as durable
/// as the bus's own retention.
pub struct NatsBusClient {
    client: async_nats::Client,
}

impl NatsBusClient {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .connect(url)
            .await
            .map_err(|e| AppError::BusError(e.to_string()))?;

        info!(url = %url, "Connected to message bus");
        Ok(Self { client })
    }
}

#[async_trait]
impl BusClient for NatsBusClient {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), AppError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| AppError::PublishFailed(e.to_string()))?;

        // publish only enqueues client-side; flush confirms the bus has it
        self.client
            .flush()
            .await
            .map_err(|e| AppError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self, pattern: &str) -> Result<BusStream, AppError> {
        let subscriber = self
            .client
            .subscribe(pattern.to_string())
            .await
            .map_err(|e| AppError::BusError(e.to_string()))?;

        Ok(subscriber.map(|msg| msg.payload.to_vec()).boxed())
    }
}
