use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::shared::AppError;

/// Lazy, potentially infinite sequence of raw payloads from one subscription.
pub type BusStream = BoxStream<'static, Vec<u8>>;

/// Thin capability boundary over the message bus.
///
/// No business logic lives here: subjects and payloads are opaque. `publish`
/// returning `Ok` means the payload reached the bus, not that any subscriber
/// saw it.
#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), AppError>;

    /// Subscribe to a subject pattern. The stream ends when the subscription
    /// is dropped server-side; callers restart by subscribing again.
    async fn subscribe(&self, pattern: &str) -> Result<BusStream, AppError>;
}
