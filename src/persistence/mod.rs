// Persistence consumer: the independent subscriber that records every
// published message to the durable per-room logs, isolated from client
// connection lifecycle.

// Public API
pub use consumer::PersistenceConsumer;

// Internal modules
mod consumer;
