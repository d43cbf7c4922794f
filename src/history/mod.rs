// Message history: the bounded in-memory replay ring and the unbounded
// durable per-room log behind the `MessageStore` seam.

// Public API
pub use replay::ReplayBuffer;
pub use store::{InMemoryMessageStore, JsonlMessageStore, MessageStore};

// Internal modules
pub mod handlers;
mod replay;
pub mod store;
