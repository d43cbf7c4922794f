// Library crate for the chatbridge server
// This file exposes the public API for integration tests

pub mod bridge;
pub mod bus;
pub mod config;
pub mod history;
pub mod message;
pub mod persistence;
pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use bridge::{BridgeConfig, BridgeManager, Session};
pub use bus::{BusClient, InMemoryBusClient, NatsBusClient};
pub use config::Config;
pub use history::{InMemoryMessageStore, JsonlMessageStore, MessageStore, ReplayBuffer};
pub use message::Message;
pub use persistence::PersistenceConsumer;
pub use room::{models::RoomModel, repository::RoomRepository, RoomService};
pub use shared::{AppError, AppState};
pub use websockets::{Connection, InboundFrame, OutboundFrame};
