// Room registry boundary
//
// The registry is a collaborator the bridge consults, never mutates: the
// bridge only reads it to validate that a room exists before attaching.

// Public API
pub use models::RoomModel;
pub use repository::{InMemoryRoomRepository, RoomRepository, SqliteRoomRepository};
pub use service::RoomService;

// Internal modules
pub mod handlers;
pub mod models;
pub mod repository;
mod service;
pub mod types;
