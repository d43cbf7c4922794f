// Room bridge: per-room live fan-out and replay
//
// One `RoomBridge` per active room owns that room's sequence counter, replay
// buffer and attached sessions behind a single per-room mutex; the
// `BridgeManager` creates bridges lazily on first attach and tears them down
// when the last session detaches.

// Public API
pub use manager::{BridgeConfig, BridgeManager};
pub use room::{RoomBridge, Session};

// Internal modules
mod manager;
mod room;
