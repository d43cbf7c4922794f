// Public API
pub use handler::websocket_handler;
pub use messages::{InboundFrame, OutboundFrame};
pub use socket::{Connection, SocketError, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod socket;
