//! Subject naming convention for room traffic.
//!
//! Per-room traffic lives under `chat.<room_id>`; the persistence consumer
//! subscribes to the `chat.>` wildcard covering every room.

/// Wildcard pattern matching every room subject.
pub const ALL_ROOMS: &str = "chat.>";

/// Subject carrying one room's messages.
pub fn room(room_id: &str) -> String {
    format!("chat.{}", room_id)
}

/// Extracts the room id from a per-room subject, if it is one.
pub fn room_id(subject: &str) -> Option<&str> {
    subject.strip_prefix("chat.").filter(|rest| !rest.is_empty())
}
