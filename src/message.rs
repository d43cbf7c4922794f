use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message within one room.
///
/// The sequence number is assigned by the room's bridge at publish time and
/// is the total order for that room; the timestamp is server-side publish
/// time, never client time. The same shape travels on the bus, in the
/// durable log, and on WebSocket frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub room_id: String,
    pub sender: String,
    pub text: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(room_id: String, sender: String, text: String, sequence: u64) -> Self {
        Self {
            room_id,
            sender,
            text,
            sequence,
            timestamp: Utc::now(),
        }
    }
}
