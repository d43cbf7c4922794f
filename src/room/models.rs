use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Registry model for the rooms table. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoomModel {
    pub id: String,   // Random pet name generated ID
    pub name: String, // Display name
}

impl RoomModel {
    /// Creates a new room model with generated ID
    pub fn new(name: String) -> Self {
        let id = petname::Petnames::default().generate_one(2, "-");
        Self { id, name }
    }
}
