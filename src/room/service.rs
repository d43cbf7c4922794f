use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    models::RoomModel,
    repository::RoomRepository,
    types::{RoomCreateRequest, RoomResponse},
};
use crate::shared::AppError;

/// Name of the room bootstrapped on a fresh deployment.
pub const DEFAULT_ROOM_NAME: &str = "Main Room";

/// Service for handling room registry business logic
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
}

impl RoomService {
    pub fn new(repository: Arc<dyn RoomRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Creates a new room with a generated ID
    #[instrument(skip(self))]
    pub async fn create_room(&self, request: RoomCreateRequest) -> Result<RoomResponse, AppError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest(
                "Room name must not be empty".to_string(),
            ));
        }

        let room = RoomModel::new(name.to_string());
        self.repository.create_room(&room).await?;

        info!(room_id = %room.id, name = %room.name, "Room created successfully");
        Ok(RoomResponse::from(room))
    }

    /// Lists all known rooms
    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Result<Vec<RoomResponse>, AppError> {
        debug!("Listing all rooms");
        let rooms = self.repository.list_rooms().await?;
        Ok(rooms.into_iter().map(RoomResponse::from).collect())
    }

    /// Makes sure a fresh deployment has one room to land in
    pub async fn ensure_default_room(&self) -> Result<(), AppError> {
        let rooms = self.repository.list_rooms().await?;
        if rooms.iter().any(|room| room.name == DEFAULT_ROOM_NAME) {
            return Ok(());
        }

        let room = RoomModel::new(DEFAULT_ROOM_NAME.to_string());
        self.repository.create_room(&room).await?;
        info!(room_id = %room.id, "Default room created");
        Ok(())
    }
}
