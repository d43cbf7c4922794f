use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::models::RoomModel;
use crate::shared::AppError;

/// Trait for room registry operations
#[async_trait]
pub trait RoomRepository {
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError>;
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError>;
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError>;
}

/// In-memory implementation of RoomRepository for development and testing
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_id = %room.id, name = %room.name, "Creating room in memory");

        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.id) {
            warn!(room_id = %room.id, "Room already exists in memory");
            return Err(AppError::DatabaseError("Room already exists".to_string()));
        }
        rooms.insert(room.id.clone(), room.clone());

        debug!(room_id = %room.id, "Room created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let room = rooms.get(room_id).cloned();

        match &room {
            Some(r) => debug!(room_id = %room_id, name = %r.name, "Room found in memory"),
            None => debug!(room_id = %room_id, "Room not found in memory"),
        }

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let mut room_list: Vec<RoomModel> = rooms.values().cloned().collect();
        room_list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(room_list)
    }
}

/// SQLite-backed implementation of RoomRepository for production
pub struct SqliteRoomRepository {
    pool: SqlitePool,
}

impl SqliteRoomRepository {
    /// Connects, creating the database file and schema if missing
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::DatabaseError(e.to_string()))?
            .create_if_missing(true);
        // single connection: the registry is tiny, and in-memory databases
        // are per-connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        info!(database_url = %database_url, "Room registry connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl RoomRepository for SqliteRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        sqlx::query("INSERT INTO rooms (id, name) VALUES (?, ?)")
            .bind(&room.id)
            .bind(&room.name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        debug!(room_id = %room.id, "Room created in registry");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        sqlx::query_as::<_, RoomModel>("SELECT id, name FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        sqlx::query_as::<_, RoomModel>("SELECT id, name FROM rooms ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room(room_id: &str, name: &str) -> RoomModel {
        RoomModel {
            id: room_id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_room() {
        let repository = InMemoryRoomRepository::new();
        repository
            .create_room(&test_room("r1", "Room One"))
            .await
            .unwrap();

        let room = repository.get_room("r1").await.unwrap().unwrap();
        assert_eq!(room.name, "Room One");
    }

    #[tokio::test]
    async fn test_get_missing_room_returns_none() {
        let repository = InMemoryRoomRepository::new();
        assert!(repository.get_room("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_room_id_rejected() {
        let repository = InMemoryRoomRepository::new();
        repository
            .create_room(&test_room("r1", "Room One"))
            .await
            .unwrap();

        let result = repository.create_room(&test_room("r1", "Other")).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_list_rooms_ordered_by_id() {
        let repository = InMemoryRoomRepository::new();
        repository
            .create_room(&test_room("b-room", "B"))
            .await
            .unwrap();
        repository
            .create_room(&test_room("a-room", "A"))
            .await
            .unwrap();

        let rooms = repository.list_rooms().await.unwrap();
        let ids: Vec<&str> = rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a-room", "b-room"]);
    }

    #[tokio::test]
    async fn test_sqlite_repository_round_trip() {
        let repository = SqliteRoomRepository::connect("sqlite::memory:")
            .await
            .unwrap();
        repository
            .create_room(&test_room("r1", "Room One"))
            .await
            .unwrap();

        let room = repository.get_room("r1").await.unwrap().unwrap();
        assert_eq!(room.name, "Room One");
        assert!(repository.get_room("ghost").await.unwrap().is_none());
        assert_eq!(repository.list_rooms().await.unwrap().len(), 1);
    }
}
