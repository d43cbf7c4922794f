use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::bridge::BridgeManager;
use crate::history::store::MessageStore;
use crate::room::repository::RoomRepository;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_repository: Arc<dyn RoomRepository + Send + Sync>,
    pub message_store: Arc<dyn MessageStore + Send + Sync>,
    pub bridge_manager: Arc<BridgeManager>,
}

impl AppState {
    pub fn new(
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        message_store: Arc<dyn MessageStore + Send + Sync>,
        bridge_manager: Arc<BridgeManager>,
    ) -> Self {
        Self {
            room_repository,
            message_store,
            bridge_manager,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Bus error: {0}")]
    BusError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::RoomNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PublishFailed(msg) => {
                (StatusCode::BAD_GATEWAY, format!("Publish failed: {}", msg))
            }
            AppError::BusError(msg) => (StatusCode::BAD_GATEWAY, format!("Bus error: {}", msg)),
            AppError::WriteFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Write failed: {}", msg),
            ),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
