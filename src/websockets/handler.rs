use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::socket::Connection;
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub username: String,
}

/// WebSocket endpoint for attaching a live session to one room
///
/// GET /ws/{room_id}?username=<display name>
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let username = params.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest(
            "username must not be empty".to_string(),
        ));
    }

    // reject before upgrading so the client gets a clear status; attach
    // re-validates against the registry
    if state.room_repository.get_room(&room_id).await?.is_none() {
        warn!(room_id = %room_id, "Room not found, rejecting WebSocket connection");
        return Err(AppError::RoomNotFound(room_id));
    }

    info!(
        room_id = %room_id,
        username = %username,
        "WebSocket connection requested"
    );
    Ok(ws.on_upgrade(move |socket| handle_websocket_connection(socket, room_id, username, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: axum::extract::ws::WebSocket,
    room_id: String,
    username: String,
    state: AppState,
) {
    let session = match state.bridge_manager.attach(&room_id).await {
        Ok(session) => session,
        Err(err) => {
            warn!(room_id = %room_id, error = %err, "Attach failed after upgrade");
            return;
        }
    };
    let session_id = session.id;

    info!(
        room_id = %room_id,
        username = %username,
        session_id = %session_id,
        replayed = session.replay.len(),
        "WebSocket connection established"
    );

    let connection = Connection::new(
        username.clone(),
        session,
        Box::new(socket),
        Arc::clone(&state.bridge_manager),
    );

    match connection.run().await {
        Ok(()) => {
            info!(
                room_id = %room_id,
                username = %username,
                "WebSocket connection closed cleanly"
            );
        }
        Err(err) => {
            warn!(
                room_id = %room_id,
                username = %username,
                error = %err,
                "WebSocket connection error"
            );
        }
    }

    state.bridge_manager.detach(&room_id, session_id).await;
}
