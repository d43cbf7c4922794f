use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::message::Message;
use crate::shared::{AppError, AppState};

const DEFAULT_PAGE_LIMIT: usize = 100;
const MAX_PAGE_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    /// Exclusive sequence-number cursor for paging backwards.
    pub before: Option<u64>,
}

/// HTTP handler for paged room history
///
/// GET /rooms/{room_id}/messages?limit=&before=
/// Returns up to `limit` messages newest-first. The live replay snapshot is
/// consulted first (it covers messages the persistence consumer has not
/// flushed yet), then the durable log for anything older.
#[instrument(name = "get_room_messages", skip(state))]
pub async fn get_room_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    if state.room_repository.get_room(&room_id).await?.is_none() {
        return Err(AppError::RoomNotFound(room_id));
    }

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let before = params.before;

    let mut page: Vec<Message> = Vec::new();
    let snapshot = state.bridge_manager.snapshot(&room_id).await;
    for message in snapshot.iter().rev() {
        if page.len() == limit {
            break;
        }
        if before.map_or(true, |b| message.sequence < b) {
            page.push(message.clone());
        }
    }

    if page.len() < limit {
        // everything older than the page so far comes from the durable log;
        // the cursor guarantees the two sources cannot overlap
        let cursor = page.last().map(|m| m.sequence).or(before);
        let older = state
            .message_store
            .read_page(&room_id, limit - page.len(), cursor)
            .await?;
        page.extend(older);
    }

    debug!(
        room_id = %room_id,
        returned = page.len(),
        "History page served"
    );
    Ok(Json(page))
}
