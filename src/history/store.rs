use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::message::Message;
use crate::shared::AppError;

/// Durable, append-only message log per room.
///
/// Duplicate appends (bus redelivery) are tolerated at write time and
/// deduplicated by sequence number when a page is read back.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends one message as one record to the room's log.
    async fn append(&self, room_id: &str, message: &Message) -> Result<(), AppError>;

    /// Up to `limit` messages with sequence below `before_sequence` (or the
    /// newest when omitted), returned newest first.
    async fn read_page(
        &self,
        room_id: &str,
        limit: usize,
        before_sequence: Option<u64>,
    ) -> Result<Vec<Message>, AppError>;

    /// Total number of records in the room's log, duplicates included.
    async fn message_count(&self, room_id: &str) -> Result<u64, AppError>;
}

/// File-backed implementation: one JSONL file per room, one message per
/// line, append order. Forward-readable so pages can be served from the tail
/// without holding the whole log in memory.
pub struct JsonlMessageStore {
    dir: PathBuf,
}

impl JsonlMessageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| AppError::WriteFailed(e.to_string()))?;
        Ok(Self { dir })
    }

    fn log_path(&self, room_id: &str) -> PathBuf {
        // room ids become file name tokens; collapse anything path-hostile
        let safe: String = room_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("room_{}.jsonl", safe))
    }
}

#[async_trait]
impl MessageStore for JsonlMessageStore {
    async fn append(&self, room_id: &str, message: &Message) -> Result<(), AppError> {
        let mut record =
            serde_json::to_vec(message).map_err(|e| AppError::WriteFailed(e.to_string()))?;
        record.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(room_id))
            .await
            .map_err(|e| AppError::WriteFailed(e.to_string()))?;

        // whole record in one write so concurrent readers never observe a
        // torn line
        file.write_all(&record)
            .await
            .map_err(|e| AppError::WriteFailed(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| AppError::WriteFailed(e.to_string()))?;

        debug!(room_id = %room_id, sequence = message.sequence, "Message appended to durable log");
        Ok(())
    }

    async fn read_page(
        &self,
        room_id: &str,
        limit: usize,
        before_sequence: Option<u64>,
    ) -> Result<Vec<Message>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let file = match tokio::fs::File::open(self.log_path(room_id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::DatabaseError(e.to_string())),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut window: VecDeque<Message> = VecDeque::with_capacity(limit);

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let message: Message = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Skipping malformed log line");
                    continue;
                }
            };
            push_into_window(&mut window, message, limit, before_sequence);
        }

        Ok(window.into_iter().rev().collect())
    }

    async fn message_count(&self, room_id: &str) -> Result<u64, AppError> {
        let file = match tokio::fs::File::open(self.log_path(room_id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::DatabaseError(e.to_string())),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut count = 0;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?
        {
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory implementation of MessageStore for development and testing
pub struct InMemoryMessageStore {
    rooms: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, room_id: &str, message: &Message) -> Result<(), AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(room_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn read_page(
        &self,
        room_id: &str,
        limit: usize,
        before_sequence: Option<u64>,
    ) -> Result<Vec<Message>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rooms = self.rooms.lock().unwrap();
        let mut window: VecDeque<Message> = VecDeque::with_capacity(limit);
        if let Some(messages) = rooms.get(room_id) {
            for message in messages {
                push_into_window(&mut window, message.clone(), limit, before_sequence);
            }
        }
        Ok(window.into_iter().rev().collect())
    }

    async fn message_count(&self, room_id: &str) -> Result<u64, AppError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.get(room_id).map_or(0, |m| m.len() as u64))
    }
}

/// Keeps the last `limit` distinct-by-sequence messages matching the cursor.
fn push_into_window(
    window: &mut VecDeque<Message>,
    message: Message,
    limit: usize,
    before_sequence: Option<u64>,
) {
    if let Some(before) = before_sequence {
        if message.sequence >= before {
            return;
        }
    }
    if window.iter().any(|m| m.sequence == message.sequence) {
        return;
    }
    if window.len() == limit {
        window.pop_front();
    }
    window.push_back(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(room_id: &str, sequence: u64) -> Message {
        Message::new(
            room_id.to_string(),
            "alice".to_string(),
            format!("message {}", sequence),
            sequence,
        )
    }

    #[tokio::test]
    async fn test_append_then_read_page_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path()).unwrap();

        for sequence in 1..=5 {
            store.append("r1", &message("r1", sequence)).await.unwrap();
        }

        let page = store.read_page("r1", 3, None).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn test_before_cursor_pages_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path()).unwrap();

        for sequence in 1..=5 {
            store.append("r1", &message("r1", sequence)).await.unwrap();
        }

        let page = store.read_page("r1", 2, Some(4)).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_missing_room_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path()).unwrap();

        assert!(store.read_page("ghost", 10, None).await.unwrap().is_empty());
        assert_eq!(store.message_count("ghost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path()).unwrap();

        store.append("r1", &message("r1", 1)).await.unwrap();
        tokio::fs::write(
            dir.path().join("room_r1.jsonl"),
            format!(
                "{}\nnot json at all\n{}\n",
                serde_json::to_string(&message("r1", 1)).unwrap(),
                serde_json::to_string(&message("r1", 2)).unwrap()
            ),
        )
        .await
        .unwrap();

        let page = store.read_page("r1", 10, None).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_duplicate_appends_deduplicated_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path()).unwrap();

        let duplicated = message("r1", 1);
        store.append("r1", &duplicated).await.unwrap();
        store.append("r1", &duplicated).await.unwrap();
        store.append("r1", &message("r1", 2)).await.unwrap();

        assert_eq!(store.message_count("r1").await.unwrap(), 3);

        let page = store.read_page("r1", 10, None).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_in_memory_store_matches_contract() {
        let store = InMemoryMessageStore::new();
        for sequence in 1..=5 {
            store.append("r1", &message("r1", sequence)).await.unwrap();
        }

        let page = store.read_page("r1", 2, Some(5)).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![4, 3]);
        assert_eq!(store.message_count("r1").await.unwrap(), 5);
    }
}
