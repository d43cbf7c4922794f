use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chatbridge::history::{InMemoryMessageStore, MessageStore};
use chatbridge::message::Message;
use chatbridge::shared::AppError;

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Message store whose appends can be made to fail on demand, for exercising
/// the persistence consumer's retry path.
pub struct FlakyMessageStore {
    inner: InMemoryMessageStore,
    fail_next: AtomicU32,
    fail_rooms: Mutex<HashSet<String>>,
}

impl FlakyMessageStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            fail_next: AtomicU32::new(0),
            fail_rooms: Mutex::new(HashSet::new()),
        }
    }

    /// The next `n` appends fail with `WriteFailed`, then writes recover.
    pub fn fail_next_appends(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Every append for `room_id` fails, forever.
    pub fn always_fail_room(&self, room_id: &str) {
        self.fail_rooms
            .lock()
            .unwrap()
            .insert(room_id.to_string());
    }
}

impl Default for FlakyMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for FlakyMessageStore {
    async fn append(&self, room_id: &str, message: &Message) -> Result<(), AppError> {
        if self.fail_rooms.lock().unwrap().contains(room_id) {
            return Err(AppError::WriteFailed("disk on fire".to_string()));
        }

        let failed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AppError::WriteFailed("transient failure".to_string()));
        }

        self.inner.append(room_id, message).await
    }

    async fn read_page(
        &self,
        room_id: &str,
        limit: usize,
        before_sequence: Option<u64>,
    ) -> Result<Vec<Message>, AppError> {
        self.inner.read_page(room_id, limit, before_sequence).await
    }

    async fn message_count(&self, room_id: &str) -> Result<u64, AppError> {
        self.inner.message_count(room_id).await
    }
}
