//! Nullable conferencing SFU: rooms and tokens kept in memory.

use crate::lock;
use async_trait::async_trait;
use chama_meetings::{ConferencingClient, ConferencingError, TokenGrant};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Records every call. Room ids and tokens are deterministic:
/// `room-<n>` and `token-<n>:<room>:<identity>`.
#[derive(Default)]
pub struct NullConferencing {
    rooms: Mutex<BTreeMap<String, String>>,
    deleted: Mutex<Vec<String>>,
    grants: Mutex<Vec<TokenGrant>>,
    counter: AtomicU64,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    hang: AtomicBool,
}

impl NullConferencing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_room_creation(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_room_deletion(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Make every call wait far longer than any sane timeout.
    pub fn hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Open rooms, by name, with their ids.
    pub fn rooms(&self) -> BTreeMap<String, String> {
        lock(&self.rooms).clone()
    }

    pub fn deleted_rooms(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn grants(&self) -> Vec<TokenGrant> {
        lock(&self.grants).clone()
    }

    async fn maybe_hang(&self) {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ConferencingClient for NullConferencing {
    async fn create_room(&self, name: &str, _max_participants: u32) -> Result<String, ConferencingError> {
        self.maybe_hang().await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ConferencingError::Unreachable("null conferencing set to fail".into()));
        }
        let mut rooms = lock(&self.rooms);
        if let Some(id) = rooms.get(name) {
            return Ok(id.clone());
        }
        let id = format!("room-{}", self.next());
        rooms.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn delete_room(&self, name: &str) -> Result<(), ConferencingError> {
        self.maybe_hang().await;
        lock(&self.deleted).push(name.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ConferencingError::Unreachable("null conferencing set to fail".into()));
        }
        lock(&self.rooms).remove(name);
        Ok(())
    }

    async fn mint_token(&self, grant: &TokenGrant) -> Result<String, ConferencingError> {
        self.maybe_hang().await;
        lock(&self.grants).push(grant.clone());
        Ok(format!("token-{}:{}:{}", self.next(), grant.room, grant.identity))
    }
}
