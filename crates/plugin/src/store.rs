//! In-memory collection records, one per user.
//!
//! Expiry is lazy: nothing sweeps the map, the state machine checks the
//! deadline when the next message from that user arrives.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use {gemexp_media::InputImage, tokio::time::Instant};

/// Longest window a record can have; larger timeouts are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// An open collection window for one user.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub user_id: String,
    pub expires_at: Instant,
    /// Instruction text. Empty until the first text-bearing message.
    pub text: String,
    /// Images gathered so far, in arrival order.
    pub images: Vec<InputImage>,
}

impl PendingRequest {
    pub fn new(user_id: impl Into<String>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            user_id: user_id.into(),
            expires_at: now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now),
            text: String::new(),
            images: Vec::new(),
        }
    }

    /// True once `now` is strictly past the deadline.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Map of user id to pending record.
///
/// The lock is only held inside each method, never across an await.
#[derive(Debug, Default)]
pub struct PendingRequestStore {
    records: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the record for `user_id`.
    pub fn get(&self, user_id: &str) -> Option<PendingRequest> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(user_id).cloned()
    }

    /// Insert or replace the record for its user, returning the previous one.
    pub fn put(&self, record: PendingRequest) -> Option<PendingRequest> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.user_id.clone(), record)
    }

    pub fn delete(&self, user_id: &str) -> Option<PendingRequest> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.remove(user_id)
    }

    /// Mutate the record in place. Returns `None` when there is no record.
    pub fn update<R>(&self, user_id: &str, f: impl FnOnce(&mut PendingRequest) -> R) -> Option<R> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get_mut(user_id).map(f)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.clear();
    }
}
