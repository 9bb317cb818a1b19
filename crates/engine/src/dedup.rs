//! Intake deduplication: one accepted submission per (chat, message) pair.
//!
//! Each submission claims `dedup:<chat_id>:<message_id>` with `SET NX EX`
//! semantics. The first claim stores a freshly generated task id and wins;
//! every later claim inside the TTL sees the key held and loses. Keys are never
//! deleted explicitly, they expire.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use relay_common::store::{DedupStore, StoreError};

/// Dedup window (7 days).
pub const DEDUP_TTL: Duration = Duration::from_secs(604_800);

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This call won; the envelope must carry this task id.
    New(Uuid),
    /// Another submission already holds the key.
    Duplicate,
}

impl Claim {
    pub fn is_new(&self) -> bool {
        matches!(self, Claim::New(_))
    }

    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            Claim::New(task_id) => Some(*task_id),
            Claim::Duplicate => None,
        }
    }
}

#[derive(Clone)]
pub struct IntakeDeduplicator {
    store: Arc<dyn DedupStore>,
    ttl: Duration,
}

impl IntakeDeduplicator {
    pub fn new(store: Arc<dyn DedupStore>) -> Self {
        Self::with_ttl(store, DEDUP_TTL)
    }

    pub fn with_ttl(store: Arc<dyn DedupStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key(chat_id: i64, message_id: i64) -> String {
        format!("dedup:{}:{}", chat_id, message_id)
    }

    /// Atomically claim the (chat, message) pair.
    ///
    /// A store failure is returned as `Err`, never folded into
    /// [`Claim::Duplicate`].
    pub async fn claim(&self, chat_id: i64, message_id: i64) -> Result<Claim, StoreError> {
        let key = Self::key(chat_id, message_id);
        let task_id = Uuid::new_v4();

        let created = self
            .store
            .set_if_absent(&key, &task_id.to_string(), self.ttl)
            .await?;

        if created {
            Ok(Claim::New(task_id))
        } else {
            tracing::debug!(key = %key, "Dedup key already held");
            Ok(Claim::Duplicate)
        }
    }
}
