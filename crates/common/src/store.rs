//! Store ports for the dedup keyspace and the two Redis lists.
//!
//! Both the dedup store and the queues are externally synchronized: `SET NX EX`
//! gives the atomic claim and `RPUSH`/`BLPOP` give FIFO append/pop, so nothing
//! here takes a service-side lock around Redis.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Key/value store with an atomic set-if-absent and automatic expiry.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Set `key` to `value` with `ttl` only if the key does not exist.
    ///
    /// Returns `Ok(true)` if this call created the key, `Ok(false)` if it was
    /// already held.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;
}

/// Append-only FIFO that accepted work is pushed onto.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn push(&self, payload: &str) -> Result<(), StoreError>;
}

/// FIFO the notification relay drains.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Pop the head item, waiting at most `wait`. `Ok(None)` means the wait
    /// elapsed with nothing queued.
    async fn pop(&self, wait: Duration) -> Result<Option<String>, StoreError>;
}

// ============================================================
// Redis
// ============================================================

/// Redis-backed dedup keyspace.
#[derive(Clone)]
pub struct RedisDedupStore {
    manager: ConnectionManager,
}

impl RedisDedupStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();

        // SET key value NX EX ttl
        // Some("OK") when the key was created, None when it already existed
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }
}

/// A Redis list used as a FIFO queue (`RPUSH` to the tail, `BLPOP` from the head).
#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
    key: String,
}

impl RedisQueue {
    pub fn new(manager: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            manager,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn push(&self, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _length: i64 = conn.rpush(&self.key, payload).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for RedisQueue {
    async fn pop(&self, wait: Duration) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();

        // BLPOP key timeout → nil on timeout, [key, value] otherwise
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.key)
            .arg(wait.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(popped.map(|(_, value)| value))
    }
}

// ============================================================
// In-memory
// ============================================================

/// Process-local dedup store with the same claim semantics as Redis.
#[derive(Clone, Default)]
pub struct MemoryDedupStore {
    inner: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a live key.
    pub fn get(&self, key: &str) -> Option<String> {
        let guard = self.inner.lock().ok()?;
        guard
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("dedup store lock poisoned".to_string()))?;
        let now = Instant::now();

        if let Some((_, expires_at)) = guard.get(key)
            && now < *expires_at
        {
            return Ok(false);
        }

        guard.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(true)
    }
}

/// Process-local FIFO implementing both queue ports.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    items: Arc<Mutex<VecDeque<String>>>,
    notify: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the queued items, head first.
    pub fn snapshot(&self) -> Vec<String> {
        self.items
            .lock()
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn try_pop(&self) -> Result<Option<String>, StoreError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StoreError::Unavailable("queue lock poisoned".to_string()))?;
        Ok(items.pop_front())
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn push(&self, payload: &str) -> Result<(), StoreError> {
        self.items
            .lock()
            .map_err(|_| StoreError::Unavailable("queue lock poisoned".to_string()))?
            .push_back(payload.to_string());
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for MemoryQueue {
    async fn pop(&self, wait: Duration) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop()? {
                return Ok(Some(item));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_dedup_claims_once() {
        let store = MemoryDedupStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("dedup:1:2", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("dedup:1:2", "b", ttl).await.unwrap());
        assert_eq!(store.get("dedup:1:2").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_memory_dedup_expires() {
        let store = MemoryDedupStore::new();
        let ttl = Duration::from_millis(30);
        assert!(store.set_if_absent("k", "a", ttl).await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get("k").is_none());
        assert!(store.set_if_absent("k", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_queue_fifo() {
        let queue = MemoryQueue::new();
        queue.push("first").await.unwrap();
        queue.push("second").await.unwrap();
        assert_eq!(queue.len(), 2);

        let wait = Duration::from_millis(10);
        assert_eq!(queue.pop(wait).await.unwrap().as_deref(), Some("first"));
        assert_eq!(queue.pop(wait).await.unwrap().as_deref(), Some("second"));
        assert_eq!(queue.pop(wait).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_queue_pop_wakes_on_push() {
        let queue = MemoryQueue::new();
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push("late").await.unwrap();
        });

        let popped = queue.pop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }

    /// Requires a running Redis:
    ///
    /// ```bash
    /// REDIS_URL="redis://localhost:6379" cargo test -p relay-common -- --ignored
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_redis_claim_and_queue_roundtrip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let manager = crate::redis_pool::create_redis_pool(&url).await.unwrap();

        let key = format!("dedup:test:{}", uuid::Uuid::new_v4());
        let dedup = RedisDedupStore::new(manager.clone());
        let ttl = Duration::from_secs(5);
        assert!(dedup.set_if_absent(&key, "a", ttl).await.unwrap());
        assert!(!dedup.set_if_absent(&key, "b", ttl).await.unwrap());

        let queue = RedisQueue::new(manager, format!("queue:test:{}", uuid::Uuid::new_v4()));
        WorkQueue::push(&queue, "one").await.unwrap();
        WorkQueue::push(&queue, "two").await.unwrap();
        let wait = Duration::from_secs(1);
        assert_eq!(queue.pop(wait).await.unwrap().as_deref(), Some("one"));
        assert_eq!(queue.pop(wait).await.unwrap().as_deref(), Some("two"));
        assert_eq!(queue.pop(wait).await.unwrap(), None);
    }
}
