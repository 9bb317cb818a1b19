//! Task envelope construction and work queue submission.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use relay_common::store::{StoreError, WorkQueue};
use relay_common::types::{TASK_SOURCE, TaskEnvelope, TelegramMeta};

#[derive(Clone)]
pub struct TaskEnqueuer {
    queue: Arc<dyn WorkQueue>,
}

impl TaskEnqueuer {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self { queue }
    }

    /// Build the envelope for a freshly claimed submission.
    pub fn build_envelope(task_id: Uuid, raw_text: String, telegram: TelegramMeta) -> TaskEnvelope {
        TaskEnvelope {
            task_id,
            source: TASK_SOURCE.to_string(),
            raw_text,
            telegram,
            created_at: Utc::now(),
        }
    }

    /// Append the envelope to the tail of the work queue.
    ///
    /// No retry and no dead-lettering: a failed push is logged and reported as
    /// `false`, and the submission is lost. The dedup claim stays in place.
    pub async fn enqueue(&self, envelope: &TaskEnvelope) -> bool {
        match self.push(envelope).await {
            Ok(()) => {
                tracing::info!(
                    task_id = %envelope.task_id,
                    chat_id = envelope.telegram.chat_id,
                    message_id = envelope.telegram.message_id,
                    "Task enqueued"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    task_id = %envelope.task_id,
                    chat_id = envelope.telegram.chat_id,
                    message_id = envelope.telegram.message_id,
                    error = %e,
                    "Failed to push task to work queue"
                );
                false
            }
        }
    }

    async fn push(&self, envelope: &TaskEnvelope) -> Result<(), StoreError> {
        let payload = serde_json::to_string(envelope)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.queue.push(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_common::store::MemoryQueue;

    struct DownQueue;

    #[async_trait]
    impl WorkQueue for DownQueue {
        async fn push(&self, _payload: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn meta() -> TelegramMeta {
        TelegramMeta {
            chat_id: 222,
            message_id: 333,
            user_id: 111,
            username: Some("ann".to_string()),
        }
    }

    #[tokio::test]
    async fn test_enqueue_appends_json_envelope() {
        let queue = MemoryQueue::new();
        let enqueuer = TaskEnqueuer::new(Arc::new(queue.clone()));
        let envelope = TaskEnqueuer::build_envelope(Uuid::new_v4(), "hello".to_string(), meta());

        assert!(enqueuer.enqueue(&envelope).await);

        let items = queue.snapshot();
        assert_eq!(items.len(), 1);
        let decoded: TaskEnvelope = serde_json::from_str(&items[0]).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn test_enqueue_keeps_fifo_order() {
        let queue = MemoryQueue::new();
        let enqueuer = TaskEnqueuer::new(Arc::new(queue.clone()));
        let first = TaskEnqueuer::build_envelope(Uuid::new_v4(), "one".to_string(), meta());
        let second = TaskEnqueuer::build_envelope(Uuid::new_v4(), "two".to_string(), meta());

        assert!(enqueuer.enqueue(&first).await);
        assert!(enqueuer.enqueue(&second).await);

        let texts: Vec<String> = queue
            .snapshot()
            .iter()
            .map(|raw| serde_json::from_str::<TaskEnvelope>(raw).unwrap().raw_text)
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_enqueue_reports_failure_without_retry() {
        let enqueuer = TaskEnqueuer::new(Arc::new(DownQueue));
        let envelope = TaskEnqueuer::build_envelope(Uuid::new_v4(), "hello".to_string(), meta());
        assert!(!enqueuer.enqueue(&envelope).await);
    }

    #[test]
    fn test_build_envelope_sets_source() {
        let task_id = Uuid::new_v4();
        let envelope = TaskEnqueuer::build_envelope(task_id, "text".to_string(), meta());
        assert_eq!(envelope.task_id, task_id);
        assert_eq!(envelope.source, "telegram");
        assert_eq!(envelope.telegram, meta());
    }
}
