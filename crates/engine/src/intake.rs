//! Intake pipeline: dedup claim, then queue submission.
//!
//! The inbound handler hands a [`SubmissionRequest`] to
//! [`IntakeService::submit`] and moves on. The outcome is observable only
//! through logs, or through the returned `JoinHandle` for callers that want it.
//! Submissions beyond the in-flight bound are dropped, not queued.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use relay_common::store::{DedupStore, WorkQueue};
use relay_common::types::TelegramMeta;

use crate::dedup::{Claim, IntakeDeduplicator};
use crate::enqueue::TaskEnqueuer;

/// One candidate submission extracted from an inbound chat message.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Claimed and pushed.
    Enqueued(Uuid),
    /// The (chat, message) pair was already claimed inside the dedup window.
    Duplicate,
    /// The dedup store could not be reached; nothing was claimed or pushed.
    ClaimFailed,
    /// Claimed, but the push failed. The submission is lost and the claim stays.
    PushFailed(Uuid),
}

#[derive(Clone)]
pub struct IntakeService {
    dedup: IntakeDeduplicator,
    enqueuer: TaskEnqueuer,
    permits: Arc<Semaphore>,
}

impl IntakeService {
    pub fn new(
        dedup_store: Arc<dyn DedupStore>,
        work_queue: Arc<dyn WorkQueue>,
        max_inflight: usize,
    ) -> Self {
        Self::from_parts(
            IntakeDeduplicator::new(dedup_store),
            TaskEnqueuer::new(work_queue),
            max_inflight,
        )
    }

    pub fn from_parts(
        dedup: IntakeDeduplicator,
        enqueuer: TaskEnqueuer,
        max_inflight: usize,
    ) -> Self {
        Self {
            dedup,
            enqueuer,
            permits: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    /// Fire-and-forget submission.
    ///
    /// Returns immediately. When `max_inflight` submissions are already
    /// running the request is logged and dropped and `None` comes back, so a
    /// flood never piles up waiting tasks. Dropping the handle detaches the task.
    pub fn submit(&self, request: SubmissionRequest) -> Option<JoinHandle<SubmissionOutcome>> {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!(
                    chat_id = request.chat_id,
                    message_id = request.message_id,
                    user_id = request.user_id,
                    "Intake saturated, submission dropped"
                );
                return None;
            }
        };

        let service = self.clone();
        Some(tokio::spawn(async move {
            let _permit = permit;
            service.process(request).await
        }))
    }

    /// Claim the submission and, if this call won, push its envelope.
    pub async fn process(&self, request: SubmissionRequest) -> SubmissionOutcome {
        let claim = match self.dedup.claim(request.chat_id, request.message_id).await {
            Ok(claim) => claim,
            Err(e) => {
                tracing::error!(
                    chat_id = request.chat_id,
                    message_id = request.message_id,
                    user_id = request.user_id,
                    error = %e,
                    "Dedup store unavailable, submission dropped"
                );
                return SubmissionOutcome::ClaimFailed;
            }
        };

        let task_id = match claim {
            Claim::New(task_id) => task_id,
            Claim::Duplicate => {
                tracing::info!(
                    chat_id = request.chat_id,
                    message_id = request.message_id,
                    user_id = request.user_id,
                    "Duplicate submission ignored"
                );
                return SubmissionOutcome::Duplicate;
            }
        };

        let envelope = TaskEnqueuer::build_envelope(
            task_id,
            request.raw_text,
            TelegramMeta {
                chat_id: request.chat_id,
                message_id: request.message_id,
                user_id: request.user_id,
                username: request.username,
            },
        );

        if self.enqueuer.enqueue(&envelope).await {
            SubmissionOutcome::Enqueued(task_id)
        } else {
            SubmissionOutcome::PushFailed(task_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_common::store::{MemoryDedupStore, MemoryQueue, StoreError};
    use relay_common::types::TaskEnvelope;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct DownStore;

    #[async_trait]
    impl DedupStore for DownStore {
        async fn set_if_absent(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[async_trait]
    impl WorkQueue for DownStore {
        async fn push(&self, _payload: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn request(chat_id: i64, message_id: i64) -> SubmissionRequest {
        SubmissionRequest {
            chat_id,
            message_id,
            user_id: 111,
            username: Some("ann".to_string()),
            raw_text: "Looking for a backend role.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_process_enqueues_envelope_with_claimed_task_id() {
        let dedup = MemoryDedupStore::new();
        let queue = MemoryQueue::new();
        let intake = IntakeService::new(Arc::new(dedup.clone()), Arc::new(queue.clone()), 4);

        let outcome = intake.process(request(222, 333)).await;
        let SubmissionOutcome::Enqueued(task_id) = outcome else {
            panic!("expected Enqueued, got {:?}", outcome);
        };

        assert_eq!(dedup.get("dedup:222:333"), Some(task_id.to_string()));
        let items = queue.snapshot();
        assert_eq!(items.len(), 1);
        let envelope: TaskEnvelope = serde_json::from_str(&items[0]).unwrap();
        assert_eq!(envelope.task_id, task_id);
        assert_eq!(envelope.telegram.chat_id, 222);
        assert_eq!(envelope.telegram.message_id, 333);
        assert_eq!(envelope.telegram.user_id, 111);
        assert_eq!(envelope.raw_text, "Looking for a backend role.");
    }

    #[tokio::test]
    async fn test_duplicate_is_not_enqueued() {
        let queue = MemoryQueue::new();
        let intake = IntakeService::new(
            Arc::new(MemoryDedupStore::new()),
            Arc::new(queue.clone()),
            4,
        );

        assert!(matches!(
            intake.process(request(222, 333)).await,
            SubmissionOutcome::Enqueued(_)
        ));
        assert_eq!(
            intake.process(request(222, 333)).await,
            SubmissionOutcome::Duplicate
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_resubmission_after_ttl_gets_new_task_id() {
        let queue = MemoryQueue::new();
        let dedup = IntakeDeduplicator::with_ttl(
            Arc::new(MemoryDedupStore::new()),
            Duration::from_millis(30),
        );
        let intake =
            IntakeService::from_parts(dedup, TaskEnqueuer::new(Arc::new(queue.clone())), 4);

        let first = intake.process(request(222, 333)).await;
        assert_eq!(
            intake.process(request(222, 333)).await,
            SubmissionOutcome::Duplicate
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        let third = intake.process(request(222, 333)).await;

        let (SubmissionOutcome::Enqueued(a), SubmissionOutcome::Enqueued(b)) = (first, third)
        else {
            panic!("expected two enqueued submissions");
        };
        assert_ne!(a, b);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_a_duplicate() {
        let queue = MemoryQueue::new();
        let intake = IntakeService::new(Arc::new(DownStore), Arc::new(queue.clone()), 4);
        assert_eq!(
            intake.process(request(1, 1)).await,
            SubmissionOutcome::ClaimFailed
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_keeps_claim() {
        let dedup = MemoryDedupStore::new();
        let intake = IntakeService::new(Arc::new(dedup.clone()), Arc::new(DownStore), 4);

        let outcome = intake.process(request(222, 333)).await;
        let SubmissionOutcome::PushFailed(task_id) = outcome else {
            panic!("expected PushFailed, got {:?}", outcome);
        };
        assert_eq!(dedup.get("dedup:222:333"), Some(task_id.to_string()));

        // The claim is not rolled back, so a retry from the transport is a duplicate.
        assert_eq!(
            intake.process(request(222, 333)).await,
            SubmissionOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn test_submit_runs_in_background() {
        let queue = MemoryQueue::new();
        let intake = IntakeService::new(
            Arc::new(MemoryDedupStore::new()),
            Arc::new(queue.clone()),
            8,
        );

        let handles: Vec<_> = (0..5)
            .map(|i| intake.submit(request(222, i)).expect("below the in-flight bound"))
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                SubmissionOutcome::Enqueued(_)
            ));
        }
        assert_eq!(queue.len(), 5);
    }

    /// Holds every claim until the gate opens.
    struct GatedStore {
        gate: Arc<Notify>,
        inner: MemoryDedupStore,
    }

    #[async_trait]
    impl DedupStore for GatedStore {
        async fn set_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, StoreError> {
            self.gate.notified().await;
            self.inner.set_if_absent(key, value, ttl).await
        }
    }

    #[tokio::test]
    async fn test_submit_drops_when_saturated() {
        let gate = Arc::new(Notify::new());
        let queue = MemoryQueue::new();
        let intake = IntakeService::new(
            Arc::new(GatedStore {
                gate: gate.clone(),
                inner: MemoryDedupStore::new(),
            }),
            Arc::new(queue.clone()),
            1,
        );

        let first = intake.submit(request(222, 1)).expect("permit available");
        assert!(intake.submit(request(222, 2)).is_none());

        gate.notify_one();
        assert!(matches!(
            first.await.unwrap(),
            SubmissionOutcome::Enqueued(_)
        ));
        assert_eq!(queue.len(), 1);

        // The permit is released once the running submission finishes.
        let third = intake.submit(request(222, 3)).expect("permit released");
        gate.notify_one();
        assert!(matches!(
            third.await.unwrap(),
            SubmissionOutcome::Enqueued(_)
        ));
    }
}
