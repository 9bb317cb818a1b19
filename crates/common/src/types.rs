use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origin tag stamped on every task envelope produced by this service.
pub const TASK_SOURCE: &str = "telegram";

/// Chat-side identifiers of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramMeta {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
}

/// Canonical record pushed to the work queue for one accepted submission.
///
/// Created once and never mutated; processing and deletion belong to the
/// downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: Uuid,
    pub source: String,
    pub raw_text: String,
    pub telegram: TelegramMeta,
    pub created_at: DateTime<Utc>,
}

/// Item consumed from the notification queue.
///
/// Recipients are not carried per message; the relay uses its configured list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub text: Option<String>,
}

impl NotificationPayload {
    /// Deliverable text, if any. Whitespace-only text counts as empty.
    pub fn deliverable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }
}

/// The chat user behind an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Body of `POST /auth/telegram/confirm` on the backend.
#[derive(Debug, Clone, Serialize)]
pub struct LoginConfirmRequest<'a> {
    pub login_token: &'a str,
    pub telegram_user_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    /// Whitelist verdict for the sender at request time
    pub allowed: bool,
}
