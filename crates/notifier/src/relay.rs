//! Notification relay. Drains the notification queue and fans each item out
//! to the configured operator chats.
//!
//! ```text
//! WAITING → ITEM_RECEIVED → DISCARDED → WAITING
//!                         → DELIVERING(0..N-1) → WAITING
//! ```
//!
//! A failed delivery to one recipient is logged and the fan-out moves on to
//! the next one. Nothing is retried: delivery is at most once per recipient.
//!
//! Cancellation is checked once per iteration. A pending wait runs to its
//! bound and an in-flight fan-out finishes before the loop exits.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use relay_common::store::NotificationSource;
use relay_common::types::NotificationPayload;

use crate::telegram::ChatTransport;

/// Default bounded wait of one iteration.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Pause after the queue itself errors, so a dead store is not hammered.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Malformed,
    EmptyText,
    NoRecipients,
}

/// Per-recipient result of one fan-out, in recipient order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<i64>,
    pub failed: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Discarded(DiscardReason),
    Delivered(DeliveryReport),
}

pub struct NotificationRelay {
    source: Arc<dyn NotificationSource>,
    transport: Arc<dyn ChatTransport>,
    recipients: Vec<i64>,
    wait: Duration,
}

impl NotificationRelay {
    pub fn new(
        source: Arc<dyn NotificationSource>,
        transport: Arc<dyn ChatTransport>,
        recipients: Vec<i64>,
    ) -> Self {
        Self {
            source,
            transport,
            recipients,
            wait: DEFAULT_WAIT,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            recipients = self.recipients.len(),
            wait_secs = self.wait.as_secs(),
            "Notification relay started"
        );

        while !cancel.is_cancelled() {
            match self.source.pop(self.wait).await {
                Ok(Some(raw)) => {
                    self.relay(&raw).await;
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read notification queue");
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("Notification relay stopped");
    }

    /// Handle one raw queue item.
    pub async fn relay(&self, raw: &str) -> RelayOutcome {
        let payload: NotificationPayload = match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed notification");
                return RelayOutcome::Discarded(DiscardReason::Malformed);
            }
        };

        let Some(text) = payload.deliverable_text() else {
            tracing::debug!("Discarding notification without text");
            return RelayOutcome::Discarded(DiscardReason::EmptyText);
        };

        if self.recipients.is_empty() {
            tracing::debug!("Discarding notification, no recipients configured");
            return RelayOutcome::Discarded(DiscardReason::NoRecipients);
        }

        RelayOutcome::Delivered(self.fan_out(text).await)
    }

    async fn fan_out(&self, text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for &recipient in &self.recipients {
            match self.transport.send_text(recipient, text).await {
                Ok(()) => report.delivered.push(recipient),
                Err(e) => {
                    tracing::warn!(
                        recipient,
                        error = %e,
                        "Notification delivery failed"
                    );
                    report.failed.push(recipient);
                }
            }
        }

        tracing::info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Notification relayed"
        );
        report
    }
}
