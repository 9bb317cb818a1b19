//! Sender whitelist.

use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether a chat user may submit content.
///
/// Cheap to clone; the id set is shared.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    allowed: Arc<HashSet<i64>>,
}

impl AccessControl {
    pub fn new(allowed: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: Arc::new(allowed.into_iter().collect()),
        }
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed.contains(&user_id)
    }

    /// Same as [`is_allowed`](Self::is_allowed), denying events without a sender.
    pub fn is_sender_allowed(&self, user_id: Option<i64>) -> bool {
        user_id.is_some_and(|id| self.is_allowed(id))
    }
}
