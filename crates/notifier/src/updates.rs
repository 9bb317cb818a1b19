//! The subset of the Telegram `Update` object this service reads.
//!
//! Unknown fields are ignored, so the full Bot API payload deserializes as is.

use serde::Deserialize;

use relay_common::types::SenderIdentity;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
}

impl Message {
    /// Text of the message, falling back to the media caption.
    ///
    /// Whitespace-only content counts as none.
    pub fn content(&self) -> Option<&str> {
        [self.text.as_deref(), self.caption.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&User> for SenderIdentity {
    fn from(user: &User) -> Self {
        SenderIdentity {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Option<User>,
    pub message: Option<Message>,
    pub data: Option<String>,
}
