//! Telegram Bot API transport.
//!
//! Failures come back as [`TransportError`]. Background callers log and drop
//! them; direct replies decide for themselves.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("Telegram {method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the bot token.
        TransportError::Http(err.without_url())
    }
}

/// Single inline keyboard button with callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    async fn send_with_button(
        &self,
        chat_id: i64,
        text: &str,
        button: &InlineButton,
    ) -> Result<(), TransportError>;

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    description: Option<String>,
}

/// Bot API client over plain HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Register `url` as the bot's webhook.
    pub async fn set_webhook(&self, url: &str) -> Result<(), TransportError> {
        self.call("setWebhook", json!({ "url": url })).await
    }

    async fn call(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<(), TransportError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();

        let reply: ApiReply = response.json().await.map_err(|e| TransportError::Api {
            method,
            description: format!("HTTP {}: {}", status, e.without_url()),
        })?;

        if reply.ok {
            Ok(())
        } else {
            Err(TransportError::Api {
                method,
                description: reply
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            })
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    async fn send_with_button(
        &self,
        chat_id: i64,
        text: &str,
        button: &InlineButton,
    ) -> Result<(), TransportError> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "reply_markup": {
                    "inline_keyboard": [[{
                        "text": button.text,
                        "callback_data": button.callback_data,
                    }]]
                }
            }),
        )
        .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(server.url(""), "test-token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_text_posts_send_message() {
        let server = MockServer::start();
        let sent = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .json_body(serde_json::json!({"chat_id": 999, "text": "ping"}));
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": {"message_id": 1}}));
        });

        client(&server).send_text(999, "ping").await.unwrap();
        sent.assert_calls(1);
    }

    #[tokio::test]
    async fn test_send_with_button_builds_inline_keyboard() {
        let server = MockServer::start();
        let sent = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .body_includes("\"callback_data\":\"confirm:abc123\"");
            then.status(200).json_body(serde_json::json!({"ok": true}));
        });

        let button = InlineButton {
            text: "Confirm".to_string(),
            callback_data: "confirm:abc123".to_string(),
        };
        client(&server)
            .send_with_button(111, "Press the button", &button)
            .await
            .unwrap();
        sent.assert_calls(1);
    }

    #[tokio::test]
    async fn test_api_error_is_typed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendMessage");
            then.status(403).json_body(serde_json::json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }));
        });

        let err = client(&server).send_text(1, "hi").await.unwrap_err();
        match err {
            TransportError::Api {
                method,
                description,
            } => {
                assert_eq!(method, "sendMessage");
                assert!(description.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_hides_token() {
        let client =
            TelegramClient::new("http://127.0.0.1:1", "secret-token", Duration::from_secs(2))
                .unwrap();
        let err = client.send_text(1, "hi").await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
        assert!(!err.to_string().contains("secret-token"));
    }

    #[tokio::test]
    async fn test_set_webhook() {
        let server = MockServer::start();
        let registered = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/setWebhook")
                .json_body(serde_json::json!({"url": "https://bot.example.com/telegram/webhook"}));
            then.status(200).json_body(serde_json::json!({"ok": true, "result": true}));
        });

        client(&server)
            .set_webhook("https://bot.example.com/telegram/webhook")
            .await
            .unwrap();
        registered.assert_calls(1);
    }
}
