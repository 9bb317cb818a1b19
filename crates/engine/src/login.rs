//! Login confirmation bridge.
//!
//! Forwards a login token from the chat to the backend's confirmation endpoint
//! and maps the answer to one of a fixed set of replies. Every call is
//! independent; nothing is retained between confirmations.

use std::time::Duration;

use relay_common::types::{LoginConfirmRequest, SenderIdentity};

use crate::access::AccessControl;

/// Default bound on one backend confirmation call.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Header the backend authenticates the bot with.
pub const BOT_SECRET_HEADER: &str = "X-BOT-SECRET";

/// User-facing result of a confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReply {
    UnknownSender,
    RetryLater,
    Expired,
    Approved,
    Denied,
}

impl LoginReply {
    pub fn message(&self) -> &'static str {
        match self {
            LoginReply::UnknownSender => "Не удалось определить пользователя Telegram.",
            LoginReply::RetryLater => "Ошибка подтверждения. Попробуйте позже.",
            LoginReply::Expired => "QR устарел. Обновите страницу входа.",
            LoginReply::Approved => "Вход подтверждён. Вернитесь на сайт.",
            LoginReply::Denied => "Доступ запрещён. Обратитесь к администратору.",
        }
    }
}

/// What the `status` field of a 200 response looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStatus {
    Field(String),
    Missing,
    Unparseable,
}

/// Everything the reply depends on, gathered from one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    NoSender,
    TransportFailed,
    Responded { status: u16, body_status: BodyStatus },
}

/// Map an exchange outcome to a reply. Priority follows the match order.
pub fn interpret(outcome: &BackendOutcome) -> LoginReply {
    match outcome {
        BackendOutcome::NoSender => LoginReply::UnknownSender,
        BackendOutcome::TransportFailed => LoginReply::RetryLater,
        BackendOutcome::Responded {
            status: 404 | 410, ..
        } => LoginReply::Expired,
        BackendOutcome::Responded { status, .. } if *status != 200 => LoginReply::RetryLater,
        BackendOutcome::Responded {
            body_status: BodyStatus::Unparseable,
            ..
        } => LoginReply::RetryLater,
        BackendOutcome::Responded {
            body_status: BodyStatus::Field(status),
            ..
        } if status == "APPROVED" => LoginReply::Approved,
        BackendOutcome::Responded { .. } => LoginReply::Denied,
    }
}

#[derive(Clone)]
pub struct LoginConfirmationBridge {
    http: reqwest::Client,
    confirm_url: String,
    bot_secret: String,
    access: AccessControl,
}

impl LoginConfirmationBridge {
    pub fn new(
        confirm_url: impl Into<String>,
        bot_secret: impl Into<String>,
        access: AccessControl,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            confirm_url: confirm_url.into(),
            bot_secret: bot_secret.into(),
            access,
        })
    }

    /// Confirm `login_token` on behalf of `sender`.
    ///
    /// Without a sender no request is made. Transport failures are not retried.
    pub async fn confirm(&self, login_token: &str, sender: Option<&SenderIdentity>) -> LoginReply {
        let outcome = match sender {
            Some(sender) => self.call_backend(login_token, sender).await,
            None => BackendOutcome::NoSender,
        };

        let reply = interpret(&outcome);
        tracing::info!(
            user_id = sender.map(|s| s.id),
            outcome = ?outcome,
            reply = ?reply,
            "Login confirmation processed"
        );
        reply
    }

    async fn call_backend(&self, login_token: &str, sender: &SenderIdentity) -> BackendOutcome {
        let request = LoginConfirmRequest {
            login_token,
            telegram_user_id: sender.id,
            username: sender.username.as_deref(),
            first_name: sender.first_name.as_deref(),
            last_name: sender.last_name.as_deref(),
            allowed: self.access.is_allowed(sender.id),
        };

        let response = match self
            .http
            .post(&self.confirm_url)
            .header(BOT_SECRET_HEADER, &self.bot_secret)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(user_id = sender.id, error = %e, "Login backend unreachable");
                return BackendOutcome::TransportFailed;
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            return BackendOutcome::Responded {
                status,
                body_status: BodyStatus::Missing,
            };
        }

        let body_status = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("status")
                .and_then(|value| value.as_str())
                .map(|value| BodyStatus::Field(value.to_string()))
                .unwrap_or(BodyStatus::Missing),
            Err(e) => {
                tracing::warn!(user_id = sender.id, error = %e, "Login backend returned a malformed body");
                BodyStatus::Unparseable
            }
        };

        BackendOutcome::Responded {
            status,
            body_status,
        }
    }
}
