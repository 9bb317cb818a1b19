//! Inbound Telegram update handling.
//!
//! - `/start` (optionally with a login token) → login prompt or confirm button
//! - `confirm:<token>` callback → login confirmation bridge
//! - anything else → whitelist gate, then fire-and-forget intake submission
//!
//! Nothing here returns an error: failures are logged and the webhook still
//! acknowledges the update.

use relay_common::types::SenderIdentity;
use relay_engine::intake::SubmissionRequest;
use relay_notifier::telegram::InlineButton;
use relay_notifier::updates::{CallbackQuery, Message, Update};

use crate::state::AppState;

pub const START_PROMPT: &str = "Отсканируйте QR-код для входа.";
pub const CONFIRM_PROMPT: &str = "Нажмите кнопку, чтобы подтвердить вход.";
pub const CONFIRM_BUTTON: &str = "Подтвердить вход";
pub const INTAKE_DENIED: &str = "У вас нет доступа к отправке вакансий.";
pub const INTAKE_NO_TEXT: &str = "Пришлите текст вакансии сообщением или подписью к файлу.";
pub const INTAKE_ACCEPTED: &str = "Вакансия принята в обработку.";

const CONFIRM_PREFIX: &str = "confirm:";

pub async fn handle_update(state: &AppState, update: Update) {
    if let Some(callback) = update.callback_query {
        handle_callback(state, callback).await;
    } else if let Some(message) = update.message {
        handle_message(state, message).await;
    } else {
        tracing::debug!(update_id = update.update_id, "Ignoring unsupported update");
    }
}

/// Parse a `/start` command.
///
/// Returns `None` for anything that is not `/start`, `Some(None)` for a bare
/// `/start`, and `Some(Some(token))` when an argument follows. A
/// `/start@<name>` mention must name `bot_username` when one is configured.
pub fn parse_start<'a>(text: &'a str, bot_username: Option<&str>) -> Option<Option<&'a str>> {
    let text = text.trim();
    let (command, rest) = match text.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (text, ""),
    };

    let name = command.strip_prefix('/')?;
    let (name, mention) = match name.split_once('@') {
        Some((name, mention)) => (name, Some(mention)),
        None => (name, None),
    };
    if name != "start" {
        return None;
    }
    if let (Some(mention), Some(bot)) = (mention, bot_username)
        && !mention.eq_ignore_ascii_case(bot)
    {
        return None;
    }

    Some(Some(rest).filter(|arg| !arg.is_empty()))
}

async fn handle_message(state: &AppState, message: Message) {
    let chat_id = message.chat.id;

    let bot_username = state.config.telegram_bot_username.as_deref();
    if let Some(start) = message
        .text
        .as_deref()
        .and_then(|text| parse_start(text, bot_username))
    {
        match start {
            None => reply(state, chat_id, START_PROMPT).await,
            Some(login_token) => {
                let button = InlineButton {
                    text: CONFIRM_BUTTON.to_string(),
                    callback_data: format!("{}{}", CONFIRM_PREFIX, login_token),
                };
                if let Err(e) = state
                    .transport
                    .send_with_button(chat_id, CONFIRM_PROMPT, &button)
                    .await
                {
                    tracing::warn!(chat_id, error = %e, "Failed to send login confirmation prompt");
                }
            }
        }
        return;
    }

    let Some(sender) = message
        .from
        .as_ref()
        .filter(|user| state.access.is_allowed(user.id))
    else {
        tracing::info!(
            chat_id,
            message_id = message.message_id,
            user_id = message.from.as_ref().map(|u| u.id),
            "Submission rejected: sender not whitelisted"
        );
        reply(state, chat_id, INTAKE_DENIED).await;
        return;
    };

    let Some(content) = message.content() else {
        tracing::info!(
            chat_id,
            message_id = message.message_id,
            user_id = sender.id,
            "Submission rejected: no text content"
        );
        reply(state, chat_id, INTAKE_NO_TEXT).await;
        return;
    };

    // Fire-and-forget: the outcome is only visible in the intake logs.
    drop(state.intake.submit(SubmissionRequest {
        chat_id,
        message_id: message.message_id,
        user_id: sender.id,
        username: sender.username.clone(),
        raw_text: content.to_string(),
    }));

    reply(state, chat_id, INTAKE_ACCEPTED).await;
}

async fn handle_callback(state: &AppState, callback: CallbackQuery) {
    let Some(login_token) = callback
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix(CONFIRM_PREFIX))
    else {
        tracing::debug!(callback_id = %callback.id, "Ignoring unknown callback data");
        return;
    };

    let sender = callback.from.as_ref().map(SenderIdentity::from);
    let outcome = state.login.confirm(login_token, sender.as_ref()).await;

    if let Err(e) = state.transport.answer_callback(&callback.id).await {
        tracing::warn!(callback_id = %callback.id, error = %e, "Failed to answer callback query");
    }

    if let Some(message) = &callback.message {
        reply(state, message.chat.id, outcome.message()).await;
    }
}

async fn reply(state: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = state.transport.send_text(chat_id, text).await {
        tracing::warn!(chat_id, error = %e, "Failed to send reply");
    }
}
