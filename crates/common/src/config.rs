use std::collections::HashSet;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
///
/// Everything that needs parsing (id lists, derived URLs) is resolved once in
/// [`AppConfig::from_env`]; handlers read typed fields only.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Telegram Bot API token
    pub telegram_bot_token: String,

    /// Bot username; a `/start@<name>` mention must match it when set
    pub telegram_bot_username: Option<String>,

    /// Telegram Bot API base URL (overridable for tests and local proxies)
    pub telegram_api_base: String,

    /// Shared secret sent to the backend as `X-BOT-SECRET`
    pub telegram_bot_secret: String,

    /// Path the webhook route is mounted on (always starts with `/`)
    pub telegram_webhook_path: String,

    /// Full public webhook URL, registered with Telegram at startup when set
    pub webhook_url: Option<String>,

    /// Backend login confirmation endpoint (`<base>/auth/telegram/confirm`)
    pub login_confirm_url: String,

    /// Timeout for backend confirmation calls, in seconds (default: 10)
    pub backend_timeout_secs: u64,

    /// Timeout for Telegram Bot API calls, in seconds (default: 10)
    pub telegram_timeout_secs: u64,

    /// Redis connection string
    pub redis_url: String,

    /// Token expected in `X-Internal-Token` on the internal notify endpoint
    pub internal_notify_token: String,

    /// Telegram user ids allowed to submit content
    pub allowed_user_ids: HashSet<i64>,

    /// Operator chats that receive relayed notifications, in configured order
    pub notify_chat_ids: Vec<i64>,

    /// Redis list that accepted task envelopes are pushed onto
    pub task_queue_key: String,

    /// Redis list the notification relay drains
    pub notification_queue_key: String,

    /// Bounded wait of one relay iteration, in seconds (default: 5)
    pub notification_wait_secs: u64,

    /// Maximum number of intake submissions running at once (default: 64)
    pub intake_max_inflight: usize,

    /// HTTP listen port
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    ///
    /// Fails when `TELEGRAM_BOT_TOKEN` is missing or a numeric variable does
    /// not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let webhook_public_url = var("TELEGRAM_WEBHOOK_PUBLIC_URL", "");
        let telegram_webhook_path =
            normalize_path(&var("TELEGRAM_WEBHOOK_PATH", "/telegram/webhook"));
        let backend_base_url = var("BACKEND_BASE_URL", "http://website_backend:5000");

        Ok(Self {
            telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!("TELEGRAM_BOT_TOKEN environment variable is required")
                })?,
            telegram_bot_username: lookup("TELEGRAM_BOT_USERNAME")
                .map(|name| name.trim().trim_start_matches('@').to_string())
                .filter(|name| !name.is_empty()),
            telegram_api_base: var("TELEGRAM_API_BASE", "https://api.telegram.org"),
            telegram_bot_secret: var("TELEGRAM_BOT_SECRET", ""),
            webhook_url: webhook_url(&webhook_public_url, &telegram_webhook_path),
            telegram_webhook_path,
            login_confirm_url: login_confirm_url(&backend_base_url),
            backend_timeout_secs: parse_env(&lookup, "BACKEND_TIMEOUT_SECS", 10)?,
            telegram_timeout_secs: parse_env(&lookup, "TELEGRAM_TIMEOUT_SECS", 10)?,
            redis_url: var("REDIS_URL", "redis://localhost:6379"),
            internal_notify_token: var("INTERNAL_NOTIFY_TOKEN", ""),
            allowed_user_ids: parse_id_list(&var("ALLOWED_USER_IDS", ""))
                .into_iter()
                .collect(),
            notify_chat_ids: parse_id_list(&var("NOTIFY_CHAT_IDS", "")),
            task_queue_key: var("TASK_QUEUE_KEY", "queue:tasks"),
            notification_queue_key: var("NOTIFICATION_QUEUE_KEY", "queue:notifications"),
            notification_wait_secs: parse_env(&lookup, "NOTIFICATION_WAIT_SECS", 5)?,
            intake_max_inflight: parse_env(&lookup, "INTAKE_MAX_INFLIGHT", 64)?,
            port: parse_env(&lookup, "PORT", 8080)?,
        })
    }
}

/// Parse a comma-separated list of integer ids.
///
/// Blank and malformed entries are skipped, never reported.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| entry.parse().ok())
        .collect()
}

fn parse_env<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}, got {:?}",
                name,
                std::any::type_name::<T>(),
                raw
            )
        }),
        None => Ok(default),
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn webhook_url(public_url: &str, path: &str) -> Option<String> {
    let base = public_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    Some(format!("{}{}", base, path))
}

fn login_confirm_url(backend_base_url: &str) -> String {
    format!(
        "{}/auth/telegram/confirm",
        backend_base_url.trim().trim_end_matches('/')
    )
}
