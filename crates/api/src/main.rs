//! Relay API server binary entrypoint.
//!
//! Serves the Telegram webhook and the internal notify endpoint, and runs the
//! notification relay alongside until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use relay_common::config::AppConfig;
use relay_common::redis_pool::create_redis_pool;
use relay_common::store::{RedisDedupStore, RedisQueue};
use relay_notifier::relay::NotificationRelay;
use relay_notifier::telegram::TelegramClient;

use relay_api::routes::create_router;
use relay_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("relay_api=debug,relay_engine=debug,relay_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting relay API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Intake commands and the relay's BLPOP each get their own connection
    let redis = create_redis_pool(&config.redis_url).await?;
    let relay_redis = create_redis_pool(&config.redis_url).await?;
    tracing::info!("Redis connections established");

    let telegram = Arc::new(TelegramClient::new(
        config.telegram_api_base.clone(),
        config.telegram_bot_token.clone(),
        Duration::from_secs(config.telegram_timeout_secs),
    )?);

    if let Some(url) = &config.webhook_url {
        telegram.set_webhook(url).await?;
        tracing::info!(webhook_path = %config.telegram_webhook_path, "Telegram webhook registered");
    }

    let relay = NotificationRelay::new(
        Arc::new(RedisQueue::new(relay_redis, config.notification_queue_key.clone())),
        telegram.clone(),
        config.notify_chat_ids.clone(),
    )
    .with_wait(Duration::from_secs(config.notification_wait_secs));

    let port = config.port;

    // Build application state
    let state = AppState::new(
        config.clone(),
        Arc::new(RedisDedupStore::new(redis.clone())),
        Arc::new(RedisQueue::new(redis, config.task_queue_key.clone())),
        telegram,
    )?;

    let shutdown = CancellationToken::new();
    let relay_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { relay.run(shutdown).await }
    });

    // Build router
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Covers the server exiting on its own as well
    shutdown.cancel();
    if let Err(e) = relay_task.await {
        tracing::error!(error = %e, "Notification relay task failed");
    }

    tracing::info!("Relay API server stopped.");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
    shutdown.cancel();
}
