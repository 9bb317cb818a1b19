//! Shared application state for the Axum API server.

use std::sync::Arc;
use std::time::Duration;

use relay_common::config::AppConfig;
use relay_common::store::{DedupStore, WorkQueue};
use relay_engine::access::AccessControl;
use relay_engine::intake::IntakeService;
use relay_engine::login::LoginConfirmationBridge;
use relay_notifier::telegram::ChatTransport;

/// Service context shared across all route handlers via Axum `State`.
///
/// Built once at startup; store and transport handles are owned here and
/// dropped with the router on shutdown.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub access: AccessControl,
    pub intake: IntakeService,
    pub login: LoginConfirmationBridge,
    pub transport: Arc<dyn ChatTransport>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        dedup_store: Arc<dyn DedupStore>,
        work_queue: Arc<dyn WorkQueue>,
        transport: Arc<dyn ChatTransport>,
    ) -> anyhow::Result<Self> {
        let access = AccessControl::new(config.allowed_user_ids.iter().copied());
        let intake = IntakeService::new(dedup_store, work_queue, config.intake_max_inflight);
        let login = LoginConfirmationBridge::new(
            config.login_confirm_url.clone(),
            config.telegram_bot_secret.clone(),
            access.clone(),
            Duration::from_secs(config.backend_timeout_secs),
        )?;

        Ok(Self {
            config: Arc::new(config),
            access,
            intake,
            login,
            transport,
        })
    }
}
