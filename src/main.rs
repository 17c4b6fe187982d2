use std::sync::Arc;

use anyhow::{Error, Result};
use notification_core::{
    api::{AppState, run_api_server},
    clients::in_app::InAppInbox,
    config::Config,
    scheduler::RetryScheduler,
    utils::init_tracing,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(config.log_json);

    let inbox = InAppInbox::default();
    let dispatcher = Arc::new(config.build_dispatcher(inbox.clone())?);
    let scheduler = RetryScheduler::new(Arc::clone(&dispatcher), config.retry_config());

    info!(
        channels = ?dispatcher.registered_types(),
        worker_concurrency = config.worker_concurrency,
        "Configuration validated. Notification worker is ready."
    );

    let state = Arc::new(AppState {
        dispatcher,
        scheduler: scheduler.clone(),
        inbox,
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    run_api_server(config.server_port, state, shutdown).await?;

    scheduler.shutdown().await;

    Ok(())
}
