use std::{future::Future, sync::Arc};

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::in_app::{InAppInbox, InboxEntry},
    dispatcher::CompositeDispatcher,
    models::health::HealthStatus,
    scheduler::RetryScheduler,
};

pub struct AppState {
    pub dispatcher: Arc<CompositeDispatcher>,
    pub scheduler: RetryScheduler,
    pub inbox: InAppInbox,
}

#[derive(Debug, Serialize)]
struct InboxResponse {
    user_id: String,
    unread_count: usize,
    entries: Vec<InboxEntry>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/connections", get(connection_check))
        .route("/retries", get(list_retries))
        .route("/retries/{id}", delete(cancel_retry))
        .route("/inbox/{user_id}", get(user_inbox))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server<F>(port: u16, state: Arc<AppState>, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Monitoring server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.dispatcher.get_health_report().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn connection_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dispatcher.test_all_connections().await)
}

async fn list_retries(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.all_retry_statuses())
}

async fn cancel_retry(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> StatusCode {
    if state.scheduler.cancel_retry(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn user_inbox(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> impl IntoResponse {
    Json(InboxResponse {
        unread_count: state.inbox.unread_count(&user_id),
        entries: state.inbox.inbox(&user_id),
        user_id,
    })
}
