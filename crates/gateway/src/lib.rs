//! HTTP API gateway for OpenManus.
//!
//! Exposes the task lifecycle over REST, streams step events over SSE and
//! WebSocket, and serves per-task traces. Built on Axum.
//!
//! Each submitted prompt becomes a task driven by its own spawned runner;
//! concurrent tasks share nothing but the store, the event bus, and the
//! trace recorder.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

use openmanus_agent::StopHandle;
use openmanus_config::AppConfig;
use openmanus_core::error::ToolError;
use openmanus_core::event::EventBus;
use openmanus_core::provider::Provider;
use openmanus_core::task::Task;
use openmanus_core::tool::ToolRegistry;
use openmanus_telemetry::Recorder;

/// Failures while bringing the gateway up.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No API key configured. Set OPENMANUS_API_KEY or api_key in config.toml")]
    NoApiKey,

    #[error("Tool setup failed: {0}")]
    Tools(#[from] ToolError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state for the gateway.
pub struct GatewayState {
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub config: AppConfig,
    pub event_bus: Arc<EventBus>,
    pub recorder: Arc<Recorder>,
    /// Task snapshots by id: the spawning snapshot while running, the final
    /// task once the runner finishes.
    pub tasks: RwLock<HashMap<String, Task>>,
    /// Stop handles for in-flight tasks.
    pub stops: RwLock<HashMap<String, StopHandle>>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: AppConfig) -> Self {
        Self {
            provider,
            tools,
            config,
            event_bus: Arc::new(EventBus::default()),
            recorder: Arc::new(Recorder::new()),
            tasks: RwLock::new(HashMap::new()),
            stops: RwLock::new(HashMap::new()),
        }
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/tasks",
            post(api::create_task_handler).get(api::list_tasks_handler),
        )
        .route("/api/tasks/{id}", get(api::get_task_handler))
        .route("/api/tasks/{id}/stop", post(api::stop_task_handler))
        .route("/api/tasks/{id}/events", get(api::task_events_handler))
        .route("/api/tasks/{id}/trace", get(api::task_trace_handler))
        .route("/ws/{id}", get(api::ws_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    let Some(provider) = openmanus_providers::build_from_config(&config) else {
        return Err(GatewayError::NoApiKey);
    };
    let tools = Arc::new(openmanus_tools::default_registry(&config)?);

    let state = Arc::new(GatewayState::new(provider, tools, config));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_without_api_key_is_a_config_error() {
        // AppConfig::default() carries no key and reads no environment.
        let err = start(AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoApiKey));
        assert!(err.to_string().contains("OPENMANUS_API_KEY"));
    }

    #[test]
    fn gateway_error_converts_to_anyhow() {
        // The CLI propagates start() failures with `?` into anyhow.
        let err: anyhow::Error = GatewayError::NoApiKey.into();
        assert!(err.to_string().contains("No API key"));
    }
}
