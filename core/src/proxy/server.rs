//! Proxy Server - Axum HTTP host for a [`ProxyHooks`] implementation
//! Everything outside the interception prefix is answered here; matched
//! requests are handed to the hooks untouched.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::ControlConfig;
use crate::proxy::config::ConfigAck;
use crate::proxy::hooks::ProxyHooks;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub hooks: Arc<dyn ProxyHooks>,
    pub control: Arc<ControlConfig>,
}

/// Proxy server instance
pub struct ProxyServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ProxyServer {
    pub fn new(host: String, port: u16, hooks: Arc<dyn ProxyHooks>, control: ControlConfig) -> Self {
        let state = AppState {
            hooks,
            control: Arc::new(control),
        };
        Self { host, port, state }
    }

    /// Run the proxy server (blocking)
    pub async fn run(self) -> anyhow::Result<()> {
        self.state.hooks.on_install();
        let app = build_router(self.state.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        self.state.hooks.on_activate();
        tracing::info!("Proxy server listening on {}", addr);

        // Handle graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        // Health check
        .route("/healthz", get(health_check_handler))
        .route("/health", get(health_check_handler));

    if state.control.enabled {
        let path = control_path(&state.control.path);
        tracing::debug!("Runtime reconfiguration accepted at {}", path);
        app = app.route(&path, post(config_update_handler));
    }

    app.fallback(intercept_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn control_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

async fn intercept_handler(State(state): State<AppState>, request: Request) -> Response {
    if !state.hooks.route(&request) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }
    state.hooks.handle(request).await
}

/// Accepts `{ "configUpdate": { ... } }` and answers with the ack
async fn config_update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(key) = state.control.api_key.as_deref().filter(|k| !k.is_empty()) {
        if !is_authorized(&headers, key) {
            tracing::warn!("Rejected unauthenticated configuration update");
            return (StatusCode::UNAUTHORIZED, Json(ConfigAck::error("unauthorized"))).into_response();
        }
    }

    let message: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ConfigAck::error(format!("invalid JSON: {}", e))),
            )
                .into_response();
        }
    };

    let ack = state.hooks.on_config_update(message);
    let status = if ack.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ack)).into_response()
}

fn is_authorized(headers: &HeaderMap, key: &str) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    bearer == Some(key) || api_key == Some(key)
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
