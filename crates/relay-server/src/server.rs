//! HTTP surface: routes, handlers, and server startup.
//!
//! Four routes. `GET /` serves the configured static page. `GET /receive`
//! opens a session and streams its events as SSE. `POST /send` validates a
//! submission and hands it to the bridge. `GET /health` reports liveness and
//! the open-session count.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use relay_core::provider::{CompletionOptions, CompletionProvider};
use relay_core::{ChatMessage, SessionId};

use crate::audit::AuditLog;
use crate::bridge::{StreamBridge, SubmitError};
use crate::publisher;
use crate::registry::SessionRegistry;
use crate::render::RenderPolicy;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub static_page: PathBuf,
    pub audit_dir: Option<PathBuf>,
    pub render: RenderPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8088,
            static_page: PathBuf::from("index.html"),
            audit_dir: None,
            render: RenderPolicy::default(),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub bridge: Arc<StreamBridge>,
    pub render: RenderPolicy,
    pub audit: Option<Arc<AuditLog>>,
    pub static_page: PathBuf,
}

/// Submission envelope for `POST /send`.
#[derive(Deserialize)]
struct SendRequest {
    uuid: String,
    chat: Vec<ChatMessage>,
}

/// Assemble the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/send", post(send_handler))
        .route("/receive", get(receive_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the relay server. Resolves once the listener is bound; the accept
/// loop runs on a background task owned by the returned handle.
pub async fn start(
    config: ServerConfig,
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(SessionRegistry::new());
    let bridge = Arc::new(StreamBridge::new(Arc::clone(&registry), provider, options));
    let audit = config.audit_dir.map(|dir| Arc::new(AuditLog::new(dir)));

    let state = AppState {
        registry: Arc::clone(&registry),
        bridge,
        render: config.render,
        audit,
        static_page: config.static_page,
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    let port = listener.local_addr()?.port();
    tracing::info!(port, render = %config.render, "relay server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server exited");
        }
    });

    Ok(ServerHandle {
        port,
        registry,
        _server: server,
    })
}

/// Running server. Dropping the handle does not stop the accept loop.
pub struct ServerHandle {
    pub port: u16,
    pub registry: Arc<SessionRegistry>,
    _server: tokio::task::JoinHandle<()>,
}

async fn index_handler(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(&state.static_page).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::warn!(path = %state.static_page.display(), error = %e, "static page unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn receive_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stream = publisher::open(Arc::clone(&state.registry), state.render);
    (
        [(header::CACHE_CONTROL, "no-cache")],
        stream.into_sse(),
    )
}

async fn send_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: SendRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let Ok(session_id) = SessionId::parse(&request.uuid) else {
        return (StatusCode::BAD_REQUEST, "unknown or invalid uuid").into_response();
    };
    if !state.registry.exists(&session_id) {
        return (StatusCode::BAD_REQUEST, "unknown or invalid uuid").into_response();
    }
    if request.chat.is_empty() {
        return (StatusCode::BAD_REQUEST, "chat must not be empty").into_response();
    }

    // Accepted past validation; keep a raw copy if auditing is on.
    if let Some(audit) = &state.audit {
        audit.record(session_id, body.clone());
    }

    match state.bridge.submit(session_id, request.chat).await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            tracing::debug!(session_id = %session_id, kind = e.kind(), "submission rejected");
            match e {
                SubmitError::StreamBusy => {
                    (StatusCode::CONFLICT, e.to_string()).into_response()
                }
                SubmitError::SessionNotFound => {
                    (StatusCode::BAD_REQUEST, "unknown or invalid uuid").into_response()
                }
                SubmitError::Upstream(e) => {
                    (StatusCode::BAD_REQUEST, e.to_string()).into_response()
                }
            }
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "open_sessions": state.registry.count(),
    }))
}
