//! `RealtimeServer` — Axum HTTP + WebSocket server.
//!
//! Routes:
//! - `GET /health` liveness and live counters
//! - `GET /metrics` Prometheus text exposition
//! - `GET /ws` WebSocket upgrade into a realtime session
//! - `POST /api/push/subscribe` register a push endpoint (bearer token)
//! - `POST /api/push/send` trigger a push fan-out (admin bearer token)

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use storefront_auth::{CredentialVerifier, Principal};
use storefront_core::{ConnectionId, UserId};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::RealtimeConfig;
use crate::errors::PushError;
use crate::gateway::SessionGateway;
use crate::health::{self, HealthResponse};
use crate::push::{PushNotifier, PushPayload};
use crate::rooms::RoomDirectory;
use crate::router::{EventRouter, OrderStore};
use crate::session::run_ws_session;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Room directory for presence queries.
    pub rooms: Arc<RoomDirectory>,
    /// Session gateway for WebSocket joins.
    pub gateway: Arc<SessionGateway>,
    /// Event router handed to each session.
    pub router: Arc<EventRouter>,
    /// Push notifier behind the HTTP push endpoints.
    pub notifier: Arc<PushNotifier>,
    /// Credential verifier for the HTTP push endpoints.
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Server configuration.
    pub config: Arc<RealtimeConfig>,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Live WebSocket connections (including unauthenticated ones).
    pub active_connections: Arc<AtomicUsize>,
}

/// The realtime notification server.
pub struct RealtimeServer {
    state: AppState,
}

impl RealtimeServer {
    /// Wire up the server from its collaborators.
    pub fn new(
        config: RealtimeConfig,
        verifier: Arc<dyn CredentialVerifier>,
        orders: Arc<dyn OrderStore>,
        notifier: Arc<PushNotifier>,
        metrics: PrometheusHandle,
    ) -> Self {
        let rooms = Arc::new(RoomDirectory::new());
        let gateway = Arc::new(SessionGateway::new(
            Arc::clone(&rooms),
            Arc::clone(&verifier),
            Duration::from_secs(config.auth_timeout_secs),
        ));
        let router = Arc::new(EventRouter::new(Arc::clone(&rooms), orders));

        Self {
            state: AppState {
                rooms,
                gateway,
                router,
                notifier,
                verifier,
                config: Arc::new(config),
                metrics,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                active_connections: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/api/push/subscribe", post(push_subscribe_handler))
            .route("/api/push/send", post(push_send_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// Returns the bound address (useful with port 0) and the join
    /// handle; the task runs until the shutdown token fires.
    pub async fn listen(
        &self,
    ) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;
        info!(%local, "realtime server listening");

        let token = self.state.shutdown.token();
        let app = self.router();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "server task ended with error");
            }
        });
        Ok((local, handle))
    }

    /// Bind and serve until Ctrl-C arrives, then shut down gracefully.
    pub async fn serve(&self) -> anyhow::Result<()> {
        let (_, handle) = self.listen().await?;

        tokio::signal::ctrl_c().await?;
        info!("ctrl-c received, shutting down");
        self.state
            .shutdown
            .graceful_shutdown(vec![handle], None)
            .await;
        Ok(())
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.state.config
    }

    /// Get the event router, for driving events from outside a session.
    pub fn event_router(&self) -> &Arc<EventRouter> {
        &self.state.router
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registrations = state.notifier.registration_count().unwrap_or(0);
    let resp = health::health_check(
        state.start_time,
        state.active_connections.load(Ordering::Relaxed),
        state.rooms.room_count().await,
        registrations,
    );
    Json(resp)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// GET /ws — upgrade into a realtime session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let connection_id = ConnectionId::new();
    ws.on_upgrade(move |socket| async move {
        let _ = state.active_connections.fetch_add(1, Ordering::Relaxed);
        run_ws_session(
            socket,
            connection_id,
            Arc::clone(&state.gateway),
            Arc::clone(&state.router),
            Duration::from_secs(state.config.heartbeat_interval_secs),
            Duration::from_secs(state.config.heartbeat_timeout_secs),
            state.shutdown.token(),
        )
        .await;
        let _ = state.active_connections.fetch_sub(1, Ordering::Relaxed);
    })
}

/// Bearer credential from the `Authorization` header.
async fn bearer_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Principal, (StatusCode, String)> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;

    state.verifier.verify(token).await.map_err(|e| {
        warn!(error = %e, "push endpoint credential rejected");
        (StatusCode::UNAUTHORIZED, "unauthorized".to_string())
    })
}

#[derive(Debug, Serialize)]
struct SubscribeResponse {
    id: String,
}

/// POST /api/push/subscribe
async fn push_subscribe_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(endpoint): Json<serde_json::Value>,
) -> Response {
    let principal = match bearer_principal(&state, &headers).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    match state.notifier.register(principal.id, endpoint) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(SubscribeResponse {
                id: id.into_inner(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "push registration failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "registration failed").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    title: String,
    body: String,
    /// Click-through URL; falls back to the configured default.
    url: Option<String>,
    /// Restrict the fan-out to one user's registrations.
    #[serde(alias = "userId")]
    user_id: Option<UserId>,
}

/// POST /api/push/send — admin only.
async fn push_send_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> Response {
    let principal = match bearer_principal(&state, &headers).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    if !principal.is_admin {
        return (StatusCode::FORBIDDEN, "admin credential required").into_response();
    }

    let payload = PushPayload {
        title: request.title,
        body: request.body,
        url: request
            .url
            .unwrap_or_else(|| state.config.default_notification_url.clone()),
    };

    match state.notifier.send(&payload, request.user_id.as_ref()).await {
        Ok(report) => Json(serde_json::json!({
            "attempted": report.attempted,
            "delivered": report.delivered,
            "pruned": report.pruned,
        }))
        .into_response(),
        Err(PushError::NoRegistrations) => {
            (StatusCode::NOT_FOUND, "no registrations matched").into_response()
        }
        Err(e) => {
            warn!(error = %e, "push send failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "send failed").into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
