//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.
//!
//! A session starts unauthenticated and may hold no room membership at
//! all; it only becomes interesting after a join frame passes the
//! gateway. A failed join terminates the session, and the client is
//! expected to reconnect with a fresh credential.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use metrics::{counter, gauge, histogram};
use storefront_core::{CatalogKind, ClientFrame, ConnectionId, OrderEvent};
use tracing::{debug, info, instrument, warn};

use crate::connection::ClientConnection;
use crate::gateway::SessionGateway;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::router::EventRouter;

/// Outbound channel depth per session.
const SEND_QUEUE_DEPTH: usize = 1024;

/// Why the session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Client closed or the socket errored.
    ClientGone,
    /// A join frame failed verification; the server closes the socket.
    JoinRejected,
    /// Server shutdown.
    Shutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Forwards outbound room broadcasts via the send channel
/// 2. Sends periodic Ping frames and disconnects unresponsive clients
/// 3. Dispatches incoming join and domain frames
/// 4. Clears room membership unconditionally on exit
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    gateway: Arc<SessionGateway>,
    router: Arc<EventRouter>,
    heartbeat_interval: Duration,
    pong_timeout: Duration,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_DEPTH);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = Arc::clone(&connection);
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut end = SessionEnd::ClientGone;
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = shutdown.cancelled() => {
                end = SessionEnd::Shutdown;
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => t.to_string(),
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
            Message::Binary(_) => {
                debug!("ignoring binary frame");
                continue;
            }
        };

        match dispatch_frame(&text, &connection, &gateway, &router).await {
            Dispatch::Continue => {}
            Dispatch::CloseSession => {
                end = SessionEnd::JoinRejected;
                break;
            }
        }
    }

    info!(reason = ?end, age = ?connection.age(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection.age().as_secs_f64());
    outbound.abort();
    gateway.disconnect(&connection.id).await;
}

enum Dispatch {
    Continue,
    CloseSession,
}

/// Parse and act on one inbound text frame.
///
/// Malformed frames are logged and ignored; the session stays open. Only
/// a rejected join closes the session.
async fn dispatch_frame(
    text: &str,
    connection: &Arc<ClientConnection>,
    gateway: &SessionGateway,
    router: &EventRouter,
) -> Dispatch {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "ignoring malformed frame");
            return Dispatch::Continue;
        }
    };

    match frame {
        ClientFrame::JoinAdmin(token) => {
            if let Err(e) = gateway.authenticate_admin(connection, &token).await {
                warn!(error = %e, "admin join rejected, closing session");
                return Dispatch::CloseSession;
            }
        }
        ClientFrame::JoinUser { token } => {
            if let Err(e) = gateway.authenticate_user(connection, &token).await {
                warn!(error = %e, "user join rejected, closing session");
                return Dispatch::CloseSession;
            }
        }
        ClientFrame::CategoryUpdate => {
            router.catalog_changed(CatalogKind::Category).await;
        }
        ClientFrame::ProductUpdate => {
            router.catalog_changed(CatalogKind::Product).await;
        }
        ClientFrame::OrderStatusUpdate(order) => {
            // A rejected event only affects this frame, not the session.
            if let Err(e) = router
                .order_status_changed(OrderEvent::from_document(order))
                .await
            {
                warn!(error = %e, "order event rejected");
            }
        }
    }
    Dispatch::Continue
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
