//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Broadcast drops total (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Rejected join attempts total (counter, labels: room).
pub const JOIN_REJECTED_TOTAL: &str = "join_rejected_total";
/// Order events routed total (counter).
pub const ORDER_EVENTS_TOTAL: &str = "order_events_total";
/// Order events dropped total (counter, labels: reason).
pub const ORDER_EVENTS_DROPPED_TOTAL: &str = "order_events_dropped_total";
/// Push deliveries attempted total (counter, labels: outcome).
pub const PUSH_DELIVERIES_TOTAL: &str = "push_deliveries_total";
/// Push registrations pruned total (counter).
pub const PUSH_REGISTRATIONS_PRUNED_TOTAL: &str = "push_registrations_pruned_total";
