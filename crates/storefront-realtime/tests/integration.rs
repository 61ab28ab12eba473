//! End-to-end integration tests using real WebSocket and HTTP clients.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_auth::{Claims, CredentialVerifier, JwtVerifier, encode_token};
use storefront_realtime::config::RealtimeConfig;
use storefront_realtime::push::{
    HttpPushTransport, MemoryRegistrationStore, PushNotifier, RegistrationStore,
};
use storefront_realtime::router::{MemoryOrderStore, OrderStore};
use storefront_realtime::server::RealtimeServer;

const TIMEOUT: Duration = Duration::from_secs(5);
const SECRET: &str = "integration-secret";

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Harness {
    server: RealtimeServer,
    addr: std::net::SocketAddr,
    orders: Arc<MemoryOrderStore>,
}

/// Boot a test server on an auto-assigned port.
async fn boot_server() -> Harness {
    let orders = Arc::new(MemoryOrderStore::new());
    let store = Arc::new(MemoryRegistrationStore::new());
    let notifier = Arc::new(PushNotifier::new(
        Arc::clone(&store) as Arc<dyn RegistrationStore>,
        Arc::new(HttpPushTransport::new().unwrap()),
    ));
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(JwtVerifier::new(SECRET));

    let config = RealtimeConfig {
        jwt_secret: SECRET.into(),
        ..RealtimeConfig::default() // port 0 = auto-assign
    };
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let server = RealtimeServer::new(
        config,
        verifier,
        Arc::clone(&orders) as Arc<dyn OrderStore>,
        notifier,
        metrics,
    );

    let (addr, _handle) = server.listen().await.unwrap();
    Harness {
        server,
        addr,
        orders,
    }
}

fn user_token(sub: &str) -> String {
    encode_token(SECRET, &Claims::new(sub, "Customer", false, 600)).unwrap()
}

fn admin_token() -> String {
    encode_token(SECRET, &Claims::new("admin1", "Admin", true, 600)).unwrap()
}

async fn connect(harness: &Harness) -> WsStream {
    let url = format!("ws://{}/ws", harness.addr);
    let (ws, _) = timeout(TIMEOUT, connect_async(&url)).await.unwrap().unwrap();
    ws
}

async fn send_frame(ws: &mut WsStream, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Next text frame as JSON, skipping pings.
async fn recv_frame(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Wait for the server to close the connection.
async fn expect_closed(ws: &mut WsStream) {
    loop {
        match timeout(TIMEOUT, ws.next()).await.expect("expected close") {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}

async fn join_admin(harness: &Harness) -> WsStream {
    let mut ws = connect(harness).await;
    send_frame(&mut ws, json!({"event": "joinAdmin", "data": admin_token()})).await;
    ws
}

async fn join_user(harness: &Harness, sub: &str) -> WsStream {
    let mut ws = connect(harness).await;
    send_frame(
        &mut ws,
        json!({"event": "joinUser", "data": {"token": user_token(sub)}}),
    )
    .await;
    ws
}

/// Joins race the broadcast that follows; give the server a beat.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn order_event_reaches_admin_and_owner() {
    let harness = boot_server().await;
    let mut admin = join_admin(&harness).await;
    let mut owner = join_user(&harness, "u9").await;
    let mut other = join_user(&harness, "u8").await;
    settle().await;

    let mut sender = join_admin(&harness).await;
    send_frame(
        &mut sender,
        json!({
            "event": "orderStatusUpdate",
            "data": {"_id": "o1", "user": {"_id": "u9"}, "status": "shipped"},
        }),
    )
    .await;

    let frame = recv_frame(&mut admin).await;
    assert_eq!(frame["event"], "orderStatusUpdate");
    assert_eq!(frame["data"]["_id"], "o1");
    assert_eq!(frame["data"]["status"], "shipped");

    let frame = recv_frame(&mut owner).await;
    assert_eq!(frame["data"]["_id"], "o1");

    // The other customer saw nothing; a later broadcast arrives first.
    send_frame(
        &mut sender,
        json!({
            "event": "orderStatusUpdate",
            "data": {"_id": "o2", "user": {"_id": "u8"}, "status": "paid"},
        }),
    )
    .await;
    let frame = recv_frame(&mut other).await;
    assert_eq!(frame["data"]["_id"], "o2");
}

#[tokio::test]
async fn catalog_update_reaches_admins_only() {
    let harness = boot_server().await;
    let mut admin = join_admin(&harness).await;
    let mut user = join_user(&harness, "u1").await;
    settle().await;

    let mut sender = join_admin(&harness).await;
    send_frame(&mut sender, json!({"event": "productUpdate"})).await;

    let frame = recv_frame(&mut admin).await;
    assert_eq!(frame, json!({"event": "productUpdate"}));

    // The user sees only a later event addressed to them.
    send_frame(
        &mut sender,
        json!({
            "event": "orderStatusUpdate",
            "data": {"_id": "o3", "user": "u1", "status": "paid"},
        }),
    )
    .await;
    let frame = recv_frame(&mut user).await;
    assert_eq!(frame["data"]["_id"], "o3");
}

#[tokio::test]
async fn invalid_token_join_closes_socket() {
    let harness = boot_server().await;
    let mut ws = connect(&harness).await;
    send_frame(&mut ws, json!({"event": "joinAdmin", "data": "garbage"})).await;
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn non_admin_token_cannot_join_admin_room() {
    let harness = boot_server().await;
    let mut ws = connect(&harness).await;
    send_frame(&mut ws, json!({"event": "joinAdmin", "data": user_token("u1")})).await;
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn expired_token_join_closes_socket() {
    let harness = boot_server().await;
    let expired = encode_token(SECRET, &Claims::new("u1", "X", false, -120)).unwrap();
    let mut ws = connect(&harness).await;
    send_frame(&mut ws, json!({"event": "joinUser", "data": {"token": expired}})).await;
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn malformed_frame_keeps_session_alive() {
    let harness = boot_server().await;
    let mut admin = join_admin(&harness).await;
    settle().await;

    let mut ws = connect(&harness).await;
    ws.send(Message::Text("not json".into())).await.unwrap();
    send_frame(&mut ws, json!({"event": "categoryUpdate"})).await;

    // The frame after the garbage still goes through.
    let frame = recv_frame(&mut admin).await;
    assert_eq!(frame["event"], "categoryUpdate");
}

#[tokio::test]
async fn order_by_reference_is_fetched_from_store() {
    let harness = boot_server().await;
    harness.orders.insert(
        serde_json::from_value(json!({"_id": "o7", "user": "u7", "status": "delivered"}))
            .unwrap(),
    );
    let mut owner = join_user(&harness, "u7").await;
    settle().await;

    harness
        .server
        .event_router()
        .order_status_changed(storefront_core::OrderEvent::from_id("o7".into()))
        .await
        .unwrap();

    let frame = recv_frame(&mut owner).await;
    assert_eq!(frame["data"]["_id"], "o7");
    assert_eq!(frame["data"]["status"], "delivered");
}

#[tokio::test]
async fn deleted_order_event_is_dropped() {
    let harness = boot_server().await;
    let mut admin = join_admin(&harness).await;
    settle().await;

    harness
        .server
        .event_router()
        .order_status_changed(storefront_core::OrderEvent::from_id("missing".into()))
        .await
        .unwrap();

    // Nothing arrives for the dropped event; a catalog signal sent after
    // it is the first thing the admin sees.
    let mut sender = join_admin(&harness).await;
    send_frame(&mut sender, json!({"event": "categoryUpdate"})).await;
    let frame = recv_frame(&mut admin).await;
    assert_eq!(frame["event"], "categoryUpdate");
}

#[tokio::test]
async fn health_endpoint_reports_counts() {
    let harness = boot_server().await;
    let _admin = join_admin(&harness).await;
    let _user = join_user(&harness, "u1").await;
    settle().await;

    let resp = reqwest::get(format!("http://{}/health", harness.addr))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 2);
    assert_eq!(body["rooms"], 2);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let harness = boot_server().await;
    let resp = reqwest::get(format!("http://{}/metrics", harness.addr))
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn push_subscribe_and_send_round_trip() {
    let harness = boot_server().await;
    let push_service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send/device-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&push_service)
        .await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/push/subscribe", harness.addr))
        .bearer_auth(user_token("u5"))
        .json(&json!({"endpoint": format!("{}/send/device-1", push_service.uri())}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert!(body["id"].is_string());

    let resp = client
        .post(format!("http://{}/api/push/send", harness.addr))
        .bearer_auth(admin_token())
        .json(&json!({"title": "Order update", "body": "shipped", "user_id": "u5"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["attempted"], 1);
    assert_eq!(body["delivered"], 1);
    assert_eq!(body["pruned"], 0);
}

#[tokio::test]
async fn push_send_prunes_gone_endpoint() {
    let harness = boot_server().await;
    let push_service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send/alive"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&push_service)
        .await;
    Mock::given(method("POST"))
        .and(path("/send/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&push_service)
        .await;

    let client = reqwest::Client::new();
    for device in ["alive", "gone"] {
        let resp = client
            .post(format!("http://{}/api/push/subscribe", harness.addr))
            .bearer_auth(user_token("u5"))
            .json(&json!({"endpoint": format!("{}/send/{device}", push_service.uri())}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let send = |body: Value| {
        let client = client.clone();
        let addr = harness.addr;
        async move {
            client
                .post(format!("http://{addr}/api/push/send"))
                .bearer_auth(admin_token())
                .json(&body)
                .send()
                .await
                .unwrap()
        }
    };

    let resp = send(json!({"title": "t", "body": "b"})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["attempted"], 2);
    assert_eq!(body["delivered"], 1);
    assert_eq!(body["pruned"], 1);

    // The pruned registration is not attempted again.
    let resp = send(json!({"title": "t", "body": "b"})).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["attempted"], 1);
    assert_eq!(body["pruned"], 0);
}

#[tokio::test]
async fn push_send_without_admin_is_forbidden() {
    let harness = boot_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/push/send", harness.addr))
        .bearer_auth(user_token("u1"))
        .json(&json!({"title": "t", "body": "b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn push_subscribe_without_token_is_unauthorized() {
    let harness = boot_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/push/subscribe", harness.addr))
        .json(&json!({"endpoint": "https://push/e"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn disconnect_clears_room_membership() {
    let harness = boot_server().await;
    let admin = join_admin(&harness).await;
    settle().await;

    let resp: Value = reqwest::get(format!("http://{}/health", harness.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["rooms"], 1);

    drop(admin);
    // Allow the server to observe the closed socket.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let resp: Value = reqwest::get(format!("http://{}/health", harness.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["rooms"], 0);
    assert_eq!(resp["connections"], 0);
}

#[tokio::test]
async fn graceful_shutdown_stops_server() {
    let harness = boot_server().await;
    let _ws = connect(&harness).await;

    harness.server.shutdown().shutdown();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // New connections are refused once the listener is gone.
    let result = timeout(
        TIMEOUT,
        connect_async(format!("ws://{}/ws", harness.addr)),
    )
    .await
    .unwrap();
    assert!(result.is_err());
}
