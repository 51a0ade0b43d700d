//! End-to-end stream tests against a local WebSocket backend.
#![allow(clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use monit_stream::api::HttpApi;
use monit_stream::config::ClientConfig;
use monit_stream::domain::{AlertId, AlertStatus, EventKind, PatientId};
use monit_stream::stream::{ConnectionState, WsTransport};
use monit_stream::MonitorClient;

#[derive(Clone, Default)]
struct Backend {
    sessions: Arc<AtomicUsize>,
    auth: Arc<Mutex<Vec<String>>>,
}

const FIRST_SESSION: [&str; 3] = [
    r#"{"type":"vitals","timestamp":"2024-03-01T10:00:00Z","data":{"patient_id":"P1","heart_rate":118,"bp_systolic":135,"bp_diastolic":88,"o2_saturation":91,"temperature":38.2}}"#,
    "this is not json",
    r#"{"type":"alert","timestamp":"2024-03-01T10:00:01Z","data":{"alert_id":"A1","patient_id":"P1","severity":"high","message":"Tachycardia"}}"#,
];

const SECOND_SESSION: [&str; 2] = [
    r#"{"type":"alert","timestamp":"2024-03-01T10:00:05Z","data":{"alert_id":"A1","patient_id":"P1","severity":"high","message":"Tachycardia","status":"acknowledged"}}"#,
    r#"{"type":"system","timestamp":"2024-03-01T10:00:06Z","data":{"message":"resumed"}}"#,
];

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(backend): State<Backend>,
) -> Response {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        backend.auth.lock().push(auth.to_string());
    }
    let session = backend.sessions.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| serve(socket, session))
}

/// First session: sends its frames and hangs up. Later sessions: send
/// their frames and stay open until the client leaves.
async fn serve(mut socket: WebSocket, session: usize) {
    let frames: &[&str] = if session == 0 { &FIRST_SESSION } else { &SECOND_SESSION };
    for frame in frames {
        if socket.send(Message::Text((*frame).into())).await.is_err() {
            return;
        }
    }
    if session == 0 {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(backend.clone());
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr.to_string(), backend)
}

fn config(addr: &str) -> ClientConfig {
    ClientConfig {
        ws_url: format!("ws://{addr}/ws"),
        api_base_url: format!("http://{addr}"),
        auth_token: Some("test-token".to_string()),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

async fn next(rx: &mut mpsc::UnboundedReceiver<EventKind>) -> EventKind {
    match tokio::time::timeout(Duration::from_secs(10), rx.recv()).await {
        Ok(Some(kind)) => kind,
        other => panic!("no event delivered: {other:?}"),
    }
}

#[tokio::test]
async fn stream_survives_bad_frames_and_reconnects() {
    let (addr, backend) = spawn_backend().await;
    let config = config(&addr);
    let Ok(api) = HttpApi::from_config(&config) else {
        panic!("http client");
    };
    let client = MonitorClient::new(WsTransport::from_config(&config), api, &config);

    let (tx, mut events) = mpsc::unbounded_channel();
    client.subscribers().subscribe_all(move |event| {
        tx.send(event.kind())?;
        Ok(())
    });
    let mut states = client.connection().subscribe_state();

    client.start();

    assert_eq!(next(&mut events).await, EventKind::Vitals);
    assert_eq!(next(&mut events).await, EventKind::Alert);
    assert_eq!(next(&mut events).await, EventKind::Alert);
    assert_eq!(next(&mut events).await, EventKind::System);

    let mut seen = Vec::new();
    while let Ok(state) = states.try_recv() {
        seen.push(state);
    }
    assert_eq!(
        seen,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Open,
        ]
    );
    assert_eq!(client.connection().state(), ConnectionState::Open);

    let stores = client.stores();
    let status = stores.alerts.get(&AlertId::from("A1")).await.map(|a| a.status);
    assert_eq!(status, Some(AlertStatus::Acknowledged));
    let latest = stores.vitals.latest(&PatientId::from("P1")).await;
    assert_eq!(latest.map(|v| v.heart_rate), Some(118.0));

    assert_eq!(
        *backend.auth.lock(),
        vec!["Bearer test-token".to_string(), "Bearer test-token".to_string()]
    );

    client.shutdown().await;
    assert_eq!(client.connection().state(), ConnectionState::Closed);
    assert!(!client.connection().retry_pending());
}

#[tokio::test]
async fn unreachable_backend_keeps_retrying_until_shutdown() {
    let Ok(listener) = std::net::TcpListener::bind("127.0.0.1:0") else {
        panic!("reserve a port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener address");
    };
    drop(listener);

    let config = config(&addr.to_string());
    let Ok(api) = HttpApi::from_config(&config) else {
        panic!("http client");
    };
    let client = MonitorClient::new(WsTransport::from_config(&config), api, &config);
    let mut states = client.connection().subscribe_state();
    client.start();

    let mut reconnects = 0;
    while reconnects < 3 {
        match tokio::time::timeout(Duration::from_secs(10), states.recv()).await {
            Ok(Ok(ConnectionState::Reconnecting)) => reconnects += 1,
            Ok(Ok(ConnectionState::Open)) => panic!("nothing is listening"),
            Ok(Ok(_)) => {}
            other => panic!("state stream stalled: {other:?}"),
        }
    }
    assert!(client.connection().retry_count() >= 1);

    client.shutdown().await;
    assert_eq!(client.connection().state(), ConnectionState::Closed);
}
