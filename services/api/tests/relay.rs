//! End-to-end tests against a bound server, using real HTTP and WebSocket clients.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use futures_util::{SinkExt, StreamExt};
use relay_api::{router::create_router, state::AppState};
use relay_core::{
    CredentialClient, CredentialError, CredentialRequest, OpenAICredentialClient,
    SessionDefaults, SessionLifecycleManager, SessionRegistry,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Message, protocol::frame::coding::CloseCode},
};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ── Stub credential clients ──

struct StaticCredentials;

#[async_trait]
impl CredentialClient for StaticCredentials {
    async fn request_credential(
        &self,
        request: &CredentialRequest,
    ) -> Result<Value, CredentialError> {
        Ok(json!({
            "object": "realtime.session",
            "model": request.model,
            "client_secret": {"value": "ek_test", "expires_at": 1700000000}
        }))
    }
}

struct UnavailableCredentials;

#[async_trait]
impl CredentialClient for UnavailableCredentials {
    async fn request_credential(
        &self,
        _request: &CredentialRequest,
    ) -> Result<Value, CredentialError> {
        Err(CredentialError::ProviderUnavailable(
            "connection refused".to_string(),
        ))
    }
}

// ── Harness ──

fn defaults() -> SessionDefaults {
    SessionDefaults {
        model: "gpt-4o-mini-realtime-preview-2024-12-17".to_string(),
        voice: "verse".to_string(),
        temperature: 0.9,
        instructions_path: PathBuf::from("/nonexistent/instruction.txt"),
        max_sessions: 5,
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Boot a relay server and return its address plus a handle on its registry.
async fn boot_server(
    credentials: Arc<dyn CredentialClient>,
    public_dir: PathBuf,
) -> (SocketAddr, Arc<SessionRegistry>) {
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = Arc::new(SessionLifecycleManager::new(
        registry.clone(),
        credentials,
        defaults(),
    ));
    let app = create_router(Arc::new(AppState::new(lifecycle)), public_dir);
    (serve(app).await, registry)
}

async fn boot_default() -> (SocketAddr, Arc<SessionRegistry>) {
    boot_server(Arc::new(StaticCredentials), PathBuf::from("/nonexistent/public")).await
}

async fn create_session(addr: SocketAddr) -> Value {
    let response = reqwest::get(format!("http://{addr}/api/session"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.json().await.unwrap()
}

async fn connect(addr: SocketAddr, session_id: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(format!("ws://{addr}/ws/{session_id}")))
        .await
        .expect("connect timed out")
        .expect("websocket handshake failed");
    ws
}

async fn next_json(ws: &mut WsStream) -> Value {
    let msg = timeout(TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("websocket error");
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn expect_policy_close(ws: &mut WsStream) {
    let msg = timeout(TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for close")
        .expect("stream ended without close frame")
        .expect("websocket error");
    match msg {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
        other => panic!("expected close frame, got {other:?}"),
    }
}

async fn skip_greeting(ws: &mut WsStream) {
    assert_eq!(next_json(ws).await["type"], "status");
    assert_eq!(next_json(ws).await["type"], "session_info");
}

// ── Tests ──

#[tokio::test]
async fn test_end_to_end_session_lifecycle() {
    let (addr, registry) = boot_default().await;

    let session = create_session(addr).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    assert_eq!(session["client_secret"]["value"], "ek_test");
    assert!(registry.get(&session_id.as_str().into()).unwrap().is_active);

    let mut ws = connect(addr, &session_id).await;
    let status = next_json(&mut ws).await;
    assert_eq!(status["type"], "status");
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "session_info", "session_id": session_id, "is_active": true})
    );

    ws.send(Message::text(r#"{"type":"transcript","text":"hello"}"#))
        .await
        .unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "status", "message": "received message of type transcript"})
    );

    let client = reqwest::Client::new();
    let response = client
        .delete(format!("http://{addr}/api/session/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"status": "success"})
    );

    // A closed session can no longer be joined.
    let mut rejected = connect(addr, &session_id).await;
    assert_eq!(
        next_json(&mut rejected).await,
        json!({"type": "error", "message": "session inactive"})
    );
    expect_policy_close(&mut rejected).await;

    // Closing again is still a success.
    let again = client
        .delete(format!("http://{addr}/api/session/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), reqwest::StatusCode::OK);

    let _ = ws.close(None).await;
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let (addr, _registry) = boot_default().await;

    let mut ws = connect(addr, "does-not-exist").await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "error", "message": "invalid session identifier"})
    );
    expect_policy_close(&mut ws).await;
}

#[tokio::test]
async fn test_malformed_frame_is_answered_in_band() {
    let (addr, _registry) = boot_default().await;
    let session = create_session(addr).await;
    let mut ws = connect(addr, session["session_id"].as_str().unwrap()).await;
    skip_greeting(&mut ws).await;

    ws.send(Message::text("this is not json")).await.unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "error", "message": "expected structured message"})
    );
    assert_eq!(next_json(&mut ws).await["type"], "status");

    // The connection is still usable.
    ws.send(Message::text(r#"{"type":"heartbeat"}"#)).await.unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "status", "message": "received message of type heartbeat"})
    );
}

#[tokio::test]
async fn test_abrupt_disconnect_leaves_registry_intact() {
    let (addr, registry) = boot_default().await;
    let session = create_session(addr).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let mut ws = connect(addr, &session_id).await;
    skip_greeting(&mut ws).await;
    drop(ws);

    // Disconnecting does not close the session; a new connection is accepted.
    let mut again = connect(addr, &session_id).await;
    skip_greeting(&mut again).await;
    assert!(registry.get(&session_id.as_str().into()).unwrap().is_active);
}

#[tokio::test]
async fn test_provider_failure_returns_500_and_registers_nothing() {
    let (addr, registry) = boot_server(
        Arc::new(UnavailableCredentials),
        PathBuf::from("/nonexistent/public"),
    )
    .await;

    let response = reqwest::get(format!("http://{addr}/api/session"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert!(body["message"].as_str().unwrap().contains("Provider unavailable"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_close_unknown_session_is_404() {
    let (addr, _registry) = boot_default().await;

    let response = reqwest::Client::new()
        .delete(format!("http://{addr}/api/session/never-issued"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_concurrent_creations_are_distinct() {
    let (addr, registry) = boot_default().await;

    let requests = (0..20).map(|_| create_session(addr));
    let sessions = futures_util::future::join_all(requests).await;

    let mut ids: Vec<_> = sessions
        .iter()
        .map(|s| s["session_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
    assert_eq!(registry.len(), 20);
}

#[tokio::test]
async fn test_static_client_is_served() {
    let public = tempfile::tempdir().unwrap();
    std::fs::write(public.path().join("index.html"), "<h1>relay</h1>").unwrap();
    let (addr, _registry) =
        boot_server(Arc::new(StaticCredentials), public.path().to_path_buf()).await;

    let body = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "<h1>relay</h1>");

    // API routes are not shadowed by the static mount.
    create_session(addr).await;
}

// ── Real credential client against a stub provider ──

async fn stub_provider_sessions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if header("authorization") != Some("Bearer sk-test") || header("openai-beta") != Some("realtime=v1")
    {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"}))).into_response();
    }
    Json(json!({
        "id": "sess_stub",
        "model": body["model"],
        "voice": body["voice"],
        "client_secret": {"value": "ek_stub"}
    }))
    .into_response()
}

async fn boot_with_stub_provider(api_key: &str) -> (SocketAddr, Arc<SessionRegistry>) {
    let provider = serve(Router::new().route("/v1/realtime/sessions", post(stub_provider_sessions))).await;
    let client = OpenAICredentialClient::new(
        Some(SecretString::from(api_key.to_string())),
        format!("http://{provider}/v1"),
    );
    boot_server(Arc::new(client), PathBuf::from("/nonexistent/public")).await
}

#[tokio::test]
async fn test_openai_client_against_stub_provider() {
    let (addr, registry) = boot_with_stub_provider("sk-test").await;

    let session = create_session(addr).await;
    assert_eq!(session["id"], "sess_stub");
    assert_eq!(session["voice"], "verse");
    assert_eq!(session["client_secret"]["value"], "ek_stub");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_provider_rejection_surfaces_as_500() {
    let (addr, registry) = boot_with_stub_provider("sk-wrong").await;

    let response = reqwest::get(format!("http://{addr}/api/session"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("401"));
    assert!(!message.contains("sk-wrong"));
    assert!(registry.is_empty());
}
