//! Remediation against a local JSON-RPC websocket server

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use xenflow_cloud_xo::{
    MemoryFixHook, RemediationRequest, TlsMode, WsTransportFactory, XoError,
};
use xenflow_config::Secret;

struct Seen {
    requests: Vec<Value>,
    closed_by_client: bool,
}

/// Serve one connection. Every response is preceded by an event
/// notification the client has to skip.
async fn serve_once(reject_token: bool) -> (String, JoinHandle<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut seen = Seen {
            requests: Vec::new(),
            closed_by_client: false,
        };

        while let Some(message) = ws.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => {
                    seen.closed_by_client = true;
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            };

            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let id = request["id"].clone();
            let method = request["method"].as_str().unwrap_or_default().to_string();
            seen.requests.push(request);

            let notification = json!({ "jsonrpc": "2.0", "method": "all", "params": { "type": "enter" } });
            ws.send(Message::text(notification.to_string())).await.unwrap();

            let response = match method.as_str() {
                "session.signInWithToken" if reject_token => json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": { "code": 3, "message": "invalid credentials" }
                }),
                "session.signInWithToken" => json!({
                    "jsonrpc": "2.0", "id": id, "result": { "email": "admin@lab" }
                }),
                "vm.setAndRestart" => json!({ "jsonrpc": "2.0", "id": id, "result": true }),
                _ => json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": { "code": -32601, "message": "method not found" }
                }),
            };
            ws.send(Message::text(response.to_string())).await.unwrap();
        }
        seen
    });

    (url, handle)
}

fn hook(url: &str, token: &str) -> MemoryFixHook {
    let factory = Arc::new(WsTransportFactory::new(url, TlsMode::Verify).unwrap());
    MemoryFixHook::new(factory, Secret::new(token))
        .with_settle_delay(Duration::ZERO)
        .with_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn test_memory_fix_over_websocket() {
    let (url, server) = serve_once(false).await;

    hook(&url, "tok")
        .run(&RemediationRequest::new("abc123", 8 * 1024 * 1024 * 1024))
        .await
        .unwrap();

    let seen = server.await.unwrap();
    let methods: Vec<&str> = seen
        .requests
        .iter()
        .map(|r| r["method"].as_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["session.signInWithToken", "vm.setAndRestart"]);
    assert_eq!(seen.requests[0]["jsonrpc"], "2.0");
    assert_eq!(seen.requests[0]["params"]["token"], "tok");
    assert_eq!(
        seen.requests[1]["params"],
        json!({
            "id": "abc123",
            "memory": 8589934592u64,
            "memoryMin": 8589934592u64,
            "memoryMax": 8589934592u64,
            "memoryStaticMax": 8589934592u64,
        })
    );
    assert!(seen.closed_by_client);
}

#[tokio::test]
async fn test_rejected_token_over_websocket() {
    let (url, server) = serve_once(true).await;

    let result = hook(&url, "bad")
        .run(&RemediationRequest::new("abc123", 1 << 30))
        .await;
    assert!(matches!(result, Err(XoError::Auth(ref m)) if m == "invalid credentials"));

    let seen = server.await.unwrap();
    assert_eq!(seen.requests.len(), 1);
    assert!(seen.closed_by_client);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = hook(&url, "tok")
        .run(&RemediationRequest::new("abc123", 1 << 30))
        .await;
    assert!(matches!(result, Err(XoError::Connect(_))));
}
