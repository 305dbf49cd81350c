use axum::{
    Json, Router,
    http::StatusCode,
    routing::post,
};
use chat_relay::session::Role;
use chat_relay::transport::{GraphqlTransport, MessageTransport, TransportError, WireMessage};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn transport(base: &str) -> GraphqlTransport {
    GraphqlTransport::new(base, Duration::from_secs(5)).unwrap()
}

fn hello() -> Vec<WireMessage> {
    vec![WireMessage {
        role: Role::User,
        content: "hello".to_string(),
    }]
}

#[tokio::test]
async fn test_send_returns_reply_and_posts_variables() {
    let app = Router::new().route(
        "/graphql",
        post(|Json(body): Json<Value>| async move {
            let messages = &body["variables"]["messages"];
            let echoed = format!(
                "{}:{}",
                messages[0]["role"].as_str().unwrap_or_default(),
                messages[0]["content"].as_str().unwrap_or_default()
            );
            Json(json!({ "data": { "sendMessage": { "content": echoed } } }))
        }),
    );
    let base = serve(app).await;

    let reply = transport(&base)
        .send(&hello(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, "user:hello");
}

#[tokio::test]
async fn test_http_error_is_network() {
    let app = Router::new().route(
        "/graphql",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = serve(app).await;

    let err = transport(&base)
        .send(&hello(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Network("HTTP error: status 500".to_string())
    );
}

#[tokio::test]
async fn test_graphql_errors_are_protocol() {
    let app = Router::new().route(
        "/graphql",
        post(|| async {
            Json(json!({
                "data": null,
                "errors": [{ "message": "LLM API error: 429" }, { "message": "second" }]
            }))
        }),
    );
    let base = serve(app).await;

    let err = transport(&base)
        .send(&hello(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Protocol("LLM API error: 429".to_string())
    );
}

#[tokio::test]
async fn test_missing_content_is_protocol() {
    let app = Router::new().route(
        "/graphql",
        post(|| async { Json(json!({ "data": { "sendMessage": null } })) }),
    );
    let base = serve(app).await;

    let err = transport(&base)
        .send(&hello(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Protocol("Invalid response from server".to_string())
    );
}

#[tokio::test]
async fn test_non_json_body_is_protocol() {
    let app = Router::new().route("/graphql", post(|| async { "<html>oops</html>" }));
    let base = serve(app).await;

    let err = transport(&base)
        .send(&hello(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn test_refused_connection_is_network() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = transport(&format!("http://{addr}"))
        .send(&hello(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_cancel_abandons_slow_request() {
    let app = Router::new().route(
        "/graphql",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(json!({ "data": { "sendMessage": { "content": "too late" } } }))
        }),
    );
    let base = serve(app).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = transport(&base).send(&hello(), &cancel).await.unwrap_err();

    assert_eq!(err, TransportError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_health_and_check_connection() {
    let app = Router::new().route(
        "/graphql",
        post(|| async {
            Json(json!({
                "data": { "health": { "status": "ok", "timestamp": "2025-01-01T00:00:00.000Z" } }
            }))
        }),
    );
    let base = serve(app).await;
    let client = transport(&base);

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.timestamp, "2025-01-01T00:00:00.000Z");
    assert!(client.check_connection().await);
}

#[tokio::test]
async fn test_check_connection_false_when_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(!transport(&format!("http://{addr}")).check_connection().await);
}
