use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use forum_client::{ClientConfig, Forum, Preload, SessionPayload};
use forum_store::ResourceKey;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    method: String,
    method_override: Option<String>,
    csrf: Option<String>,
    authorization: Option<String>,
    body: String,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn discussion(
    State(log): State<Log>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    log.lock().expect("log").push(Seen {
        method: method.to_string(),
        method_override: header(&headers, "x-http-method-override"),
        csrf: header(&headers, "x-csrf-token"),
        authorization: header(&headers, "authorization"),
        body,
    });
    (
        [
            ("x-csrf-token", "server-rotated"),
            ("content-type", "application/vnd.api+json"),
        ],
        r#"{"data":{"type":"discussions","id":"1","attributes":{"lastReadPostNumber":7}}}"#,
    )
}

async fn forbidden() -> impl IntoResponse {
    (
        axum::http::StatusCode::FORBIDDEN,
        [("x-csrf-token", "after-403")],
        r#"{"errors":[{"status":"403","code":"permission_denied"}]}"#,
    )
}

async fn serve() -> (String, Log) {
    let log: Log = Arc::default();
    let app = Router::new()
        .route("/api/discussions/:id", any(discussion))
        .route("/api/posts", any(forbidden))
        .with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), log)
}

fn boot(base_url: String) -> Forum {
    let config = ClientConfig {
        base_url,
        api_token: Some("secret".to_string()),
        ..ClientConfig::default()
    };
    let preload = Preload {
        session: Some(SessionPayload {
            user_id: Some("3".to_string()),
            csrf_token: "initial".to_string(),
        }),
        documents: Vec::new(),
    };
    Forum::boot(config, preload).expect("boot")
}

#[tokio::test]
async fn patch_is_tunnelled_and_csrf_rotates_over_http() {
    let (base_url, log) = serve().await;
    let forum = boot(base_url);
    let key = ResourceKey::new("discussions", "1");

    let mut attributes = serde_json::Map::new();
    attributes.insert("lastReadPostNumber".to_string(), json!(7));
    forum.api().save(&key, attributes).await.expect("save");
    forum.api().find("discussions", "1", &[]).await.expect("find");

    let seen = log.lock().expect("log").clone();
    assert_eq!(seen.len(), 2);

    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].method_override.as_deref(), Some("PATCH"));
    assert_eq!(seen[0].csrf.as_deref(), Some("initial"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Token secret"));
    let sent: serde_json::Value = serde_json::from_str(&seen[0].body).expect("json");
    assert_eq!(sent["data"]["attributes"]["lastReadPostNumber"], json!(7));

    assert_eq!(seen[1].method, "GET");
    assert_eq!(seen[1].method_override, None);
    assert_eq!(seen[1].csrf.as_deref(), Some("server-rotated"));

    assert_eq!(forum.session().csrf_token(), "server-rotated");
    assert_eq!(
        forum
            .store()
            .get(&key)
            .and_then(|r| r.attribute("lastReadPostNumber").cloned()),
        Some(json!(7))
    );
}

#[tokio::test]
async fn error_responses_still_rotate_the_token() {
    let (base_url, _log) = serve().await;
    let forum = boot(base_url);

    let err = forum.api().find_all("posts", &[]).await.expect_err("403");
    assert_eq!(err.status, 403);
    assert_eq!(err.failure, forum_client::Failure::PermissionDenied);
    assert_eq!(forum.session().csrf_token(), "after-403");
}

#[tokio::test]
async fn unreachable_server_reports_status_zero() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let forum = boot(format!("http://{addr}"));
    let err = forum
        .api()
        .find("discussions", "1", &[])
        .await
        .expect_err("no server");
    assert_eq!(err.status, 0);
    assert_eq!(err.failure, forum_client::Failure::Generic);
}
