use std::sync::Arc;

use super::*;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response as AxumResponse},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    accept: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct HostedStub {
    calls: Arc<Mutex<Vec<Recorded>>>,
    profile_insert_fails: bool,
}

async fn handle(
    State(stub): State<HostedStub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AxumResponse {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header_text("authorization");
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    stub.calls.lock().await.push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: authorization.clone(),
        accept: header_text("accept"),
        body: body.clone(),
    });

    match (method.as_str(), uri.path()) {
        ("POST", "/auth/v1/signup") => {
            Json(json!({"id": "uuid-1", "email": body["email"]})).into_response()
        }
        ("POST", "/rest/v1/users") if stub.profile_insert_fails => (
            StatusCode::CONFLICT,
            Json(json!({"message": "duplicate key value"})),
        )
            .into_response(),
        ("POST", "/rest/v1/users") => StatusCode::CREATED.into_response(),
        ("POST", "/auth/v1/token") if body["refresh_token"] == "r1" => Json(json!({
            "access_token": "tok-2",
            "refresh_token": "r2",
            "expires_in": 3600,
            "user": {"id": "uuid-1", "email": "player1@example.com"}
        }))
        .into_response(),
        ("POST", "/auth/v1/token") if body["password"] == "123456" => Json(json!({
            "access_token": "tok-1",
            "refresh_token": "r1",
            "expires_in": 3600,
            "user": {"id": "uuid-1", "email": body["email"]}
        }))
        .into_response(),
        ("POST", "/auth/v1/token") => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
            .into_response(),
        ("GET", "/rest/v1/users") => Json(json!({"counter": 7})).into_response(),
        ("PATCH", "/rest/v1/users") if authorization.as_deref() == Some("Bearer expired") => {
            StatusCode::UNAUTHORIZED.into_response()
        }
        ("PATCH", "/rest/v1/users") => StatusCode::NO_CONTENT.into_response(),
        ("GET", "/auth/v1/user") if authorization.as_deref() == Some("Bearer tok-1") => {
            Json(json!({"id": "uuid-1"})).into_response()
        }
        ("GET", "/auth/v1/user") => StatusCode::UNAUTHORIZED.into_response(),
        ("POST", "/auth/v1/logout") => StatusCode::NO_CONTENT.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_hosted(profile_insert_fails: bool) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let stub = HostedStub {
        calls: Arc::new(Mutex::new(Vec::new())),
        profile_insert_fails,
    };
    let calls = stub.calls.clone();
    let app = Router::new().fallback(handle).with_state(stub);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), calls)
}

fn signed_in() -> Identity {
    Identity::new(UserId::from("uuid-1"), "player1").with_access_token("tok-1")
}

#[tokio::test]
async fn register_signs_up_with_synthetic_email_and_inserts_profile() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    let outcome = backend.register("player1", "123456").await.expect("register");

    assert_eq!(outcome.user_id, Some(UserId::from("uuid-1")));
    let calls = calls.lock().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].path, "/auth/v1/signup");
    assert_eq!(
        calls[0].body,
        json!({"email": "player1@example.com", "password": "123456"})
    );
    assert_eq!(calls[1].path, "/rest/v1/users");
    assert_eq!(
        calls[1].body,
        json!([{"id": "uuid-1", "username": "player1", "counter": 0}])
    );
    assert_eq!(calls[1].authorization.as_deref(), Some("Bearer anon-key"));
}

#[tokio::test]
async fn failed_profile_insert_does_not_fail_registration() {
    let (url, _calls) = spawn_hosted(true).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    backend
        .register("player1", "123456")
        .await
        .expect("registration still succeeds");
}

#[tokio::test]
async fn login_uses_password_grant_and_keeps_access_token() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    let outcome = backend.login("player1", "123456").await.expect("login");

    assert_eq!(outcome.identity.user_id, UserId::from("uuid-1"));
    assert_eq!(outcome.identity.username, "player1");
    assert_eq!(outcome.identity.access_token.as_deref(), Some("tok-1"));
    assert_eq!(outcome.identity.refresh_token.as_deref(), Some("r1"));
    assert_eq!(outcome.state, None);
    let calls = calls.lock().await;
    assert_eq!(calls[0].query.as_deref(), Some("grant_type=password"));
}

#[tokio::test]
async fn login_rejection_carries_service_description() {
    let (url, _calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    let err = backend
        .login("player1", "999999")
        .await
        .expect_err("bad password");
    assert!(
        matches!(err, BackendError::Rejected(ref m) if m == "Invalid login credentials"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn fetch_reads_single_counter_row_with_bearer() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    let state = backend.fetch_user_state(&signed_in()).await.expect("fetch");

    assert_eq!(
        state,
        UserState {
            counter: 7,
            coins: DEFAULT_COINS
        }
    );
    let calls = calls.lock().await;
    assert_eq!(calls[0].query.as_deref(), Some("select=counter&id=eq.uuid-1"));
    assert_eq!(calls[0].accept.as_deref(), Some(SINGLE_OBJECT_MEDIA_TYPE));
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer tok-1"));
}

#[tokio::test]
async fn update_patches_counter_column() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    backend
        .update_counter(&signed_in(), 8)
        .await
        .expect("update");

    let calls = calls.lock().await;
    assert_eq!(calls[0].method, Method::PATCH);
    assert_eq!(calls[0].query.as_deref(), Some("id=eq.uuid-1"));
    assert_eq!(calls[0].body, json!({"counter": 8}));
}

#[tokio::test]
async fn expired_token_on_update_is_unauthorized() {
    let (url, _calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");
    let expired = Identity::new(UserId::from("uuid-1"), "player1").with_access_token("expired");

    let err = backend
        .update_counter(&expired, 8)
        .await
        .expect_err("expired token");
    assert!(matches!(err, BackendError::Unauthorized), "got {err:?}");
}

#[tokio::test]
async fn refresh_grant_renews_credentials() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");
    let expired = Identity::new(UserId::from("uuid-1"), "player1")
        .with_access_token("expired")
        .with_refresh_token("r1");

    let refreshed = backend
        .refresh_session(&expired)
        .await
        .expect("refresh")
        .expect("renewed");

    assert_eq!(refreshed.user_id, UserId::from("uuid-1"));
    assert_eq!(refreshed.username, "player1");
    assert_eq!(refreshed.access_token.as_deref(), Some("tok-2"));
    assert_eq!(refreshed.refresh_token.as_deref(), Some("r2"));

    let calls = calls.lock().await;
    assert_eq!(calls[0].path, "/auth/v1/token");
    assert_eq!(calls[0].query.as_deref(), Some("grant_type=refresh_token"));
    assert_eq!(calls[0].body, json!({"refresh_token": "r1"}));
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer anon-key"));
}

#[tokio::test]
async fn refused_or_missing_refresh_token_means_sign_in_again() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    let revoked = Identity::new(UserId::from("uuid-1"), "player1").with_refresh_token("revoked");
    assert_eq!(backend.refresh_session(&revoked).await.expect("refused"), None);

    let tokenless = Identity::new(UserId::from("uuid-1"), "player1");
    assert_eq!(backend.refresh_session(&tokenless).await.expect("no token"), None);
    assert_eq!(calls.lock().await.len(), 1);
}

#[tokio::test]
async fn check_session_distinguishes_live_and_expired_tokens() {
    let (url, _calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    assert!(backend.check_session(&signed_in()).await.expect("live"));

    let stale = Identity::new(UserId::from("uuid-1"), "player1").with_access_token("old");
    assert!(!backend.check_session(&stale).await.expect("expired"));

    let tokenless = Identity::new(UserId::from("uuid-1"), "player1");
    assert!(!backend.check_session(&tokenless).await.expect("no token"));
}

#[tokio::test]
async fn sign_out_and_bet_game() {
    let (url, calls) = spawn_hosted(false).await;
    let backend = HostedAuthBackend::new(url, "anon-key");

    backend.sign_out(&signed_in()).await.expect("sign out");
    assert_eq!(calls.lock().await[0].path, "/auth/v1/logout");

    assert!(!backend.capabilities().bet_game);
    let err = backend
        .play_bet_game(&signed_in(), 1000)
        .await
        .expect_err("unsupported");
    assert!(matches!(err, BackendError::Unsupported(_)));
}
