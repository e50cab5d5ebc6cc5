//! HTTP surface tests

use std::sync::Arc;
use std::time::Duration;

use auth::identity::{IdentityProvider, StaticIdentityProvider};
use auth::models::{IdentityState, Profile, User};
use auth::routes::create_router;
use auth::state::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use common::MonitorConfig;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

fn resolved(is_admin: bool) -> IdentityState {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();
    IdentityState::Resolved {
        user: User {
            id,
            email: Some("admin@example.com".to_string()),
        },
        profile: Profile {
            id,
            email: Some("admin@example.com".to_string()),
            full_name: Some("Store Admin".to_string()),
            phone: None,
            is_admin,
            created_at: now,
            updated_at: now,
        },
    }
}

fn app_state(identity: IdentityState) -> (AppState<StaticIdentityProvider>, Arc<StaticIdentityProvider>) {
    let identity = Arc::new(StaticIdentityProvider::with_identity(identity));
    let state = AppState::new(
        MonitorConfig::default(),
        Arc::clone(&identity),
        Duration::from_secs(10),
    );
    (state, identity)
}

async fn send(
    state: &AppState<StaticIdentityProvider>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    create_router(state.clone())
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (state, _) = app_state(IdentityState::Anonymous);

    let response = send(&state, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_session_without_monitor() {
    let (state, _) = app_state(IdentityState::Anonymous);

    let response = send(&state, "GET", "/session", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["phase"], "uninitialized");
    assert_eq!(body["time_remaining"], 1800);
    assert_eq!(body["time_remaining_formatted"], "30:00");

    let response = send(&state, "POST", "/session/extend", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&state, "POST", "/session/logout", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_activity_extend_and_logout() {
    let (state, identity) = app_state(resolved(false));
    state.supervisor.reconcile(&identity.snapshot()).await;

    let response = send(
        &state,
        "POST",
        "/session/activity",
        Some(serde_json::json!({ "signal": "click" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["listeners"], 1);

    let response = send(
        &state,
        "POST",
        "/session/activity",
        Some(serde_json::json!({ "signal": "wheel" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&state, "POST", "/session/extend", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["phase"], "active");
    assert_eq!(body["show_warning"], false);

    let response = send(&state, "POST", "/session/logout", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["redirect"],
        "/login?reason=session-timeout"
    );
    assert_eq!(identity.sign_out_count(), 1);

    let response = send(&state, "GET", "/session/redirect", None).await;
    assert_eq!(
        json_body(response).await["redirect"],
        "/login?reason=session-timeout"
    );
}

#[tokio::test]
async fn test_restore_requires_bearer_token() {
    let (state, _) = app_state(IdentityState::Anonymous);

    let response = send(&state, "POST", "/auth/session", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/auth/session")
        .header(header::AUTHORIZATION, "Bearer token")
        .body(Body::empty())
        .unwrap();
    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "anonymous");
}

#[tokio::test]
async fn test_admin_route_guard() {
    let (state, identity) = app_state(IdentityState::Anonymous);

    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?redirect=/admin");

    identity.set_identity(resolved(false));
    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?error=unauthorized");

    identity.set_identity(resolved(true));
    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["area"], "admin");
}

#[tokio::test(start_paused = true)]
async fn test_admin_route_protection_timeout() {
    let (state, identity) = app_state(resolved(true));
    state.supervisor.reconcile(&identity.snapshot()).await;
    identity.set_loading(true);

    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    tokio::time::advance(Duration::from_secs(11)).await;

    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?reason=protection-timeout");
    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(
        state.navigator.latest().unwrap().path(),
        "/login?reason=protection-timeout"
    );
}

#[tokio::test]
async fn test_register_login_and_profile_update() {
    let (state, identity) = app_state(IdentityState::Anonymous);
    let registration = serde_json::json!({
        "email": "shopper@example.com",
        "password": "correct horse",
        "full_name": "Shopper"
    });

    let response = send(&state, "POST", "/auth/register", Some(registration.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["is_admin"], false);

    // The new account has a profile, so it is monitored rather than treated as a ghost
    state.supervisor.reconcile(&identity.snapshot()).await;
    assert!(state.supervisor.current().await.is_some());

    let response = send(&state, "POST", "/auth/register", Some(registration)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &state,
        "PATCH",
        "/auth/profile",
        Some(serde_json::json!({ "phone": "+33 6 12 34 56 78" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["phone"], "+33 6 12 34 56 78");
    assert_eq!(body["full_name"], "Shopper");

    let response = send(&state, "POST", "/auth/logout", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &state,
        "POST",
        "/auth/login",
        Some(serde_json::json!({ "email": "shopper@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!identity.is_loading());

    let response = send(
        &state,
        "POST",
        "/auth/login",
        Some(serde_json::json!({ "email": "shopper@example.com", "password": "correct horse" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "resolved");
    assert_eq!(
        identity.current_identity().profile().and_then(|p| p.phone.clone()),
        Some("+33 6 12 34 56 78".to_string())
    );
}

#[tokio::test]
async fn test_auth_requests_are_validated() {
    let (state, _) = app_state(IdentityState::Anonymous);

    let response = send(
        &state,
        "POST",
        "/auth/register",
        Some(serde_json::json!({
            "email": "not-an-email",
            "password": "correct horse",
            "full_name": "Shopper"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid email format");

    let response = send(
        &state,
        "POST",
        "/auth/login",
        Some(serde_json::json!({ "email": "shopper@example.com", "password": "" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &state,
        "PATCH",
        "/auth/profile",
        Some(serde_json::json!({ "full_name": "Shopper" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_password() {
    let (state, identity) = app_state(IdentityState::Anonymous);

    let response = send(
        &state,
        "POST",
        "/auth/reset-password",
        Some(serde_json::json!({ "email": "shopper@example.com" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        identity.password_resets().await,
        vec!["shopper@example.com".to_string()]
    );

    let response = send(
        &state,
        "POST",
        "/auth/reset-password",
        Some(serde_json::json!({ "email": "nope" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(identity.password_resets().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_protection_timeout_with_stalled_sign_out() {
    let (state, identity) = app_state(resolved(true));
    identity.set_loading(true);
    identity.stall_sign_out(true);

    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    tokio::time::advance(Duration::from_secs(11)).await;

    let response = send(&state, "GET", "/admin", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?reason=protection-timeout");
    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(state.navigator.navigation_count(), 1);
}
