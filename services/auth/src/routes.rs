//! Session guard routes

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    activity::ActivitySignal,
    error::{AuthError, AuthResult},
    identity::{IdentityProvider, sign_out_within},
    middleware::admin_guard,
    models::{
        Credentials, IdentityState, Profile, ProfileUpdate, Registration, SessionSnapshot,
        SessionState,
    },
    navigation::LogoutReason,
    state::AppState,
    validation,
};

/// Request carrying an activity signal from the front end
#[derive(Deserialize)]
pub struct ActivityRequest {
    pub signal: ActivitySignal,
}

/// Response for a published activity signal
#[derive(Serialize)]
pub struct ActivityResponse {
    pub listeners: usize,
}

/// Request for a password reset email
#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Response describing the current identity
#[derive(Serialize)]
pub struct IdentityResponse {
    pub status: &'static str,
    pub user_id: Option<String>,
    pub is_admin: bool,
}

impl From<&IdentityState> for IdentityResponse {
    fn from(identity: &IdentityState) -> Self {
        let status = match identity {
            IdentityState::Anonymous => "anonymous",
            IdentityState::Unresolved(_) => "unresolved",
            IdentityState::Resolved { .. } => "resolved",
        };

        Self {
            status,
            user_id: identity.user().map(|user| user.id.to_string()),
            is_admin: identity.is_admin(),
        }
    }
}

/// Response with the latest redirect
#[derive(Serialize)]
pub struct RedirectResponse {
    pub redirect: Option<String>,
}

/// Create the router for the session guard
pub fn create_router<P: IdentityProvider>(state: AppState<P>) -> Router {
    let admin = Router::new()
        .route("/admin", get(admin_home))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_guard::<P>,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login::<P>))
        .route("/auth/register", post(register::<P>))
        .route("/auth/reset-password", post(reset_password::<P>))
        .route("/auth/profile", patch(update_profile::<P>))
        .route("/auth/session", post(restore_session::<P>))
        .route("/auth/logout", post(sign_out::<P>))
        .route("/session", get(session_snapshot::<P>))
        .route("/session/activity", post(record_activity::<P>))
        .route("/session/extend", post(extend_session::<P>))
        .route("/session/logout", post(force_logout::<P>))
        .route("/session/redirect", get(latest_redirect::<P>))
        .merge(admin)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Restore the signed-in user from a bearer token
pub async fn restore_session<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
) -> AuthResult<Json<IdentityResponse>> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::Unauthorized)?;

    let identity = state.identity().restore(token).await?;
    let response = IdentityResponse::from(&identity);
    info!("Session restore finished: {}", response.status);

    Ok(Json(response))
}

/// Email and password sign-in
pub async fn login<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Json(payload): Json<Credentials>,
) -> AuthResult<Json<IdentityResponse>> {
    validation::validate_credentials(&payload).map_err(AuthError::Validation)?;

    let identity = state.identity().sign_in(&payload).await?;
    Ok(Json(IdentityResponse::from(&identity)))
}

/// Account registration
///
/// Answers `201` when the new user is signed in straight away and `202` when
/// the backend waits for the email to be confirmed.
pub async fn register<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Json(payload): Json<Registration>,
) -> AuthResult<impl IntoResponse> {
    validation::validate_registration(&payload).map_err(AuthError::Validation)?;

    let identity = state.identity().sign_up(&payload).await?;
    let status = if identity.is_resolved() {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };

    Ok((status, Json(IdentityResponse::from(&identity))))
}

/// Send a password reset email
pub async fn reset_password<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AuthResult<impl IntoResponse> {
    validation::validate_email(&payload.email).map_err(AuthError::Validation)?;

    state.identity().reset_password(&payload.email).await?;
    Ok(Json(serde_json::json!({
        "message": "If an account exists for this email, a reset link is on its way"
    })))
}

/// Update the signed-in user's profile
pub async fn update_profile<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Json(payload): Json<ProfileUpdate>,
) -> AuthResult<Json<Profile>> {
    validation::validate_profile_update(&payload).map_err(AuthError::Validation)?;

    let profile = state.identity().update_profile(&payload).await?;
    Ok(Json(profile))
}

/// Sign the user out on request
pub async fn sign_out<P: IdentityProvider>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    info!("Logout request");
    sign_out_within(state.identity().as_ref(), state.config.sign_out_timeout).await;

    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    )
}

/// Current session snapshot, for the warning banner
pub async fn session_snapshot<P: IdentityProvider>(
    State(state): State<AppState<P>>,
) -> Json<SessionSnapshot> {
    let snapshot = match state.supervisor.current().await {
        Some(monitor) => monitor.snapshot(),
        None => SessionState::new(state.config.clone()).snapshot(),
    };
    Json(snapshot)
}

/// Publish an activity signal
pub async fn record_activity<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Json(payload): Json<ActivityRequest>,
) -> Json<ActivityResponse> {
    let listeners = state.bus().publish(payload.signal);
    Json(ActivityResponse { listeners })
}

/// "Stay logged in"
pub async fn extend_session<P: IdentityProvider>(
    State(state): State<AppState<P>>,
) -> AuthResult<Json<SessionSnapshot>> {
    let monitor = state
        .supervisor
        .current()
        .await
        .ok_or(AuthError::NoSession)?;
    monitor.extend_session().await;
    Ok(Json(monitor.snapshot()))
}

/// "Logout now"
pub async fn force_logout<P: IdentityProvider>(
    State(state): State<AppState<P>>,
) -> AuthResult<Json<RedirectResponse>> {
    let monitor = state
        .supervisor
        .current()
        .await
        .ok_or(AuthError::NoSession)?;
    monitor.force_logout(LogoutReason::SessionTimeout).await;

    Ok(Json(RedirectResponse {
        redirect: state.navigator.latest().map(|r| r.path().to_string()),
    }))
}

/// Latest redirect issued by the guard
pub async fn latest_redirect<P: IdentityProvider>(
    State(state): State<AppState<P>>,
) -> Json<RedirectResponse> {
    Json(RedirectResponse {
        redirect: state.navigator.latest().map(|r| r.path().to_string()),
    })
}

/// Admin console landing
pub async fn admin_home() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "area": "admin" }))
}
