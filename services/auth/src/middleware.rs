//! Middleware protecting the admin console

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect as HttpRedirect, Response},
};
use serde_json::json;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    guard::GuardDecision,
    identity::{IdentityProvider, sign_out_within},
    navigation::{LogoutReason, Navigator},
    state::AppState,
};

/// Let administrators through and redirect everyone else
pub async fn admin_guard<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let identity = state.identity().snapshot();
    let decision = state
        .admin_guard
        .lock()
        .await
        .evaluate(&identity, Instant::now());

    match decision {
        GuardDecision::Allow => next.run(req).await,
        GuardDecision::Pending => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(json!({ "status": "loading" })),
        )
            .into_response(),
        GuardDecision::Redirect(redirect) => {
            info!("Admin route denied, redirecting to {}", redirect);
            HttpRedirect::to(redirect.path()).into_response()
        }
        GuardDecision::TimedOut => {
            warn!("Identity still loading past the protection timeout, forcing logout");
            let reason = LogoutReason::ProtectionTimeout;

            match state.supervisor.current().await {
                Some(monitor) => monitor.force_logout(reason).await,
                None => {
                    sign_out_within(state.identity().as_ref(), state.config.sign_out_timeout)
                        .await;
                    state.navigator.navigate(reason.login_redirect());
                }
            }

            HttpRedirect::to(reason.login_redirect().path()).into_response()
        }
    }
}
