//! Admin route protection

use std::time::Duration;

use tokio::time::Instant;

use crate::models::{IdentitySnapshot, IdentityState};
use crate::navigation::Redirect;

/// Outcome of evaluating a protected route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity is still loading; show a placeholder
    Pending,
    /// Render the protected content
    Allow,
    /// Send the user elsewhere
    Redirect(Redirect),
    /// Identity kept loading past the protection timeout
    TimedOut,
}

/// Guard for routes reserved to administrators
#[derive(Debug)]
pub struct RouteGuard {
    return_path: String,
    protection_timeout: Duration,
    loading_since: Option<Instant>,
}

impl RouteGuard {
    pub fn new(return_path: impl Into<String>, protection_timeout: Duration) -> Self {
        Self {
            return_path: return_path.into(),
            protection_timeout,
            loading_since: None,
        }
    }

    /// Guard for the admin console
    pub fn admin(protection_timeout: Duration) -> Self {
        Self::new("/admin", protection_timeout)
    }

    pub fn evaluate(&mut self, identity: &IdentitySnapshot, now: Instant) -> GuardDecision {
        if identity.loading {
            let since = *self.loading_since.get_or_insert(now);
            if now.saturating_duration_since(since) > self.protection_timeout {
                self.loading_since = None;
                return GuardDecision::TimedOut;
            }
            return GuardDecision::Pending;
        }
        self.loading_since = None;

        match &identity.state {
            IdentityState::Anonymous => {
                GuardDecision::Redirect(Redirect::login_returning_to(&self.return_path))
            }
            IdentityState::Resolved { profile, .. } if profile.is_admin => GuardDecision::Allow,
            _ => GuardDecision::Redirect(Redirect::unauthorized()),
        }
    }
}
