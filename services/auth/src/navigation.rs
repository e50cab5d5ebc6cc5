//! Logout reasons and the navigation seam used on forced logout

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Why a session was ended by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoutReason {
    /// The user was idle for the whole timeout
    SessionTimeout,
    /// The identity layer wedged while loading
    SessionError,
    /// A protected route gave up waiting for the identity layer
    ProtectionTimeout,
}

impl LogoutReason {
    /// Get the reason code carried in the login URL
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::SessionTimeout => "session-timeout",
            LogoutReason::SessionError => "session-error",
            LogoutReason::ProtectionTimeout => "protection-timeout",
        }
    }

    /// Login view carrying this reason
    pub fn login_redirect(&self) -> Redirect {
        Redirect::new(format!("/login?reason={}", self.as_str()))
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application path the user should be sent to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Redirect(String);

impl Redirect {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Login view that returns to `path` after signing in
    pub fn login_returning_to(path: &str) -> Self {
        Self(format!("/login?redirect={}", path))
    }

    /// Storefront home with an authorization error
    pub fn unauthorized() -> Self {
        Self("/?error=unauthorized".to_string())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something able to move the user to another view
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, redirect: Redirect);
}

/// Navigator that publishes the latest redirect for the front end to follow
#[derive(Debug, Clone)]
pub struct RedirectNavigator {
    latest: Arc<watch::Sender<Option<Redirect>>>,
    navigations: Arc<AtomicUsize>,
}

impl RedirectNavigator {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest: Arc::new(latest),
            navigations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Most recent redirect, if any
    pub fn latest(&self) -> Option<Redirect> {
        self.latest.borrow().clone()
    }

    /// Number of redirects issued so far
    pub fn navigation_count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

impl Default for RedirectNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for RedirectNavigator {
    fn navigate(&self, redirect: Redirect) {
        info!("Redirecting to {}", redirect);
        self.navigations.fetch_add(1, Ordering::SeqCst);
        self.latest.send_replace(Some(redirect));
    }
}
