//! Identity provider seam
//!
//! The session guard never talks to the auth backend directly. It reads the
//! current identity and loading flag, watches them for changes, and asks the
//! provider to sign users in and out.

use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use common::{IdentityError, IdentityResult};
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{
    Credentials, IdentitySnapshot, IdentityState, Profile, ProfileUpdate, Registration, User,
};

/// Source of truth for who is signed in
pub trait IdentityProvider: Send + Sync + 'static {
    /// Current identity and loading flag
    fn snapshot(&self) -> IdentitySnapshot;

    /// Watch identity changes
    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot>;

    /// Restore a session from a bearer token
    fn restore(
        &self,
        access_token: &str,
    ) -> impl Future<Output = IdentityResult<IdentityState>> + Send;

    /// Sign in with email and password
    ///
    /// Loading is reported while the sign-in is in flight.
    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = IdentityResult<IdentityState>> + Send;

    /// Create an account together with its profile row
    ///
    /// Returns `Anonymous` when the backend holds the account until the email
    /// is confirmed.
    fn sign_up(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = IdentityResult<IdentityState>> + Send;

    /// Send a password reset email
    fn reset_password(&self, email: &str) -> impl Future<Output = IdentityResult<()>> + Send;

    /// Update the signed-in user's profile
    fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> impl Future<Output = IdentityResult<Profile>> + Send;

    /// Sign the current user out
    ///
    /// The local identity is cleared even when the remote call fails.
    fn sign_out(&self) -> impl Future<Output = IdentityResult<()>> + Send;

    fn current_identity(&self) -> IdentityState {
        self.snapshot().state
    }

    fn current_user(&self) -> Option<User> {
        self.snapshot().state.user().cloned()
    }

    fn is_loading(&self) -> bool {
        self.snapshot().loading
    }
}

/// Sign out, giving up on the provider after `limit`
///
/// Failures and timeouts are logged; the caller carries on with its redirect.
pub async fn sign_out_within<P: IdentityProvider>(identity: &P, limit: Duration) {
    match timeout(limit, identity.sign_out()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Sign-out failed: {}", e),
        Err(_) => error!(
            "Sign-out did not finish within {}s, continuing without it",
            limit.as_secs()
        ),
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: User,
    profile: Profile,
}

/// In-memory identity provider
///
/// Accounts live in a map keyed by email. Sign-outs are counted and can be
/// made to fail or hang, which is what the session guard's tests need.
#[derive(Debug, Clone)]
pub struct StaticIdentityProvider {
    state: Arc<watch::Sender<IdentitySnapshot>>,
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    password_resets: Arc<Mutex<Vec<String>>>,
    sign_outs: Arc<AtomicUsize>,
    fail_sign_out: Arc<AtomicBool>,
    stall_sign_out: Arc<AtomicBool>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(IdentitySnapshot::default());
        Self {
            state: Arc::new(state),
            accounts: Arc::new(Mutex::new(HashMap::new())),
            password_resets: Arc::new(Mutex::new(Vec::new())),
            sign_outs: Arc::new(AtomicUsize::new(0)),
            fail_sign_out: Arc::new(AtomicBool::new(false)),
            stall_sign_out: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_identity(state: IdentityState) -> Self {
        let provider = Self::new();
        provider.set_identity(state);
        provider
    }

    pub fn set_identity(&self, state: IdentityState) {
        self.state.send_modify(|snapshot| snapshot.state = state);
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|snapshot| snapshot.loading = loading);
    }

    /// Make subsequent remote sign-outs fail
    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent remote sign-outs hang forever
    pub fn stall_sign_out(&self, stall: bool) {
        self.stall_sign_out.store(stall, Ordering::SeqCst);
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    /// Emails a password reset was requested for
    pub async fn password_resets(&self) -> Vec<String> {
        self.password_resets.lock().await.clone()
    }

    fn publish(&self, state: IdentityState) {
        self.state.send_replace(IdentitySnapshot {
            state,
            loading: false,
        });
    }
}

impl Default for StaticIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn snapshot(&self) -> IdentitySnapshot {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.state.subscribe()
    }

    async fn restore(&self, _access_token: &str) -> IdentityResult<IdentityState> {
        Ok(self.current_identity())
    }

    async fn sign_in(&self, credentials: &Credentials) -> IdentityResult<IdentityState> {
        self.set_loading(true);

        let account = self
            .accounts
            .lock()
            .await
            .get(&credentials.email)
            .filter(|account| account.password == credentials.password)
            .cloned();

        match account {
            Some(account) => {
                info!("User {} signed in", account.user.id);
                let state = IdentityState::Resolved {
                    user: account.user,
                    profile: account.profile,
                };
                self.publish(state.clone());
                Ok(state)
            }
            None => {
                self.set_loading(false);
                Err(IdentityError::InvalidCredentials)
            }
        }
    }

    async fn sign_up(&self, registration: &Registration) -> IdentityResult<IdentityState> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&registration.email) {
            return Err(IdentityError::AlreadyRegistered(registration.email.clone()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: Some(registration.email.clone()),
        };
        let profile = Profile {
            id: user.id,
            email: user.email.clone(),
            full_name: Some(registration.full_name.clone()),
            phone: None,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(
            registration.email.clone(),
            Account {
                password: registration.password.clone(),
                user: user.clone(),
                profile: profile.clone(),
            },
        );
        drop(accounts);

        info!("Registered user {}", user.id);
        let state = IdentityState::Resolved { user, profile };
        self.publish(state.clone());
        Ok(state)
    }

    async fn reset_password(&self, email: &str) -> IdentityResult<()> {
        self.password_resets.lock().await.push(email.to_string());
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> IdentityResult<Profile> {
        let IdentityState::Resolved { user, mut profile } = self.current_identity() else {
            return Err(IdentityError::NotSignedIn);
        };
        update.apply(&mut profile);

        let mut accounts = self.accounts.lock().await;
        if let Some(account) = user
            .email
            .as_ref()
            .and_then(|email| accounts.get_mut(email))
        {
            account.profile = profile.clone();
        }
        drop(accounts);

        self.set_identity(IdentityState::Resolved {
            user,
            profile: profile.clone(),
        });
        Ok(profile)
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        info!("Signing out current user");

        if self.stall_sign_out.load(Ordering::SeqCst) {
            future::pending::<()>().await;
        }

        self.state.send_replace(IdentitySnapshot::default());

        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(IdentityError::Status(503));
        }
        Ok(())
    }
}
