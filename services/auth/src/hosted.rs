//! Identity provider backed by the hosted auth and REST backend
//!
//! The storefront keeps its users in a managed backend. This module talks to
//! its auth endpoints (`/auth/v1/...`) for the signed-in user and sign-out,
//! and to its REST endpoint (`/rest/v1/profiles`) for the profile row. A user
//! whose profile cannot be loaded is reported as a ghost and signed out.

use std::sync::Arc;
use std::time::Duration;

use common::{IdentityError, IdentityResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::{RwLock, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::identity::IdentityProvider;
use crate::models::{
    Credentials, IdentitySnapshot, IdentityState, Profile, ProfileUpdate, Registration, User,
};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct HostedIdentityConfig {
    /// Project URL, e.g. `https://project.example.co`
    pub base_url: String,
    /// Public API key sent with every request
    pub api_key: String,
    /// Storefront origin, used for the password reset link
    pub site_url: String,
    /// Upper bound on every request to the backend
    pub request_timeout: Duration,
}

/// Token grant returned by sign-in, and by sign-up when no confirmation is needed
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenGrant),
    AwaitingConfirmation(User),
}

/// Hosted identity provider
#[derive(Debug, Clone)]
pub struct HostedIdentityProvider {
    client: Client,
    config: HostedIdentityConfig,
    state: Arc<watch::Sender<IdentitySnapshot>>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl HostedIdentityProvider {
    pub fn new(config: HostedIdentityConfig) -> IdentityResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;
        let (state, _) = watch::channel(IdentitySnapshot::default());

        Ok(Self {
            client,
            config,
            state: Arc::new(state),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.config.api_key)
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_modify(|snapshot| snapshot.loading = loading);
    }

    fn publish(&self, state: IdentityState) {
        self.state.send_replace(IdentitySnapshot {
            state,
            loading: false,
        });
    }

    /// Get the user the token belongs to, if the token is still valid
    async fn fetch_user(&self, access_token: &str) -> IdentityResult<Option<User>> {
        let response = self
            .with_key(self.client.get(self.endpoint("/auth/v1/user")))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => decode(response).await.map(Some),
            status => Err(IdentityError::Status(status.as_u16())),
        }
    }

    /// Get the profile row for a user
    async fn fetch_profile(&self, access_token: &str, user_id: Uuid) -> IdentityResult<Profile> {
        let response = self
            .with_key(self.client.get(self.endpoint("/rest/v1/profiles")))
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())])
            .header("Accept", SINGLE_OBJECT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        decode(success(response)?).await
    }

    /// Insert the profile row for a new account
    async fn insert_profile(
        &self,
        bearer: &str,
        user: &User,
        full_name: &str,
    ) -> IdentityResult<Profile> {
        let response = self
            .with_key(self.client.post(self.endpoint("/rest/v1/profiles")))
            .header("Accept", SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .bearer_auth(bearer)
            .json(&serde_json::json!({
                "id": user.id,
                "email": user.email,
                "full_name": full_name,
                "is_admin": false,
            }))
            .send()
            .await
            .map_err(transport)?;

        decode(success(response)?).await
    }

    /// Keep the token, load the profile and publish the result
    ///
    /// A user without a profile is a ghost and is signed out again.
    async fn establish(&self, access_token: &str, user: User) -> IdentityResult<IdentityState> {
        *self.access_token.write().await = Some(access_token.to_string());

        let state = match self.fetch_profile(access_token, user.id).await {
            Ok(profile) => IdentityState::Resolved { user, profile },
            Err(e) => {
                error!("Error fetching profile for user {}: {}", user.id, e);
                IdentityState::Unresolved(user)
            }
        };
        self.publish(state.clone());

        if state.is_ghost() {
            warn!("Ghost user detected, forcing sign out");
            if let Err(e) = self.sign_out().await {
                error!("Failed to sign out ghost user: {}", e);
            }
        }

        Ok(state)
    }

    async fn password_grant(&self, credentials: &Credentials) -> IdentityResult<TokenGrant> {
        let response = self
            .with_key(self.client.post(self.endpoint("/auth/v1/token")))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(IdentityError::InvalidCredentials)
            }
            _ => decode(success(response)?).await,
        }
    }
}

impl IdentityProvider for HostedIdentityProvider {
    fn snapshot(&self) -> IdentitySnapshot {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.state.subscribe()
    }

    async fn restore(&self, access_token: &str) -> IdentityResult<IdentityState> {
        info!("Restoring session from access token");
        self.set_loading(true);

        match self.fetch_user(access_token).await {
            Ok(Some(user)) => self.establish(access_token, user).await,
            Ok(None) => {
                info!("Access token rejected, no active session");
                self.publish(IdentityState::Anonymous);
                Ok(IdentityState::Anonymous)
            }
            Err(e) => {
                error!("Failed to load current user: {}", e);
                self.publish(IdentityState::Anonymous);
                Err(e)
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> IdentityResult<IdentityState> {
        info!("Sign-in attempt for {}", credentials.email);
        self.set_loading(true);

        match self.password_grant(credentials).await {
            Ok(grant) => self.establish(&grant.access_token, grant.user).await,
            Err(e) => {
                warn!("Sign-in failed for {}: {}", credentials.email, e);
                self.set_loading(false);
                Err(e)
            }
        }
    }

    async fn sign_up(&self, registration: &Registration) -> IdentityResult<IdentityState> {
        info!("Registering {}", registration.email);
        self.set_loading(true);

        let response = self
            .with_key(self.client.post(self.endpoint("/auth/v1/signup")))
            .json(&serde_json::json!({
                "email": registration.email,
                "password": registration.password,
                "data": { "full_name": registration.full_name },
            }))
            .send()
            .await
            .map_err(transport);

        let created = match response {
            Ok(response) if response.status() == StatusCode::UNPROCESSABLE_ENTITY => {
                Err(IdentityError::AlreadyRegistered(registration.email.clone()))
            }
            Ok(response) => match success(response) {
                Ok(response) => decode::<SignUpResponse>(response).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match created {
            Ok(SignUpResponse::Session(grant)) => {
                if let Err(e) = self
                    .insert_profile(&grant.access_token, &grant.user, &registration.full_name)
                    .await
                {
                    error!("Failed to create profile for user {}: {}", grant.user.id, e);
                }
                self.establish(&grant.access_token, grant.user).await
            }
            Ok(SignUpResponse::AwaitingConfirmation(user)) => {
                info!("User {} must confirm their email before signing in", user.id);
                if let Err(e) = self
                    .insert_profile(&self.config.api_key, &user, &registration.full_name)
                    .await
                {
                    error!("Failed to create profile for user {}: {}", user.id, e);
                }
                self.set_loading(false);
                Ok(IdentityState::Anonymous)
            }
            Err(e) => {
                warn!("Registration failed for {}: {}", registration.email, e);
                self.set_loading(false);
                Err(e)
            }
        }
    }

    async fn reset_password(&self, email: &str) -> IdentityResult<()> {
        info!("Password reset requested for {}", email);
        let redirect_to = format!("{}/reset-password", self.config.site_url.trim_end_matches('/'));

        let response = self
            .with_key(self.client.post(self.endpoint("/auth/v1/recover")))
            .query(&[("redirect_to", redirect_to)])
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(transport)?;

        success(response).map(|_| ())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> IdentityResult<Profile> {
        let token = self
            .access_token
            .read()
            .await
            .clone()
            .ok_or(IdentityError::NotSignedIn)?;
        let user = self.current_user().ok_or(IdentityError::NotSignedIn)?;

        let response = self
            .with_key(self.client.patch(self.endpoint("/rest/v1/profiles")))
            .query(&[("id", format!("eq.{}", user.id))])
            .header("Accept", SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .bearer_auth(token)
            .json(update)
            .send()
            .await
            .map_err(transport)?;

        let profile: Profile = decode(success(response)?).await?;
        info!("Profile updated for user {}", user.id);
        self.state.send_modify(|snapshot| {
            snapshot.state = IdentityState::Resolved {
                user,
                profile: profile.clone(),
            }
        });
        Ok(profile)
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        let token = self.access_token.write().await.take();

        let result = match token {
            Some(token) => {
                info!("Signing out current user");
                match self
                    .with_key(self.client.post(self.endpoint("/auth/v1/logout")))
                    .bearer_auth(token)
                    .send()
                    .await
                {
                    Ok(response) => success(response).map(|_| ()),
                    Err(e) => Err(transport(e)),
                }
            }
            None => Ok(()),
        };

        self.publish(IdentityState::Anonymous);
        result
    }
}

fn transport(e: reqwest::Error) -> IdentityError {
    IdentityError::Transport(e.to_string())
}

fn success(response: Response) -> IdentityResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(IdentityError::Status(response.status().as_u16()))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> IdentityResult<T> {
    response
        .json()
        .await
        .map_err(|e| IdentityError::Malformed(e.to_string()))
}
