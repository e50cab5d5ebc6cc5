//! User, profile and identity state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated identity as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Storefront profile row attached to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Email and password sign-in
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// New account details
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Changes a user may make to their own profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none()
    }

    /// Apply the set fields to a profile
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(full_name) = &self.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        profile.updated_at = Utc::now();
    }
}

/// What the identity provider currently knows about the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    /// Nobody is signed in
    #[default]
    Anonymous,
    /// Signed in, but the profile could not be loaded (ghost user)
    Unresolved(User),
    /// Signed in with a loaded profile
    Resolved { user: User, profile: Profile },
}

impl IdentityState {
    pub fn user(&self) -> Option<&User> {
        match self {
            IdentityState::Anonymous => None,
            IdentityState::Unresolved(user) => Some(user),
            IdentityState::Resolved { user, .. } => Some(user),
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            IdentityState::Resolved { profile, .. } => Some(profile),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IdentityState::Resolved { .. })
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, IdentityState::Unresolved(_))
    }

    pub fn is_admin(&self) -> bool {
        self.profile().is_some_and(|profile| profile.is_admin)
    }
}

/// Identity state together with the provider's loading flag
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentitySnapshot {
    pub state: IdentityState,
    pub loading: bool,
}
