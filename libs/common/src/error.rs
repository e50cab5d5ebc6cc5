//! Custom error types for the common library
//!
//! This module defines the error taxonomy shared by the session guard and
//! the identity collaborators it talks to.

use thiserror::Error;

/// Error raised when a monitor configuration is inconsistent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The warning lead time does not fit inside the timeout
    #[error("Warning period ({warning}s) must be shorter than the session timeout ({timeout}s)")]
    WarningNotBeforeTimeout { warning: u64, timeout: u64 },

    /// A value that must be positive was zero
    #[error("Configuration value `{0}` must be greater than zero")]
    Zero(&'static str),

    /// A value does not fit in a duration once converted to seconds
    #[error("Configuration value `{0}` is too large")]
    Overflow(&'static str),
}

/// Error reported by an identity provider
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The request never produced a response
    #[error("Identity provider request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status
    #[error("Identity provider returned status {0}")]
    Status(u16),

    /// The provider answered with a body we could not decode
    #[error("Identity provider returned a malformed body: {0}")]
    Malformed(String),

    /// Email and password did not match an account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// An account already exists for the email
    #[error("An account already exists for {0}")]
    AlreadyRegistered(String),

    /// The operation needs a signed-in user
    #[error("No user is signed in")]
    NotSignedIn,
}

/// Error returned when a session monitor refuses to start
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No authenticated user is present
    #[error("No authenticated user")]
    NoUser,

    /// The identity provider has not finished loading
    #[error("Identity provider is still loading")]
    IdentityLoading,

    /// The user exists but their profile could not be resolved
    #[error("User {0} has no resolvable profile")]
    UnresolvedProfile(String),

    /// The monitor is already running
    #[error("Session monitor already started")]
    AlreadyStarted,

    /// The monitor reached its terminal state and cannot be reused
    #[error("Session monitor has already logged out")]
    LoggedOut,
}

/// Type alias for Result with IdentityError
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Type alias for Result with SessionError
pub type SessionResult<T> = Result<T, SessionError>;
