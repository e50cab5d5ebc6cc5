//! Session guard models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::{HealthAction, SessionPhase, SessionSnapshot, SessionState};
pub use user::{
    Credentials, IdentitySnapshot, IdentityState, Profile, ProfileUpdate, Registration, User,
};
