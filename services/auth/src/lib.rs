//! Storefront authentication and session guard
//!
//! The centrepiece is [`session::SessionMonitor`], which ends idle sessions
//! after a warning period. [`supervisor::SessionSupervisor`] ties monitors to
//! the identity provider's sign-in and sign-out events, and the axum router
//! in [`routes`] exposes the session to the storefront front end.

pub mod activity;
pub mod error;
pub mod guard;
pub mod hosted;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod navigation;
pub mod routes;
pub mod session;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod validation;
