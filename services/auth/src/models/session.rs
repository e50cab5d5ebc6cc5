//! Session liveness state and its transitions
//!
//! `SessionState` is the clock-free core of the session monitor: every
//! transition takes the current instant as an argument, so the timing rules
//! can be exercised without timers. The monitor in `crate::session` owns one
//! of these behind a lock and drives it from its poll and backstop timers.

use std::time::Duration;

use common::MonitorConfig;
use serde::Serialize;
use tokio::time::Instant;

use crate::navigation::LogoutReason;

/// Phase of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No authenticated session has been stamped yet
    Uninitialized,
    /// Activity is recent enough
    Active,
    /// Inactivity crossed the warning threshold
    Warning,
    /// Terminal: the session was ended
    LoggedOut,
}

/// What a health check decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    /// Nothing beyond refreshing the remaining time
    None,
    /// The warning phase was just entered
    EnterWarning,
    /// The session must be ended
    Logout(LogoutReason),
}

/// Reactive view of a session, for a banner or dialog to bind to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_active: bool,
    pub time_remaining: u64,
    pub show_warning: bool,
    pub time_remaining_formatted: String,
}

/// Liveness state of one authenticated session
#[derive(Debug, Clone)]
pub struct SessionState {
    config: MonitorConfig,
    phase: SessionPhase,
    is_active: bool,
    last_activity_at: Option<Instant>,
    time_remaining: u64,
    show_warning: bool,
    initialized: bool,
}

impl SessionState {
    pub fn new(config: MonitorConfig) -> Self {
        let time_remaining = config.timeout_seconds();
        Self {
            config,
            phase: SessionPhase::Uninitialized,
            is_active: true,
            last_activity_at: None,
            time_remaining,
            show_warning: false,
            initialized: false,
        }
    }

    /// Stamp the first activity of a freshly authenticated session
    ///
    /// Returns false once the session has logged out: a new state is needed
    /// for a new session.
    pub fn initialize(&mut self, now: Instant) -> bool {
        if self.phase == SessionPhase::LoggedOut {
            return false;
        }
        self.initialized = true;
        self.record_activity(now)
    }

    /// Reset the inactivity clock
    ///
    /// Ignored before initialization and after logout.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        if !self.initialized || self.phase == SessionPhase::LoggedOut {
            return false;
        }
        self.last_activity_at = Some(now);
        self.show_warning = false;
        self.is_active = true;
        self.time_remaining = self.config.timeout_seconds();
        self.phase = SessionPhase::Active;
        true
    }

    /// Evaluate the session at `now`
    ///
    /// Branches are checked in priority order: stuck loading, timeout,
    /// warning threshold.
    pub fn check(&mut self, now: Instant, identity_loading: bool) -> HealthAction {
        if !self.initialized || self.phase == SessionPhase::LoggedOut {
            return HealthAction::None;
        }
        let Some(last_activity_at) = self.last_activity_at else {
            return HealthAction::None;
        };

        let elapsed = now.saturating_duration_since(last_activity_at);

        if identity_loading && elapsed > self.config.stuck_loading_threshold {
            return HealthAction::Logout(LogoutReason::SessionError);
        }

        self.time_remaining = self.config.timeout.saturating_sub(elapsed).as_secs();

        if elapsed >= self.config.timeout {
            return HealthAction::Logout(LogoutReason::SessionTimeout);
        }

        if elapsed >= self.config.warning_threshold() && !self.show_warning {
            self.show_warning = true;
            self.phase = SessionPhase::Warning;
            return HealthAction::EnterWarning;
        }

        HealthAction::None
    }

    /// Enter the terminal phase
    ///
    /// Returns true only for the call that performed the transition.
    pub fn begin_logout(&mut self) -> bool {
        if self.phase == SessionPhase::LoggedOut {
            return false;
        }
        self.is_active = false;
        self.phase = SessionPhase::LoggedOut;
        true
    }

    /// Forget the current session, as on sign-out
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn show_warning(&self) -> bool {
        self.show_warning
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.last_activity_at
    }

    pub fn time_remaining(&self) -> u64 {
        self.time_remaining
    }

    pub fn time_remaining_formatted(&self) -> String {
        format_time_remaining(self.time_remaining)
    }

    /// Wall-clock delay after which the warning backstop ends the session
    pub fn backstop_delay(&self) -> Duration {
        self.config.warning
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            is_active: self.is_active,
            time_remaining: self.time_remaining,
            show_warning: self.show_warning,
            time_remaining_formatted: self.time_remaining_formatted(),
        }
    }
}

/// Format seconds as `m:ss`
pub fn format_time_remaining(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
