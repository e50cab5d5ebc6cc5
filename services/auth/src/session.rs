//! Session activity monitor
//!
//! One monitor exists per authenticated session. Once started it owns a
//! driver task that reconciles three sources:
//!
//! - a repeating poll at `check_interval` running the health check,
//! - a one-shot backstop armed when the warning phase begins, which ends the
//!   session after `warning` of wall-clock time even if polls are delayed,
//! - the activity bus subscription.
//!
//! All state lives behind one lock. Activity clears the backstop deadline
//! under that lock, and the backstop only fires if its deadline is still set
//! when it acquires the lock, so whichever side gets there first wins. The
//! logout transition itself is never undone.

use std::future;
use std::sync::Arc;

use common::{MonitorConfig, SessionError, SessionResult};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, warn};

use crate::activity::{ActivityBus, ActivitySignal};
use crate::identity::{IdentityProvider, sign_out_within};
use crate::models::{HealthAction, IdentityState, SessionPhase, SessionSnapshot, SessionState};
use crate::navigation::{LogoutReason, Navigator};

struct MonitorState {
    session: SessionState,
    backstop: Option<Instant>,
}

struct Shared<P, N> {
    config: MonitorConfig,
    identity: Arc<P>,
    navigator: Arc<N>,
    state: Mutex<MonitorState>,
    wake: Notify,
    snapshot: watch::Sender<SessionSnapshot>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Session activity monitor
pub struct SessionMonitor<P, N> {
    shared: Arc<Shared<P, N>>,
}

impl<P, N> Clone for SessionMonitor<P, N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P, N> SessionMonitor<P, N>
where
    P: IdentityProvider,
    N: Navigator,
{
    /// Create a monitor for the session the identity provider currently holds
    pub fn new(config: MonitorConfig, identity: Arc<P>, navigator: Arc<N>) -> Self {
        let session = SessionState::new(config.clone());
        let (snapshot, _) = watch::channel(session.snapshot());

        Self {
            shared: Arc::new(Shared {
                config,
                identity,
                navigator,
                state: Mutex::new(MonitorState {
                    session,
                    backstop: None,
                }),
                wake: Notify::new(),
                snapshot,
                driver: Mutex::new(None),
            }),
        }
    }

    /// Stamp the first activity and start listening and polling
    ///
    /// Refuses to start unless the identity provider reports a fully
    /// resolved user and is done loading.
    pub async fn start(&self, bus: &ActivityBus) -> SessionResult<()> {
        let identity = self.shared.identity.snapshot();
        if identity.loading {
            return Err(SessionError::IdentityLoading);
        }
        let user = match identity.state {
            IdentityState::Anonymous => return Err(SessionError::NoUser),
            IdentityState::Unresolved(user) => {
                return Err(SessionError::UnresolvedProfile(user.id.to_string()));
            }
            IdentityState::Resolved { user, .. } => user,
        };

        let mut driver = self.shared.driver.lock().await;
        if driver.is_some() {
            return Err(SessionError::AlreadyStarted);
        }

        {
            let mut state = self.shared.state.lock().await;
            if !state.session.initialize(Instant::now()) {
                return Err(SessionError::LoggedOut);
            }
            state.backstop = None;
            self.shared.publish(&state);
        }

        info!(
            "Initializing session for user {} (timeout {}s, warning {}s, check every {}s)",
            user.id,
            self.shared.config.timeout.as_secs(),
            self.shared.config.warning.as_secs(),
            self.shared.config.check_interval.as_secs()
        );

        let signals = bus.subscribe();
        *driver = Some(tokio::spawn(drive(Arc::clone(&self.shared), signals)));

        Ok(())
    }

    /// Tear the monitor down
    ///
    /// Cancels both timers, drops the activity subscription and returns the
    /// state to uninitialized. Returns once the driver task is gone.
    pub async fn stop(&self) {
        let handle = self.shared.driver.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            // Wait for the task to be dropped so its subscription is released
            let _ = handle.await;
        }

        let mut state = self.shared.state.lock().await;
        state.backstop = None;
        state.session.reset();
        self.shared.publish(&state);
        debug!("Session monitor stopped");
    }

    /// Record a qualifying user interaction
    pub async fn record_activity(&self) {
        self.shared.record_activity().await;
    }

    /// Explicitly keep the session alive, e.g. from a "stay logged in" action
    pub async fn extend_session(&self) {
        info!("Session extended by user");
        self.shared.record_activity().await;
    }

    /// Run one health check now
    pub async fn check_health(&self) {
        self.shared.check_health().await;
    }

    /// End the session
    ///
    /// Only the first call has any effect.
    pub async fn force_logout(&self, reason: LogoutReason) {
        self.shared.force_logout(reason).await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Watch snapshots as the session changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.snapshot.borrow().phase
    }

    pub fn is_active(&self) -> bool {
        self.shared.snapshot.borrow().is_active
    }

    pub fn show_warning(&self) -> bool {
        self.shared.snapshot.borrow().show_warning
    }

    pub fn time_remaining(&self) -> u64 {
        self.shared.snapshot.borrow().time_remaining
    }

    pub fn time_remaining_formatted(&self) -> String {
        self.shared.snapshot.borrow().time_remaining_formatted.clone()
    }

    /// Whether the backstop is currently armed
    pub async fn backstop_armed(&self) -> bool {
        self.shared.state.lock().await.backstop.is_some()
    }
}

impl<P, N> Shared<P, N>
where
    P: IdentityProvider,
    N: Navigator,
{
    fn publish(&self, state: &MonitorState) {
        self.snapshot.send_replace(state.session.snapshot());
    }

    async fn record_activity(&self) {
        let mut state = self.state.lock().await;
        if !state.session.record_activity(Instant::now()) {
            return;
        }
        if state.backstop.take().is_some() {
            debug!("Warning backstop cancelled by activity");
        }
        self.publish(&state);
        drop(state);

        self.wake.notify_one();
    }

    async fn check_health(&self) {
        if self.identity.current_user().is_none() {
            return;
        }
        let loading = self.identity.is_loading();
        let now = Instant::now();

        let action = {
            let mut state = self.state.lock().await;
            let action = state.session.check(now, loading);
            if action == HealthAction::EnterWarning {
                let delay = state.session.backstop_delay();
                state.backstop = Some(now + delay);
            }
            self.publish(&state);
            action
        };

        match action {
            HealthAction::None => {}
            HealthAction::EnterWarning => {
                warn!(
                    "Session inactive for {}s, showing timeout warning",
                    self.config.warning_threshold().as_secs()
                );
                self.wake.notify_one();
            }
            HealthAction::Logout(LogoutReason::SessionError) => {
                warn!("Session appears stuck in loading state, forcing logout");
                self.force_logout(LogoutReason::SessionError).await;
            }
            HealthAction::Logout(reason) => {
                info!("Session timeout threshold reached");
                self.force_logout(reason).await;
            }
        }
    }

    async fn fire_backstop(&self) {
        let due = {
            let state = self.state.lock().await;
            state.session.phase() == SessionPhase::Warning
                && state.backstop.is_some_and(|deadline| Instant::now() >= deadline)
        };
        if due {
            info!("Warning period elapsed without activity");
            self.force_logout(LogoutReason::SessionTimeout).await;
        }
    }

    async fn force_logout(&self, reason: LogoutReason) {
        {
            let mut state = self.state.lock().await;
            if !state.session.begin_logout() {
                debug!("Logout already performed, ignoring {}", reason);
                return;
            }
            state.backstop = None;
            self.publish(&state);
        }
        self.wake.notify_one();

        info!("Session ended ({}), logging out", reason);
        sign_out_within(self.identity.as_ref(), self.config.sign_out_timeout).await;
        self.navigator.navigate(reason.login_redirect());
    }
}

async fn backstop_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn drive<P, N>(shared: Arc<Shared<P, N>>, mut signals: broadcast::Receiver<ActivitySignal>)
where
    P: IdentityProvider,
    N: Navigator,
{
    let period = shared.config.check_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut listening = true;

    loop {
        let backstop = {
            let state = shared.state.lock().await;
            if state.session.phase() == SessionPhase::LoggedOut {
                break;
            }
            state.backstop
        };

        tokio::select! {
            _ = ticker.tick() => shared.check_health().await,
            _ = backstop_elapsed(backstop) => shared.fire_backstop().await,
            received = signals.recv(), if listening => match received {
                Ok(signal) => {
                    debug!("Activity: {}", signal);
                    shared.record_activity().await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Activity listener lagged by {} signals", skipped);
                    shared.record_activity().await;
                }
                Err(RecvError::Closed) => {
                    warn!("Activity bus closed, continuing without activity signals");
                    listening = false;
                }
            },
            _ = shared.wake.notified() => {}
        }
    }

    debug!("Session driver finished");
}
