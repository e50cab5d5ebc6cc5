//! Timing tests for the session monitor
//!
//! These run on tokio's paused clock: sleeping in the test advances virtual
//! time and lets the monitor's poll and backstop timers fire in order.

use std::sync::Arc;
use std::time::Duration;

use auth::activity::{ActivityBus, ActivitySignal};
use auth::identity::StaticIdentityProvider;
use auth::models::{IdentityState, Profile, SessionPhase, User};
use auth::navigation::{LogoutReason, RedirectNavigator};
use auth::session::SessionMonitor;
use common::MonitorConfig;
use tokio::time::sleep;
use uuid::Uuid;

type Monitor = SessionMonitor<StaticIdentityProvider, RedirectNavigator>;

struct Harness {
    monitor: Monitor,
    identity: Arc<StaticIdentityProvider>,
    navigator: Arc<RedirectNavigator>,
    bus: ActivityBus,
}

fn resolved_identity() -> IdentityState {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();
    IdentityState::Resolved {
        user: User {
            id,
            email: Some("shopper@example.com".to_string()),
        },
        profile: Profile {
            id,
            email: Some("shopper@example.com".to_string()),
            full_name: Some("Shopper".to_string()),
            phone: None,
            is_admin: false,
            created_at: now,
            updated_at: now,
        },
    }
}

async fn start(config: MonitorConfig) -> Harness {
    let identity = Arc::new(StaticIdentityProvider::with_identity(resolved_identity()));
    let navigator = Arc::new(RedirectNavigator::new());
    let bus = ActivityBus::default();
    let monitor = SessionMonitor::new(config, Arc::clone(&identity), Arc::clone(&navigator));
    monitor.start(&bus).await.expect("monitor should start");

    Harness {
        monitor,
        identity,
        navigator,
        bus,
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_warns_then_times_out() {
    let h = start(MonitorConfig::from_minutes(30, 5, 30).unwrap()).await;

    sleep(secs(1499)).await;
    assert!(!h.monitor.show_warning());
    assert_eq!(h.monitor.phase(), SessionPhase::Active);
    assert_eq!(h.monitor.time_remaining(), 1800 - 1470);

    sleep(secs(2)).await;
    assert!(h.monitor.show_warning());
    assert_eq!(h.monitor.phase(), SessionPhase::Warning);
    assert_eq!(h.monitor.time_remaining_formatted(), "5:00");
    assert!(h.monitor.backstop_armed().await);

    sleep(secs(300)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::LoggedOut);
    assert!(!h.monitor.is_active());
    assert_eq!(h.identity.sign_out_count(), 1);
    assert_eq!(h.navigator.navigation_count(), 1);
    assert_eq!(
        h.navigator.latest().unwrap().path(),
        "/login?reason=session-timeout"
    );

    // Nothing fires after the terminal transition
    sleep(secs(5000)).await;
    assert_eq!(h.identity.sign_out_count(), 1);
    assert_eq!(h.navigator.navigation_count(), 1);
    assert_eq!(h.bus.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_extend_session_cancels_backstop() {
    let h = start(MonitorConfig::default()).await;

    sleep(secs(1510)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::Warning);

    h.monitor.extend_session().await;
    assert_eq!(h.monitor.phase(), SessionPhase::Active);
    assert!(!h.monitor.show_warning());
    assert!(!h.monitor.backstop_armed().await);
    assert_eq!(h.monitor.time_remaining(), 1800);

    // The original backstop would have fired at 1800
    sleep(secs(300)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::Active);
    assert_eq!(h.identity.sign_out_count(), 0);

    // A full new cycle is needed before the next warning
    sleep(secs(1200)).await;
    assert!(!h.monitor.show_warning());
    sleep(secs(30)).await;
    assert!(h.monitor.show_warning());

    sleep(secs(300)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::LoggedOut);
    assert_eq!(h.identity.sign_out_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backstop_logs_out_when_polls_are_sparse() {
    // The second poll would only come at 3000s
    let h = start(MonitorConfig::from_minutes(30, 5, 1500).unwrap()).await;

    sleep(secs(1501)).await;
    assert!(h.monitor.show_warning());

    sleep(secs(300)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::LoggedOut);
    assert_eq!(h.identity.sign_out_count(), 1);
    assert_eq!(
        h.navigator.latest().unwrap().path(),
        "/login?reason=session-timeout"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stuck_loading_forces_error_logout() {
    let h = start(MonitorConfig::default()).await;
    h.identity.set_loading(true);

    sleep(secs(31)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::LoggedOut);
    assert_eq!(h.identity.sign_out_count(), 1);
    assert_eq!(
        h.navigator.latest().unwrap().path(),
        "/login?reason=session-error"
    );
}

#[tokio::test(start_paused = true)]
async fn test_regular_activity_keeps_session_alive() {
    let h = start(MonitorConfig::default()).await;

    for _ in 0..12 {
        sleep(secs(1000)).await;
        assert!(!h.monitor.show_warning());
        assert_eq!(h.bus.publish(ActivitySignal::KeyPress), 1);
    }

    sleep(secs(1)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::Active);
    assert_eq!(h.identity.sign_out_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_activity_signal_during_warning_returns_to_active() {
    let h = start(MonitorConfig::default()).await;

    sleep(secs(1530)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::Warning);

    h.bus.publish(ActivitySignal::PointerMove);
    sleep(secs(1)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::Active);
    assert!(!h.monitor.backstop_armed().await);

    sleep(secs(400)).await;
    assert_eq!(h.identity.sign_out_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_subscription_sees_warning() {
    let h = start(MonitorConfig::default()).await;
    let mut snapshots = h.monitor.subscribe();

    sleep(secs(1501)).await;
    assert!(snapshots.has_changed().unwrap());
    let snapshot = snapshots.borrow_and_update().clone();
    assert!(snapshot.show_warning);
    assert_eq!(snapshot.phase, SessionPhase::Warning);
    assert_eq!(snapshot.time_remaining_formatted, "5:00");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_sign_out_still_redirects() {
    let h = start(MonitorConfig::default()).await;
    h.identity.stall_sign_out(true);

    // Let the default 10s sign-out bound elapse on the paused clock
    h.monitor.force_logout(LogoutReason::SessionTimeout).await;

    assert_eq!(h.monitor.phase(), SessionPhase::LoggedOut);
    assert_eq!(h.identity.sign_out_count(), 1);
    assert_eq!(h.navigator.navigation_count(), 1);
    assert_eq!(
        h.navigator.latest().unwrap().path(),
        "/login?reason=session-timeout"
    );
    assert_eq!(h.bus.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_with_stalled_sign_out_redirects_once() {
    let h = start(MonitorConfig::from_minutes(30, 5, 30).unwrap()).await;
    h.identity.stall_sign_out(true);

    sleep(secs(1811)).await;
    assert_eq!(h.monitor.phase(), SessionPhase::LoggedOut);
    assert_eq!(h.navigator.navigation_count(), 1);

    sleep(secs(600)).await;
    assert_eq!(h.identity.sign_out_count(), 1);
    assert_eq!(h.navigator.navigation_count(), 1);
}
