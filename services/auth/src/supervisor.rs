//! Session lifecycle driven by identity changes
//!
//! A monitor is created when a fully resolved user appears and dropped when
//! the user goes away, so every sign-in gets a fresh monitor with reset
//! state. Ghost users never get one.

use std::sync::Arc;

use common::MonitorConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::ActivityBus;
use crate::identity::IdentityProvider;
use crate::models::{IdentitySnapshot, IdentityState, SessionPhase};
use crate::navigation::Navigator;
use crate::session::SessionMonitor;

struct Supervised<P, N> {
    user_id: Uuid,
    monitor: SessionMonitor<P, N>,
}

/// Owns the monitor for whoever is currently signed in
pub struct SessionSupervisor<P, N> {
    config: MonitorConfig,
    identity: Arc<P>,
    navigator: Arc<N>,
    bus: ActivityBus,
    current: Mutex<Option<Supervised<P, N>>>,
}

impl<P, N> SessionSupervisor<P, N>
where
    P: IdentityProvider,
    N: Navigator,
{
    pub fn new(config: MonitorConfig, identity: Arc<P>, navigator: Arc<N>, bus: ActivityBus) -> Self {
        Self {
            config,
            identity,
            navigator,
            bus,
            current: Mutex::new(None),
        }
    }

    /// Monitor of the current session, if one is running
    pub async fn current(&self) -> Option<SessionMonitor<P, N>> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|supervised| supervised.monitor.clone())
    }

    pub fn bus(&self) -> &ActivityBus {
        &self.bus
    }

    pub fn identity(&self) -> &Arc<P> {
        &self.identity
    }

    /// Bring the monitor in line with the given identity
    pub async fn reconcile(&self, identity: &IdentitySnapshot) {
        let mut current = self.current.lock().await;

        match &identity.state {
            IdentityState::Resolved { user, .. } => {
                if identity.loading {
                    return;
                }
                if let Some(supervised) = current.as_ref() {
                    if supervised.user_id == user.id {
                        return;
                    }
                    info!("Signed-in user changed, replacing session monitor");
                }
                if let Some(previous) = current.take() {
                    retire(previous).await;
                }

                let monitor = SessionMonitor::new(
                    self.config.clone(),
                    Arc::clone(&self.identity),
                    Arc::clone(&self.navigator),
                );
                match monitor.start(&self.bus).await {
                    Ok(()) => {
                        *current = Some(Supervised {
                            user_id: user.id,
                            monitor,
                        });
                    }
                    Err(e) => warn!("Could not start session monitor: {}", e),
                }
            }
            IdentityState::Unresolved(user) => {
                debug!("User {} has no profile, not monitoring", user.id);
                if let Some(previous) = current.take() {
                    retire(previous).await;
                }
            }
            IdentityState::Anonymous => {
                if let Some(previous) = current.take() {
                    info!("User signed out, tearing down session monitor");
                    retire(previous).await;
                }
            }
        }
    }

    /// Follow the identity provider until it goes away
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.identity.subscribe();
        tokio::spawn(async move {
            loop {
                let snapshot = changes.borrow_and_update().clone();
                self.reconcile(&snapshot).await;
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Tear down whatever monitor is running
    pub async fn shutdown(&self) {
        if let Some(previous) = self.current.lock().await.take() {
            retire(previous).await;
        }
    }
}

async fn retire<P, N>(supervised: Supervised<P, N>)
where
    P: IdentityProvider,
    N: Navigator,
{
    // Logged-out monitors wind down their own driver, redirect included
    if supervised.monitor.phase() != SessionPhase::LoggedOut {
        supervised.monitor.stop().await;
    }
}
