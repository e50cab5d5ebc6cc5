//! Application state shared across handlers

use std::sync::Arc;
use std::time::Duration;

use common::MonitorConfig;
use tokio::sync::Mutex;

use crate::{
    activity::ActivityBus, guard::RouteGuard, identity::IdentityProvider,
    navigation::RedirectNavigator, supervisor::SessionSupervisor,
};

/// Application state shared across handlers
pub struct AppState<P> {
    pub config: MonitorConfig,
    pub supervisor: Arc<SessionSupervisor<P, RedirectNavigator>>,
    pub navigator: Arc<RedirectNavigator>,
    pub admin_guard: Arc<Mutex<RouteGuard>>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            supervisor: Arc::clone(&self.supervisor),
            navigator: Arc::clone(&self.navigator),
            admin_guard: Arc::clone(&self.admin_guard),
        }
    }
}

impl<P: IdentityProvider> AppState<P> {
    pub fn new(config: MonitorConfig, identity: Arc<P>, protection_timeout: Duration) -> Self {
        let navigator = Arc::new(RedirectNavigator::new());
        let supervisor = Arc::new(SessionSupervisor::new(
            config.clone(),
            identity,
            Arc::clone(&navigator),
            ActivityBus::default(),
        ));

        Self {
            config,
            supervisor,
            navigator,
            admin_guard: Arc::new(Mutex::new(RouteGuard::admin(protection_timeout))),
        }
    }

    pub fn identity(&self) -> &Arc<P> {
        self.supervisor.identity()
    }

    pub fn bus(&self) -> &ActivityBus {
        self.supervisor.bus()
    }
}
