use std::sync::Arc;

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use auth::{
    hosted::HostedIdentityProvider, routes, settings::Settings, state::AppState,
};
use common::MonitorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    let settings = Settings::load()?;
    let monitor_config = MonitorConfig::from_env()?;

    // Initialize the hosted identity provider
    let identity = Arc::new(HostedIdentityProvider::new(settings.identity())?);

    let app_state = AppState::new(monitor_config, identity, settings.protection_timeout());

    // Follow sign-ins and sign-outs
    let supervisor = Arc::clone(&app_state.supervisor);
    let supervision = Arc::clone(&supervisor).spawn();

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    info!("Authentication service listening on {}", settings.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    supervision.abort();
    supervisor.shutdown().await;
    info!("Authentication service stopped");

    Ok(())
}
