//! Service settings

use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::hosted::HostedIdentityConfig;

/// Settings for the auth service, read from `STOREFRONT_*` variables
///
/// # Environment Variables
/// - `STOREFRONT_BIND_ADDRESS`: Listen address (default: "0.0.0.0:3000")
/// - `STOREFRONT_IDENTITY_URL`: Hosted backend URL (default: "http://localhost:54321")
/// - `STOREFRONT_IDENTITY_API_KEY`: Hosted backend public key (default: "")
/// - `STOREFRONT_IDENTITY_TIMEOUT_SECONDS`: Per-request bound on backend calls (default: 10)
/// - `STOREFRONT_SITE_URL`: Storefront origin for email links (default: "http://localhost:3000")
/// - `STOREFRONT_PROTECTION_TIMEOUT_SECONDS`: Admin guard loading timeout (default: 10)
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_address: String,
    pub identity_url: String,
    pub identity_api_key: String,
    pub identity_timeout_seconds: u64,
    pub site_url: String,
    pub protection_timeout_seconds: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("identity_url", "http://localhost:54321")?
            .set_default("identity_api_key", "")?
            .set_default("identity_timeout_seconds", 10_i64)?
            .set_default("site_url", "http://localhost:3000")?
            .set_default("protection_timeout_seconds", 10_i64)?
            .add_source(Environment::with_prefix("STOREFRONT"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn identity(&self) -> HostedIdentityConfig {
        HostedIdentityConfig {
            base_url: self.identity_url.clone(),
            api_key: self.identity_api_key.clone(),
            site_url: self.site_url.clone(),
            request_timeout: Duration::from_secs(self.identity_timeout_seconds),
        }
    }

    pub fn protection_timeout(&self) -> Duration {
        Duration::from_secs(self.protection_timeout_seconds)
    }
}
