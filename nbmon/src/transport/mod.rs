//! Transport layer: fetching a device's running configuration.
//!
//! The poll orchestrator only sees [`ConfigFetcher`]. [`SshFetcher`] is the
//! production implementation, built on a russh session and an interactive
//! shell driven by the device's [`PlatformDefinition`](crate::platform::PlatformDefinition).

pub mod config;
mod fetcher;
mod ssh;

pub use config::{HostKeyVerification, SshConfig, SshOptions};
pub use fetcher::SshFetcher;
pub use ssh::{ShellChannel, SshTransport};

use std::future::Future;

use secrecy::SecretString;

use crate::error::{ConfigurationError, FetchError};
use crate::store::Device;
use crate::store::field::validate_address;

/// What a fetcher needs to reach one device.
///
/// Deliberately excludes polling policy and observed state (`actively_polled`,
/// counters, `last_seen`).
#[derive(Debug, Clone)]
pub struct ConnectionAttrs {
    pub platform: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub secret: Option<SecretString>,
}

impl ConnectionAttrs {
    /// Extract and check the connection attributes of a stored device.
    pub fn from_device(device: &Device) -> Result<Self, ConfigurationError> {
        if device.platform.trim().is_empty() {
            return Err(ConfigurationError::InvalidAttribute {
                field: "platform",
                message: "empty".to_string(),
            });
        }
        if device.port == 0 {
            return Err(ConfigurationError::InvalidAttribute {
                field: "port",
                message: "0 is not a usable port".to_string(),
            });
        }
        if device.username.is_empty() {
            return Err(ConfigurationError::InvalidAttribute {
                field: "username",
                message: "empty".to_string(),
            });
        }

        Ok(Self {
            platform: device.platform.clone(),
            address: validate_address(&device.address)?,
            port: device.port,
            username: device.username.clone(),
            password: device.password.clone(),
            secret: device.secret.clone(),
        })
    }
}

/// Retrieves the full configuration text of a device.
///
/// Implementations must bound every call by their own deadline and report
/// it as a timeout; the orchestrator never waits on a fetch indefinitely.
pub trait ConfigFetcher: Send + Sync {
    /// Whether this fetcher knows how to talk to `platform`.
    fn supports_platform(&self, platform: &str) -> bool;

    /// Connect, authenticate, and return the device's configuration text.
    fn fetch_config(
        &self,
        attrs: &ConnectionAttrs,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}
