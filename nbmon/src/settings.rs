//! Settings file.
//!
//! A TOML document, every key optional:
//!
//! ```toml
//! database = "nbmon.db"
//! concurrency = 8
//! timeout_secs = 30
//! host_key_verification = "accept-new"   # strict | accept-new | disabled
//! known_hosts = "/etc/nbmon/known_hosts"
//! log_file = "/var/log/nbmon.log"
//! verbose = false
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SettingsError;
use crate::poll::PollOptions;
use crate::transport::{HostKeyVerification, SshOptions};

/// File read when no `--config` is given.
pub const DEFAULT_PATH: &str = "nbmon.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// SQLite database file.
    pub database: PathBuf,

    /// Devices fetched at once during a poll cycle.
    pub concurrency: usize,

    /// Deadline for one device fetch, connect to disconnect.
    pub timeout_secs: u64,

    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; `~/.ssh/known_hosts` when unset.
    pub known_hosts: Option<PathBuf>,

    /// Append log lines here instead of stderr.
    pub log_file: Option<PathBuf>,

    /// Log cycle start and end.
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("nbmon.db"),
            concurrency: PollOptions::default().concurrency,
            timeout_secs: SshOptions::default().timeout.as_secs(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
            log_file: None,
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file yields the defaults unless `explicit` is set, i.e. the
    /// operator named the file.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(path, &text)
    }

    /// Parse a settings document; `path` is only used in error messages.
    pub fn parse(path: &Path, text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.concurrency == 0 {
            return Err(SettingsError::Invalid {
                key: "concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            timeout: self.timeout(),
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts.clone(),
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            concurrency: self.concurrency,
        }
    }
}
