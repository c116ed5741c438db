//! Error types for nbmon.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for nbmon operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Persistent store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device misconfiguration (unknown platform, bad attributes)
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Settings file errors
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Bulk import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
}

/// Persistent store errors.
///
/// Any of these leaves the store unchanged: every mutation runs inside a
/// transaction that is rolled back when the error is raised.
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The device does not exist (or was deleted)
    #[error("Device {0} not found")]
    DeviceNotFound(i64),

    /// The revision does not exist
    #[error("Config revision {0} not found")]
    RevisionNotFound(i64),

    /// The store handle lock was poisoned by a panicking writer
    #[error("Store handle poisoned")]
    Poisoned,
}

/// Transport layer errors (SSH connection, authentication, prompt handling).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device rejected a command
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Privilege escalation was rejected by the device
    #[error("Failed to enter privileged mode: {prompt}")]
    EnableFailed { prompt: String },
}

/// Failure returned by a [`ConfigFetcher`](crate::transport::ConfigFetcher).
///
/// The poll orchestrator recovers from every variant locally: configuration
/// failures are reported as such, the rest as a missed poll.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The device did not answer within the transport's deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The device's connection attributes cannot be used
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl FetchError {
    /// Whether this failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::Transport(TransportError::Timeout(_))
        )
    }
}

/// Device misconfiguration detected before any transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The platform tag has no registered platform definition
    #[error("unknown platform '{tag}'")]
    UnknownPlatform { tag: String },

    /// A connection attribute is missing or malformed
    #[error("invalid {field}: {message}")]
    InvalidAttribute {
        field: &'static str,
        message: String,
    },
}

/// Settings file errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for the settings schema
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}

/// Bulk device import errors.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The document could not be read
    #[error("Failed to read import file: {0}")]
    Io(#[from] io::Error),

    /// The document is not valid JSON for the import schema
    #[error("Failed to parse import document: {0}")]
    Json(#[from] serde_json::Error),

    /// A device record was rejected
    #[error("Device #{index} rejected: {source}")]
    InvalidDevice {
        index: usize,
        #[source]
        source: ConfigurationError,
    },
}

/// Result type alias using nbmon's Error.
pub type Result<T> = std::result::Result<T, Error>;
