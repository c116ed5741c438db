//! Device store: persisted devices and their configuration revisions.
//!
//! The [`DeviceStore`] trait is the only storage surface the poll
//! orchestrator and the operator commands see. [`SqliteStore`] is the
//! bundled implementation.
//!
//! Every mutation is a single atomic transaction. The one stateful protocol
//! is [`DeviceStore::record_poll_success`]: read the baseline, conditionally
//! append a revision, bump counters and `last_seen`, all-or-nothing.

pub(crate) mod field;
mod sqlite;

pub use field::DeviceField;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

/// Store-assigned device identifier.
pub type DeviceId = i64;

/// Store-assigned revision identifier.
pub type RevisionId = i64;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// A polled network device.
#[derive(Debug, Clone)]
pub struct Device {
    /// Store-assigned identity.
    pub id: DeviceId,

    /// Platform tag selecting transport behavior (e.g. "cisco_ios").
    pub platform: String,

    /// Host name or IP address.
    pub address: String,

    /// SSH port.
    pub port: u16,

    /// Free-form operator label.
    pub description: String,

    /// Login user.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// Privileged-mode (enable) secret.
    pub secret: Option<SecretString>,

    /// Whether the device takes part in poll cycles.
    pub actively_polled: bool,

    /// Time of the last successful poll.
    pub last_seen: Option<DateTime<Utc>>,

    /// Missed polls since the last operator clear.
    pub missed_polls: u32,

    /// Detected configuration changes since the last operator clear.
    pub config_changes: u32,
}

/// Attributes of a device that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub platform: String,
    pub address: String,
    pub port: u16,
    pub description: String,
    pub username: String,
    pub password: SecretString,
    pub secret: Option<SecretString>,
    pub actively_polled: bool,
    pub missed_polls: u32,
    pub config_changes: u32,
}

impl NewDevice {
    /// A polled device on port 22 with zeroed counters.
    pub fn new(
        platform: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            address: address.into(),
            port: 22,
            description: String::new(),
            username: username.into(),
            password: SecretString::from(password.into()),
            secret: None,
            actively_polled: true,
            missed_polls: 0,
            config_changes: 0,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    pub fn actively_polled(mut self, polled: bool) -> Self {
        self.actively_polled = polled;
        self
    }
}

/// One captured configuration of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRevision {
    pub id: RevisionId,
    pub device_id: DeviceId,
    pub captured_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
    pub config: String,
}

/// What a successful poll did to the device's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// First revision ever stored for the device. Not a change.
    FirstCapture,
    /// Fingerprint differs from the baseline; a revision was appended.
    Changed,
    /// Fingerprint matches the baseline; only `last_seen` moved.
    Unchanged,
}

impl ChangeOutcome {
    /// Whether a new revision was appended.
    pub fn stored_revision(self) -> bool {
        !matches!(self, ChangeOutcome::Unchanged)
    }
}

/// Storage interface for devices and revisions.
///
/// Implementations serialize mutations per device; operations on different
/// devices never observe each other's partial state.
pub trait DeviceStore: Send + Sync {
    /// All devices with `actively_polled = true`, ordered by id.
    fn list_active(&self) -> StoreResult<Vec<Device>>;

    /// Active devices with a non-zero counter, ordered by `missed_polls`
    /// descending then `config_changes` descending.
    fn list_flagged(&self) -> StoreResult<Vec<Device>>;

    /// Every device, ordered by id.
    fn list_devices(&self) -> StoreResult<Vec<Device>>;

    /// Fetch one device.
    fn get_device(&self, device: DeviceId) -> StoreResult<Device>;

    /// Insert a device and return its id.
    fn insert_device(&self, device: &NewDevice) -> StoreResult<DeviceId>;

    /// Fingerprint of the most recent revision, if any.
    fn current_baseline(&self, device: DeviceId) -> StoreResult<Option<Fingerprint>>;

    /// Reconcile a freshly fetched configuration against the baseline.
    fn record_poll_success(
        &self,
        device: DeviceId,
        captured_at: DateTime<Utc>,
        fingerprint: &Fingerprint,
        config: &str,
    ) -> StoreResult<ChangeOutcome>;

    /// Increment `missed_polls`. A no-op for a device that no longer exists.
    fn record_missed_poll(&self, device: DeviceId) -> StoreResult<()>;

    /// Zero both counters.
    fn clear_counters(&self, device: DeviceId) -> StoreResult<()>;

    /// Apply one operator edit.
    fn update_field(&self, device: DeviceId, field: DeviceField) -> StoreResult<()>;

    /// Delete a device together with all of its revisions.
    fn delete_device(&self, device: DeviceId) -> StoreResult<()>;

    /// Revisions of a device, most recent first.
    fn list_revisions(&self, device: DeviceId) -> StoreResult<Vec<ConfigRevision>>;

    /// Fetch one revision.
    fn get_revision(&self, revision: RevisionId) -> StoreResult<ConfigRevision>;

    /// Delete one revision. Counters are left alone.
    fn delete_revision(&self, revision: RevisionId) -> StoreResult<()>;
}
