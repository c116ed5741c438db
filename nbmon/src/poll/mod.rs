//! Poll orchestrator.
//!
//! One call to [`PollOrchestrator::run_poll_cycle`] polls every actively
//! polled device once and reconciles the result against the device's
//! baseline. Devices are independent: a failure on one is recorded as a
//! missed poll for that device and never aborts the cycle.
//!
//! Fetches run concurrently up to [`PollOptions::concurrency`]. The store is
//! the only shared mutable state; each of its mutations is an atomic
//! transaction, so concurrent devices never observe each other's partial
//! writes. No state is carried between cycles.
//!
//! # Example
//!
//! ```rust,no_run
//! use nbmon::poll::{PollOptions, PollOrchestrator};
//! use nbmon::store::SqliteStore;
//! use nbmon::transport::{SshFetcher, SshOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::open("nbmon.db")?;
//! let fetcher = SshFetcher::new(SshOptions::default());
//! let orchestrator = PollOrchestrator::new(store, fetcher)
//!     .with_options(PollOptions { concurrency: 16 });
//!
//! let report = orchestrator.run_poll_cycle().await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

mod report;

pub use report::{CycleReport, DeviceReport, MissReason, PollOutcome};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use log::{debug, error, info, warn};

use crate::error::{ConfigurationError, FetchError, StorageError};
use crate::fingerprint::fingerprint;
use crate::store::{ChangeOutcome, Device, DeviceId, DeviceStore, StoreResult};
use crate::transport::{ConfigFetcher, ConnectionAttrs};

/// Poll cycle tuning.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Maximum number of devices fetched at once. Values below 1 act as 1.
    pub concurrency: usize,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

/// Drives poll cycles over a store and a fetcher.
pub struct PollOrchestrator<S, F> {
    store: S,
    fetcher: F,
    options: PollOptions,
}

impl<S: DeviceStore, F: ConfigFetcher> PollOrchestrator<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            options: PollOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Give back the store handle so the caller can close it.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Poll every active device once.
    ///
    /// Fails only if the active device list itself cannot be read. Every
    /// per-device failure is folded into the returned report.
    pub async fn run_poll_cycle(&self) -> Result<CycleReport, StorageError> {
        let started_at = Utc::now();
        let devices = self.store.list_active()?;
        info!("Poll cycle started: {} active devices", devices.len());

        let mut entries: Vec<DeviceReport> = stream::iter(devices)
            .map(|device| self.poll_device(device))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        entries.sort_by_key(|entry| entry.device_id);

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            entries,
        };
        info!("Poll cycle finished: {}", report);
        Ok(report)
    }

    /// Active devices with non-zero counters, most missed polls first.
    pub fn list_flagged_devices(&self) -> StoreResult<Vec<Device>> {
        self.store.list_flagged()
    }

    /// Reset a device's counters after the operator has looked at it.
    pub fn clear_device_counters(&self, device: DeviceId) -> StoreResult<()> {
        self.store.clear_counters(device)
    }

    async fn poll_device(&self, device: Device) -> DeviceReport {
        let outcome = self.poll_outcome(&device).await;
        DeviceReport {
            device_id: device.id,
            address: device.address,
            outcome,
        }
    }

    async fn poll_outcome(&self, device: &Device) -> PollOutcome {
        let attrs = match self.connection_attrs(device) {
            Ok(attrs) => attrs,
            Err(e) => return self.configuration_error(device, e),
        };

        match self.fetcher.fetch_config(&attrs).await {
            Ok(config) => self.reconcile(device, &config),
            Err(FetchError::Configuration(e)) => self.configuration_error(device, e),
            Err(e) => {
                let reason = if e.is_timeout() {
                    MissReason::Timeout
                } else {
                    MissReason::Transport
                };
                warn!("Missed poll of {}: {}", device.address, e);
                self.record_missed(device);
                PollOutcome::Missed(reason)
            }
        }
    }

    fn connection_attrs(&self, device: &Device) -> Result<ConnectionAttrs, ConfigurationError> {
        if !self.fetcher.supports_platform(&device.platform) {
            return Err(ConfigurationError::UnknownPlatform {
                tag: device.platform.clone(),
            });
        }
        ConnectionAttrs::from_device(device)
    }

    fn reconcile(&self, device: &Device, config: &str) -> PollOutcome {
        let digest = fingerprint(config);
        match self
            .store
            .record_poll_success(device.id, Utc::now(), &digest, config)
        {
            Ok(ChangeOutcome::Changed) => {
                warn!("CHANGE TO {} ({})", device.address, device.description);
                PollOutcome::Changed
            }
            Ok(ChangeOutcome::FirstCapture) => {
                debug!("Stored first configuration of {}", device.address);
                PollOutcome::FirstCapture
            }
            Ok(ChangeOutcome::Unchanged) => PollOutcome::Unchanged,
            Err(StorageError::DeviceNotFound(_)) => {
                info!(
                    "Device {} ({}) was deleted during the cycle",
                    device.id, device.address
                );
                PollOutcome::Missed(MissReason::Storage)
            }
            Err(e) => {
                error!("Failed to record poll of {}: {}", device.address, e);
                self.record_missed(device);
                PollOutcome::Missed(MissReason::Storage)
            }
        }
    }

    fn configuration_error(&self, device: &Device, e: ConfigurationError) -> PollOutcome {
        warn!(
            "Skipped {} (device {}): configuration error: {}",
            device.address, device.id, e
        );
        self.record_missed(device);
        PollOutcome::ConfigError(e)
    }

    fn record_missed(&self, device: &Device) {
        if let Err(e) = self.store.record_missed_poll(device.id) {
            error!("Failed to record missed poll of {}: {}", device.address, e);
        }
    }
}
