//! # nbmon
//!
//! Network baseline monitor: detects configuration drift on network devices.
//!
//! Each poll cycle pulls the running configuration of every actively polled
//! device over SSH, fingerprints it, and compares the fingerprint with the
//! device's most recent stored revision. A differing fingerprint stores a new
//! revision and counts as a change; an unreachable device counts as a missed
//! poll. Operators review flagged devices and clear their counters.
//!
//! ## Features
//!
//! - Async SSH via russh, with enable/privilege escalation and paging control
//! - Multi-vendor platform definitions (Cisco, Arista, Juniper)
//! - Bounded concurrent poll cycles with per-device failure isolation
//! - SQLite-backed device and revision history with atomic reconciliation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nbmon::{PollOrchestrator, SqliteStore, SshFetcher, SshOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nbmon::Error> {
//!     let store = SqliteStore::open("nbmon.db")?;
//!     let orchestrator = PollOrchestrator::new(store, SshFetcher::new(SshOptions::default()));
//!
//!     let report = orchestrator.run_poll_cycle().await?;
//!     for entry in &report.entries {
//!         println!("{} {}", entry.address, entry.outcome);
//!     }
//!
//!     orchestrator.into_store().close()?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod fingerprint;
pub mod import;
pub mod logging;
pub mod platform;
pub mod poll;
pub mod settings;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, fingerprint};
pub use platform::{PlatformDefinition, PlatformRegistry, PrivilegeLevel};
pub use poll::{CycleReport, PollOptions, PollOrchestrator, PollOutcome};
pub use settings::Settings;
pub use store::{ChangeOutcome, Device, DeviceField, DeviceStore, NewDevice, SqliteStore};
pub use transport::{ConfigFetcher, ConnectionAttrs, SshFetcher, SshOptions};
