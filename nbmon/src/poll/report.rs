//! Per-cycle outcome reporting.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::ConfigurationError;
use crate::store::DeviceId;

/// Why a device produced no configuration this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The fetch exceeded its deadline.
    Timeout,
    /// Connection, authentication, or command failure.
    Transport,
    /// The configuration was fetched but could not be recorded.
    Storage,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            MissReason::Timeout => "timeout",
            MissReason::Transport => "transport error",
            MissReason::Storage => "storage error",
        };
        f.write_str(reason)
    }
}

/// Result of polling one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The configuration differs from the baseline.
    Changed,
    /// The configuration matches the baseline.
    Unchanged,
    /// The device's first configuration was stored.
    FirstCapture,
    /// No configuration was recorded; `missed_polls` was incremented.
    Missed(MissReason),
    /// The device cannot be polled as configured; counted as a missed poll.
    ConfigError(ConfigurationError),
}

impl PollOutcome {
    /// Whether the poll counted against the device's `missed_polls`.
    pub fn is_missed(&self) -> bool {
        matches!(self, PollOutcome::Missed(_) | PollOutcome::ConfigError(_))
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollOutcome::Changed => f.write_str("changed"),
            PollOutcome::Unchanged => f.write_str("unchanged"),
            PollOutcome::FirstCapture => f.write_str("first capture"),
            PollOutcome::Missed(reason) => write!(f, "missed ({})", reason),
            PollOutcome::ConfigError(e) => write!(f, "configuration error ({})", e),
        }
    }
}

/// Outcome for one device in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub device_id: DeviceId,
    pub address: String,
    pub outcome: PollOutcome,
}

/// Everything one poll cycle did, ordered by device id.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<DeviceReport>,
}

impl CycleReport {
    /// Outcome recorded for `device`, if it was polled.
    pub fn outcome_for(&self, device: DeviceId) -> Option<&PollOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.device_id == device)
            .map(|entry| &entry.outcome)
    }

    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, PollOutcome::Changed))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, PollOutcome::Unchanged))
    }

    pub fn first_captures(&self) -> usize {
        self.count(|o| matches!(o, PollOutcome::FirstCapture))
    }

    /// Transport and storage misses, excluding configuration errors.
    pub fn missed(&self) -> usize {
        self.count(|o| matches!(o, PollOutcome::Missed(_)))
    }

    pub fn config_errors(&self) -> usize {
        self.count(|o| matches!(o, PollOutcome::ConfigError(_)))
    }

    fn count(&self, predicate: impl Fn(&PollOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.outcome)).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        write!(
            f,
            "{} devices in {:.1}s: {} changed, {} unchanged, {} first captures, {} missed, {} configuration errors",
            self.entries.len(),
            elapsed,
            self.changed(),
            self.unchanged(),
            self.first_captures(),
            self.missed(),
            self.config_errors()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(device_id: DeviceId, outcome: PollOutcome) -> DeviceReport {
        DeviceReport {
            device_id,
            address: format!("10.0.0.{}", device_id),
            outcome,
        }
    }

    fn report() -> CycleReport {
        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        CycleReport {
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(2500),
            entries: vec![
                entry(1, PollOutcome::Changed),
                entry(2, PollOutcome::Unchanged),
                entry(3, PollOutcome::Unchanged),
                entry(4, PollOutcome::FirstCapture),
                entry(5, PollOutcome::Missed(MissReason::Timeout)),
                entry(
                    6,
                    PollOutcome::ConfigError(ConfigurationError::UnknownPlatform {
                        tag: "vendor_x".to_string(),
                    }),
                ),
            ],
        }
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.changed(), 1);
        assert_eq!(report.unchanged(), 2);
        assert_eq!(report.first_captures(), 1);
        assert_eq!(report.missed(), 1);
        assert_eq!(report.config_errors(), 1);
    }

    #[test]
    fn test_outcome_for() {
        let report = report();
        assert_eq!(report.outcome_for(4), Some(&PollOutcome::FirstCapture));
        assert!(report.outcome_for(6).unwrap().is_missed());
        assert!(!report.outcome_for(1).unwrap().is_missed());
        assert_eq!(report.outcome_for(99), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            report().to_string(),
            "6 devices in 2.5s: 1 changed, 2 unchanged, 1 first captures, 1 missed, 1 configuration errors"
        );
        assert_eq!(
            PollOutcome::Missed(MissReason::Transport).to_string(),
            "missed (transport error)"
        );
        assert_eq!(
            PollOutcome::ConfigError(ConfigurationError::UnknownPlatform {
                tag: "vendor_x".to_string()
            })
            .to_string(),
            "configuration error (unknown platform 'vendor_x')"
        );
    }
}
