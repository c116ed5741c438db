//! End-to-end poll cycles against a SQLite store and a scripted fetcher.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use nbmon::error::{FetchError, TransportError};
use nbmon::poll::{MissReason, PollOutcome};
use nbmon::{
    ConfigFetcher, ConnectionAttrs, DeviceStore, NewDevice, PollOptions, PollOrchestrator,
    SqliteStore,
};

enum Reply {
    Config(&'static str),
    Timeout,
    Refused,
}

/// Answers each fetch with the next scripted reply for the device address.
#[derive(Default)]
struct ScriptedFetcher {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<ConnectionAttrs>>,
}

impl ScriptedFetcher {
    fn script(self, address: &str, replies: Vec<Reply>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(address.to_string(), replies.into());
        self
    }

    fn calls_to(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|attrs| attrs.address == address)
            .count()
    }
}

impl ConfigFetcher for ScriptedFetcher {
    fn supports_platform(&self, platform: &str) -> bool {
        matches!(platform, "cisco_ios" | "juniper_junos")
    }

    async fn fetch_config(&self, attrs: &ConnectionAttrs) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(attrs.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&attrs.address)
            .and_then(|replies| replies.pop_front());

        match reply {
            Some(Reply::Config(text)) => Ok(text.to_string()),
            Some(Reply::Timeout) => Err(FetchError::Timeout(Duration::from_secs(30))),
            Some(Reply::Refused) | None => Err(TransportError::Disconnected.into()),
        }
    }
}

fn ios(address: &str) -> NewDevice {
    NewDevice::new("cisco_ios", address, "admin", "pw").description(format!("switch {}", address))
}

#[tokio::test]
async fn test_first_capture_unchanged_changed_then_missed() {
    let store = SqliteStore::in_memory().unwrap();
    let id = store.insert_device(&ios("10.0.0.1")).unwrap();
    let fetcher = ScriptedFetcher::default().script(
        "10.0.0.1",
        vec![
            Reply::Config("hostname r1\n"),
            Reply::Config("hostname r1\n"),
            Reply::Config("hostname r1-renamed\n"),
            Reply::Timeout,
        ],
    );
    let orchestrator = PollOrchestrator::new(store, fetcher);

    // First poll stores the baseline without counting a change
    let report = orchestrator.run_poll_cycle().await.unwrap();
    assert_eq!(report.outcome_for(id), Some(&PollOutcome::FirstCapture));
    let device = orchestrator.store().get_device(id).unwrap();
    assert_eq!(orchestrator.store().list_revisions(id).unwrap().len(), 1);
    assert_eq!(device.config_changes, 0);
    assert!(device.last_seen.is_some());

    let report = orchestrator.run_poll_cycle().await.unwrap();
    assert_eq!(report.outcome_for(id), Some(&PollOutcome::Unchanged));
    assert_eq!(orchestrator.store().list_revisions(id).unwrap().len(), 1);

    let report = orchestrator.run_poll_cycle().await.unwrap();
    assert_eq!(report.outcome_for(id), Some(&PollOutcome::Changed));
    let after_change = orchestrator.store().get_device(id).unwrap();
    let revisions = orchestrator.store().list_revisions(id).unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].config, "hostname r1-renamed\n");
    assert_eq!(after_change.config_changes, 1);
    assert_eq!(after_change.missed_polls, 0);

    let report = orchestrator.run_poll_cycle().await.unwrap();
    assert_eq!(
        report.outcome_for(id),
        Some(&PollOutcome::Missed(MissReason::Timeout))
    );
    let after_miss = orchestrator.store().get_device(id).unwrap();
    assert_eq!(after_miss.missed_polls, 1);
    assert_eq!(after_miss.config_changes, 1);
    assert_eq!(after_miss.last_seen, after_change.last_seen);
    assert_eq!(orchestrator.store().list_revisions(id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_connection_attrs_carry_only_connection_fields() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .insert_device(
            &NewDevice::new("juniper_junos", "edge1.example.net", "ops", "pw")
                .port(830)
                .secret("en"),
        )
        .unwrap();
    let fetcher = ScriptedFetcher::default().script("edge1.example.net", vec![Reply::Config("x")]);
    let orchestrator = PollOrchestrator::new(store, fetcher);

    orchestrator.run_poll_cycle().await.unwrap();

    let calls = orchestrator.fetcher().calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].platform, "juniper_junos");
    assert_eq!(calls[0].port, 830);
    assert_eq!(calls[0].username, "ops");
    assert!(calls[0].secret.is_some());
}

#[tokio::test]
async fn test_inactive_devices_are_not_polled() {
    let store = SqliteStore::in_memory().unwrap();
    let active = store.insert_device(&ios("10.0.0.1")).unwrap();
    let inactive = store
        .insert_device(&ios("10.0.0.2").actively_polled(false))
        .unwrap();
    let fetcher = ScriptedFetcher::default()
        .script("10.0.0.1", vec![Reply::Config("a")])
        .script("10.0.0.2", vec![Reply::Config("b")]);
    let orchestrator = PollOrchestrator::new(store, fetcher);

    let report = orchestrator.run_poll_cycle().await.unwrap();
    assert_eq!(report.entries.len(), 1);
    assert!(report.outcome_for(active).is_some());
    assert!(report.outcome_for(inactive).is_none());
    assert_eq!(orchestrator.fetcher().calls_to("10.0.0.2"), 0);
    assert!(orchestrator.store().list_revisions(inactive).unwrap().is_empty());
}

#[tokio::test]
async fn test_cycle_isolates_failures_and_flags_devices() {
    let store = SqliteStore::in_memory().unwrap();
    let ok = store.insert_device(&ios("10.0.0.1")).unwrap();
    let refused = store.insert_device(&ios("10.0.0.2")).unwrap();
    let unknown = store
        .insert_device(&NewDevice::new("vendor_x", "10.0.0.3", "admin", "pw"))
        .unwrap();
    let changed = store.insert_device(&ios("10.0.0.4")).unwrap();

    let fetcher = ScriptedFetcher::default()
        .script("10.0.0.1", vec![Reply::Config("a"), Reply::Config("a")])
        .script("10.0.0.2", vec![Reply::Refused, Reply::Refused])
        .script("10.0.0.4", vec![Reply::Config("v1"), Reply::Config("v2")]);
    let orchestrator =
        PollOrchestrator::new(store, fetcher).with_options(PollOptions { concurrency: 3 });

    orchestrator.run_poll_cycle().await.unwrap();
    let report = orchestrator.run_poll_cycle().await.unwrap();

    assert_eq!(report.outcome_for(ok), Some(&PollOutcome::Unchanged));
    assert_eq!(
        report.outcome_for(refused),
        Some(&PollOutcome::Missed(MissReason::Transport))
    );
    assert!(matches!(
        report.outcome_for(unknown),
        Some(PollOutcome::ConfigError(_))
    ));
    assert_eq!(report.outcome_for(changed), Some(&PollOutcome::Changed));
    assert_eq!(orchestrator.fetcher().calls_to("10.0.0.3"), 0);

    let flagged: Vec<_> = orchestrator
        .list_flagged_devices()
        .unwrap()
        .iter()
        .map(|d| (d.id, d.missed_polls, d.config_changes))
        .collect();
    assert_eq!(flagged, vec![(refused, 2, 0), (unknown, 2, 0), (changed, 0, 1)]);

    orchestrator.clear_device_counters(refused).unwrap();
    orchestrator.clear_device_counters(refused).unwrap();
    let device = orchestrator.store().get_device(refused).unwrap();
    assert_eq!((device.missed_polls, device.config_changes), (0, 0));
}

#[tokio::test]
async fn test_baseline_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nbmon.db");

    let store = SqliteStore::open(&path).unwrap();
    let id = store.insert_device(&ios("10.0.0.1")).unwrap();
    let fetcher = ScriptedFetcher::default().script("10.0.0.1", vec![Reply::Config("a")]);
    let orchestrator = PollOrchestrator::new(store, fetcher);
    orchestrator.run_poll_cycle().await.unwrap();
    orchestrator.into_store().close().unwrap();

    let store = SqliteStore::open(&path).unwrap();
    let fetcher = ScriptedFetcher::default().script("10.0.0.1", vec![Reply::Config("a")]);
    let orchestrator = PollOrchestrator::new(store, fetcher);
    let report = orchestrator.run_poll_cycle().await.unwrap();

    assert_eq!(report.outcome_for(id), Some(&PollOutcome::Unchanged));
    assert_eq!(orchestrator.store().get_device(id).unwrap().config_changes, 0);
}
