//! nbmon command line.
//!
//! Run `nbmon poll` from a scheduler (cron, systemd timer); every other
//! subcommand is an operator tool over the same database.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::builder::{PossibleValue, PossibleValuesParser};
use clap::{ArgAction, Parser, Subcommand};
use log::info;

use nbmon::error::{ConfigurationError, StorageError};
use nbmon::poll::CycleReport;
use nbmon::settings::{self, Settings};
use nbmon::store::{Device, DeviceField, DeviceId, RevisionId};
use nbmon::{DeviceStore, PlatformRegistry, PollOrchestrator, SqliteStore, SshFetcher, logging};

#[derive(Parser)]
#[command(name = "nbmon", version, about = "Network baseline monitor")]
struct Cli {
    /// Settings file [default: nbmon.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Devices polled at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Per-device fetch timeout
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every actively polled device once
    Poll {
        /// Print the outcome for every device
        #[arg(long)]
        report: bool,
    },
    /// List supported platform tags
    Platforms,
    #[command(flatten)]
    Store(StoreCommand),
}

/// Operator commands over the device database.
#[derive(Subcommand)]
enum StoreCommand {
    /// Show devices with missed polls or configuration changes
    Status,
    /// Reset missed poll and change counters
    Clear {
        /// Only this device
        #[arg(long)]
        device: Option<DeviceId>,
    },
    /// Add devices from a JSON document
    Import { file: PathBuf },
    /// Change one field of a device
    Edit {
        id: DeviceId,
        #[arg(value_parser = field_names())]
        field: String,
        /// New value; an empty `secret` or `last_seen` clears it
        value: String,
    },
    /// List stored configurations of a device, newest first
    Revisions {
        id: DeviceId,
        /// Print the text of this revision
        #[arg(long, value_name = "REVISION")]
        show: Option<RevisionId>,
    },
    /// Delete a device and its configuration history
    DeleteDevice { id: DeviceId },
    /// Delete one stored configuration
    DeleteRevision { id: RevisionId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(&cli)?;
    let verbosity = cli.verbose.max(u8::from(settings.verbose));
    logging::init(verbosity, settings.log_file.as_deref()).context("failed to set up logging")?;

    let registry = PlatformRegistry::with_builtins();

    match cli.command {
        Command::Platforms => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
        Command::Poll { report } => {
            let store = open_store(&settings)?;
            let fetcher = SshFetcher::with_registry(registry, settings.ssh_options());
            let orchestrator =
                PollOrchestrator::new(store, fetcher).with_options(settings.poll_options());

            let cycle = orchestrator
                .run_poll_cycle()
                .await
                .context("failed to list active devices")?;
            if report {
                print!("{}", format_report(&cycle));
            }
            orchestrator.into_store().close()?;
        }
        Command::Store(command) => {
            let store = open_store(&settings)?;
            run_command(command, &store, &registry)?;
            store.close()?;
        }
    }
    Ok(())
}

/// Editable device fields, with their aliases.
fn field_names() -> PossibleValuesParser {
    PossibleValuesParser::new(DeviceField::NAMES.iter().map(|name| {
        DeviceField::ALIASES
            .iter()
            .filter(|(_, canonical)| canonical == name)
            .fold(PossibleValue::new(*name), |value, (alias, _)| value.alias(*alias))
    }))
}

fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&settings.database)
        .with_context(|| format!("failed to open {}", settings.database.display()))
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(settings::DEFAULT_PATH), false),
    };
    let mut settings = Settings::load(&path, explicit)?;

    if let Some(database) = &cli.database {
        settings.database = database.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }
    settings.validate()?;
    Ok(settings)
}

fn run_command(
    command: StoreCommand,
    store: &SqliteStore,
    registry: &PlatformRegistry,
) -> anyhow::Result<()> {
    match command {
        StoreCommand::Status => {
            print!("{}", format_status(&store.list_flagged()?));
        }
        StoreCommand::Clear { device: Some(id) } => {
            store.clear_counters(id)?;
            info!("Device {} counters cleared", id);
        }
        StoreCommand::Clear { device: None } => {
            for device in store.list_devices()? {
                store.clear_counters(device.id)?;
            }
            info!("All device counters cleared");
        }
        StoreCommand::Import { file } => {
            let ids = nbmon::import::import_file(store, registry, &file)
                .with_context(|| format!("failed to import {}", file.display()))?;
            println!("Imported {} devices", ids.len());
        }
        StoreCommand::Edit { id, field, value } => {
            let field = DeviceField::parse(&field, &value)?;
            if let DeviceField::Platform(tag) = &field {
                if !registry.contains(tag) {
                    bail!(ConfigurationError::UnknownPlatform { tag: tag.clone() });
                }
            }
            store.update_field(id, field.clone())?;
            info!("Device {} modified: {}", id, field);
        }
        StoreCommand::Revisions { id, show: None } => {
            let device = store.get_device(id)?;
            let revisions = store.list_revisions(device.id)?;
            println!("{:>8}  {:<23}  FINGERPRINT", "REVISION", "CAPTURED");
            for revision in revisions {
                println!(
                    "{:>8}  {} UTC  {}",
                    revision.id,
                    revision.captured_at.format("%Y-%m-%d %H:%M:%S"),
                    revision.fingerprint.as_str().get(..16).unwrap_or_default()
                );
            }
        }
        StoreCommand::Revisions { id, show: Some(revision) } => {
            let revision = store.get_revision(revision)?;
            if revision.device_id != id {
                bail!(StorageError::RevisionNotFound(revision.id));
            }
            println!("{}", revision.config);
        }
        StoreCommand::DeleteDevice { id } => {
            store.delete_device(id)?;
            info!("Device {} deleted", id);
        }
        StoreCommand::DeleteRevision { id } => {
            store.delete_revision(id)?;
            info!("Revision {} deleted", id);
        }
    }
    Ok(())
}

/// Flagged device table, one line per device.
fn format_status(devices: &[Device]) -> String {
    let mut out = format!(
        "{:^6}  {:^15}  {:^25}  {:^23}  {:^6}  {:^7}\n",
        "DEVICE", "IP", "DESCRIPTION", "LAST_SEEN", "MISSED", "CHANGES"
    );
    for device in devices {
        let description: String = device.description.chars().take(25).collect();
        let last_seen = match device.last_seen {
            Some(ts) => format!("{} UTC", ts.format("%Y-%m-%d %H:%M:%S")),
            None => "NEVER".to_string(),
        };
        let _ = writeln!(
            out,
            "{:>6}  {:<15}  {:<25}  {:^23}  {:>6}  {:>7}",
            device.id,
            device.address,
            description,
            last_seen,
            device.missed_polls,
            device.config_changes
        );
    }
    out
}

fn format_report(report: &CycleReport) -> String {
    let mut out = String::new();
    for entry in &report.entries {
        let _ = writeln!(out, "{:>6}  {:<15}  {}", entry.device_id, entry.address, entry.outcome);
    }
    let _ = writeln!(out, "{}", report);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clap::CommandFactory;
    use nbmon::poll::{DeviceReport, MissReason, PollOutcome};
    use secrecy::SecretString;

    fn device(id: DeviceId, description: &str, seen: bool) -> Device {
        Device {
            id,
            platform: "cisco_ios".to_string(),
            address: format!("10.0.0.{}", id),
            port: 22,
            description: description.to_string(),
            username: "admin".to_string(),
            password: SecretString::from("pw".to_string()),
            secret: None,
            actively_polled: true,
            last_seen: seen.then(|| Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            missed_polls: 2,
            config_changes: 1,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_global_overrides() {
        let cli = Cli::try_parse_from([
            "nbmon", "poll", "--report", "--database", "x.db", "--timeout", "5", "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Poll { report: true }));
        assert_eq!(cli.database, Some(PathBuf::from("x.db")));
        assert_eq!(cli.timeout, Some(5));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_edit_field_names() {
        let cli = Cli::try_parse_from(["nbmon", "edit", "4", "ip", "10.0.0.9"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Store(StoreCommand::Edit { id: 4, ref field, .. }) if field == "ip"
        ));
        let cli = Cli::try_parse_from(["nbmon", "edit", "4", "last_seen", ""]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Store(StoreCommand::Edit { ref value, .. }) if value.is_empty()
        ));

        let err = Cli::try_parse_from(["nbmon", "edit", "4", "hostname", "r1"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
        assert!(err.to_string().contains("missed_polls"));
    }

    #[test]
    fn test_status_table() {
        let table = format_status(&[
            device(7, "a very long description that goes on", true),
            device(12, "edge", false),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("DEVICE"));
        assert_eq!(
            lines[1],
            "     7  10.0.0.7         a very long description t  2024-01-02 03:04:05 UTC       2        1"
        );
        assert!(lines[2].contains("         NEVER         "));
    }

    #[test]
    fn test_report_lines() {
        let started_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let report = CycleReport {
            started_at,
            finished_at: started_at,
            entries: vec![DeviceReport {
                device_id: 3,
                address: "10.0.0.3".to_string(),
                outcome: PollOutcome::Missed(MissReason::Timeout),
            }],
        };
        let text = format_report(&report);
        assert!(text.starts_with("     3  10.0.0.3         missed (timeout)\n"));
        assert!(text.contains("1 devices in 0.0s"));
    }
}
