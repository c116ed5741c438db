//! SQLite-backed device store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use secrecy::{ExposeSecret, SecretString};

use super::{
    ChangeOutcome, ConfigRevision, Device, DeviceField, DeviceId, DeviceStore, NewDevice,
    RevisionId, StoreResult,
};
use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS device (
    device_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    device_type    TEXT    NOT NULL,
    ip             TEXT    NOT NULL,
    port           INTEGER NOT NULL DEFAULT 22 CHECK (port BETWEEN 1 AND 65535),
    description    TEXT    NOT NULL DEFAULT '',
    username       TEXT    NOT NULL,
    password       TEXT    NOT NULL,
    secret         TEXT,
    actively_poll  INTEGER NOT NULL DEFAULT 1,
    last_seen      INTEGER,
    missed_polls   INTEGER NOT NULL DEFAULT 0 CHECK (missed_polls >= 0),
    config_changes INTEGER NOT NULL DEFAULT 0 CHECK (config_changes >= 0)
);

CREATE TABLE IF NOT EXISTS config (
    config_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id   INTEGER NOT NULL REFERENCES device(device_id),
    captured_at INTEGER NOT NULL,
    hconfig     TEXT    NOT NULL,
    config      TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_config_device_recent
    ON config (device_id, captured_at DESC, config_id DESC);
";

const DEVICE_COLUMNS: &str = "device_id, device_type, ip, port, description, username, \
     password, secret, actively_poll, last_seen, missed_polls, config_changes";

const REVISION_COLUMNS: &str = "config_id, device_id, captured_at, hconfig, config";

/// Counters saturate here so they always read back as `u32`.
const COUNTER_MAX: i64 = u32::MAX as i64;

/// Device store persisted in a SQLite database.
///
/// The connection is owned by the store and guarded by a mutex; every
/// mutation runs in an `IMMEDIATE` transaction so SQLite's writer lock
/// serializes read-modify-write sequences. SQLite admits one writer per
/// database, so the mutex only makes that queue explicit. Each call holds it
/// for a single short statement or transaction and never across an `.await`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("opened {} (journal_mode={})", path.display(), mode);
        Self::from_connection(conn)
    }

    /// Create a private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;

        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            info!("initialized store schema v{}", SCHEMA_VERSION);
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Close the underlying connection, flushing pending writes.
    pub fn close(self) -> StoreResult<()> {
        let conn = self.conn.into_inner().map_err(|_| StorageError::Poisoned)?;
        conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn query_devices(&self, filter: &str) -> StoreResult<Vec<Device>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM device {}", DEVICE_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let devices = stmt
            .query_map([], device_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }
}

impl DeviceStore for SqliteStore {
    fn list_active(&self) -> StoreResult<Vec<Device>> {
        self.query_devices("WHERE actively_poll = 1 ORDER BY device_id")
    }

    fn list_flagged(&self) -> StoreResult<Vec<Device>> {
        self.query_devices(
            "WHERE actively_poll = 1 AND (missed_polls != 0 OR config_changes != 0) \
             ORDER BY missed_polls DESC, config_changes DESC, device_id",
        )
    }

    fn list_devices(&self) -> StoreResult<Vec<Device>> {
        self.query_devices("ORDER BY device_id")
    }

    fn get_device(&self, device: DeviceId) -> StoreResult<Device> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM device WHERE device_id = ?1", DEVICE_COLUMNS);
        conn.query_row(&sql, [device], device_from_row)
            .optional()?
            .ok_or(StorageError::DeviceNotFound(device))
    }

    fn insert_device(&self, device: &NewDevice) -> StoreResult<DeviceId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO device (device_type, ip, port, description, username, password, \
             secret, actively_poll, missed_polls, config_changes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                device.platform,
                device.address,
                device.port,
                device.description,
                device.username,
                device.password.expose_secret(),
                device.secret.as_ref().map(|s| s.expose_secret()),
                device.actively_polled,
                device.missed_polls,
                device.config_changes,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("inserted device {} ({})", id, device.address);
        Ok(id)
    }

    fn current_baseline(&self, device: DeviceId) -> StoreResult<Option<Fingerprint>> {
        let conn = self.lock()?;
        baseline(&conn, device)
    }

    fn record_poll_success(
        &self,
        device: DeviceId,
        captured_at: DateTime<Utc>,
        fingerprint: &Fingerprint,
        config: &str,
    ) -> StoreResult<ChangeOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_device(&tx, device)?;

        let outcome = match baseline(&tx, device)? {
            Some(current) if current == *fingerprint => ChangeOutcome::Unchanged,
            Some(_) => ChangeOutcome::Changed,
            None => ChangeOutcome::FirstCapture,
        };

        if outcome.stored_revision() {
            tx.execute(
                "INSERT INTO config (device_id, captured_at, hconfig, config) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![device, captured_at.timestamp_micros(), fingerprint.as_str(), config],
            )?;
        }

        let bump = i64::from(outcome == ChangeOutcome::Changed);
        tx.execute(
            "UPDATE device SET last_seen = ?1, config_changes = MIN(config_changes + ?2, ?3) \
             WHERE device_id = ?4",
            params![captured_at.timestamp_micros(), bump, COUNTER_MAX, device],
        )?;

        tx.commit()?;
        Ok(outcome)
    }

    fn record_missed_poll(&self, device: DeviceId) -> StoreResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE device SET missed_polls = MIN(missed_polls + 1, ?1) WHERE device_id = ?2",
            params![COUNTER_MAX, device],
        )?;
        if updated == 0 {
            debug!("missed poll for deleted device {} ignored", device);
        }
        Ok(())
    }

    fn clear_counters(&self, device: DeviceId) -> StoreResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE device SET missed_polls = 0, config_changes = 0 WHERE device_id = ?1",
            [device],
        )?;
        if updated == 0 {
            return Err(StorageError::DeviceNotFound(device));
        }
        Ok(())
    }

    fn update_field(&self, device: DeviceId, field: DeviceField) -> StoreResult<()> {
        let (column, value) = match field {
            DeviceField::Platform(v) => ("device_type", Value::Text(v)),
            DeviceField::Address(v) => ("ip", Value::Text(v)),
            DeviceField::Port(v) => ("port", Value::Integer(v.into())),
            DeviceField::Description(v) => ("description", Value::Text(v)),
            DeviceField::Username(v) => ("username", Value::Text(v)),
            DeviceField::Password(v) => ("password", Value::Text(v.expose_secret().to_string())),
            DeviceField::Secret(v) => (
                "secret",
                v.map_or(Value::Null, |s| Value::Text(s.expose_secret().to_string())),
            ),
            DeviceField::ActivelyPolled(v) => ("actively_poll", Value::Integer(v.into())),
            DeviceField::MissedPolls(v) => ("missed_polls", Value::Integer(v.into())),
            DeviceField::ConfigChanges(v) => ("config_changes", Value::Integer(v.into())),
            DeviceField::LastSeen(v) => (
                "last_seen",
                v.map_or(Value::Null, |ts| Value::Integer(ts.timestamp_micros())),
            ),
        };

        let conn = self.lock()?;
        let sql = format!("UPDATE device SET {} = ?1 WHERE device_id = ?2", column);
        let updated = conn.execute(&sql, params![value, device])?;
        if updated == 0 {
            return Err(StorageError::DeviceNotFound(device));
        }
        Ok(())
    }

    fn delete_device(&self, device: DeviceId) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_device(&tx, device)?;
        let revisions = tx.execute("DELETE FROM config WHERE device_id = ?1", [device])?;
        tx.execute("DELETE FROM device WHERE device_id = ?1", [device])?;
        tx.commit()?;
        debug!("deleted device {} and {} revisions", device, revisions);
        Ok(())
    }

    fn list_revisions(&self, device: DeviceId) -> StoreResult<Vec<ConfigRevision>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM config WHERE device_id = ?1 \
             ORDER BY captured_at DESC, config_id DESC",
            REVISION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let revisions = stmt
            .query_map([device], revision_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(revisions)
    }

    fn get_revision(&self, revision: RevisionId) -> StoreResult<ConfigRevision> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM config WHERE config_id = ?1", REVISION_COLUMNS);
        conn.query_row(&sql, [revision], revision_from_row)
            .optional()?
            .ok_or(StorageError::RevisionNotFound(revision))
    }

    fn delete_revision(&self, revision: RevisionId) -> StoreResult<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM config WHERE config_id = ?1", [revision])?;
        if deleted == 0 {
            return Err(StorageError::RevisionNotFound(revision));
        }
        Ok(())
    }
}

fn ensure_device(tx: &Transaction<'_>, device: DeviceId) -> StoreResult<()> {
    let exists = tx
        .query_row("SELECT 1 FROM device WHERE device_id = ?1", [device], |_| Ok(()))
        .optional()?;
    exists.ok_or(StorageError::DeviceNotFound(device))
}

fn baseline(conn: &Connection, device: DeviceId) -> StoreResult<Option<Fingerprint>> {
    let hex: Option<String> = conn
        .query_row(
            "SELECT hconfig FROM config WHERE device_id = ?1 \
             ORDER BY captured_at DESC, config_id DESC LIMIT 1",
            [device],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hex.map(Fingerprint::from_hex))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    let last_seen = match row.get::<_, Option<i64>>(9)? {
        Some(_) => Some(timestamp(row, 9)?),
        None => None,
    };

    Ok(Device {
        id: row.get(0)?,
        platform: row.get(1)?,
        address: row.get(2)?,
        port: row.get(3)?,
        description: row.get(4)?,
        username: row.get(5)?,
        password: SecretString::from(row.get::<_, String>(6)?),
        secret: row.get::<_, Option<String>>(7)?.map(SecretString::from),
        actively_polled: row.get(8)?,
        last_seen,
        missed_polls: row.get(10)?,
        config_changes: row.get(11)?,
    })
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<ConfigRevision> {
    Ok(ConfigRevision {
        id: row.get(0)?,
        device_id: row.get(1)?,
        captured_at: timestamp(row, 2)?,
        fingerprint: Fingerprint::from_hex(row.get::<_, String>(3)?),
        config: row.get(4)?,
    })
}
