//! Bulk device import from a JSON document.
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "ip": "10.0.0.1",
//!       "port": 22,
//!       "description": "core switch",
//!       "username": "admin",
//!       "password": "hunter2",
//!       "secret": "enable-secret",
//!       "actively_poll": true,
//!       "device_type": "cisco_ios",
//!       "missed_polls": 0,
//!       "config_changes": 0
//!     }
//!   ]
//! }
//! ```
//!
//! `missed_polls`, `config_changes`, `description` and `secret` may be left
//! out. The whole document is validated before the first insert; each device
//! is then committed on its own.

use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{ConfigurationError, ImportError, Result};
use crate::platform::PlatformRegistry;
use crate::store::field::{validate_address, validate_port};
use crate::store::{DeviceId, DeviceStore, NewDevice};

#[derive(Debug, Deserialize)]
struct Document {
    devices: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    ip: String,
    port: PortValue,
    #[serde(default)]
    description: String,
    username: String,
    password: String,
    #[serde(default)]
    secret: Option<String>,
    actively_poll: bool,
    device_type: String,
    #[serde(default)]
    missed_polls: u32,
    #[serde(default)]
    config_changes: u32,
}

/// Ports show up both as numbers and as strings in hand-written files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn to_text(&self) -> String {
        match self {
            PortValue::Number(n) => n.to_string(),
            PortValue::Text(s) => s.clone(),
        }
    }
}

impl Record {
    fn into_device(self, registry: &PlatformRegistry) -> std::result::Result<NewDevice, ConfigurationError> {
        let platform = self.device_type.trim().to_string();
        if !registry.contains(&platform) {
            return Err(ConfigurationError::UnknownPlatform { tag: platform });
        }
        if self.username.is_empty() {
            return Err(ConfigurationError::InvalidAttribute {
                field: "username",
                message: "empty".to_string(),
            });
        }

        let address = validate_address(&self.ip)?;
        let port = validate_port(&self.port.to_text())?;

        let mut device = NewDevice::new(platform, address, self.username, self.password)
            .port(port)
            .description(self.description)
            .actively_polled(self.actively_poll);
        if let Some(secret) = self.secret.filter(|s| !s.is_empty()) {
            device = device.secret(secret);
        }
        device.missed_polls = self.missed_polls;
        device.config_changes = self.config_changes;
        Ok(device)
    }
}

/// Parse and validate an import document.
pub fn parse_devices(text: &str, registry: &PlatformRegistry) -> std::result::Result<Vec<NewDevice>, ImportError> {
    let document: Document = serde_json::from_str(text)?;
    document
        .devices
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_device(registry)
                .map_err(|source| ImportError::InvalidDevice { index, source })
        })
        .collect()
}

/// Insert every device of an import document, returning the new ids in
/// document order.
pub fn import_devices<S: DeviceStore + ?Sized>(
    store: &S,
    registry: &PlatformRegistry,
    text: &str,
) -> Result<Vec<DeviceId>> {
    let devices = parse_devices(text, registry)?;
    let mut ids = Vec::with_capacity(devices.len());
    for device in &devices {
        let id = store.insert_device(device)?;
        info!("Imported device {} ({})", id, device.address);
        ids.push(id);
    }
    Ok(ids)
}

/// [`import_devices`] reading the document from `path`.
pub fn import_file<S: DeviceStore + ?Sized>(
    store: &S,
    registry: &PlatformRegistry,
    path: &Path,
) -> Result<Vec<DeviceId>> {
    let text = fs::read_to_string(path).map_err(ImportError::from)?;
    import_devices(store, registry, &text)
}
