use crate::credential::redact_token;
use crate::error::{DccamError, Result};
use crate::persist::write_atomic;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Approval status of a registered device key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Pending,
    Allowed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub status: DeviceStatus,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub last_request_at: Option<DateTime<Utc>>,
}

/// Registry entry as returned by the admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub key: String,
    pub name: String,
    pub status: DeviceStatus,
    pub registered_at: DateTime<Utc>,
    pub last_request_at: Option<DateTime<Utc>>,
}

/// What a registration request did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyAllowed,
    AlreadyPending,
    Submitted,
}

/// Device keys known to the collector, keyed by the key itself.
///
/// Every mutation is written through to a JSON file when the registry
/// is file-backed.
pub struct DeviceRegistry {
    path: Option<PathBuf>,
    devices: Mutex<BTreeMap<String, DeviceRecord>>,
}

impl DeviceRegistry {
    /// Open a file-backed registry, starting empty if the file is absent
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let devices = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(
            "Device registry {} holds {} device(s)",
            path.display(),
            devices.len()
        );

        Ok(Self {
            path: Some(path),
            devices: Mutex::new(devices),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            devices: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn register(&self, key: &str, name: &str) -> Result<Registration> {
        let mut devices = self.devices.lock();
        if let Some(record) = devices.get(key) {
            return Ok(match record.status {
                DeviceStatus::Allowed => Registration::AlreadyAllowed,
                DeviceStatus::Pending => Registration::AlreadyPending,
            });
        }

        let mut next = devices.clone();
        next.insert(
            key.to_string(),
            DeviceRecord {
                name: name.to_string(),
                status: DeviceStatus::Pending,
                registered_at: Utc::now(),
                last_request_at: None,
            },
        );
        self.commit(&mut devices, next)?;
        info!("Key {} ('{}') submitted for approval", redact_token(key), name);
        Ok(Registration::Submitted)
    }

    pub fn status(&self, key: &str) -> Option<DeviceStatus> {
        self.devices.lock().get(key).map(|record| record.status)
    }

    pub fn is_allowed(&self, key: &str) -> bool {
        self.status(key) == Some(DeviceStatus::Allowed)
    }

    /// Record activity from an allowed device; not persisted on its own
    pub fn touch(&self, key: &str) {
        if let Some(record) = self.devices.lock().get_mut(key) {
            record.last_request_at = Some(Utc::now());
        }
    }

    /// Approve a pending key; false if the key is unknown
    pub fn allow(&self, key: &str) -> Result<bool> {
        self.update(key, |record| record.status = DeviceStatus::Allowed)
    }

    /// Forget a key entirely
    pub fn deny(&self, key: &str) -> Result<bool> {
        let mut devices = self.devices.lock();
        if !devices.contains_key(key) {
            return Ok(false);
        }
        let mut next = devices.clone();
        next.remove(key);
        self.commit(&mut devices, next)?;
        info!("Key {} removed", redact_token(key));
        Ok(true)
    }

    pub fn rename(&self, key: &str, name: &str) -> Result<bool> {
        self.update(key, |record| record.name = name.to_string())
    }

    pub fn list(&self, status: DeviceStatus) -> Vec<DeviceSummary> {
        self.devices
            .lock()
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(key, record)| DeviceSummary {
                key: key.clone(),
                name: record.name.clone(),
                status: record.status,
                registered_at: record.registered_at,
                last_request_at: record.last_request_at,
            })
            .collect()
    }

    fn update<F: FnOnce(&mut DeviceRecord)>(&self, key: &str, change: F) -> Result<bool> {
        let mut devices = self.devices.lock();
        let mut next = devices.clone();
        let Some(record) = next.get_mut(key) else {
            return Ok(false);
        };
        change(record);
        self.commit(&mut devices, next)?;
        debug!("Updated registry entry {}", redact_token(key));
        Ok(true)
    }

    /// Write `next` to disk, then make it the live map. A failed write
    /// leaves the live map untouched.
    fn commit(
        &self,
        devices: &mut BTreeMap<String, DeviceRecord>,
        next: BTreeMap<String, DeviceRecord>,
    ) -> Result<()> {
        if let Some(path) = &self.path {
            write_atomic(path, &serde_json::to_vec_pretty(&next)?, false).map_err(|e| {
                DccamError::system(format!("Failed to write {}: {}", path.display(), e))
            })?;
        }
        *devices = next;
        Ok(())
    }
}
