use super::{redact_token, CredentialStore};
use crate::error::{DccamError, Result};
use crate::persist::write_atomic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    api_key: String,
}

/// Credential slot backed by a small JSON file in the application state directory
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored credential at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(DccamError::credential(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let stored: StoredCredential = serde_json::from_str(&content).map_err(|e| {
            DccamError::credential(format!(
                "Corrupt credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let token = stored.api_key.trim().to_string();
        if token.is_empty() {
            return Ok(None);
        }

        debug!("Loaded stored credential {}", redact_token(&token));
        Ok(Some(token))
    }

    fn save(&self, token: &str) -> Result<()> {
        let payload = serde_json::to_vec(&StoredCredential {
            api_key: token.to_string(),
        })?;

        write_atomic(&self.path, &payload, true).map_err(|e| {
            DccamError::credential(format!(
                "Failed to persist credential to {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(
            "Persisted credential {} to {}",
            redact_token(token),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory credential slot for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token<S: Into<String>>(token: S) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }
}
