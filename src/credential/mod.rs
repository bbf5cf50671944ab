//! Device credential: the opaque key that gates uploads, and the durable
//! slot it lives in between process restarts.

mod store;

pub use store::{FileCredentialStore, MemoryCredentialStore};

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Approval state of the device credential as last observed from the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    Unknown,
    AwaitingApproval,
    Approved,
    Rejected,
    ConnectionError,
}

impl ApprovalState {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalState::Approved)
    }
}

/// The single live credential owned by the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCredential {
    pub token: String,
    pub approval: ApprovalState,
}

impl DeviceCredential {
    /// Generate a fresh credential with a random v4 UUID token
    pub fn generate() -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            approval: ApprovalState::Unknown,
        }
    }

    pub fn with_token<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
            approval: ApprovalState::Unknown,
        }
    }

    /// Token prefix that is safe to write to logs
    pub fn redacted(&self) -> String {
        redact_token(&self.token)
    }
}

pub(crate) fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}…", prefix)
}

/// Durable single-slot storage for the device token
pub trait CredentialStore: Send + Sync {
    /// Return the persisted token, if any
    fn load(&self) -> Result<Option<String>>;

    /// Persist the token; a crash mid-write never exposes a partial value
    fn save(&self, token: &str) -> Result<()>;
}
