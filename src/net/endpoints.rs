use crate::config::ServerConfig;
use crate::error::{DccamError, Result};
use std::time::Duration;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const PHOTO_NAME_HEADER: &str = "X-Photo-Name";

/// Collector endpoint URLs derived from one base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn check_status(&self) -> String {
        format!("{}/check_status", self.base_url)
    }

    pub fn register_key(&self) -> String {
        format!("{}/register_key", self.base_url)
    }

    pub fn upload_image(&self) -> String {
        format!("{}/upload_image", self.base_url)
    }
}

/// Build the HTTP client shared by the trust and upload clients
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("dccam/", env!("CARGO_PKG_VERSION")));

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| DccamError::system(format!("Failed to build HTTP client: {}", e)))
}
