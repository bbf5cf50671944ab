use super::handlers::ADMIN_KEY_HEADER;
use super::registry::DeviceSummary;
use crate::error::{AuthError, DccamError, Result};
use crate::net::{describe_transport_error, extract_server_message};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Client for the collector's admin endpoints
pub struct AdminClient {
    client: reqwest::Client,
    base_url: String,
    admin_key: String,
}

impl AdminClient {
    pub fn new<S: Into<String>>(client: reqwest::Client, base_url: &str, admin_key: S) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_key: admin_key.into(),
        }
    }

    pub async fn devices(&self) -> Result<Vec<DeviceSummary>> {
        self.get("/admin/devices").await
    }

    pub async fn pending(&self) -> Result<Vec<DeviceSummary>> {
        self.get("/admin/pending").await
    }

    pub async fn allow(&self, key: &str) -> Result<String> {
        self.post("/admin/allow_device", json!({ "key": key })).await
    }

    pub async fn deny(&self, key: &str) -> Result<String> {
        self.post("/admin/deny_device", json!({ "key": key })).await
    }

    pub async fn rename(&self, key: &str, name: &str) -> Result<String> {
        self.post("/admin/update_name", json!({ "key": key, "name": name }))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(ADMIN_KEY_HEADER, &self.admin_key)
            .send()
            .await
            .map_err(transport)?;
        let body = checked_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post(&self, path: &str, payload: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(ADMIN_KEY_HEADER, &self.admin_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        let body = checked_body(response).await?;
        Ok(extract_server_message(&body).unwrap_or_default())
    }
}

fn transport(error: reqwest::Error) -> DccamError {
    DccamError::Connection {
        cause: describe_transport_error(&error),
    }
}

async fn checked_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Unauthorized.into()),
        s if s.is_success() => response.text().await.map_err(transport),
        s => Err(DccamError::Server { status: s.as_u16() }),
    }
}
