use super::endpoints::{Endpoints, API_KEY_HEADER, PHOTO_NAME_HEADER};
use super::describe_transport_error;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

/// Outcome of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    Success {
        server_message: Option<String>,
    },
    /// 401: the credential was rejected after having been approved
    Unauthorized,
    Failed {
        status: u16,
        server_message: String,
    },
    ConnectionFailed(String),
}

/// Transmits a finished image under a credential
#[async_trait]
pub trait UploadClient: Send + Sync {
    async fn upload(&self, image: Bytes, file_name: &str, token: &str) -> UploadResult;
}

/// Upload client speaking the collector's HTTP protocol
#[derive(Clone)]
pub struct HttpUploadClient {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpUploadClient {
    pub fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl UploadClient for HttpUploadClient {
    async fn upload(&self, image: Bytes, file_name: &str, token: &str) -> UploadResult {
        let url = self.endpoints.upload_image();
        info!("Uploading {} ({} bytes) to {}", file_name, image.len(), url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(PHOTO_NAME_HEADER, file_name)
            .header(API_KEY_HEADER, token)
            .body(image)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let cause = describe_transport_error(&e);
                warn!("Upload of {} failed: {}", file_name, cause);
                return UploadResult::ConnectionFailed(cause);
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let server_message = extract_server_message(&body);
        debug!("Upload responded with {}: {:?}", status, server_message);

        match status {
            StatusCode::OK => UploadResult::Success { server_message },
            StatusCode::UNAUTHORIZED => UploadResult::Unauthorized,
            other => UploadResult::Failed {
                status: other.as_u16(),
                server_message: server_message.unwrap_or_else(|| {
                    other
                        .canonical_reason()
                        .unwrap_or("Unknown status")
                        .to_string()
                }),
            },
        }
    }
}

/// Pull a human-readable message out of a response body
pub(crate) fn extract_server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed)
    {
        for key in ["message", "error", "description"] {
            if let Some(serde_json::Value::String(text)) = map.get(key) {
                return Some(text.clone());
            }
        }
    }

    Some(trimmed.chars().take(200).collect())
}
