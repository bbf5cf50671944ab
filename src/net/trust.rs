use super::endpoints::{Endpoints, API_KEY_HEADER};
use super::describe_transport_error;
use crate::credential::redact_token;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of a registration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterResult {
    /// 200: the credential is usable immediately
    Approved,
    /// 202: the credential was stored and awaits manual approval
    Pending,
    /// Any other status
    Failed(u16),
    /// DNS, refusal, timeout
    ConnectionFailed(String),
}

/// Outcome of a status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusResult {
    /// 200
    Approved,
    /// 401
    NotApproved,
    /// Any other status
    ServerError(u16),
    /// DNS, refusal, timeout
    ConnectionFailed(String),
}

/// Registers device credentials and polls their approval status
#[async_trait]
pub trait TrustClient: Send + Sync {
    async fn register(&self, token: &str, device_label: &str) -> RegisterResult;

    async fn check_status(&self, token: &str) -> StatusResult;
}

#[derive(Serialize)]
struct RegisterPayload<'a> {
    key: &'a str,
    device_name: &'a str,
}

/// Trust client speaking the collector's HTTP protocol
#[derive(Clone)]
pub struct HttpTrustClient {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpTrustClient {
    pub fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl TrustClient for HttpTrustClient {
    async fn register(&self, token: &str, device_label: &str) -> RegisterResult {
        let url = self.endpoints.register_key();
        info!(
            "Registering credential {} as '{}' at {}",
            redact_token(token),
            device_label,
            url
        );

        let response = self
            .client
            .post(&url)
            .json(&RegisterPayload {
                key: token,
                device_name: device_label,
            })
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                debug!("Registration responded with {}", status);
                match status {
                    StatusCode::OK => RegisterResult::Approved,
                    StatusCode::ACCEPTED => RegisterResult::Pending,
                    other => {
                        warn!("Registration rejected with HTTP {}", other.as_u16());
                        RegisterResult::Failed(other.as_u16())
                    }
                }
            }
            Err(e) => {
                let cause = describe_transport_error(&e);
                warn!("Registration request failed: {}", cause);
                RegisterResult::ConnectionFailed(cause)
            }
        }
    }

    async fn check_status(&self, token: &str) -> StatusResult {
        let url = self.endpoints.check_status();
        debug!("Checking status of credential {}", redact_token(token));

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, token)
            .body("")
            .send()
            .await;

        match response {
            Ok(response) => match response.status() {
                StatusCode::OK => StatusResult::Approved,
                StatusCode::UNAUTHORIZED => StatusResult::NotApproved,
                other => {
                    warn!("Status check returned HTTP {}", other.as_u16());
                    StatusResult::ServerError(other.as_u16())
                }
            },
            Err(e) => {
                let cause = describe_transport_error(&e);
                warn!("Status check failed: {}", cause);
                StatusResult::ConnectionFailed(cause)
            }
        }
    }
}
