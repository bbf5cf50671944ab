//! Header-based HTTP protocol spoken with the collector.
//!
//! Every call resolves into a typed outcome instead of an error: transport
//! failures become `ConnectionFailed`, unexpected statuses keep their code.

mod endpoints;
mod trust;
mod upload;

pub use endpoints::{build_http_client, Endpoints, API_KEY_HEADER, PHOTO_NAME_HEADER};
pub use trust::{HttpTrustClient, RegisterResult, StatusResult, TrustClient};
pub use upload::{HttpUploadClient, UploadClient, UploadResult};
pub(crate) use upload::extract_server_message;

/// Describe a transport-level failure for the operator
pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("could not connect: {}", error)
    } else {
        error.to_string()
    }
}
