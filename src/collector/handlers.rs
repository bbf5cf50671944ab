use super::registry::{DeviceStatus, Registration};
use super::server::CollectorState;
use super::storage::StoreError;
use crate::credential::redact_token;
use crate::net::{API_KEY_HEADER, PHOTO_NAME_HEADER};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    key: Option<String>,
    device_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceKeyRequest {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    key: Option<String>,
    name: Option<String>,
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

fn failure(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "error": text.into() }))).into_response()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Key from `X-API-Key` if it belongs to an allowed device
fn allowed_key(state: &CollectorState, headers: &HeaderMap) -> Result<String, Response> {
    match header_value(headers, API_KEY_HEADER) {
        Some(key) if state.registry.is_allowed(key) => {
            state.registry.touch(key);
            Ok(key.to_string())
        }
        Some(key) => {
            warn!("Rejected request from key {}", redact_token(key));
            Err(failure(
                StatusCode::UNAUTHORIZED,
                "Unauthorized: Device not allowed.",
            ))
        }
        None => Err(failure(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: Missing API key.",
        )),
    }
}

pub async fn register_key(
    State(state): State<CollectorState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Bad Request: Expected JSON body.");
    };
    let Some(key) = non_empty(request.key) else {
        return failure(StatusCode::BAD_REQUEST, "Bad Request: Missing 'key'.");
    };
    let name = non_empty(request.device_name).unwrap_or_else(|| "Unnamed Device".to_string());

    match state.registry.register(&key, &name) {
        Ok(Registration::AlreadyAllowed) => {
            message(StatusCode::OK, "Device key is already allowed.")
        }
        Ok(Registration::AlreadyPending) => {
            message(StatusCode::ACCEPTED, "Device key is already pending approval.")
        }
        Ok(Registration::Submitted) => message(StatusCode::ACCEPTED, "Key submitted for approval."),
        Err(e) => {
            error!("Failed to record registration: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record registration.")
        }
    }
}

pub async fn check_status(State(state): State<CollectorState>, headers: HeaderMap) -> Response {
    match allowed_key(&state, &headers) {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "approved" }))).into_response(),
        Err(response) => response,
    }
}

pub async fn upload_image(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = match allowed_key(&state, &headers) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let Some(photo_name) = header_value(&headers, PHOTO_NAME_HEADER).map(str::to_string) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Bad Request: Missing photo name or data.",
        );
    };
    if body.is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            "Bad Request: Missing photo name or data.",
        );
    }

    let storage = state.storage.clone();
    let size = body.len();
    let stored = tokio::task::spawn_blocking(move || {
        storage.store(&photo_name, &body, &chrono::Local::now())
    })
    .await;

    match stored {
        Ok(Ok(path)) => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(
                "Stored {} ({} bytes) from {}",
                path.display(),
                size,
                redact_token(&key)
            );
            message(
                StatusCode::OK,
                format!("Photo uploaded successfully as {}", file_name),
            )
        }
        Ok(Err(StoreError::InvalidName(name))) => {
            warn!("Rejected upload named '{}'", name);
            failure(StatusCode::BAD_REQUEST, "Bad Request: File type not allowed.")
        }
        Ok(Err(e)) => {
            error!("Failed to store upload: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store photo.")
        }
        Err(e) => {
            error!("Upload storage task failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store photo.")
        }
    }
}

fn authorize_admin(state: &CollectorState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.admin_key.as_deref() else {
        return Err(failure(StatusCode::FORBIDDEN, "Admin API disabled."));
    };
    if header_value(headers, ADMIN_KEY_HEADER) == Some(expected) {
        Ok(())
    } else {
        Err(failure(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

pub async fn list_devices(State(state): State<CollectorState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    Json(state.registry.list(DeviceStatus::Allowed)).into_response()
}

pub async fn list_pending(State(state): State<CollectorState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    Json(state.registry.list(DeviceStatus::Pending)).into_response()
}

/// Shared shape of the key-addressed admin mutations
fn admin_update<F>(outcome: crate::error::Result<bool>, done: &str, describe: F) -> Response
where
    F: FnOnce() -> String,
{
    match outcome {
        Ok(true) => {
            info!("{}", describe());
            message(StatusCode::OK, done)
        }
        Ok(false) => failure(StatusCode::NOT_FOUND, "Unknown device key."),
        Err(e) => {
            error!("Registry update failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Registry update failed.")
        }
    }
}

pub async fn allow_device(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    payload: Result<Json<DeviceKeyRequest>, JsonRejection>,
) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    let Some(key) = payload.ok().and_then(|Json(r)| non_empty(r.key)) else {
        return failure(StatusCode::BAD_REQUEST, "Key required");
    };
    admin_update(state.registry.allow(&key), "Device allowed", || {
        format!("Allowed device {}", redact_token(&key))
    })
}

pub async fn deny_device(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    payload: Result<Json<DeviceKeyRequest>, JsonRejection>,
) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    let Some(key) = payload.ok().and_then(|Json(r)| non_empty(r.key)) else {
        return failure(StatusCode::BAD_REQUEST, "Key required");
    };
    admin_update(state.registry.deny(&key), "Device denied", || {
        format!("Denied device {}", redact_token(&key))
    })
}

pub async fn update_name(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    let Some((key, name)) = payload
        .ok()
        .and_then(|Json(r)| Some((non_empty(r.key)?, non_empty(r.name)?)))
    else {
        return failure(StatusCode::BAD_REQUEST, "Key and name required");
    };
    admin_update(state.registry.rename(&key, &name), "Name updated", || {
        format!("Renamed device {} to '{}'", redact_token(&key), name)
    })
}
