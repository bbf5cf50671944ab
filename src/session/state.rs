use crate::credential::ApprovalState;
use crate::error::{InputField, ProcessingStage};
use crate::processing::ProcessedImage;
use serde::Serialize;
use std::fmt;

/// Controller states, from credential bootstrap through upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// No usable credential; waiting for start or retry
    AwaitingCredential,
    /// A freshly generated token is being registered
    Registering,
    /// A token exists but is not (yet) known to be approved
    Polling,
    /// Preview active, capture allowed
    Ready,
    /// Waiting for the camera to deliver one frame
    Capturing,
    /// Orientation, stamping and encoding in progress
    Processing,
    /// Processed image held for operator review
    ReviewReady,
    /// Upload in flight
    Uploading,
}

impl SessionState {
    /// States in which a capture session is live
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            SessionState::Capturing
                | SessionState::Processing
                | SessionState::ReviewReady
                | SessionState::Uploading
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingCredential => "awaiting credential",
            SessionState::Registering => "registering",
            SessionState::Polling => "awaiting approval",
            SessionState::Ready => "ready",
            SessionState::Capturing => "capturing",
            SessionState::Processing => "processing",
            SessionState::ReviewReady => "review",
            SessionState::Uploading => "uploading",
        };
        f.write_str(name)
    }
}

/// Operator commands accepted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Capture {
        store_code: String,
        reference_code: String,
    },
    Retake,
    Send,
    Retry,
    RefreshStatus,
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Capture { .. } => "capture",
            Command::Retake => "retake",
            Command::Send => "send",
            Command::Retry => "retry",
            Command::RefreshStatus => "status",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Human-readable reason attached to the latest transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Registered,
    AwaitingApproval,
    Approved,
    NotApproved,
    RegistrationFailed { status: u16 },
    ServerError { status: u16 },
    ConnectionFailed { cause: String },
    CredentialStoreFailed { details: String },
    InvalidInput { field: InputField },
    CaptureFailed { details: String },
    ProcessingFailed { stage: ProcessingStage, details: String },
    UploadSucceeded { file_name: String },
    UploadFailed { status: Option<u16>, message: String },
    UploadUnauthorized,
    SendRequiresApproval,
    CommandUnavailable { command: &'static str, state: SessionState },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Registered => write!(f, "Device registered and approved"),
            Notice::AwaitingApproval => {
                write!(f, "Device registered, waiting for administrator approval")
            }
            Notice::Approved => write!(f, "Device approved"),
            Notice::NotApproved => write!(f, "Device not approved"),
            Notice::RegistrationFailed { status } => {
                write!(f, "Registration failed with HTTP {}", status)
            }
            Notice::ServerError { status } => write!(f, "Server error: HTTP {}", status),
            Notice::ConnectionFailed { cause } => write!(f, "Connection failed: {}", cause),
            Notice::CredentialStoreFailed { details } => {
                write!(f, "Could not persist device key: {}", details)
            }
            Notice::InvalidInput { field } => write!(f, "Invalid {}", field),
            Notice::CaptureFailed { details } => write!(f, "Capture failed: {}", details),
            Notice::ProcessingFailed { stage, details } => {
                write!(f, "Image {} failed: {}", stage, details)
            }
            Notice::UploadSucceeded { file_name } => write!(f, "Uploaded {}", file_name),
            Notice::UploadFailed {
                status: Some(status),
                message,
            } => write!(f, "Upload failed (HTTP {}): {}", status, message),
            Notice::UploadFailed {
                status: None,
                message,
            } => write!(f, "Upload failed: {}", message),
            Notice::UploadUnauthorized => write!(f, "Upload rejected: device not authorized"),
            Notice::SendRequiresApproval => {
                write!(f, "Device must be approved before sending")
            }
            Notice::CommandUnavailable { command, state } => {
                write!(f, "'{}' is not available while {}", command, state)
            }
        }
    }
}

/// Result of the most recent upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// `None` when the request never produced a response
    pub http_status: Option<u16>,
    pub server_message: Option<String>,
}

/// One capture-through-upload attempt
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub store_code: String,
    pub reference_code: String,
    pub processed: Option<ProcessedImage>,
}

impl CaptureSession {
    pub fn new(store_code: String, reference_code: String) -> Self {
        Self {
            store_code,
            reference_code,
            processed: None,
        }
    }

    /// Name the collector files the image under
    pub fn file_name(&self) -> String {
        format!("{}_{}.jpg", self.store_code, self.reference_code)
    }
}

/// Immutable snapshot consumed by rendering collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub state: SessionState,
    pub approval: ApprovalState,
    pub capture_enabled: bool,
    pub send_enabled: bool,
    pub retake_enabled: bool,
    pub retry_enabled: bool,
    /// Field to return focus to after a validation failure
    pub focus: Option<InputField>,
    pub notice: Option<Notice>,
    pub last_upload: Option<UploadOutcome>,
    pub has_processed_image: bool,
    pub store_code: Option<String>,
    pub reference_code: Option<String>,
    /// Redacted token prefix
    pub credential: Option<String>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            state: SessionState::AwaitingCredential,
            approval: ApprovalState::Unknown,
            capture_enabled: false,
            send_enabled: false,
            retake_enabled: false,
            retry_enabled: false,
            focus: None,
            notice: None,
            last_upload: None,
            has_processed_image: false,
            store_code: None,
            reference_code: None,
            credential: None,
        }
    }
}
