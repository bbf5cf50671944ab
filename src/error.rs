use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DccamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Connection error: {cause}")]
    Connection { cause: String },

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Credential store error: {details}")]
    Credential { details: String },

    #[error("Camera error: {details}")]
    Camera { details: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl DccamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn camera<S: Into<String>>(details: S) -> Self {
        Self::Camera {
            details: details.into(),
        }
    }

    pub fn credential<S: Into<String>>(details: S) -> Self {
        Self::Credential {
            details: details.into(),
        }
    }
}

/// Operator-entered field that failed format validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    StoreCode,
    ReferenceCode,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputField::StoreCode => write!(f, "store code"),
            InputField::ReferenceCode => write!(f, "reference code"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} '{value}' does not match the expected format")]
pub struct ValidationError {
    pub field: InputField,
    pub value: String,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("device credential was rejected")]
    Unauthorized,
    #[error("device credential is awaiting approval")]
    Pending,
}

/// Stage of the capture pipeline that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Acquire,
    Orientation,
    Timestamp,
    Encode,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Acquire => "acquire",
            ProcessingStage::Orientation => "orientation",
            ProcessingStage::Timestamp => "timestamp",
            ProcessingStage::Encode => "encode",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} stage failed: {details}")]
pub struct ProcessingError {
    pub stage: ProcessingStage,
    pub details: String,
}

impl ProcessingError {
    pub fn new<S: Into<String>>(stage: ProcessingStage, details: S) -> Self {
        Self {
            stage,
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DccamError>;
