use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DccamConfig {
    pub server: ServerConfig,
    pub credential: CredentialConfig,
    pub validation: ValidationConfig,
    pub overlay: OverlayConfig,
    pub camera: CameraConfig,
    pub collector: CollectorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Collector host name or IP address
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Collector port
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Request timeout in seconds; the transport default applies when unset
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Per-device key registered with the collector and approved out-of-band
    Registered,
    /// Fixed pre-provisioned key shared by every device
    Shared,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CredentialConfig {
    /// Credential scheme used by this deployment
    #[serde(default = "default_credential_mode")]
    pub mode: CredentialMode,

    /// Pre-provisioned key, only used in shared mode
    #[serde(default)]
    pub shared_key: Option<String>,

    /// File holding the persisted device credential
    #[serde(default = "default_credential_store_path")]
    pub store_path: String,

    /// Device label sent along with the registration request
    #[serde(default = "default_device_label")]
    pub device_label: String,

    /// Seconds between status polls while awaiting approval (0 disables)
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValidationConfig {
    /// Full-match pattern for the store code
    #[serde(default = "default_store_code_pattern")]
    pub store_code_pattern: String,

    /// Full-match pattern for the reference code
    #[serde(default = "default_reference_code_pattern")]
    pub reference_code_pattern: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OverlayConfig {
    /// Stamp the capture time onto processed images
    #[serde(default = "default_overlay_enabled")]
    pub enabled: bool,

    /// Path to TrueType font file for the timestamp
    #[serde(default = "default_overlay_font_path")]
    pub font_path: String,

    /// Font size in pixels
    #[serde(default = "default_overlay_font_size")]
    pub font_size: f32,

    /// Distance of the timestamp from the left and bottom edges
    #[serde(default = "default_overlay_inset")]
    pub inset: u32,

    /// IANA timezone for the timestamp; local time when unset
    #[serde(default)]
    pub timezone: Option<String>,

    /// JPEG quality used for the uploaded image
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    /// Decode a still image from disk on every capture
    Still,
    /// Grab a single frame from a V4L2 device through GStreamer
    V4l2,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_camera_source")]
    pub source: CameraSource,

    /// Image file read by the still source
    #[serde(default = "default_still_path")]
    pub still_path: String,

    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_device_index")]
    pub device_index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Sensor mounting rotation reported with every frame
    #[serde(default)]
    pub rotation_degrees: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CollectorConfig {
    /// IP address to bind to
    #[serde(default = "default_collector_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Root directory for uploaded photos
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// JSON file holding registered devices
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Key required by the admin endpoints; admin endpoints are disabled when unset
    #[serde(default)]
    pub admin_key: Option<String>,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Base URL of the collector, e.g. `http://127.0.0.1:6868`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

impl CredentialConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.poll_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl DccamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("dccam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("server.host", default_server_host())?
            .set_default("server.port", default_server_port())?
            .set_default("credential.mode", "registered")?
            .set_default("credential.store_path", default_credential_store_path())?
            .set_default("credential.device_label", default_device_label())?
            .set_default(
                "credential.poll_interval_seconds",
                default_poll_interval_seconds(),
            )?
            .set_default(
                "validation.store_code_pattern",
                default_store_code_pattern(),
            )?
            .set_default(
                "validation.reference_code_pattern",
                default_reference_code_pattern(),
            )?
            .set_default("overlay.enabled", default_overlay_enabled())?
            .set_default("overlay.font_path", default_overlay_font_path())?
            .set_default("overlay.font_size", default_overlay_font_size() as f64)?
            .set_default("overlay.inset", default_overlay_inset())?
            .set_default("overlay.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default("camera.source", "still")?
            .set_default("camera.still_path", default_still_path())?
            .set_default("camera.device_index", default_device_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.rotation_degrees", 0)?
            .set_default("collector.bind", default_collector_bind())?
            .set_default("collector.port", default_server_port())?
            .set_default("collector.upload_dir", default_upload_dir())?
            .set_default("collector.registry_path", default_registry_path())?
            .set_default(
                "collector.max_upload_bytes",
                default_max_upload_bytes() as u64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // DCCAM_SERVER__PORT=7000 overrides server.port
            .add_source(
                Environment::with_prefix("DCCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DccamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "Server host must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.credential.mode == CredentialMode::Shared
            && self
                .credential
                .shared_key
                .as_deref()
                .map_or(true, |key| key.trim().is_empty())
        {
            return Err(ConfigError::Message(
                "Shared credential mode requires a non-empty shared_key".to_string(),
            ));
        }

        for (name, pattern) in [
            ("store_code_pattern", &self.validation.store_code_pattern),
            (
                "reference_code_pattern",
                &self.validation.reference_code_pattern,
            ),
        ] {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Message(format!("Invalid {} '{}': {}", name, pattern, e))
            })?;
        }

        if self.overlay.font_size <= 0.0 {
            return Err(ConfigError::Message(
                "Overlay font size must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.overlay.jpeg_quality) {
            return Err(ConfigError::Message(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if let Some(tz) = &self.overlay.timezone {
            tz.parse::<chrono_tz::Tz>().map_err(|_| {
                ConfigError::Message(format!("Unknown overlay timezone '{}'", tz))
            })?;
        }

        if !matches!(self.camera.rotation_degrees, 0 | 90 | 180 | 270) {
            return Err(ConfigError::Message(format!(
                "Camera rotation must be 0, 90, 180 or 270 (got {})",
                self.camera.rotation_degrees
            )));
        }

        if self.collector.max_upload_bytes == 0 {
            return Err(ConfigError::Message(
                "Collector max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for DccamConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_server_host(),
                port: default_server_port(),
                request_timeout_seconds: None,
            },
            credential: CredentialConfig {
                mode: default_credential_mode(),
                shared_key: None,
                store_path: default_credential_store_path(),
                device_label: default_device_label(),
                poll_interval_seconds: default_poll_interval_seconds(),
            },
            validation: ValidationConfig {
                store_code_pattern: default_store_code_pattern(),
                reference_code_pattern: default_reference_code_pattern(),
            },
            overlay: OverlayConfig {
                enabled: default_overlay_enabled(),
                font_path: default_overlay_font_path(),
                font_size: default_overlay_font_size(),
                inset: default_overlay_inset(),
                timezone: None,
                jpeg_quality: default_jpeg_quality(),
            },
            camera: CameraConfig {
                source: default_camera_source(),
                still_path: default_still_path(),
                device_index: default_device_index(),
                resolution: default_camera_resolution(),
                rotation_degrees: 0,
            },
            collector: CollectorConfig {
                bind: default_collector_bind(),
                port: default_server_port(),
                upload_dir: default_upload_dir(),
                registry_path: default_registry_path(),
                admin_key: None,
                max_upload_bytes: default_max_upload_bytes(),
            },
        }
    }
}

// Default value functions
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    6868
}

fn default_credential_mode() -> CredentialMode {
    CredentialMode::Registered
}
fn default_credential_store_path() -> String {
    "./dccam_state/credential".to_string()
}
fn default_device_label() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "Unnamed Device".to_string())
}
fn default_poll_interval_seconds() -> u64 {
    15
}

fn default_store_code_pattern() -> String {
    r"^[0-9]{4}$".to_string()
}
fn default_reference_code_pattern() -> String {
    r"^5[0-9]{9}$".to_string()
}

fn default_overlay_enabled() -> bool {
    true
}
fn default_overlay_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_overlay_font_size() -> f32 {
    50.0
}
fn default_overlay_inset() -> u32 {
    20
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_camera_source() -> CameraSource {
    CameraSource::Still
}
fn default_still_path() -> String {
    "./capture.jpg".to_string()
}
fn default_device_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (1920, 1080)
}

fn default_collector_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_upload_dir() -> String {
    "./uploads".to_string()
}
fn default_registry_path() -> String {
    "./collector_registry.json".to_string()
}
fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}
