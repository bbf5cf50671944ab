use crate::camera::build_frame_source;
use crate::config::DccamConfig;
use crate::credential::FileCredentialStore;
use crate::error::Result;
use crate::events::EventBus;
use crate::net::{build_http_client, Endpoints, HttpTrustClient, HttpUploadClient};
use crate::processing::ImageProcessor;
use crate::session::{Collaborators, SessionSettings};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const EVENT_BUS_CAPACITY: usize = 100;

/// Wire the production collaborators named by the configuration
pub fn build_collaborators(config: &DccamConfig) -> Result<Collaborators> {
    let client = build_http_client(config.server.request_timeout())?;
    let endpoints = Endpoints::from_config(&config.server);
    let camera = build_frame_source(&config.camera)?;

    info!(
        "Collector at {}, camera source: {}",
        endpoints.base_url(),
        camera.describe()
    );

    Ok(Collaborators {
        store: Arc::new(FileCredentialStore::new(&config.credential.store_path)),
        trust: Arc::new(HttpTrustClient::new(client.clone(), endpoints.clone())),
        uploader: Arc::new(HttpUploadClient::new(client, endpoints)),
        camera,
        processor: Arc::new(ImageProcessor::new(config.overlay.clone())),
    })
}

/// Top-level application: one session controller plus the operator console
pub struct DccamApp {
    pub(super) config: DccamConfig,
    pub(super) settings: SessionSettings,
    pub(super) deps: Collaborators,
    pub(super) event_bus: EventBus,
    pub(super) console_enabled: bool,
    pub(super) cancellation_token: CancellationToken,
}

impl DccamApp {
    pub fn new(config: DccamConfig) -> Result<Self> {
        let deps = build_collaborators(&config)?;
        Self::with_collaborators(config, deps)
    }

    /// Build around caller-supplied collaborators
    pub fn with_collaborators(config: DccamConfig, deps: Collaborators) -> Result<Self> {
        let settings = SessionSettings::from_config(&config)?;

        Ok(Self {
            config,
            settings,
            deps,
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
            console_enabled: true,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Run without reading operator commands from stdin
    pub fn set_console_enabled(&mut self, enabled: bool) {
        self.console_enabled = enabled;
    }

    pub fn config(&self) -> &DccamConfig {
        &self.config
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Token that stops the whole application when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
