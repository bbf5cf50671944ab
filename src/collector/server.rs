use super::handlers::{
    allow_device, check_status, deny_device, list_devices, list_pending, register_key,
    update_name, upload_image,
};
use super::registry::DeviceRegistry;
use super::storage::UploadStorage;
use crate::config::CollectorConfig;
use crate::error::{DccamError, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the collector routes
#[derive(Clone)]
pub struct CollectorState {
    pub(crate) registry: Arc<DeviceRegistry>,
    pub(crate) storage: UploadStorage,
    pub(crate) admin_key: Option<String>,
}

impl CollectorState {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        storage: UploadStorage,
        admin_key: Option<String>,
    ) -> Self {
        Self {
            registry,
            storage,
            admin_key: admin_key.filter(|key| !key.is_empty()),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }
}

/// Build the collector router
pub fn router(state: CollectorState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/register_key", post(register_key))
        .route("/check_status", post(check_status))
        .route("/upload_image", post(upload_image))
        .route("/admin/devices", get(list_devices))
        .route("/admin/pending", get(list_pending))
        .route("/admin/allow_device", post(allow_device))
        .route("/admin/deny_device", post(deny_device))
        .route("/admin/update_name", post(update_name))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP collector that registers devices and stores their photos
pub struct CollectorServer {
    config: CollectorConfig,
    state: CollectorState,
}

impl CollectorServer {
    pub fn new(config: CollectorConfig, state: CollectorState) -> Self {
        Self { config, state }
    }

    /// Open the registry and upload directory named by the configuration
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let registry = Arc::new(DeviceRegistry::open(&config.registry_path)?);
        let storage = UploadStorage::new(&config.upload_dir);
        std::fs::create_dir_all(storage.root())?;

        Ok(Self::new(
            config.clone(),
            CollectorState::new(registry, storage, config.admin_key.clone()),
        ))
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.bind, self.config.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| DccamError::system(format!("Failed to bind {}: {}", addr, e)))
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        if self.state.admin_key.is_none() {
            info!("No admin key configured, admin endpoints are disabled");
        }
        info!(
            "Collector listening on {} (uploads in {})",
            addr,
            self.state.storage.root().display()
        );

        let app = router(self.state, self.config.max_upload_bytes);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| DccamError::system(format!("Collector server error: {}", e)))?;

        info!("Collector stopped");
        Ok(())
    }
}
