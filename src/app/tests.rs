use super::*;
use crate::camera::StillImageSource;
use crate::config::{CredentialMode, DccamConfig};
use crate::credential::MemoryCredentialStore;
use crate::net::{build_http_client, Endpoints, HttpTrustClient, HttpUploadClient};
use crate::processing::ImageProcessor;
use crate::session::Collaborators;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn shared_config(dir: &TempDir) -> DccamConfig {
    let mut config = DccamConfig::default();
    config.credential.mode = CredentialMode::Shared;
    config.credential.shared_key = Some("shared-key".to_string());
    config.credential.store_path = dir.path().join("key.txt").to_string_lossy().into_owned();
    config.overlay.enabled = false;
    config
}

fn offline_collaborators(config: &DccamConfig) -> Collaborators {
    // Nothing listens here; shared mode never reaches the network before a send
    let client = build_http_client(Some(Duration::from_millis(200))).unwrap();
    let endpoints = Endpoints::new("http://127.0.0.1:9");
    Collaborators {
        store: Arc::new(MemoryCredentialStore::new()),
        trust: Arc::new(HttpTrustClient::new(client.clone(), endpoints.clone())),
        uploader: Arc::new(HttpUploadClient::new(client, endpoints)),
        camera: Arc::new(StillImageSource::new("missing.png", 0)),
        processor: Arc::new(ImageProcessor::new(config.overlay.clone())),
    }
}

#[test]
fn test_build_collaborators_from_default_config() {
    let config = DccamConfig::default();
    let deps = build_collaborators(&config).unwrap();
    assert!(deps.camera.describe().starts_with("still image"));
}

#[test]
fn test_shared_mode_without_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = shared_config(&dir);
    config.credential.shared_key = Some("   ".to_string());

    assert!(DccamApp::new(config).is_err());
}

#[tokio::test]
async fn test_run_exits_cleanly_on_cancellation() {
    let dir = TempDir::new().unwrap();
    let config = shared_config(&dir);
    let deps = offline_collaborators(&config);

    let mut app = DccamApp::with_collaborators(config, deps).unwrap();
    app.set_console_enabled(false);
    assert_eq!(app.settings().shared_key.as_deref(), Some("shared-key"));

    let token = app.cancellation_token();
    let running = tokio::spawn(app.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let exit_code = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("app did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
}
