use super::*;
use crate::camera::FrameSource;
use crate::config::{CredentialMode, DccamConfig};
use crate::credential::{ApprovalState, MemoryCredentialStore};
use crate::error::{DccamError, InputField, ProcessingStage, Result};
use crate::events::{EventBus, EventFilter, SessionEvent};
use crate::frame::CapturedFrame;
use crate::net::{RegisterResult, StatusResult, TrustClient, UploadClient, UploadResult};
use crate::processing::ImageProcessor;
use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);
const STORE: &str = "0421";
const REFERENCE: &str = "5123456789";

struct FakeTrust {
    register_result: Mutex<RegisterResult>,
    status_result: Mutex<StatusResult>,
    registered: Mutex<Vec<String>>,
    status_calls: AtomicUsize,
    status_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeTrust {
    fn new(register_result: RegisterResult, status_result: StatusResult) -> Self {
        Self {
            register_result: Mutex::new(register_result),
            status_result: Mutex::new(status_result),
            registered: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            status_gate: Mutex::new(None),
        }
    }

    fn set_register(&self, result: RegisterResult) {
        *self.register_result.lock() = result;
    }

    fn set_status(&self, result: StatusResult) {
        *self.status_result.lock() = result;
    }

    fn registered(&self) -> Vec<String> {
        self.registered.lock().clone()
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Make later status checks wait until the returned gate gets a permit
    fn hold_status(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.status_gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl TrustClient for FakeTrust {
    async fn register(&self, token: &str, _device_label: &str) -> RegisterResult {
        self.registered.lock().push(token.to_string());
        self.register_result.lock().clone()
    }

    async fn check_status(&self, _token: &str) -> StatusResult {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.status_gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.status_result.lock().clone()
    }
}

#[derive(Debug, Clone)]
struct UploadCall {
    file_name: String,
    token: String,
    size: usize,
}

#[derive(Default)]
struct FakeUploader {
    results: Mutex<VecDeque<UploadResult>>,
    calls: Mutex<Vec<UploadCall>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeUploader {
    fn responding(results: Vec<UploadResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Default::default()
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<UploadCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl UploadClient for FakeUploader {
    async fn upload(&self, image: Bytes, file_name: &str, token: &str) -> UploadResult {
        self.calls.lock().push(UploadCall {
            file_name: file_name.to_string(),
            token: token.to_string(),
            size: image.len(),
        });
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.results
            .lock()
            .pop_front()
            .unwrap_or(UploadResult::Success {
                server_message: None,
            })
    }
}

#[derive(Default)]
struct FakeCamera {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeCamera {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeCamera {
    async fn acquire_frame(&self) -> Result<CapturedFrame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DccamError::camera("sensor unplugged"));
        }
        Ok(CapturedFrame::new(
            RgbaImage::from_pixel(16, 8, Rgba([120, 80, 40, 255])),
            90,
        ))
    }

    fn describe(&self) -> String {
        "fake camera".to_string()
    }
}

struct Harness {
    handle: SessionHandle,
    store: Arc<MemoryCredentialStore>,
    trust: Arc<FakeTrust>,
    uploader: Arc<FakeUploader>,
    camera: Arc<FakeCamera>,
    events: EventBus,
    task: JoinHandle<()>,
}

struct HarnessBuilder {
    store: MemoryCredentialStore,
    trust: FakeTrust,
    uploader: FakeUploader,
    overlay_enabled: bool,
    poll_interval: Option<Duration>,
    shared_key: Option<String>,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            store: MemoryCredentialStore::new(),
            trust: FakeTrust::new(RegisterResult::Approved, StatusResult::Approved),
            uploader: FakeUploader::default(),
            overlay_enabled: false,
            poll_interval: None,
            shared_key: None,
        }
    }

    /// Stored token that the collector reports as approved
    fn approved() -> Self {
        let mut builder = Self::new();
        builder.store = MemoryCredentialStore::with_token("stored-token");
        builder
    }

    fn trust(mut self, register: RegisterResult, status: StatusResult) -> Self {
        self.trust = FakeTrust::new(register, status);
        self
    }

    fn uploader(mut self, uploader: FakeUploader) -> Self {
        self.uploader = uploader;
        self
    }

    fn broken_overlay(mut self) -> Self {
        self.overlay_enabled = true;
        self
    }

    fn poll_every(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    fn shared(mut self, key: &str) -> Self {
        self.shared_key = Some(key.to_string());
        self
    }

    fn spawn(self) -> Harness {
        let config = DccamConfig::default();
        let mut overlay = config.overlay.clone();
        overlay.enabled = self.overlay_enabled;
        overlay.font_path = "/nonexistent/dccam-test-font.ttf".to_string();

        let settings = SessionSettings {
            credential_mode: if self.shared_key.is_some() {
                CredentialMode::Shared
            } else {
                CredentialMode::Registered
            },
            shared_key: self.shared_key,
            device_label: "bench device".to_string(),
            poll_interval: self.poll_interval,
            validator: InputValidator::from_config(&config.validation).unwrap(),
        };

        let store = Arc::new(self.store);
        let trust = Arc::new(self.trust);
        let uploader = Arc::new(self.uploader);
        let camera = Arc::new(FakeCamera::default());
        let events = EventBus::new(128);

        let deps = Collaborators {
            store: store.clone(),
            trust: trust.clone(),
            uploader: uploader.clone(),
            camera: camera.clone(),
            processor: Arc::new(ImageProcessor::new(overlay)),
        };

        let (handle, task) =
            SessionController::spawn(settings, deps, events.clone(), CancellationToken::new());

        Harness {
            handle,
            store,
            trust,
            uploader,
            camera,
            events,
            task,
        }
    }
}

async fn wait_until<F>(handle: &SessionHandle, what: &str, predicate: F) -> SessionView
where
    F: FnMut(&SessionView) -> bool,
{
    match timeout(WAIT, handle.wait_for(predicate)).await {
        Ok(view) => view.unwrap(),
        Err(_) => panic!("timed out waiting for {}: {:?}", what, handle.view()),
    }
}

async fn wait_state(handle: &SessionHandle, state: SessionState) -> SessionView {
    wait_until(handle, &format!("{:?}", state), |view| view.state == state).await
}

async fn ready(harness: &Harness) -> SessionView {
    harness.handle.start().await.unwrap();
    wait_until(&harness.handle, "ready", |view| view.capture_enabled).await
}

async fn review(harness: &Harness) -> SessionView {
    ready(harness).await;
    harness.handle.capture(STORE, REFERENCE).await.unwrap();
    wait_state(&harness.handle, SessionState::ReviewReady).await
}

#[tokio::test]
async fn test_pending_registration_persists_token_and_blocks_capture() {
    let harness = HarnessBuilder::new()
        .trust(RegisterResult::Pending, StatusResult::NotApproved)
        .spawn();

    harness.handle.start().await.unwrap();
    let view = wait_state(&harness.handle, SessionState::Polling).await;

    assert_eq!(view.approval, ApprovalState::AwaitingApproval);
    assert!(!view.capture_enabled);
    assert_eq!(view.notice, Some(Notice::AwaitingApproval));

    let registered = harness.trust.registered();
    assert_eq!(registered.len(), 1);
    assert_eq!(harness.store.current(), Some(registered[0].clone()));

    harness.handle.capture(STORE, REFERENCE).await.unwrap();
    let view = wait_until(&harness.handle, "capture refusal", |view| {
        matches!(
            view.notice,
            Some(Notice::CommandUnavailable {
                command: "capture",
                ..
            })
        )
    })
    .await;
    assert_eq!(view.state, SessionState::Polling);
    assert_eq!(harness.camera.calls(), 0);
}

#[tokio::test]
async fn test_approved_registration_enters_ready() {
    let harness = HarnessBuilder::new().spawn();

    let view = ready(&harness).await;
    assert_eq!(view.state, SessionState::Ready);
    assert_eq!(view.approval, ApprovalState::Approved);
    assert_eq!(view.notice, Some(Notice::Registered));
    assert!(harness.store.current().is_some());
}

#[tokio::test]
async fn test_registration_failure_clears_token_and_retry_registers_fresh_one() {
    let harness = HarnessBuilder::new()
        .trust(RegisterResult::Failed(500), StatusResult::Approved)
        .spawn();

    harness.handle.start().await.unwrap();
    let view = wait_until(&harness.handle, "registration failure", |view| {
        view.notice == Some(Notice::RegistrationFailed { status: 500 })
    })
    .await;

    assert_eq!(view.state, SessionState::AwaitingCredential);
    assert!(view.credential.is_none());
    assert!(view.retry_enabled);
    assert!(!view.capture_enabled);
    assert_eq!(harness.store.current(), None);

    harness.trust.set_register(RegisterResult::Approved);
    harness.handle.retry().await.unwrap();
    wait_state(&harness.handle, SessionState::Ready).await;

    let registered = harness.trust.registered();
    assert_eq!(registered.len(), 2);
    assert_ne!(registered[0], registered[1]);
    assert_eq!(harness.store.current(), Some(registered[1].clone()));
}

#[tokio::test]
async fn test_registration_connection_failure_reports_cause() {
    let harness = HarnessBuilder::new()
        .trust(
            RegisterResult::ConnectionFailed("connection refused".to_string()),
            StatusResult::Approved,
        )
        .spawn();

    harness.handle.start().await.unwrap();
    let view = wait_until(&harness.handle, "connection failure", |view| {
        view.approval == ApprovalState::ConnectionError
    })
    .await;

    assert_eq!(view.state, SessionState::AwaitingCredential);
    assert_eq!(
        view.notice,
        Some(Notice::ConnectionFailed {
            cause: "connection refused".to_string()
        })
    );
}

#[tokio::test]
async fn test_stored_token_is_checked_before_ready() {
    let harness = HarnessBuilder::approved().spawn();

    let view = ready(&harness).await;
    assert_eq!(view.state, SessionState::Ready);
    assert!(harness.trust.registered().is_empty());
    assert!(harness.trust.status_calls() >= 1);
    assert_eq!(harness.store.current().as_deref(), Some("stored-token"));
}

#[tokio::test]
async fn test_capture_does_not_wait_for_status_check() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;
    let calls_before = harness.trust.status_calls();

    let gate = harness.trust.hold_status();
    harness.handle.capture(STORE, REFERENCE).await.unwrap();

    // The status check is still parked on the gate when review is reached
    let view = wait_state(&harness.handle, SessionState::ReviewReady).await;
    assert!(view.send_enabled);
    assert_eq!(harness.trust.status_calls(), calls_before + 1);
    assert_eq!(harness.camera.calls(), 1);

    gate.add_permits(1);
    harness.handle.retake().await.unwrap();
    let view = wait_state(&harness.handle, SessionState::Ready).await;
    assert_eq!(view.approval, ApprovalState::Approved);
    assert_eq!(harness.trust.status_calls(), calls_before + 1);
}

#[tokio::test]
async fn test_stored_token_not_approved_stays_out_of_ready_until_retry() {
    let harness = HarnessBuilder::approved()
        .trust(RegisterResult::Approved, StatusResult::NotApproved)
        .spawn();

    harness.handle.start().await.unwrap();
    let view = wait_until(&harness.handle, "rejection", |view| {
        view.approval == ApprovalState::Rejected
    })
    .await;
    assert_eq!(view.state, SessionState::Polling);
    assert_eq!(view.notice, Some(Notice::NotApproved));
    assert!(view.retry_enabled);

    harness.trust.set_status(StatusResult::Approved);
    harness.handle.retry().await.unwrap();
    let view = wait_state(&harness.handle, SessionState::Ready).await;
    assert_eq!(view.notice, Some(Notice::Approved));
    assert!(harness.trust.registered().is_empty());
}

#[tokio::test]
async fn test_status_server_error_reflects_reason() {
    let harness = HarnessBuilder::approved()
        .trust(RegisterResult::Approved, StatusResult::ServerError(503))
        .spawn();

    harness.handle.start().await.unwrap();
    let view = wait_until(&harness.handle, "server error", |view| {
        view.notice == Some(Notice::ServerError { status: 503 })
    })
    .await;
    assert_eq!(view.state, SessionState::Polling);
    assert_eq!(view.approval, ApprovalState::Unknown);
}

#[tokio::test]
async fn test_polling_timer_promotes_pending_device() {
    let harness = HarnessBuilder::new()
        .trust(RegisterResult::Pending, StatusResult::NotApproved)
        .poll_every(Duration::from_millis(20))
        .spawn();

    harness.handle.start().await.unwrap();
    wait_state(&harness.handle, SessionState::Polling).await;

    timeout(WAIT, async {
        while harness.trust.status_calls() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // A 401 for a freshly registered key means it is still pending
    assert_eq!(harness.handle.view().approval, ApprovalState::AwaitingApproval);

    harness.trust.set_status(StatusResult::Approved);
    let view = wait_state(&harness.handle, SessionState::Ready).await;
    assert!(view.capture_enabled);
}

#[tokio::test]
async fn test_invalid_store_code_refuses_capture() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;

    harness.handle.capture("M12", REFERENCE).await.unwrap();
    let view = wait_until(&harness.handle, "validation notice", |view| {
        view.focus.is_some()
    })
    .await;

    assert_eq!(
        view.notice,
        Some(Notice::InvalidInput {
            field: InputField::StoreCode
        })
    );
    assert_eq!(view.focus, Some(InputField::StoreCode));
    assert_eq!(view.state, SessionState::Ready);
    assert_eq!(harness.camera.calls(), 0);
}

#[tokio::test]
async fn test_invalid_reference_code_focuses_reference_field() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;

    harness.handle.capture(STORE, "41234").await.unwrap();
    let view = wait_until(&harness.handle, "validation notice", |view| {
        view.focus.is_some()
    })
    .await;
    assert_eq!(view.focus, Some(InputField::ReferenceCode));
    assert_eq!(harness.camera.calls(), 0);
}

#[tokio::test]
async fn test_capture_review_and_successful_send() {
    let harness = HarnessBuilder::approved().spawn();

    let view = review(&harness).await;
    assert!(view.has_processed_image);
    assert!(view.send_enabled && view.retake_enabled);
    assert!(!view.capture_enabled);
    assert_eq!(view.store_code.as_deref(), Some(STORE));
    assert_eq!(harness.camera.calls(), 1);

    harness.handle.send().await.unwrap();
    let view = wait_until(&harness.handle, "upload success", |view| {
        view.state == SessionState::Ready && view.last_upload.is_some()
    })
    .await;

    assert!(!view.has_processed_image);
    assert!(view.store_code.is_none());
    assert_eq!(view.last_upload.unwrap().http_status, Some(200));

    let calls = harness.uploader.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].file_name, "0421_5123456789.jpg");
    assert_eq!(calls[0].token, "stored-token");
    assert!(calls[0].size > 0);
}

#[tokio::test]
async fn test_codes_are_trimmed_before_naming_upload() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;

    harness
        .handle
        .capture(" 0421 ", " 5123456789\n")
        .await
        .unwrap();
    wait_state(&harness.handle, SessionState::ReviewReady).await;
    harness.handle.send().await.unwrap();
    wait_until(&harness.handle, "upload", |view| view.last_upload.is_some()).await;

    assert_eq!(harness.uploader.calls()[0].file_name, "0421_5123456789.jpg");
}

#[tokio::test]
async fn test_unauthorized_upload_returns_to_review_and_keeps_image() {
    let harness = HarnessBuilder::approved()
        .uploader(FakeUploader::responding(vec![UploadResult::Unauthorized]))
        .spawn();
    review(&harness).await;

    harness.handle.send().await.unwrap();
    let view = wait_until(&harness.handle, "unauthorized upload", |view| {
        view.notice == Some(Notice::UploadUnauthorized)
    })
    .await;

    assert_eq!(view.state, SessionState::ReviewReady);
    assert_eq!(view.approval, ApprovalState::Rejected);
    assert!(view.has_processed_image);
    assert!(view.send_enabled && view.retake_enabled);
    assert_eq!(view.last_upload.unwrap().http_status, Some(401));

    // Sending again is refused until the device is approved again
    harness.trust.set_status(StatusResult::NotApproved);
    harness.handle.send().await.unwrap();
    let view = wait_until(&harness.handle, "send refusal", |view| {
        view.notice == Some(Notice::SendRequiresApproval)
    })
    .await;
    assert_eq!(view.state, SessionState::ReviewReady);
    assert!(view.has_processed_image);
    assert_eq!(harness.uploader.calls().len(), 1);
}

#[tokio::test]
async fn test_second_send_while_uploading_is_ignored() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = HarnessBuilder::approved()
        .uploader(FakeUploader::gated(Arc::clone(&gate)))
        .spawn();
    review(&harness).await;

    harness.handle.send().await.unwrap();
    let view = wait_state(&harness.handle, SessionState::Uploading).await;
    assert!(!view.send_enabled && !view.retake_enabled);

    harness.handle.send().await.unwrap();
    wait_until(&harness.handle, "second send refusal", |view| {
        matches!(
            view.notice,
            Some(Notice::CommandUnavailable {
                command: "send",
                state: SessionState::Uploading
            })
        )
    })
    .await;
    assert_eq!(harness.uploader.calls().len(), 1);

    gate.add_permits(1);
    wait_until(&harness.handle, "upload completion", |view| {
        view.state == SessionState::Ready && view.last_upload.is_some()
    })
    .await;
    assert_eq!(harness.uploader.calls().len(), 1);
}

#[tokio::test]
async fn test_failed_upload_can_be_resent_without_recapture() {
    let harness = HarnessBuilder::approved()
        .uploader(FakeUploader::responding(vec![
            UploadResult::Failed {
                status: 500,
                server_message: "disk full".to_string(),
            },
            UploadResult::Success {
                server_message: Some("stored".to_string()),
            },
        ]))
        .spawn();
    review(&harness).await;

    harness.handle.send().await.unwrap();
    let view = wait_until(&harness.handle, "failed upload", |view| {
        view.last_upload.is_some() && view.state == SessionState::ReviewReady
    })
    .await;
    assert_eq!(
        view.notice,
        Some(Notice::UploadFailed {
            status: Some(500),
            message: "disk full".to_string()
        })
    );
    assert!(view.has_processed_image);

    harness.handle.send().await.unwrap();
    let view = wait_state(&harness.handle, SessionState::Ready).await;
    assert_eq!(
        view.last_upload.unwrap().server_message.as_deref(),
        Some("stored")
    );
    assert_eq!(harness.uploader.calls().len(), 2);
    assert_eq!(harness.camera.calls(), 1);
}

#[tokio::test]
async fn test_connection_failure_during_upload_returns_to_review() {
    let harness = HarnessBuilder::approved()
        .uploader(FakeUploader::responding(vec![UploadResult::ConnectionFailed(
            "timed out".to_string(),
        )]))
        .spawn();
    review(&harness).await;

    harness.handle.send().await.unwrap();
    let view = wait_until(&harness.handle, "connection failure", |view| {
        view.last_upload.is_some()
    })
    .await;
    assert_eq!(view.state, SessionState::ReviewReady);
    assert_eq!(view.approval, ApprovalState::Approved);
    assert_eq!(view.last_upload.unwrap().http_status, None);
}

#[tokio::test]
async fn test_retake_discards_processed_image() {
    let harness = HarnessBuilder::approved().spawn();
    review(&harness).await;

    harness.handle.retake().await.unwrap();
    let view = wait_state(&harness.handle, SessionState::Ready).await;
    assert!(!view.has_processed_image);
    assert!(view.capture_enabled);
    assert!(harness.uploader.calls().is_empty());
}

#[tokio::test]
async fn test_retake_outside_review_is_rejected() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;

    harness.handle.retake().await.unwrap();
    let view = wait_until(&harness.handle, "retake refusal", |view| {
        matches!(view.notice, Some(Notice::CommandUnavailable { .. }))
    })
    .await;
    assert_eq!(
        view.notice,
        Some(Notice::CommandUnavailable {
            command: "retake",
            state: SessionState::Ready
        })
    );
}

#[tokio::test]
async fn test_camera_failure_returns_to_ready() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;
    harness.camera.fail.store(true, Ordering::SeqCst);

    harness.handle.capture(STORE, REFERENCE).await.unwrap();
    let view = wait_until(&harness.handle, "capture failure", |view| {
        matches!(view.notice, Some(Notice::CaptureFailed { .. }))
    })
    .await;
    assert_eq!(view.state, SessionState::Ready);
    assert!(!view.has_processed_image);
}

#[tokio::test]
async fn test_processing_failure_returns_to_ready() {
    let harness = HarnessBuilder::approved().broken_overlay().spawn();
    ready(&harness).await;

    harness.handle.capture(STORE, REFERENCE).await.unwrap();
    let view = wait_until(&harness.handle, "processing failure", |view| {
        matches!(view.notice, Some(Notice::ProcessingFailed { .. }))
    })
    .await;

    assert_eq!(view.state, SessionState::Ready);
    assert!(!view.has_processed_image);
    match view.notice {
        Some(Notice::ProcessingFailed { stage, .. }) => {
            assert_eq!(stage, ProcessingStage::Timestamp)
        }
        other => panic!("unexpected notice {:?}", other),
    }
}

#[tokio::test]
async fn test_shared_mode_skips_registration_and_status() {
    let harness = HarnessBuilder::new().shared("fleet-key").spawn();

    let view = ready(&harness).await;
    assert_eq!(view.approval, ApprovalState::Approved);

    harness.handle.capture(STORE, REFERENCE).await.unwrap();
    wait_state(&harness.handle, SessionState::ReviewReady).await;
    harness.handle.send().await.unwrap();
    wait_until(&harness.handle, "upload", |view| view.last_upload.is_some()).await;

    assert!(harness.trust.registered().is_empty());
    assert_eq!(harness.trust.status_calls(), 0);
    assert_eq!(harness.uploader.calls()[0].token, "fleet-key");
    assert_eq!(harness.store.current(), None);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;

    harness.handle.start().await.unwrap();
    let view = wait_until(&harness.handle, "start refusal", |view| {
        matches!(view.notice, Some(Notice::CommandUnavailable { .. }))
    })
    .await;
    assert_eq!(
        view.notice,
        Some(Notice::CommandUnavailable {
            command: "start",
            state: SessionState::Ready
        })
    );
}

#[tokio::test]
async fn test_events_describe_transitions() {
    let harness = HarnessBuilder::approved().spawn();
    let mut receiver = harness.events.subscribe_filtered(
        EventFilter::EventTypes(vec!["state_changed", "upload_succeeded"]),
        "test",
    );

    review(&harness).await;
    harness.handle.send().await.unwrap();

    let mut transitions = Vec::new();
    loop {
        let event = timeout(WAIT, receiver.recv()).await.unwrap().unwrap();
        match event {
            SessionEvent::StateChanged { to, .. } => transitions.push(to),
            SessionEvent::UploadSucceeded { file_name, .. } => {
                assert_eq!(file_name, "0421_5123456789.jpg");
                break;
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(
        transitions,
        vec![
            SessionState::Polling,
            SessionState::Ready,
            SessionState::Capturing,
            SessionState::Processing,
            SessionState::ReviewReady,
            SessionState::Uploading,
        ]
    );
}

#[tokio::test]
async fn test_shutdown_stops_controller() {
    let harness = HarnessBuilder::approved().spawn();
    ready(&harness).await;

    harness.handle.shutdown().await.unwrap();
    timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert!(harness.handle.start().await.is_err());
}

#[test]
fn test_settings_require_shared_key_in_shared_mode() {
    let mut config = DccamConfig::default();
    config.credential.mode = CredentialMode::Shared;
    config.credential.shared_key = Some("  ".to_string());
    assert!(SessionSettings::from_config(&config).is_err());

    config.credential.shared_key = Some("fleet".to_string());
    let settings = SessionSettings::from_config(&config).unwrap();
    assert_eq!(settings.shared_key.as_deref(), Some("fleet"));
}

#[test]
fn test_upload_file_name() {
    let session = CaptureSession::new(STORE.to_string(), REFERENCE.to_string());
    assert_eq!(session.file_name(), "0421_5123456789.jpg");
}
