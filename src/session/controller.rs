use super::handle::SessionHandle;
use super::state::{
    CaptureSession, Command, Notice, SessionState, SessionView, UploadOutcome,
};
use super::validation::InputValidator;
use crate::camera::FrameSource;
use crate::config::{CredentialMode, DccamConfig};
use crate::credential::{ApprovalState, CredentialStore, DeviceCredential};
use crate::error::{DccamError, InputField, ProcessingError, ProcessingStage, Result};
use crate::events::{EventBus, SessionEvent};
use crate::frame::CapturedFrame;
use crate::net::{RegisterResult, StatusResult, TrustClient, UploadClient, UploadResult};
use crate::processing::{ImageProcessor, ProcessedImage};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const QUEUE_CAPACITY: usize = 32;

/// Behavioural settings of one controller instance
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub credential_mode: CredentialMode,
    pub shared_key: Option<String>,
    pub device_label: String,
    /// Automatic status checks while in `Polling`; `None` disables them
    pub poll_interval: Option<Duration>,
    pub validator: InputValidator,
}

impl SessionSettings {
    pub fn from_config(config: &DccamConfig) -> Result<Self> {
        let shared_key = match config.credential.mode {
            CredentialMode::Shared => Some(
                config
                    .credential
                    .shared_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| DccamError::system("Shared credential mode requires shared_key"))?,
            ),
            CredentialMode::Registered => None,
        };

        Ok(Self {
            credential_mode: config.credential.mode,
            shared_key,
            device_label: config.credential.device_label.clone(),
            poll_interval: config.credential.poll_interval(),
            validator: InputValidator::from_config(&config.validation)?,
        })
    }
}

/// Everything the controller talks to, injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn CredentialStore>,
    pub trust: Arc<dyn TrustClient>,
    pub uploader: Arc<dyn UploadClient>,
    pub camera: Arc<dyn FrameSource>,
    pub processor: Arc<ImageProcessor>,
}

pub(crate) enum Message {
    Command(Command),
    Completion(Completion),
}

/// Results of off-task work, marshalled back onto the controller queue
pub(crate) enum Completion {
    Registered {
        token: String,
        result: RegisterResult,
    },
    Status {
        token: String,
        result: StatusResult,
    },
    Frame(Result<CapturedFrame>),
    Processed(std::result::Result<ProcessedImage, ProcessingError>),
    Uploaded {
        file_name: String,
        result: UploadResult,
    },
}

/// Owns the device credential and the capture session.
///
/// All transitions happen on the controller task, one message at a time.
/// Network calls, frame acquisition and image processing run on other
/// tasks and report back through the same queue as operator commands.
pub struct SessionController {
    settings: SessionSettings,
    deps: Collaborators,
    events: EventBus,
    view_tx: watch::Sender<SessionView>,
    outbox: mpsc::Sender<Message>,

    state: SessionState,
    credential: Option<DeviceCredential>,
    /// Displayed approval while no credential is held
    unbound_approval: ApprovalState,
    /// Registration answered 202, so a 401 means "still pending"
    registered_pending: bool,
    session: Option<CaptureSession>,
    started: bool,
    status_in_flight: bool,
    focus: Option<InputField>,
    notice: Option<Notice>,
    last_upload: Option<UploadOutcome>,
}

impl SessionController {
    /// Spawn the controller task and return a handle to drive it
    pub fn spawn(
        settings: SessionSettings,
        deps: Collaborators,
        events: EventBus,
        shutdown: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (outbox, inbox) = mpsc::channel(QUEUE_CAPACITY);
        let (view_tx, view_rx) = watch::channel(SessionView::default());

        let controller = Self {
            settings,
            deps,
            events: events.clone(),
            view_tx,
            outbox: outbox.clone(),
            state: SessionState::AwaitingCredential,
            credential: None,
            unbound_approval: ApprovalState::Unknown,
            registered_pending: false,
            session: None,
            started: false,
            status_in_flight: false,
            focus: None,
            notice: None,
            last_upload: None,
        };

        let task = tokio::spawn(controller.run(inbox, shutdown));
        (SessionHandle::new(outbox, view_rx, events), task)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Message>, shutdown: CancellationToken) {
        info!(
            "Session controller running ({:?} credential mode)",
            self.settings.credential_mode
        );

        let mut poll_timer = self.settings.poll_interval.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        self.publish_view();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Session controller cancelled");
                    break;
                }
                message = inbox.recv() => match message {
                    Some(Message::Command(Command::Shutdown)) | None => {
                        info!("Session controller shutting down");
                        break;
                    }
                    Some(Message::Command(command)) => self.handle_command(command),
                    Some(Message::Completion(completion)) => self.handle_completion(completion),
                },
                _ = next_poll(&mut poll_timer) => self.on_poll_tick(),
            }
            self.publish_view();
        }

        self.events.publish(SessionEvent::Shutdown {
            timestamp: SystemTime::now(),
        });
    }

    fn handle_command(&mut self, command: Command) {
        debug!("Command '{}' in state {:?}", command.name(), self.state);
        match command {
            Command::Start => self.start(),
            Command::Capture {
                store_code,
                reference_code,
            } => self.capture(&store_code, &reference_code),
            Command::Retake => self.retake(),
            Command::Send => self.send(),
            Command::Retry => self.retry(),
            Command::RefreshStatus => self.refresh_status(),
            Command::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Registered { token, result } => self.on_registered(token, result),
            Completion::Status { token, result } => self.on_status(token, result),
            Completion::Frame(result) => self.on_frame(result),
            Completion::Processed(result) => self.on_processed(result),
            Completion::Uploaded { file_name, result } => self.on_uploaded(file_name, result),
        }
    }

    // Operator commands

    fn start(&mut self) {
        if self.started {
            return self.reject("start");
        }
        self.started = true;

        if let Some(key) = self.settings.shared_key.clone() {
            info!("Using shared device key");
            self.credential = Some(DeviceCredential::with_token(key));
            self.set_approval(ApprovalState::Approved);
            self.transition(SessionState::Ready);
            return;
        }

        match self.deps.store.load() {
            Ok(Some(token)) => {
                let credential = DeviceCredential::with_token(token);
                info!("Loaded stored credential {}", credential.redacted());
                self.credential = Some(credential);
                self.transition(SessionState::Polling);
                self.request_status();
            }
            Ok(None) => {
                info!("No stored credential, registering a new one");
                self.begin_registration();
            }
            Err(e) => {
                error!("Failed to load stored credential: {}", e);
                self.notify(Notice::CredentialStoreFailed {
                    details: e.to_string(),
                });
            }
        }
    }

    fn capture(&mut self, store_code: &str, reference_code: &str) {
        if !self.capture_enabled() {
            return self.reject("capture");
        }

        let (store_code, reference_code) =
            match self.settings.validator.validate(store_code, reference_code) {
                Ok(codes) => codes,
                Err(e) => {
                    info!("Capture refused: {}", e);
                    self.focus = Some(e.field);
                    return self.notify(Notice::InvalidInput { field: e.field });
                }
            };

        info!("Capturing {} / {}", store_code, reference_code);
        self.focus = None;
        self.notice = None;
        self.session = Some(CaptureSession::new(store_code, reference_code));
        self.transition(SessionState::Capturing);

        // Opportunistic: the frame request does not wait for this
        self.request_status();

        let camera = Arc::clone(&self.deps.camera);
        self.dispatch(async move { Completion::Frame(camera.acquire_frame().await) });
    }

    fn retake(&mut self) {
        if self.state != SessionState::ReviewReady {
            return self.reject("retake");
        }
        info!("Discarding processed image for retake");
        self.session = None;
        self.transition(self.idle_state());
    }

    fn send(&mut self) {
        if self.state != SessionState::ReviewReady {
            return self.reject("send");
        }
        if !self.approval().is_approved() {
            warn!("Send refused, approval is {:?}", self.approval());
            self.notify(Notice::SendRequiresApproval);
            self.request_status();
            return;
        }

        let prepared = match (self.session.as_ref(), self.credential.as_ref()) {
            (Some(session), Some(credential)) => session.processed.as_ref().map(|processed| {
                (
                    session.file_name(),
                    processed.jpeg.clone(),
                    credential.token.clone(),
                )
            }),
            _ => None,
        };
        let Some((file_name, body, token)) = prepared else {
            error!("Review state without a processed image or credential");
            self.session = None;
            return self.transition(self.idle_state());
        };

        info!("Uploading {} ({} bytes)", file_name, body.len());
        self.transition(SessionState::Uploading);

        let uploader = Arc::clone(&self.deps.uploader);
        self.dispatch(async move {
            let result = uploader.upload(body, &file_name, &token).await;
            Completion::Uploaded { file_name, result }
        });
    }

    fn retry(&mut self) {
        if !self.started {
            return self.reject("retry");
        }
        match self.state {
            SessionState::AwaitingCredential => self.begin_registration(),
            SessionState::Polling if self.settings.shared_key.is_some() => {
                info!("Re-asserting shared device key");
                self.set_approval(ApprovalState::Approved);
                self.transition(SessionState::Ready);
            }
            SessionState::Polling => self.request_status(),
            _ => self.reject("retry"),
        }
    }

    fn refresh_status(&mut self) {
        if self.credential.is_none() || self.state == SessionState::Registering {
            return self.reject("status");
        }
        self.request_status();
    }

    fn on_poll_tick(&mut self) {
        if self.state == SessionState::Polling {
            self.request_status();
        }
    }

    // Credential lifecycle

    fn begin_registration(&mut self) {
        let credential = DeviceCredential::generate();
        info!("Registering new credential {}", credential.redacted());
        let token = credential.token.clone();
        self.credential = Some(credential);
        self.registered_pending = false;
        self.transition(SessionState::Registering);

        let trust = Arc::clone(&self.deps.trust);
        let label = self.settings.device_label.clone();
        self.dispatch(async move {
            let result = trust.register(&token, &label).await;
            Completion::Registered { token, result }
        });
    }

    fn on_registered(&mut self, token: String, result: RegisterResult) {
        if self.state != SessionState::Registering || !self.holds_token(&token) {
            debug!("Ignoring stale registration result");
            return;
        }

        match result {
            RegisterResult::Approved => {
                self.persist_token(&token);
                self.set_approval(ApprovalState::Approved);
                self.transition(SessionState::Ready);
                self.notify(Notice::Registered);
            }
            RegisterResult::Pending => {
                self.persist_token(&token);
                self.registered_pending = true;
                self.set_approval(ApprovalState::AwaitingApproval);
                self.transition(SessionState::Polling);
                self.notify(Notice::AwaitingApproval);
            }
            RegisterResult::Failed(status) => {
                warn!("Registration failed with HTTP {}", status);
                self.drop_credential(ApprovalState::Unknown);
                self.notify(Notice::RegistrationFailed { status });
            }
            RegisterResult::ConnectionFailed(cause) => {
                warn!("Registration could not reach the collector: {}", cause);
                self.drop_credential(ApprovalState::ConnectionError);
                self.notify(Notice::ConnectionFailed { cause });
            }
        }
    }

    fn drop_credential(&mut self, approval: ApprovalState) {
        self.credential = None;
        self.registered_pending = false;
        self.set_approval(approval);
        self.transition(SessionState::AwaitingCredential);
    }

    fn persist_token(&mut self, token: &str) {
        match self.deps.store.save(token) {
            Ok(()) => debug!("Persisted device credential"),
            Err(e) => {
                error!("Failed to persist device credential: {}", e);
                self.notify(Notice::CredentialStoreFailed {
                    details: e.to_string(),
                });
            }
        }
    }

    fn request_status(&mut self) {
        if self.settings.shared_key.is_some() || self.status_in_flight {
            return;
        }
        let Some(credential) = self.credential.as_ref() else {
            return;
        };

        self.status_in_flight = true;
        let token = credential.token.clone();
        let trust = Arc::clone(&self.deps.trust);
        self.dispatch(async move {
            let result = trust.check_status(&token).await;
            Completion::Status { token, result }
        });
    }

    fn on_status(&mut self, token: String, result: StatusResult) {
        self.status_in_flight = false;
        if !self.holds_token(&token) {
            debug!("Ignoring status for a replaced credential");
            return;
        }

        let current = self.approval();
        match result {
            StatusResult::Approved => {
                self.registered_pending = false;
                self.set_approval(ApprovalState::Approved);
                if current != ApprovalState::Approved {
                    self.notify(Notice::Approved);
                }
                if self.state == SessionState::Polling {
                    self.transition(SessionState::Ready);
                }
            }
            StatusResult::NotApproved => {
                let approval = if self.registered_pending {
                    ApprovalState::AwaitingApproval
                } else {
                    ApprovalState::Rejected
                };
                self.set_approval(approval);
                if current != approval {
                    self.notify(Notice::NotApproved);
                }
                if self.state == SessionState::Ready {
                    self.transition(SessionState::Polling);
                }
            }
            StatusResult::ServerError(status) => {
                if !matches!(
                    current,
                    ApprovalState::Approved | ApprovalState::AwaitingApproval
                ) {
                    self.set_approval(ApprovalState::Unknown);
                }
                self.notify(Notice::ServerError { status });
            }
            StatusResult::ConnectionFailed(cause) => {
                if !matches!(
                    current,
                    ApprovalState::Approved | ApprovalState::AwaitingApproval
                ) {
                    self.set_approval(ApprovalState::ConnectionError);
                }
                self.notify(Notice::ConnectionFailed { cause });
            }
        }
    }

    // Capture pipeline

    fn on_frame(&mut self, result: Result<CapturedFrame>) {
        if self.state != SessionState::Capturing {
            debug!("Ignoring frame delivered in state {:?}", self.state);
            return;
        }

        match result {
            Ok(frame) => {
                debug!("Frame {}x{} acquired", frame.width(), frame.height());
                self.transition(SessionState::Processing);
                let processor = Arc::clone(&self.deps.processor);
                self.dispatch(async move {
                    let result = tokio::task::spawn_blocking(move || processor.process(frame))
                        .await
                        .unwrap_or_else(|e| {
                            Err(ProcessingError::new(
                                ProcessingStage::Orientation,
                                format!("processing task failed: {}", e),
                            ))
                        });
                    Completion::Processed(result)
                });
            }
            Err(e) => {
                warn!("Frame acquisition failed: {}", e);
                self.session = None;
                self.transition(self.idle_state());
                self.notify(Notice::CaptureFailed {
                    details: e.to_string(),
                });
            }
        }
    }

    fn on_processed(&mut self, result: std::result::Result<ProcessedImage, ProcessingError>) {
        if self.state != SessionState::Processing {
            debug!("Ignoring processing result in state {:?}", self.state);
            return;
        }

        let processed = match result {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Image processing failed: {}", e);
                self.session = None;
                self.transition(self.idle_state());
                return self.notify(Notice::ProcessingFailed {
                    stage: e.stage,
                    details: e.details,
                });
            }
        };

        let (width, height) = processed.dimensions();
        match self.session.as_mut() {
            Some(session) => session.processed = Some(processed),
            None => {
                error!("Processed image arrived without a session");
                return self.transition(self.idle_state());
            }
        }
        info!("Image ready for review ({}x{})", width, height);
        self.transition(SessionState::ReviewReady);
    }

    fn on_uploaded(&mut self, file_name: String, result: UploadResult) {
        if self.state != SessionState::Uploading {
            debug!("Ignoring upload result in state {:?}", self.state);
            return;
        }

        match result {
            UploadResult::Success { server_message } => {
                let outcome = UploadOutcome {
                    http_status: Some(200),
                    server_message,
                };
                self.last_upload = Some(outcome.clone());
                self.events.publish(SessionEvent::UploadSucceeded {
                    file_name: file_name.clone(),
                    outcome,
                });
                self.session = None;
                self.transition(self.idle_state());
                self.notify(Notice::UploadSucceeded { file_name });
            }
            UploadResult::Unauthorized => {
                self.registered_pending = false;
                self.set_approval(ApprovalState::Rejected);
                self.upload_failed(file_name, Some(401), None, Notice::UploadUnauthorized);
            }
            UploadResult::Failed {
                status,
                server_message,
            } => {
                let notice = Notice::UploadFailed {
                    status: Some(status),
                    message: server_message.clone(),
                };
                self.upload_failed(file_name, Some(status), Some(server_message), notice);
            }
            UploadResult::ConnectionFailed(cause) => {
                let notice = Notice::UploadFailed {
                    status: None,
                    message: cause.clone(),
                };
                self.upload_failed(file_name, None, Some(cause), notice);
            }
        }
    }

    /// Back to review with the processed image retained
    fn upload_failed(
        &mut self,
        file_name: String,
        http_status: Option<u16>,
        server_message: Option<String>,
        notice: Notice,
    ) {
        let outcome = UploadOutcome {
            http_status,
            server_message,
        };
        self.last_upload = Some(outcome.clone());
        self.events
            .publish(SessionEvent::UploadFailed { file_name, outcome });
        self.transition(SessionState::ReviewReady);
        self.notify(notice);
    }

    // Helpers

    fn dispatch<F>(&self, work: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            let completion = work.await;
            if outbox.send(Message::Completion(completion)).await.is_err() {
                debug!("Session controller stopped before a result was delivered");
            }
        });
    }

    fn holds_token(&self, token: &str) -> bool {
        self.credential
            .as_ref()
            .map_or(false, |credential| credential.token == token)
    }

    fn approval(&self) -> ApprovalState {
        self.credential
            .as_ref()
            .map_or(self.unbound_approval, |credential| credential.approval)
    }

    fn set_approval(&mut self, to: ApprovalState) {
        let from = self.approval();
        match self.credential.as_mut() {
            Some(credential) => credential.approval = to,
            None => self.unbound_approval = to,
        }
        if from != to {
            self.events.publish(SessionEvent::ApprovalChanged {
                from,
                to,
                timestamp: SystemTime::now(),
            });
        }
    }

    /// Where the operator lands when no session is live
    fn idle_state(&self) -> SessionState {
        if self.approval().is_approved() {
            SessionState::Ready
        } else {
            SessionState::Polling
        }
    }

    fn capture_enabled(&self) -> bool {
        self.state == SessionState::Ready && self.approval().is_approved()
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        info!("Session state {:?} -> {:?}", from, to);
        self.state = to;
        self.events.publish(SessionEvent::StateChanged {
            from,
            to,
            timestamp: SystemTime::now(),
        });
    }

    fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice.clone());
        self.events.publish(SessionEvent::Notice { notice });
    }

    fn reject(&mut self, command: &'static str) {
        warn!("Rejected '{}' while {:?}", command, self.state);
        self.notify(Notice::CommandUnavailable {
            command,
            state: self.state,
        });
    }

    fn view(&self) -> SessionView {
        let in_review = self.state == SessionState::ReviewReady;
        SessionView {
            state: self.state,
            approval: self.approval(),
            capture_enabled: self.capture_enabled(),
            send_enabled: in_review,
            retake_enabled: in_review,
            retry_enabled: self.started
                && matches!(
                    self.state,
                    SessionState::AwaitingCredential | SessionState::Polling
                ),
            focus: self.focus,
            notice: self.notice.clone(),
            last_upload: self.last_upload.clone(),
            has_processed_image: self
                .session
                .as_ref()
                .map_or(false, |session| session.processed.is_some()),
            store_code: self.session.as_ref().map(|s| s.store_code.clone()),
            reference_code: self.session.as_ref().map(|s| s.reference_code.clone()),
            credential: self.credential.as_ref().map(|c| c.redacted()),
        }
    }

    fn publish_view(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

async fn next_poll(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
