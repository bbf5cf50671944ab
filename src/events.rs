use crate::credential::ApprovalState;
use crate::session::{Notice, SessionState, UploadOutcome};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Transient events emitted by the session controller
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The controller moved between states
    StateChanged {
        from: SessionState,
        to: SessionState,
        timestamp: SystemTime,
    },
    /// The displayed approval state of the device credential changed
    ApprovalChanged {
        from: ApprovalState,
        to: ApprovalState,
        timestamp: SystemTime,
    },
    /// A processed image was accepted by the collector
    UploadSucceeded {
        file_name: String,
        outcome: UploadOutcome,
    },
    /// An upload attempt resolved without success
    UploadFailed {
        file_name: String,
        outcome: UploadOutcome,
    },
    /// Human-readable notice for the operator
    Notice { notice: Notice },
    /// The controller loop is exiting
    Shutdown { timestamp: SystemTime },
}

impl SessionEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::StateChanged { from, to, .. } => {
                format!("State {:?} -> {:?}", from, to)
            }
            SessionEvent::ApprovalChanged { from, to, .. } => {
                format!("Approval {:?} -> {:?}", from, to)
            }
            SessionEvent::UploadSucceeded { file_name, .. } => {
                format!("Uploaded {}", file_name)
            }
            SessionEvent::UploadFailed { file_name, outcome } => {
                format!(
                    "Upload of {} failed (status {:?})",
                    file_name, outcome.http_status
                )
            }
            SessionEvent::Notice { notice } => notice.to_string(),
            SessionEvent::Shutdown { .. } => "Session controller shut down".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "state_changed",
            SessionEvent::ApprovalChanged { .. } => "approval_changed",
            SessionEvent::UploadSucceeded { .. } => "upload_succeeded",
            SessionEvent::UploadFailed { .. } => "upload_failed",
            SessionEvent::Notice { .. } => "notice",
            SessionEvent::Shutdown { .. } => "shutdown",
        }
    }
}

/// Event bus for rendering collaborators using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: SessionEvent) -> usize {
        match &event {
            SessionEvent::UploadSucceeded { file_name, .. } => {
                info!("Upload succeeded: {}", file_name);
            }
            SessionEvent::UploadFailed { file_name, outcome } => {
                warn!(
                    "Upload of {} failed: status={:?} message={:?}",
                    file_name, outcome.http_status, outcome.server_message
                );
            }
            SessionEvent::ApprovalChanged { from, to, .. } => {
                info!("Approval state changed: {:?} -> {:?}", from, to);
            }
            _ => {
                if self.debug_logging {
                    debug!("Publishing event: {}", event.description());
                }
            }
        }

        // No subscribers is not an error for a rendering bus
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SessionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<SessionEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event; `None` once the bus is closed
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return None;
                }
            }
        }
    }
}
