use super::controller::Message;
use super::state::{Command, SessionView};
use crate::error::{DccamError, Result};
use crate::events::{EventBus, EventFilter, EventReceiver};
use tokio::sync::{mpsc, watch};

/// Cloneable front door to a running session controller
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Message>,
    view: watch::Receiver<SessionView>,
    events: EventBus,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Message>,
        view: watch::Receiver<SessionView>,
        events: EventBus,
    ) -> Self {
        Self {
            commands,
            view,
            events,
        }
    }

    /// Queue a command; fails only once the controller has exited
    pub async fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(Message::Command(command))
            .await
            .map_err(|_| DccamError::system("Session controller is not running"))
    }

    pub async fn start(&self) -> Result<()> {
        self.command(Command::Start).await
    }

    pub async fn capture(&self, store_code: &str, reference_code: &str) -> Result<()> {
        self.command(Command::Capture {
            store_code: store_code.to_string(),
            reference_code: reference_code.to_string(),
        })
        .await
    }

    pub async fn retake(&self) -> Result<()> {
        self.command(Command::Retake).await
    }

    pub async fn send(&self) -> Result<()> {
        self.command(Command::Send).await
    }

    pub async fn retry(&self) -> Result<()> {
        self.command(Command::Retry).await
    }

    pub async fn refresh_status(&self) -> Result<()> {
        self.command(Command::RefreshStatus).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown).await
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every view change
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait until the published view satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<SessionView>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut view = self.view.clone();
        let snapshot = view
            .wait_for(predicate)
            .await
            .map_err(|_| DccamError::system("Session controller is not running"))?
            .clone();
        Ok(snapshot)
    }

    pub fn subscribe(&self, filter: EventFilter, name: &str) -> EventReceiver {
        self.events.subscribe_filtered(filter, name)
    }
}
