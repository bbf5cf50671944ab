pub mod app;
pub mod camera;
pub mod config;
pub mod console;
pub mod credential;
pub mod error;
pub mod events;
pub mod frame;
pub mod net;
mod persist;
pub mod processing;
pub mod session;

#[cfg(feature = "collector")]
pub mod collector;

pub use app::{DccamApp, ShutdownReason};
pub use config::DccamConfig;
pub use error::{DccamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, SessionEvent};
pub use session::{Command, SessionController, SessionHandle, SessionState, SessionView};

#[cfg(feature = "collector")]
pub use collector::{CollectorServer, CollectorState};
