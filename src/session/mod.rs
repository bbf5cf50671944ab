//! Capture session controller: credential bootstrap, the capture/review/
//! upload state machine and the view it publishes to rendering code.

mod controller;
mod handle;
mod state;
mod validation;
#[cfg(test)]
mod tests;

pub use controller::{Collaborators, SessionController, SessionSettings};
pub use handle::SessionHandle;
pub use state::{CaptureSession, Command, Notice, SessionState, SessionView, UploadOutcome};
pub use validation::InputValidator;
