mod orchestrator;
mod runtime;
mod shutdown;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::{build_collaborators, DccamApp};
pub use types::ShutdownReason;
