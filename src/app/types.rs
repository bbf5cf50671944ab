/// Why the application is shutting down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    OperatorQuit,
    ControllerExited,
}
