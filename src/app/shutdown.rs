use super::DccamApp;
use crate::error::Result;
use crate::session::{SessionHandle, SessionState};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const CONTROLLER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl DccamApp {
    /// Stop the console and the controller, returning the exit code
    pub(super) async fn shutdown(
        &self,
        handle: SessionHandle,
        controller: JoinHandle<()>,
        console: Option<JoinHandle<Result<()>>>,
    ) -> i32 {
        info!("Beginning graceful shutdown");
        let mut exit_code = 0;

        // In-flight uploads are abandoned; the image was never acknowledged
        if handle.view().state == SessionState::Uploading {
            warn!("Shutting down with an upload in flight");
        }

        if handle.shutdown().await.is_err() {
            info!("Session controller already stopped");
        }

        match timeout(CONTROLLER_STOP_TIMEOUT, controller).await {
            Ok(Ok(())) => info!("Session controller stopped"),
            Ok(Err(e)) => {
                error!("Session controller task failed: {}", e);
                exit_code = 1;
            }
            Err(_) => {
                error!("Session controller stop timeout");
                exit_code = 1;
            }
        }
        self.cancellation_token.cancel();

        if let Some(console) = console {
            // Stdin reads cannot be interrupted, so the console is not awaited
            console.abort();
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        exit_code
    }
}
