use super::{DccamApp, ShutdownReason};
use crate::console::OperatorConsole;
use crate::error::Result;
use crate::session::SessionController;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

impl DccamApp {
    /// Run until a signal, an operator quit or the controller exiting.
    /// Returns the process exit code.
    pub async fn run(self) -> Result<i32> {
        info!("DCCam is running");

        let (handle, controller) = SessionController::spawn(
            self.settings.clone(),
            self.deps.clone(),
            self.event_bus.clone(),
            self.cancellation_token.child_token(),
        );
        handle.start().await?;

        let (reason_tx, mut reason_rx) = mpsc::channel::<ShutdownReason>(4);
        self.setup_signal_handlers(reason_tx.clone());

        let console = if self.console_enabled {
            let console = OperatorConsole::new(handle.clone(), self.cancellation_token.clone());
            Some(tokio::spawn(console.run()))
        } else {
            None
        };

        let controller_watch = {
            let reason_tx = reason_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = controller.await {
                    error!("Session controller task failed: {}", e);
                }
                let _ = reason_tx.send(ShutdownReason::ControllerExited).await;
            })
        };

        let reason = tokio::select! {
            reason = reason_rx.recv() => reason.unwrap_or(ShutdownReason::ControllerExited),
            _ = self.cancellation_token.cancelled() => ShutdownReason::OperatorQuit,
        };
        info!("Shutdown initiated: {:?}", reason);

        let exit_code = self.shutdown(handle, controller_watch, console).await;
        info!("DCCam shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, reason_tx: mpsc::Sender<ShutdownReason>) {
        // SIGTERM (systemd stop)
        #[cfg(unix)]
        {
            let reason_tx = reason_tx.clone();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            let _ = reason_tx
                                .send(ShutdownReason::Signal("SIGTERM".to_string()))
                                .await;
                        }
                    }
                    Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // SIGINT (Ctrl+C)
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                let _ = reason_tx
                    .send(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}
