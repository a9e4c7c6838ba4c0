use super::{DecoycamApp, ShutdownReason};
use crate::error::{DecoycamError, EventBusError, Result};
use crate::events::{DecoycamEvent, EventFilter, EventReceiver};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

type SharedShutdown = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl DecoycamApp {
    /// Run until a signal or a bus shutdown request, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Decoycam is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| DecoycamError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| DecoycamError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.watch_shutdown_requests(shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| DecoycamError::system("Shutdown channel closed unexpectedly"))?;
        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;
        info!("Decoycam shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: SharedShutdown) {
        let token = self.cancellation_token.clone();

        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            let token = token.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        send_shutdown(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                    }
                }
            });
        }

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                Ok(()) = signal::ctrl_c() => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    send_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string())).await;
                }
            }
        });
    }

    /// Turn `ShutdownRequested` bus events (e.g. the quit key) into a shutdown
    fn watch_shutdown_requests(&self, shutdown_sender: SharedShutdown) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "app.shutdown".to_string(),
        );
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(DecoycamEvent::ShutdownRequested { reason, .. }) => {
                            send_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason)).await;
                            break;
                        }
                        Ok(_) => {}
                        Err(EventBusError::Lagged { .. }) => {}
                        Err(_) => break,
                    },
                }
            }
        });
    }
}

async fn send_shutdown(sender: &SharedShutdown, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
