use super::{ComponentState, DecoycamApp};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl DecoycamApp {
    /// Stop gesture sources first so no new toggles arrive, then tear the
    /// controller down, which finalizes any recording in progress
    pub async fn shutdown(&mut self) -> crate::error::Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(keyboard) = &self.keyboard {
            self.set_component_state("keyboard", ComponentState::Stopping)
                .await;
            match keyboard.stop().await {
                Ok(()) => {
                    self.set_component_state("keyboard", ComponentState::Stopped)
                        .await
                }
                Err(e) => {
                    error!("Error stopping keyboard gesture source: {}", e);
                    self.set_component_state("keyboard", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
            }
        }

        #[cfg(all(feature = "touch", target_os = "linux"))]
        if let Some(touch) = &self.touch {
            touch.stop();
            self.set_component_state("touch", ComponentState::Stopped)
                .await;
        }

        if let Some(controller) = self.controller.take() {
            self.set_component_state("controller", ComponentState::Stopping)
                .await;
            match timeout(STOP_TIMEOUT, controller.teardown()).await {
                Ok(()) => {
                    self.set_component_state("controller", ComponentState::Stopped)
                        .await;
                    info!("Recording controller stopped");
                }
                Err(_) => {
                    error!("Recording controller teardown timed out");
                    self.set_component_state("controller", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
