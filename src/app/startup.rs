use super::{ComponentState, DecoycamApp};
use crate::capture::CaptureBackend;
use crate::config::DecoycamConfig;
use crate::controller::{ControllerSettings, RecordingController};
use crate::decoy::DecoyPlayer;
use crate::error::Result;
use crate::idle::{IdleCoordinator, LogOnlyInhibitor};
use crate::permission::{DeviceNodePermissionOracle, FixedPermissionOracle, PermissionOracle};
use crate::storage::RecordingStore;
use std::sync::Arc;
use tracing::{error, info, warn};

impl DecoycamApp {
    /// Bring up the controller, then the gesture sources feeding it
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting decoycam");

        self.set_component_state("controller", ComponentState::Starting)
            .await;
        let controller = RecordingController::new(
            Arc::clone(&self.event_bus),
            build_oracle(&self.config),
            build_backend(&self.config),
            Arc::new(RecordingStore::from_config(&self.config.storage)),
            IdleCoordinator::new(Arc::new(LogOnlyInhibitor)),
        )
        .with_settings(ControllerSettings::from_config(&self.config.capture));

        let controller = match build_decoy(&self.config) {
            Some(decoy) => controller.with_decoy(decoy),
            None => controller,
        };

        let handle = controller.initialize().await;
        if let Some(e) = handle.decoy_error() {
            warn!("Running without decoy: {}", e);
        }
        self.controller = Some(handle);
        self.set_component_state("controller", ComponentState::Running)
            .await;

        if let Some(keyboard) = &self.keyboard {
            self.set_component_state("keyboard", ComponentState::Starting)
                .await;
            keyboard.start().await.map_err(|e| {
                error!("Failed to start keyboard gesture source: {}", e);
                e
            })?;
            self.set_component_state("keyboard", ComponentState::Running)
                .await;
        }

        #[cfg(all(feature = "touch", target_os = "linux"))]
        if let Some(touch) = &self.touch {
            self.set_component_state("touch", ComponentState::Starting)
                .await;
            touch.start().await?;
            self.set_component_state("touch", ComponentState::Running)
                .await;
        }

        info!("Decoycam started");
        Ok(())
    }
}

fn build_oracle(config: &DecoycamConfig) -> Arc<dyn PermissionOracle> {
    match config.permission.fixed_status {
        Some(status) => {
            info!("Using fixed camera permission: {:?}", status);
            Arc::new(FixedPermissionOracle::new(status))
        }
        None => Arc::new(DeviceNodePermissionOracle::new(config.capture.device_path())),
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_backend(config: &DecoycamConfig) -> Arc<dyn CaptureBackend> {
    Arc::new(crate::capture::GstCaptureBackend::new(&config.capture))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn build_backend(_config: &DecoycamConfig) -> Arc<dyn CaptureBackend> {
    warn!("Built without the 'camera' feature; recording is unavailable");
    Arc::new(crate::capture::UnavailableCaptureBackend)
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_decoy(config: &DecoycamConfig) -> Option<Box<dyn DecoyPlayer>> {
    use crate::decoy::{GstSurface, LoopingDecoy};

    config.decoy.enabled.then(|| {
        Box::new(LoopingDecoy::new(
            config.decoy.asset_path.clone(),
            GstSurface::new(),
        )) as Box<dyn DecoyPlayer>
    })
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn build_decoy(config: &DecoycamConfig) -> Option<Box<dyn DecoyPlayer>> {
    if config.decoy.enabled {
        warn!("Built without the 'camera' feature; no decoy surface available");
    }
    None
}
