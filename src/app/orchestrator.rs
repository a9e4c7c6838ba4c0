use super::types::{ComponentState, ShutdownReason};
use crate::config::DecoycamConfig;
use crate::controller::ControllerHandle;
use crate::error::Result;
use crate::events::EventBus;
use crate::gesture::KeyboardGestureSource;
#[cfg(all(feature = "touch", target_os = "linux"))]
use crate::gesture::TouchGestureSource;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Wires configuration, event bus, gesture sources and the recording
/// controller into one process
pub struct DecoycamApp {
    pub(super) config: DecoycamConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Components
    pub(super) controller: Option<ControllerHandle>,
    pub(super) keyboard: Option<KeyboardGestureSource>,
    #[cfg(all(feature = "touch", target_os = "linux"))]
    pub(super) touch: Option<TouchGestureSource>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl DecoycamApp {
    pub fn new(config: DecoycamConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let keyboard = config.gesture.keyboard.then(|| {
            KeyboardGestureSource::new(Arc::clone(&event_bus), config.gesture.double_tap_window())
        });

        #[cfg(all(feature = "touch", target_os = "linux"))]
        let touch = config.gesture.touch_device.clone().map(|device| {
            TouchGestureSource::new(
                device,
                config.gesture.double_tap_window(),
                Arc::clone(&event_bus),
            )
        });

        Ok(Self {
            config,
            event_bus,
            controller: None,
            keyboard,
            #[cfg(all(feature = "touch", target_os = "linux"))]
            touch,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn controller(&self) -> Option<&ControllerHandle> {
        self.controller.as_ref()
    }
}
