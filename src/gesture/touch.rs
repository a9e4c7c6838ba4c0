use super::double_tap::DoubleTapDetector;
use crate::error::{DecoycamError, Result};
use crate::events::{DecoycamEvent, EventBus};
use evdev::{Device, EventType, InputEventKind, Key};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "touch_gesture";

/// Touchscreen double-tap source reading a Linux input device
pub struct TouchGestureSource {
    device_path: String,
    double_tap_window: Duration,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
    max_retries: u32,
    retry_delay: Duration,
}

impl TouchGestureSource {
    pub fn new(device_path: String, double_tap_window: Duration, event_bus: Arc<EventBus>) -> Self {
        Self {
            device_path,
            double_tap_window,
            event_bus,
            cancellation_token: CancellationToken::new(),
            max_retries: 10,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Start monitoring; device failures are retried with exponential backoff
    pub async fn start(&self) -> Result<()> {
        info!("Starting touch gesture source on {}", self.device_path);

        let device_path = self.device_path.clone();
        let window = self.double_tap_window;
        let event_bus = Arc::clone(&self.event_bus);
        let token = self.cancellation_token.clone();
        let max_retries = self.max_retries;
        let retry_delay = self.retry_delay;

        tokio::spawn(async move {
            let mut retry_count = 0;

            loop {
                match Self::monitor_device(&device_path, window, &event_bus, &token).await {
                    Ok(()) => {
                        debug!("Touch monitoring ended");
                        break;
                    }
                    Err(e) => {
                        retry_count += 1;
                        error!("Touch device error: {}", e);

                        let _ = event_bus
                            .publish(DecoycamEvent::SystemError {
                                component: COMPONENT.to_string(),
                                error: format!("Attempt {}/{}: {}", retry_count, max_retries, e),
                            })
                            .await;

                        if retry_count >= max_retries {
                            error!("Touch gesture source giving up after {} attempts", max_retries);
                            break;
                        }

                        let delay = retry_delay * 2_u32.pow(retry_count.min(5));
                        warn!(
                            "Retrying touch device in {:?} (attempt {}/{})",
                            delay, retry_count, max_retries
                        );
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = sleep(delay) => {}
                        }
                    }
                }
            }
        });

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping touch gesture source");
        self.cancellation_token.cancel();
    }

    async fn monitor_device(
        device_path: &str,
        window: Duration,
        event_bus: &EventBus,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut device = Device::open(device_path).map_err(|e| {
            let message = match e.kind() {
                std::io::ErrorKind::NotFound => format!("{} not found", device_path),
                std::io::ErrorKind::PermissionDenied => {
                    format!("Permission denied opening {}", device_path)
                }
                _ => format!("Failed to open {}: {}", device_path, e),
            };
            DecoycamError::component(COMPONENT, message)
        })?;

        if !device.supported_events().contains(EventType::KEY) {
            return Err(DecoycamError::component(
                COMPONENT,
                format!("{} does not report key events", device_path),
            ));
        }

        info!(
            "Touch device opened: {} ({})",
            device_path,
            device.name().unwrap_or("Unknown")
        );

        let mut detector = DoubleTapDetector::new(window);
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        while !token.is_cancelled() {
            match device.fetch_events() {
                Ok(events) => {
                    consecutive_errors = 0;
                    let taps = events.filter(is_touch_press).count();
                    for _ in 0..taps {
                        if detector.register_tap(Instant::now()) {
                            debug!("Double tap recognised on {}", device_path);
                            let _ = event_bus
                                .publish(DecoycamEvent::ToggleGesture {
                                    timestamp: SystemTime::now(),
                                })
                                .await;
                        }
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(DecoycamError::component(
                            COMPONENT,
                            format!("Too many consecutive read errors: {}", e),
                        ));
                    }
                    warn!(
                        "Error reading touch device (attempt {}): {}",
                        consecutive_errors, e
                    );
                    sleep(Duration::from_millis(100)).await;
                    continue;
                }
            }

            sleep(Duration::from_millis(10)).await;
        }

        Ok(())
    }
}

fn is_touch_press(event: &evdev::InputEvent) -> bool {
    match event.kind() {
        InputEventKind::Key(Key::BTN_TOUCH | Key::BTN_LEFT) => event.value() == 1,
        _ => false,
    }
}
