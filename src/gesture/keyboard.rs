use super::double_tap::DoubleTapDetector;
use crate::error::Result;
use crate::events::{DecoycamEvent, EventBus};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a single key press means to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Tap,
    LostFocus,
    Quit,
    Ignore,
}

pub(crate) fn classify_key(code: KeyCode) -> KeyAction {
    match code {
        KeyCode::Char(' ') => KeyAction::Tap,
        KeyCode::Char('b') => KeyAction::LostFocus,
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        _ => KeyAction::Ignore,
    }
}

/// Terminal stand-in for the touch surface.
///
/// Double SPACE toggles recording, `b` simulates the app going to the
/// background, `q` or Esc quits.
pub struct KeyboardGestureSource {
    event_bus: Arc<EventBus>,
    double_tap_window: Duration,
    cancellation_token: CancellationToken,
}

impl KeyboardGestureSource {
    pub fn new(event_bus: Arc<EventBus>, double_tap_window: Duration) -> Self {
        Self {
            event_bus,
            double_tap_window,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for key presses on a blocking worker
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard gesture source - double SPACE toggles, 'b' backgrounds, 'q' quits");

        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();
        let runtime_handle = Handle::current();
        let mut detector = DoubleTapDetector::new(self.double_tap_window);

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            let publish = |event: DecoycamEvent| {
                let event_bus = Arc::clone(&event_bus);
                runtime_handle.spawn(async move {
                    if let Err(e) = event_bus.publish(event).await {
                        warn!("Failed to publish keyboard event: {}", e);
                    }
                });
            };

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard gesture source stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match classify_key(key_event.code) {
                            KeyAction::Tap => {
                                if detector.register_tap(Instant::now()) {
                                    debug!("Double tap recognised");
                                    publish(DecoycamEvent::ToggleGesture {
                                        timestamp: SystemTime::now(),
                                    });
                                }
                            }
                            KeyAction::LostFocus => {
                                info!("Simulating loss of foreground focus");
                                publish(DecoycamEvent::LostFocus {
                                    timestamp: SystemTime::now(),
                                });
                            }
                            KeyAction::Quit => {
                                info!("Quit key pressed - requesting shutdown");
                                publish(DecoycamEvent::ShutdownRequested {
                                    timestamp: SystemTime::now(),
                                    reason: "User requested via keyboard".to_string(),
                                });
                                break;
                            }
                            KeyAction::Ignore => {
                                debug!("Key pressed: {:?}", key_event.code);
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard gesture source exited");
        });

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard gesture source");
        self.cancellation_token.cancel();

        // Let the poll loop notice and restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(classify_key(KeyCode::Char(' ')), KeyAction::Tap);
        assert_eq!(classify_key(KeyCode::Char('b')), KeyAction::LostFocus);
        assert_eq!(classify_key(KeyCode::Char('q')), KeyAction::Quit);
        assert_eq!(classify_key(KeyCode::Esc), KeyAction::Quit);
        assert_eq!(classify_key(KeyCode::Enter), KeyAction::Ignore);
    }

    #[tokio::test]
    async fn test_keyboard_source_stop() {
        let event_bus = Arc::new(EventBus::new(16));
        let source = KeyboardGestureSource::new(event_bus, Duration::from_millis(300));

        assert!(!source.cancellation_token.is_cancelled());
        source.stop().await.unwrap();
        assert!(source.cancellation_token.is_cancelled());
    }
}
