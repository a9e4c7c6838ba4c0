use std::time::{Duration, Instant};

/// Folds single taps into toggle gestures.
///
/// Two taps no further apart than the window form one gesture; the tap after
/// a completed gesture starts a new pair.
#[derive(Debug, Clone)]
pub struct DoubleTapDetector {
    window: Duration,
    last_tap: Option<Instant>,
}

impl DoubleTapDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_tap: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Register a tap at `at`; returns `true` when it completes a gesture
    pub fn register_tap(&mut self, at: Instant) -> bool {
        match self.last_tap.take() {
            Some(previous) if at.saturating_duration_since(previous) <= self.window => true,
            _ => {
                self.last_tap = Some(at);
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_tap = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_taps_within_window() {
        let mut detector = DoubleTapDetector::new(Duration::from_millis(300));
        let start = Instant::now();

        assert!(!detector.register_tap(start));
        assert!(detector.register_tap(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_slow_taps_restart_pair() {
        let mut detector = DoubleTapDetector::new(Duration::from_millis(300));
        let start = Instant::now();

        assert!(!detector.register_tap(start));
        assert!(!detector.register_tap(start + Duration::from_millis(400)));
        assert!(detector.register_tap(start + Duration::from_millis(500)));
    }

    #[test]
    fn test_third_tap_starts_new_pair() {
        let mut detector = DoubleTapDetector::new(Duration::from_millis(300));
        let start = Instant::now();

        assert!(!detector.register_tap(start));
        assert!(detector.register_tap(start + Duration::from_millis(100)));
        assert!(!detector.register_tap(start + Duration::from_millis(150)));
        assert!(detector.register_tap(start + Duration::from_millis(250)));

        detector.register_tap(start + Duration::from_millis(1000));
        detector.reset();
        assert!(!detector.register_tap(start + Duration::from_millis(1100)));
    }
}
