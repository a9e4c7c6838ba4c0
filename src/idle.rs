use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Host hook that toggles idle/auto-lock behaviour
pub trait IdleInhibitor: Send + Sync {
    fn set_idle_disabled(&self, disabled: bool);
}

/// Inhibitor for hosts without an idle timer; only logs the transitions
pub struct LogOnlyInhibitor;

impl IdleInhibitor for LogOnlyInhibitor {
    fn set_idle_disabled(&self, disabled: bool) {
        if disabled {
            info!("Idle timer disabled");
        } else {
            info!("Idle timer restored");
        }
    }
}

/// Reference-counted owner of the process-wide idle flag.
///
/// The first guard disables idle behaviour and the last guard dropped restores
/// it, so overlapping controllers cannot re-enable it under each other.
pub struct IdleCoordinator {
    inhibitor: Arc<dyn IdleInhibitor>,
    holders: Mutex<usize>,
}

impl IdleCoordinator {
    pub fn new(inhibitor: Arc<dyn IdleInhibitor>) -> Arc<Self> {
        Arc::new(Self {
            inhibitor,
            holders: Mutex::new(0),
        })
    }

    pub fn acquire(self: &Arc<Self>) -> IdleGuard {
        let mut holders = self.holders.lock();
        if *holders == 0 {
            self.inhibitor.set_idle_disabled(true);
        }
        *holders += 1;
        debug!("Idle suppression acquired ({} holders)", *holders);

        IdleGuard {
            coordinator: Arc::clone(self),
        }
    }

    pub fn holders(&self) -> usize {
        *self.holders.lock()
    }

    fn release(&self) {
        let mut holders = self.holders.lock();
        *holders = holders.saturating_sub(1);
        if *holders == 0 {
            self.inhibitor.set_idle_disabled(false);
        }
        debug!("Idle suppression released ({} holders)", *holders);
    }
}

/// Keeps idle behaviour disabled while alive
pub struct IdleGuard {
    coordinator: Arc<IdleCoordinator>,
}

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.coordinator.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingInhibitor {
        calls: Mutex<Vec<bool>>,
    }

    impl IdleInhibitor for RecordingInhibitor {
        fn set_idle_disabled(&self, disabled: bool) {
            self.calls.lock().push(disabled);
        }
    }

    #[test]
    fn test_nested_guards_toggle_once() {
        let inhibitor = Arc::new(RecordingInhibitor::default());
        let coordinator = IdleCoordinator::new(inhibitor.clone());

        let first = coordinator.acquire();
        let second = coordinator.acquire();
        assert_eq!(coordinator.holders(), 2);
        assert_eq!(*inhibitor.calls.lock(), vec![true]);

        drop(first);
        assert_eq!(*inhibitor.calls.lock(), vec![true]);

        drop(second);
        assert_eq!(coordinator.holders(), 0);
        assert_eq!(*inhibitor.calls.lock(), vec![true, false]);
    }

    #[test]
    fn test_reacquire_after_release() {
        let inhibitor = Arc::new(RecordingInhibitor::default());
        let coordinator = IdleCoordinator::new(inhibitor.clone());

        drop(coordinator.acquire());
        drop(coordinator.acquire());
        assert_eq!(*inhibitor.calls.lock(), vec![true, false, true, false]);
    }
}
