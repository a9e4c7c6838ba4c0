use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recording controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    /// Decoy playing, no camera session
    Idle,
    /// Waiting for the permission oracle
    PermissionPending,
    /// A capture session exists
    Recording,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Snapshot published after every controller transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: RecordingState,
    pub session_active: bool,
    /// Session running without a file sink
    pub degraded: bool,
    /// File currently being written
    pub output: Option<PathBuf>,
}

impl ControllerStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Session exists iff recording
    pub fn is_consistent(&self) -> bool {
        self.session_active == (self.state == RecordingState::Recording)
            && (self.session_active || (!self.degraded && self.output.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_consistency() {
        assert!(ControllerStatus::idle().is_consistent());

        let pending = ControllerStatus {
            state: RecordingState::PermissionPending,
            ..ControllerStatus::idle()
        };
        assert!(pending.is_consistent());

        let leaked = ControllerStatus {
            state: RecordingState::Idle,
            session_active: true,
            degraded: false,
            output: None,
        };
        assert!(!leaked.is_consistent());

        let recording = ControllerStatus {
            state: RecordingState::Recording,
            session_active: true,
            degraded: true,
            output: None,
        };
        assert!(recording.is_consistent());
    }
}
