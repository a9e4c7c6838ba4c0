use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecoycamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Decoy error: {0}")]
    Decoy(#[from] DecoyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl DecoycamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures around the camera session and its file sink.
///
/// Details are carried as strings so an outcome can be cloned onto the event
/// bus after the backend error itself is gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera access denied")]
    PermissionDenied,

    #[error("Camera device unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("Camera input rejected by session: {details}")]
    InputRejected { details: String },

    #[error("File output could not be attached: {details}")]
    SinkAttachFailure { details: String },

    #[error("Capture pipeline failed to start: {details}")]
    PipelineStart { details: String },

    #[error("Session is already writing to {path}")]
    AlreadyWriting { path: String },

    #[error("Recording could not be finalized: {details}")]
    WriteFinalizeFailure { details: String },
}

impl CaptureError {
    /// Whether the error aborts a start transition rather than degrading it.
    pub fn aborts_session(&self) -> bool {
        matches!(
            self,
            CaptureError::PermissionDenied
                | CaptureError::DeviceUnavailable { .. }
                | CaptureError::InputRejected { .. }
                | CaptureError::PipelineStart { .. }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoyError {
    #[error("Decoy asset not found: {path}")]
    AssetMissing { path: String },

    #[error("Decoy playback failed: {details}")]
    Playback { details: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage base directory unavailable: {details}")]
    BaseUnavailable { details: String },
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DecoycamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_classification() {
        assert!(CaptureError::DeviceUnavailable {
            details: "no camera".to_string()
        }
        .aborts_session());
        assert!(CaptureError::PermissionDenied.aborts_session());
        assert!(!CaptureError::SinkAttachFailure {
            details: "busy".to_string()
        }
        .aborts_session());
        assert!(!CaptureError::WriteFinalizeFailure {
            details: "disk full".to_string()
        }
        .aborts_session());
    }

    #[test]
    fn test_error_conversion() {
        let err: DecoycamError = DecoyError::AssetMissing {
            path: "blackloop.mp4".to_string(),
        }
        .into();
        assert!(err.to_string().contains("blackloop.mp4"));

        let err = DecoycamError::component("controller", "stopped");
        assert_eq!(err.to_string(), "Component error in controller: stopped");
    }
}
