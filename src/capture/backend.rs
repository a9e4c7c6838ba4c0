use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Session quality presets, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPreset {
    High,
    Medium,
    Low,
}

impl SessionPreset {
    pub fn highest() -> Self {
        SessionPreset::High
    }

    /// Output frame size for the preset
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            SessionPreset::High => (1920, 1080),
            SessionPreset::Medium => (1280, 720),
            SessionPreset::Low => (640, 480),
        }
    }
}

/// Blocking wait for a finalized file to be flushed and closed
pub type FinalizeWait = Box<dyn FnOnce() -> Result<(), CaptureError> + Send>;

/// One camera session as exposed by a platform backend.
///
/// Calls arrive in configuration order: preset, input, sink, then
/// `start_running` on a blocking worker. `finish_writing` and `stop_running`
/// are also called on blocking workers and may wait for a pending
/// `start_running`. `finish_writing` only signals the sink; the returned wait
/// performs the flush.
pub trait CapturePipeline: Send {
    fn set_preset(&mut self, preset: SessionPreset);

    /// Attach the default camera as the single video input
    fn add_video_input(&mut self) -> Result<(), CaptureError>;

    /// Attach the single file-output sink
    fn add_file_sink(&mut self) -> Result<(), CaptureError>;

    /// Start frames flowing. May block while the hardware opens.
    fn start_running(&mut self) -> Result<(), CaptureError>;

    fn begin_writing(&mut self, path: &Path) -> Result<(), CaptureError>;

    /// Ask the sink to finalize. `None` when nothing was being written.
    fn finish_writing(&mut self) -> Option<FinalizeWait>;

    fn stop_running(&mut self);
}

/// Factory for capture pipelines
pub trait CaptureBackend: Send + Sync {
    fn name(&self) -> &str;

    fn create_pipeline(&self) -> Box<dyn CapturePipeline>;
}

/// Backend used when no camera support is compiled in
pub struct UnavailableCaptureBackend;

impl CaptureBackend for UnavailableCaptureBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn create_pipeline(&self) -> Box<dyn CapturePipeline> {
        Box::new(UnavailablePipeline)
    }
}

struct UnavailablePipeline;

impl CapturePipeline for UnavailablePipeline {
    fn set_preset(&mut self, _preset: SessionPreset) {}

    fn add_video_input(&mut self) -> Result<(), CaptureError> {
        warn!("No camera backend compiled in (enable the `camera` feature)");
        Err(CaptureError::DeviceUnavailable {
            details: "no camera backend available".to_string(),
        })
    }

    fn add_file_sink(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::SinkAttachFailure {
            details: "no camera backend available".to_string(),
        })
    }

    fn start_running(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::PipelineStart {
            details: "no camera backend available".to_string(),
        })
    }

    fn begin_writing(&mut self, _path: &Path) -> Result<(), CaptureError> {
        Err(CaptureError::SinkAttachFailure {
            details: "no camera backend available".to_string(),
        })
    }

    fn finish_writing(&mut self) -> Option<FinalizeWait> {
        None
    }

    fn stop_running(&mut self) {}
}
