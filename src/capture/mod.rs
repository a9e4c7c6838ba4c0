mod backend;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod session;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use backend::{
    CaptureBackend, CapturePipeline, FinalizeWait, SessionPreset, UnavailableCaptureBackend,
};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::GstCaptureBackend;
pub use session::{CaptureSession, RecordingCompletion, RecordingOutcome};
