//! Scriptable capture backend shared by the session and controller tests.

use super::backend::{CaptureBackend, CapturePipeline, FinalizeWait, SessionPreset};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeBehaviour {
    pub no_device: bool,
    pub reject_sink: bool,
    pub fail_start: bool,
    pub fail_finalize: bool,
    /// Time `start_running` spends opening the camera
    pub start_delay: Option<Duration>,
}

/// Records every pipeline call in order across all sessions it creates
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub behaviour: Mutex<FakeBehaviour>,
    pub created: AtomicUsize,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(behaviour: FakeBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            ..Self::default()
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.as_str() == call || c.starts_with(&format!("{}:", call)))
            .count()
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix("begin_writing:").map(PathBuf::from))
            .collect()
    }
}

impl CaptureBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn create_pipeline(&self) -> Box<dyn CapturePipeline> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.behaviour.lock();
        Box::new(FakePipeline {
            calls: Arc::clone(&self.calls),
            no_device: behaviour.no_device,
            reject_sink: behaviour.reject_sink,
            fail_start: behaviour.fail_start,
            fail_finalize: behaviour.fail_finalize,
            start_delay: behaviour.start_delay,
            writing: None,
        })
    }
}

struct FakePipeline {
    calls: Arc<Mutex<Vec<String>>>,
    no_device: bool,
    reject_sink: bool,
    fail_start: bool,
    fail_finalize: bool,
    start_delay: Option<Duration>,
    writing: Option<PathBuf>,
}

impl FakePipeline {
    fn log(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl CapturePipeline for FakePipeline {
    fn set_preset(&mut self, preset: SessionPreset) {
        self.log(format!("set_preset:{:?}", preset));
    }

    fn add_video_input(&mut self) -> Result<(), CaptureError> {
        self.log("add_video_input".to_string());
        if self.no_device {
            return Err(CaptureError::DeviceUnavailable {
                details: "no camera attached".to_string(),
            });
        }
        Ok(())
    }

    fn add_file_sink(&mut self) -> Result<(), CaptureError> {
        self.log("add_file_sink".to_string());
        if self.reject_sink {
            return Err(CaptureError::SinkAttachFailure {
                details: "sink rejected".to_string(),
            });
        }
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CaptureError> {
        self.log("start_running".to_string());
        if let Some(delay) = self.start_delay {
            std::thread::sleep(delay);
        }
        if self.fail_start {
            return Err(CaptureError::PipelineStart {
                details: "sensor did not open".to_string(),
            });
        }
        Ok(())
    }

    fn begin_writing(&mut self, path: &Path) -> Result<(), CaptureError> {
        self.log(format!("begin_writing:{}", path.display()));
        self.writing = Some(path.to_path_buf());
        Ok(())
    }

    fn finish_writing(&mut self) -> Option<FinalizeWait> {
        self.log("finish_writing".to_string());
        let path = self.writing.take()?;
        let fail = self.fail_finalize;
        Some(Box::new(move || {
            if fail {
                return Err(CaptureError::WriteFinalizeFailure {
                    details: "disk full".to_string(),
                });
            }
            std::fs::write(&path, b"movie").map_err(|e| CaptureError::WriteFinalizeFailure {
                details: e.to_string(),
            })
        }))
    }

    fn stop_running(&mut self) {
        self.log("stop_running".to_string());
    }
}
