use super::backend::{CaptureBackend, CapturePipeline, SessionPreset};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one write attempt, reported once by the file sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingOutcome {
    pub path: PathBuf,
    pub error: Option<CaptureError>,
}

impl RecordingOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Completion signal of a [`CaptureSession::start`] call
pub struct RecordingCompletion {
    path: PathBuf,
    receiver: oneshot::Receiver<RecordingOutcome>,
}

impl RecordingCompletion {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Future for RecordingCompletion {
    type Output = RecordingOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Session dropped without finalizing
            Poll::Ready(Err(_)) => Poll::Ready(RecordingOutcome {
                path: self.path.clone(),
                error: Some(CaptureError::WriteFinalizeFailure {
                    details: "session dropped before the file was finalized".to_string(),
                }),
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct ActiveWrite {
    path: PathBuf,
    completion: oneshot::Sender<RecordingOutcome>,
}

/// Camera input plus file sink of a single recording attempt
pub struct CaptureSession {
    pipeline: Arc<Mutex<Box<dyn CapturePipeline>>>,
    preset: SessionPreset,
    degraded_reason: Option<String>,
    writing: Option<ActiveWrite>,
    finalized: bool,
    /// Finalize jobs that must finish before the pipeline stops
    finalizing: Vec<JoinHandle<()>>,
}

impl CaptureSession {
    /// Build a session: preset, one video input, one file sink.
    ///
    /// Input failures abort. A sink failure leaves the session running without
    /// output unless `abort_on_sink_failure` is set.
    pub fn configure(
        backend: &dyn CaptureBackend,
        preset: SessionPreset,
        abort_on_sink_failure: bool,
    ) -> Result<Self, CaptureError> {
        let mut pipeline = backend.create_pipeline();
        pipeline.set_preset(preset);

        pipeline.add_video_input()?;

        let degraded_reason = match pipeline.add_file_sink() {
            Ok(()) => None,
            Err(e) if abort_on_sink_failure => return Err(e),
            Err(e) => {
                warn!("Continuing without file output: {}", e);
                Some(e.to_string())
            }
        };

        debug!(
            "Capture session configured on '{}' backend ({:?})",
            backend.name(),
            preset
        );

        Ok(Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            preset,
            degraded_reason,
            writing: None,
            finalized: false,
            finalizing: Vec::new(),
        })
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_reason.is_some()
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        self.degraded_reason.as_deref()
    }

    pub fn is_writing(&self) -> bool {
        self.writing.is_some()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.writing.as_ref().map(|active| active.path.as_path())
    }

    /// Start the pipeline on a blocking worker
    pub fn start_running(&self) -> impl Future<Output = Result<(), CaptureError>> + Send + 'static {
        let pipeline = Arc::clone(&self.pipeline);
        async move {
            tokio::task::spawn_blocking(move || pipeline.lock().start_running())
                .await
                .map_err(|e| CaptureError::PipelineStart {
                    details: e.to_string(),
                })?
        }
    }

    /// Begin writing to `path`. Not valid while already writing.
    pub fn start(&mut self, path: &Path) -> Result<RecordingCompletion, CaptureError> {
        if let Some(active) = &self.writing {
            return Err(CaptureError::AlreadyWriting {
                path: active.path.display().to_string(),
            });
        }

        if let Some(reason) = &self.degraded_reason {
            return Err(CaptureError::SinkAttachFailure {
                details: reason.clone(),
            });
        }

        self.pipeline.lock().begin_writing(path)?;

        let (completion, receiver) = oneshot::channel();
        self.writing = Some(ActiveWrite {
            path: path.to_path_buf(),
            completion,
        });
        self.finalized = false;

        info!("Recording to {}", path.display());
        Ok(RecordingCompletion {
            path: path.to_path_buf(),
            receiver,
        })
    }

    /// Signal the sink to flush and close.
    ///
    /// Forwards exactly one finalize to the backend per start (or per session
    /// if writing never began); returns `false` when already stopped. Never
    /// blocks: the backend call waits on a blocking worker for a pipeline that
    /// is still opening the camera.
    pub fn stop(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.finalized = true;

        let pipeline = Arc::clone(&self.pipeline);
        let active = self.writing.take();
        self.finalizing.push(tokio::task::spawn_blocking(move || {
            let wait = pipeline.lock().finish_writing();
            let result = match wait {
                Some(wait) => wait(),
                None => Ok(()),
            };

            match active {
                Some(active) => {
                    let _ = active.completion.send(RecordingOutcome {
                        path: active.path,
                        error: result.err(),
                    });
                }
                None => {
                    if let Err(e) = result {
                        warn!("Finalize without active write failed: {}", e);
                    }
                }
            }
        }));

        true
    }

    /// Stop the pipeline and drop input and sink. Finalizes first if needed.
    pub fn release(mut self) -> JoinHandle<()> {
        self.stop();
        let finalizing = std::mem::take(&mut self.finalizing);
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            for job in finalizing {
                if let Err(e) = job.await {
                    warn!("Finalize job did not complete: {}", e);
                }
            }

            match tokio::task::spawn_blocking(move || pipeline.lock().stop_running()).await {
                Ok(()) => debug!("Capture pipeline stopped"),
                Err(e) => warn!("Capture pipeline stop did not complete: {}", e),
            }
        })
    }
}
