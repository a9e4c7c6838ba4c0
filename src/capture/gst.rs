use super::backend::{CaptureBackend, CapturePipeline, FinalizeWait, SessionPreset};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::{AppSink, AppSrc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// GStreamer camera backend: V4L2 source into an appsink, recordings encoded
/// through a separate appsrc → H.264 → MP4 pipeline per file
pub struct GstCaptureBackend {
    device_path: String,
    fps: u32,
}

impl GstCaptureBackend {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            device_path: config.device_path(),
            fps: config.fps,
        }
    }
}

impl CaptureBackend for GstCaptureBackend {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn create_pipeline(&self) -> Box<dyn CapturePipeline> {
        Box::new(GstCapturePipeline {
            device_path: self.device_path.clone(),
            fps: self.fps,
            preset: SessionPreset::highest(),
            camera: None,
            appsink: None,
            sink_attached: false,
            recorder: Arc::new(Mutex::new(None)),
            encoder: None,
        })
    }
}

struct GstCapturePipeline {
    device_path: String,
    fps: u32,
    preset: SessionPreset,
    camera: Option<Pipeline>,
    appsink: Option<AppSink>,
    sink_attached: bool,
    /// Where camera buffers go while a file is being written
    recorder: Arc<Mutex<Option<AppSrc>>>,
    encoder: Option<Pipeline>,
}

impl GstCapturePipeline {
    fn raw_caps(&self) -> String {
        let (width, height) = self.preset.resolution();
        format!(
            "video/x-raw,format=I420,width={},height={},framerate={}/1",
            width, height, self.fps
        )
    }

    fn build_camera_pipeline_string(&self) -> String {
        format!(
            "v4l2src device={} ! videoconvert ! videoscale ! videorate ! {} ! \
             appsink name=camera sync=false max-buffers=4 drop=true",
            self.device_path,
            self.raw_caps()
        )
    }

    fn build_encoder_pipeline_string(&self) -> String {
        format!(
            "appsrc name=recorder is-live=true do-timestamp=true format=time caps={} ! \
             queue ! \
             x264enc tune=zerolatency speed-preset=veryfast key-int-max=60 ! \
             video/x-h264,profile=high ! \
             h264parse ! \
             mp4mux ! \
             filesink name=file",
            self.raw_caps()
        )
    }
}

impl CapturePipeline for GstCapturePipeline {
    fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    fn add_video_input(&mut self) -> Result<(), CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::DeviceUnavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        if !Path::new(&self.device_path).exists() {
            return Err(CaptureError::DeviceUnavailable {
                details: format!("{} not found", self.device_path),
            });
        }

        let pipeline_desc = self.build_camera_pipeline_string();
        info!("Creating camera pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CaptureError::InputRejected {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CaptureError::InputRejected {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("camera")
            .ok_or_else(|| CaptureError::InputRejected {
                details: "Failed to get appsink element".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CaptureError::InputRejected {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        self.camera = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    fn add_file_sink(&mut self) -> Result<(), CaptureError> {
        for factory in ["x264enc", "h264parse", "mp4mux", "filesink"] {
            if gstreamer::ElementFactory::find(factory).is_none() {
                return Err(CaptureError::SinkAttachFailure {
                    details: format!("GStreamer element '{}' not installed", factory),
                });
            }
        }

        let appsink = self
            .appsink
            .as_ref()
            .ok_or_else(|| CaptureError::SinkAttachFailure {
                details: "No camera input attached".to_string(),
            })?;

        let recorder = Arc::clone(&self.recorder);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;

                    if let Some(appsrc) = recorder.lock().as_ref() {
                        if let Some(mut buffer) = sample.buffer_owned() {
                            // Let the recorder stamp buffers on its own clock
                            let buffer_ref = buffer.make_mut();
                            buffer_ref.set_pts(gstreamer::ClockTime::NONE);
                            buffer_ref.set_dts(gstreamer::ClockTime::NONE);
                            if let Err(e) = appsrc.push_buffer(buffer) {
                                debug!("Recorder rejected buffer: {:?}", e);
                            }
                        }
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        self.sink_attached = true;
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CaptureError> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| CaptureError::PipelineStart {
                details: "Camera pipeline not initialized".to_string(),
            })?;

        camera
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CaptureError::PipelineStart {
                details: format!("Failed to start camera pipeline: {}", e),
            })?;

        let (result, _, _) = camera.state(gstreamer::ClockTime::from_seconds(5));
        result.map_err(|e| CaptureError::PipelineStart {
            details: format!("Camera pipeline did not reach PLAYING: {}", e),
        })?;

        info!("Camera pipeline running on {}", self.device_path);
        Ok(())
    }

    fn begin_writing(&mut self, path: &Path) -> Result<(), CaptureError> {
        if !self.sink_attached {
            return Err(CaptureError::SinkAttachFailure {
                details: "File sink not attached".to_string(),
            });
        }

        let pipeline_desc = self.build_encoder_pipeline_string();
        debug!("Encoder pipeline: {}", pipeline_desc);

        let encoder = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CaptureError::SinkAttachFailure {
                details: format!("Failed to create encoder pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CaptureError::SinkAttachFailure {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let filesink = encoder
            .by_name("file")
            .ok_or_else(|| CaptureError::SinkAttachFailure {
                details: "Failed to get filesink element".to_string(),
            })?;
        filesink.set_property("location", path.to_string_lossy().to_string());

        let appsrc = encoder
            .by_name("recorder")
            .ok_or_else(|| CaptureError::SinkAttachFailure {
                details: "Failed to get appsrc element".to_string(),
            })?
            .downcast::<AppSrc>()
            .map_err(|_| CaptureError::SinkAttachFailure {
                details: "Failed to downcast to AppSrc".to_string(),
            })?;

        encoder
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CaptureError::SinkAttachFailure {
                details: format!("Failed to start encoder pipeline: {}", e),
            })?;

        *self.recorder.lock() = Some(appsrc);
        self.encoder = Some(encoder);
        Ok(())
    }

    fn finish_writing(&mut self) -> Option<FinalizeWait> {
        let appsrc = self.recorder.lock().take();
        let encoder = self.encoder.take()?;

        if let Some(appsrc) = appsrc {
            if let Err(e) = appsrc.end_of_stream() {
                warn!("Failed to signal EOS to recorder: {:?}", e);
            }
        }

        Some(Box::new(move || wait_for_eos(encoder)))
    }

    fn stop_running(&mut self) {
        self.recorder.lock().take();
        self.appsink.take();
        if let Some(camera) = self.camera.take() {
            if let Err(e) = camera.set_state(gstreamer::State::Null) {
                warn!("Failed to stop camera pipeline: {}", e);
            }
        }
    }
}

/// Block until the encoder drained to the file, then shut it down
fn wait_for_eos(encoder: Pipeline) -> Result<(), CaptureError> {
    let bus = encoder
        .bus()
        .ok_or_else(|| CaptureError::WriteFinalizeFailure {
            details: "Encoder pipeline has no bus".to_string(),
        })?;

    let mut outcome = Err(CaptureError::WriteFinalizeFailure {
        details: "Timed out waiting for the recording to finalize".to_string(),
    });

    for msg in bus.iter_timed(gstreamer::ClockTime::from_seconds(30)) {
        match msg.view() {
            gstreamer::MessageView::Eos(..) => {
                outcome = Ok(());
                break;
            }
            gstreamer::MessageView::Error(err) => {
                let details = format!(
                    "{} ({})",
                    err.error(),
                    err.debug().map(|d| d.to_string()).unwrap_or_default()
                );
                error!("Encoder error: {}", details);
                outcome = Err(CaptureError::WriteFinalizeFailure { details });
                break;
            }
            _ => {}
        }
    }

    if let Err(e) = encoder.set_state(gstreamer::State::Null) {
        warn!("Failed to stop encoder pipeline: {}", e);
    }

    outcome
}
