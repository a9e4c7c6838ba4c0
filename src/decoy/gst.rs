use super::player::{MediaSurface, SurfaceEvent};
use crate::error::DecoyError;
use gstreamer::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Muted `playbin` rendering the decoy asset to the default video sink
pub struct GstSurface {
    playbin: Option<gstreamer::Element>,
    /// Set by the bus watcher when the stream hit a real EOS instead of a
    /// segment boundary; the next rewind must flush
    needs_flush: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl GstSurface {
    pub fn new() -> Self {
        Self {
            playbin: None,
            needs_flush: Arc::new(AtomicBool::new(true)),
            stopping: Arc::new(AtomicBool::new(false)),
            watcher: None,
        }
    }

    fn playbin(&self) -> Result<&gstreamer::Element, DecoyError> {
        self.playbin.as_ref().ok_or_else(|| DecoyError::Playback {
            details: "Decoy surface not loaded".to_string(),
        })
    }

    fn spawn_bus_watcher(
        &mut self,
        bus: gstreamer::Bus,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) {
        let needs_flush = Arc::clone(&self.needs_flush);
        let stopping = Arc::clone(&self.stopping);

        self.watcher = Some(std::thread::spawn(move || {
            while !stopping.load(Ordering::Relaxed) {
                let Some(msg) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(100)) else {
                    continue;
                };

                let event = match msg.view() {
                    gstreamer::MessageView::SegmentDone(..) => Some(SurfaceEvent::EndOfMedia),
                    gstreamer::MessageView::Eos(..) => {
                        needs_flush.store(true, Ordering::Relaxed);
                        Some(SurfaceEvent::EndOfMedia)
                    }
                    gstreamer::MessageView::Error(err) => {
                        Some(SurfaceEvent::Error(err.error().to_string()))
                    }
                    _ => None,
                };

                if let Some(event) = event {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
            debug!("Decoy bus watcher exited");
        }));
    }
}

impl Default for GstSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSurface for GstSurface {
    fn load(
        &mut self,
        asset: &Path,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Result<(), DecoyError> {
        gstreamer::init().map_err(|e| DecoyError::Playback {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let absolute = asset.canonicalize().map_err(|e| DecoyError::Playback {
            details: format!("Failed to resolve {}: {}", asset.display(), e),
        })?;
        let uri = gstreamer::glib::filename_to_uri(&absolute, None).map_err(|e| {
            DecoyError::Playback {
                details: format!("Invalid asset path: {}", e),
            }
        })?;

        let playbin = gstreamer::ElementFactory::make("playbin")
            .property("uri", uri.as_str())
            .property("mute", true)
            .build()
            .map_err(|e| DecoyError::Playback {
                details: format!("Failed to create playbin: {}", e),
            })?;

        // Segment seeks need a prerolled pipeline
        playbin
            .set_state(gstreamer::State::Paused)
            .map_err(|e| DecoyError::Playback {
                details: format!("Failed to preroll decoy: {}", e),
            })?;
        let (result, _, _) = playbin.state(gstreamer::ClockTime::from_seconds(5));
        result.map_err(|e| DecoyError::Playback {
            details: format!("Decoy did not preroll: {}", e),
        })?;

        let bus = playbin.bus().ok_or_else(|| DecoyError::Playback {
            details: "Playbin has no bus".to_string(),
        })?;

        self.stopping.store(false, Ordering::Relaxed);
        self.needs_flush.store(true, Ordering::Relaxed);
        self.spawn_bus_watcher(bus, events);
        self.playbin = Some(playbin);

        info!("Decoy loaded from {}", uri);
        Ok(())
    }

    fn play(&mut self) -> Result<(), DecoyError> {
        self.playbin()?
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DecoyError::Playback {
                details: format!("Failed to play decoy: {}", e),
            })?;
        Ok(())
    }

    fn seek_to_start(&mut self) -> Result<(), DecoyError> {
        let mut flags = gstreamer::SeekFlags::SEGMENT;
        if self.needs_flush.swap(false, Ordering::Relaxed) {
            flags |= gstreamer::SeekFlags::FLUSH;
        }

        self.playbin()?
            .seek_simple(flags, gstreamer::ClockTime::ZERO)
            .map_err(|e| DecoyError::Playback {
                details: format!("Failed to rewind decoy: {}", e),
            })
    }

    fn stop(&mut self) {
        self.stopping.store(true, Ordering::Relaxed);
        if let Some(playbin) = self.playbin.take() {
            if let Err(e) = playbin.set_state(gstreamer::State::Null) {
                warn!("Failed to stop decoy playback: {}", e);
            }
        }
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}
