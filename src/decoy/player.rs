use crate::error::DecoyError;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Notifications from a media surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    EndOfMedia,
    Error(String),
}

/// Something that can show a silent media asset on the primary surface
pub trait MediaSurface: Send + 'static {
    /// Load `asset`; end-of-media and errors are reported on `events`
    fn load(
        &mut self,
        asset: &Path,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Result<(), DecoyError>;

    fn play(&mut self) -> Result<(), DecoyError>;

    /// Rewind to position zero without blanking the current frame
    fn seek_to_start(&mut self) -> Result<(), DecoyError>;

    fn stop(&mut self);
}

/// Decoy video lifecycle as seen by the recording controller
pub trait DecoyPlayer: Send + Sync {
    /// Begin playback from zero and keep looping
    fn start(&mut self) -> Result<(), DecoyError>;

    fn stop(&mut self);

    fn is_playing(&self) -> bool;
}

/// Loops a surface forever: every end of media rewinds and resumes in the
/// same handler turn
pub struct LoopingDecoy<S: MediaSurface> {
    asset: PathBuf,
    surface: Arc<Mutex<S>>,
    loops: Arc<AtomicU64>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<S: MediaSurface> LoopingDecoy<S> {
    pub fn new<P: Into<PathBuf>>(asset: P, surface: S) -> Self {
        Self {
            asset: asset.into(),
            surface: Arc::new(Mutex::new(surface)),
            loops: Arc::new(AtomicU64::new(0)),
            token: CancellationToken::new(),
            task: None,
        }
    }

    /// Number of completed passes through the asset
    pub fn loops_completed(&self) -> u64 {
        self.loops.load(Ordering::Relaxed)
    }

    fn restart(surface: &Mutex<S>) -> Result<(), DecoyError> {
        let mut surface = surface.lock();
        surface.seek_to_start()?;
        surface.play()
    }
}

impl<S: MediaSurface> DecoyPlayer for LoopingDecoy<S> {
    fn start(&mut self) -> Result<(), DecoyError> {
        if self.task.is_some() {
            debug!("Decoy already playing");
            return Ok(());
        }

        if !self.asset.is_file() {
            error!("Decoy asset not found: {}", self.asset.display());
            return Err(DecoyError::AssetMissing {
                path: self.asset.display().to_string(),
            });
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        {
            let mut surface = self.surface.lock();
            surface.load(&self.asset, events_tx)?;
        }
        Self::restart(&self.surface)?;

        self.token = CancellationToken::new();
        let token = self.token.clone();
        let surface = Arc::clone(&self.surface);
        let loops = Arc::clone(&self.loops);

        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events_rx.recv() => match event {
                        Some(SurfaceEvent::EndOfMedia) => {
                            if let Err(e) = Self::restart(&surface) {
                                warn!("Failed to rewind decoy: {}", e);
                            }
                            loops.fetch_add(1, Ordering::Relaxed);
                        }
                        Some(SurfaceEvent::Error(details)) => {
                            error!("Decoy surface error: {}", details);
                        }
                        None => break,
                    },
                }
            }
            debug!("Decoy loop task exited");
        }));

        info!("Decoy playback started: {}", self.asset.display());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.token.cancel();
            task.abort();
            self.surface.lock().stop();
            info!(
                "Decoy playback stopped after {} loops",
                self.loops_completed()
            );
        }
    }

    fn is_playing(&self) -> bool {
        self.task.is_some()
    }
}

impl<S: MediaSurface> Drop for LoopingDecoy<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[derive(Default)]
    struct ScriptedSurface {
        calls: Arc<Mutex<Vec<&'static str>>>,
        events: Arc<Mutex<Option<mpsc::UnboundedSender<SurfaceEvent>>>>,
    }

    impl MediaSurface for ScriptedSurface {
        fn load(
            &mut self,
            _asset: &Path,
            events: mpsc::UnboundedSender<SurfaceEvent>,
        ) -> Result<(), DecoyError> {
            self.calls.lock().push("load");
            *self.events.lock() = Some(events);
            Ok(())
        }

        fn play(&mut self) -> Result<(), DecoyError> {
            self.calls.lock().push("play");
            Ok(())
        }

        fn seek_to_start(&mut self) -> Result<(), DecoyError> {
            self.calls.lock().push("seek");
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().push("stop");
        }
    }

    #[tokio::test]
    async fn test_missing_asset_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut decoy = LoopingDecoy::new(dir.path().join("blackloop.mp4"), ScriptedSurface::default());

        let result = decoy.start();
        assert!(matches!(result, Err(DecoyError::AssetMissing { .. })));
        assert!(!decoy.is_playing());
    }

    #[tokio::test]
    async fn test_end_of_media_rewinds_and_resumes() {
        let asset = tempfile::NamedTempFile::new().unwrap();
        let surface = ScriptedSurface::default();
        let calls = Arc::clone(&surface.calls);
        let events = Arc::clone(&surface.events);

        let mut decoy = LoopingDecoy::new(asset.path(), surface);
        decoy.start().unwrap();
        assert!(decoy.is_playing());
        assert_eq!(*calls.lock(), vec!["load", "seek", "play"]);

        let sender = events.lock().clone().unwrap();
        sender.send(SurfaceEvent::EndOfMedia).unwrap();
        sender.send(SurfaceEvent::EndOfMedia).unwrap();

        timeout(Duration::from_secs(2), async {
            while decoy.loops_completed() < 2 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(
            *calls.lock(),
            vec!["load", "seek", "play", "seek", "play", "seek", "play"]
        );

        decoy.stop();
        assert!(!decoy.is_playing());
        assert_eq!(calls.lock().last(), Some(&"stop"));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let asset = tempfile::NamedTempFile::new().unwrap();
        let surface = ScriptedSurface::default();
        let calls = Arc::clone(&surface.calls);

        let mut decoy = LoopingDecoy::new(asset.path(), surface);
        decoy.start().unwrap();
        decoy.start().unwrap();
        assert_eq!(calls.lock().iter().filter(|c| **c == "load").count(), 1);
    }
}
