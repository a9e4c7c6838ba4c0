use super::handle::ControllerHandle;
use super::messages::ControlMessage;
use crate::capture::{CaptureBackend, CaptureSession, RecordingCompletion, SessionPreset};
use crate::config::CaptureConfig;
use crate::decoy::DecoyPlayer;
use crate::error::CaptureError;
use crate::events::{DecoycamEvent, EventBus, EventFilter, Subscription};
use crate::idle::{IdleCoordinator, IdleGuard};
use crate::permission::{resolve_access, PermissionOracle};
use crate::state::{ControllerStatus, RecordingState};
use crate::storage::RecordingStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tunables of the capture side of the controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub preset: SessionPreset,
    /// Delay between session start and the first write
    pub settle_delay: Duration,
    pub abort_on_sink_failure: bool,
}

impl ControllerSettings {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            preset: config.preset,
            settle_delay: config.settle_delay(),
            abort_on_sink_failure: config.abort_on_sink_failure,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            preset: SessionPreset::highest(),
            settle_delay: Duration::from_millis(500),
            abort_on_sink_failure: false,
        }
    }
}

/// Collaborators of the recording state machine, consumed by
/// [`RecordingController::initialize`]
pub struct RecordingController {
    event_bus: Arc<EventBus>,
    oracle: Arc<dyn PermissionOracle>,
    backend: Arc<dyn CaptureBackend>,
    store: Arc<RecordingStore>,
    idle: Arc<IdleCoordinator>,
    decoy: Option<Box<dyn DecoyPlayer>>,
    settings: ControllerSettings,
}

impl RecordingController {
    pub fn new(
        event_bus: Arc<EventBus>,
        oracle: Arc<dyn PermissionOracle>,
        backend: Arc<dyn CaptureBackend>,
        store: Arc<RecordingStore>,
        idle: Arc<IdleCoordinator>,
    ) -> Self {
        Self {
            event_bus,
            oracle,
            backend,
            store,
            idle,
            decoy: None,
            settings: ControllerSettings::default(),
        }
    }

    pub fn with_decoy(mut self, decoy: Box<dyn DecoyPlayer>) -> Self {
        self.decoy = Some(decoy);
        self
    }

    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start the decoy, register on the event bus, suppress idle and spawn
    /// the control task.
    ///
    /// A decoy that fails to start is reported on the handle; the controller
    /// still accepts gestures.
    pub async fn initialize(mut self) -> ControllerHandle {
        let decoy_error = match self.decoy.as_mut().map(|decoy| decoy.start()) {
            Some(Err(e)) => {
                error!("Decoy failed to start: {}", e);
                Some(e)
            }
            _ => None,
        };

        let (tx, rx) = mpsc::unbounded_channel();

        // One handler for both inputs keeps them in bus order
        let input_tx = tx.clone();
        let input = self.event_bus.subscribe_with(
            "controller.input",
            EventFilter::EventTypes(vec!["toggle_gesture", "lost_focus"]),
            move |event| {
                let message = match event {
                    DecoycamEvent::ToggleGesture { .. } => ControlMessage::Toggle,
                    DecoycamEvent::LostFocus { .. } => ControlMessage::LostFocus,
                    _ => return,
                };
                let _ = input_tx.send(message);
            },
        );

        let idle_guard = self.idle.acquire();
        let (status_tx, status_rx) = watch::channel(ControllerStatus::idle());

        let control = ControlLoop {
            state: RecordingState::Idle,
            event_bus: self.event_bus,
            oracle: self.oracle,
            backend: self.backend,
            store: self.store,
            settings: self.settings,
            tx: tx.clone(),
            status_tx,
            session: None,
            next_request: 0,
            pending_request: None,
            next_session: 0,
            cancel: CancellationToken::new(),
            subscriptions: vec![input],
            idle_guard: Some(idle_guard),
            decoy: self.decoy,
        };

        let task = tokio::spawn(control.run(rx));
        info!("Recording controller initialized");

        ControllerHandle::new(tx, status_rx, decoy_error, task)
    }
}

struct ActiveSession {
    id: u64,
    /// Log label, unique across restarts
    label: String,
    capture: CaptureSession,
    settle: CancellationToken,
}

enum WriteAttempt {
    Started(PathBuf),
    Failed { component: &'static str, error: String },
}

/// Owns the recording state; every transition happens on this task
struct ControlLoop {
    state: RecordingState,
    event_bus: Arc<EventBus>,
    oracle: Arc<dyn PermissionOracle>,
    backend: Arc<dyn CaptureBackend>,
    store: Arc<RecordingStore>,
    settings: ControllerSettings,
    tx: mpsc::UnboundedSender<ControlMessage>,
    status_tx: watch::Sender<ControllerStatus>,
    session: Option<ActiveSession>,
    next_request: u64,
    pending_request: Option<u64>,
    next_session: u64,
    /// Parent of every permission request and settle timer
    cancel: CancellationToken,
    subscriptions: Vec<Subscription>,
    idle_guard: Option<IdleGuard>,
    decoy: Option<Box<dyn DecoyPlayer>>,
}

impl ControlLoop {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControlMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                ControlMessage::Toggle => self.on_toggle().await,
                ControlMessage::LostFocus => self.on_lost_focus().await,
                ControlMessage::PermissionResolved { request, granted } => {
                    self.on_permission_resolved(request, granted).await
                }
                ControlMessage::PipelineFailed { session, error } => {
                    self.on_pipeline_failed(session, error).await
                }
                ControlMessage::SettleElapsed { session } => self.on_settle_elapsed(session).await,
                ControlMessage::Teardown { done } => {
                    self.teardown().await;
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    break;
                }
            }
        }
        debug!("Controller task exited");
    }

    async fn on_toggle(&mut self) {
        match self.state {
            RecordingState::Idle => self.request_permission().await,
            RecordingState::PermissionPending => {
                debug!("Toggle ignored while waiting for permission");
            }
            RecordingState::Recording => {
                let _ = self.stop_recording("toggle").await;
            }
        }
    }

    async fn on_lost_focus(&mut self) {
        if self.state == RecordingState::Recording {
            info!("Lost focus while recording, stopping");
            let _ = self.stop_recording("lost focus").await;
        } else {
            debug!("Lost focus in {:?}, nothing to stop", self.state);
        }
    }

    async fn request_permission(&mut self) {
        self.next_request += 1;
        let request = self.next_request;
        self.pending_request = Some(request);
        self.transition(RecordingState::PermissionPending).await;

        let oracle = Arc::clone(&self.oracle);
        let tx = self.tx.clone();
        let token = self.cancel.child_token();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Permission request {} abandoned", request);
                }
                granted = resolve_access(oracle.as_ref()) => {
                    let _ = tx.send(ControlMessage::PermissionResolved { request, granted });
                }
            }
        });
    }

    async fn on_permission_resolved(&mut self, request: u64, granted: bool) {
        if self.state != RecordingState::PermissionPending || self.pending_request != Some(request)
        {
            debug!("Dropping stale permission answer for request {}", request);
            return;
        }
        self.pending_request = None;
        self.emit(DecoycamEvent::PermissionResolved { granted }).await;

        if granted {
            self.open_session().await;
        } else {
            info!("Camera access denied");
            self.transition(RecordingState::Idle).await;
        }
    }

    /// Build the session, enter Recording and schedule the first write
    async fn open_session(&mut self) {
        let capture = match CaptureSession::configure(
            self.backend.as_ref(),
            self.settings.preset,
            self.settings.abort_on_sink_failure,
        ) {
            Ok(capture) => capture,
            Err(e) => {
                error!("Failed to build capture session: {}", e);
                self.emit(DecoycamEvent::SystemError {
                    component: "capture".to_string(),
                    error: e.to_string(),
                })
                .await;
                self.transition(RecordingState::Idle).await;
                return;
            }
        };

        self.next_session += 1;
        let id = self.next_session;
        let label = Uuid::new_v4().to_string();
        let degraded = capture.degraded_reason().map(str::to_string);
        let running = capture.start_running();
        let settle = self.cancel.child_token();

        self.session = Some(ActiveSession {
            id,
            label: label.clone(),
            capture,
            settle: settle.clone(),
        });
        info!("Capture session {} constructed", label);
        self.transition(RecordingState::Recording).await;
        self.emit(DecoycamEvent::SessionConstructed {
            session_id: label.clone(),
        })
        .await;
        if let Some(reason) = degraded {
            warn!("Session {} has no file output: {}", label, reason);
            self.emit(DecoycamEvent::SessionDegraded {
                session_id: label,
                reason,
            })
            .await;
        }

        let tx = self.tx.clone();
        let delay = self.settings.settle_delay;
        tokio::spawn(async move {
            if let Err(error) = running.await {
                let _ = tx.send(ControlMessage::PipelineFailed { session: id, error });
                return;
            }
            tokio::select! {
                _ = settle.cancelled() => {}
                _ = sleep(delay) => {
                    let _ = tx.send(ControlMessage::SettleElapsed { session: id });
                }
            }
        });
    }

    async fn on_settle_elapsed(&mut self, session: u64) {
        let Some(active) = self.session.as_ref().filter(|active| active.id == session) else {
            debug!("Dropping settle expiry of finished session {}", session);
            return;
        };
        let label = active.label.clone();
        if active.capture.is_degraded() {
            debug!("Session {} is degraded, not writing", label);
            return;
        }

        // Directory creation and collision probes touch the filesystem
        let store = Arc::clone(&self.store);
        let allocated = match tokio::task::spawn_blocking(move || store.allocate()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let attempt = match allocated {
            Err(error) => WriteAttempt::Failed {
                component: "storage",
                error,
            },
            Ok(output) => {
                // Nothing else touches the session while this handler runs
                let Some(active) = self.session.as_mut() else {
                    return;
                };
                match active.capture.start(&output.path) {
                    Ok(completion) => {
                        spawn_completion_watcher(Arc::clone(&self.event_bus), completion);
                        WriteAttempt::Started(output.path)
                    }
                    Err(e) => WriteAttempt::Failed {
                        component: "capture",
                        error: e.to_string(),
                    },
                }
            }
        };

        match attempt {
            WriteAttempt::Started(path) => {
                self.publish_status();
                self.emit(DecoycamEvent::RecordingStarted {
                    session_id: label,
                    path,
                })
                .await;
            }
            WriteAttempt::Failed { component, error } => {
                error!("Session {} continues without writing: {}", label, error);
                self.emit(DecoycamEvent::SystemError {
                    component: component.to_string(),
                    error,
                })
                .await;
            }
        }
    }

    async fn on_pipeline_failed(&mut self, session: u64, error: CaptureError) {
        if !self.session.as_ref().is_some_and(|active| active.id == session) {
            debug!("Dropping pipeline failure of finished session {}", session);
            return;
        }

        error!("Capture pipeline failed to start: {}", error);
        self.emit(DecoycamEvent::SystemError {
            component: "capture".to_string(),
            error: error.to_string(),
        })
        .await;
        let _ = self.stop_recording("pipeline failure").await;
    }

    /// Finalize, go Idle, then release. Returns the release task so teardown
    /// can wait for the pipeline to stop.
    async fn stop_recording(&mut self, reason: &str) -> Option<JoinHandle<()>> {
        if self.state != RecordingState::Recording {
            return None;
        }

        let Some(active) = self.session.take() else {
            warn!("Recording without a session, resetting");
            self.transition(RecordingState::Idle).await;
            return None;
        };

        info!("Stopping session {} ({})", active.label, reason);
        active.settle.cancel();

        let mut capture = active.capture;
        self.emit(DecoycamEvent::FinalizeRequested {
            session_id: active.label.clone(),
        })
        .await;
        capture.stop();

        self.transition(RecordingState::Idle).await;

        let release = capture.release();
        self.emit(DecoycamEvent::SessionReleased {
            session_id: active.label,
        })
        .await;
        Some(release)
    }

    async fn teardown(&mut self) {
        info!("Tearing down recording controller");

        for subscription in self.subscriptions.iter_mut() {
            subscription.release();
        }
        self.subscriptions.clear();
        self.idle_guard.take();

        self.cancel.cancel();
        if let Some(release) = self.stop_recording("teardown").await {
            if let Err(e) = release.await {
                warn!("Session release did not complete: {}", e);
            }
        }
        if self.state == RecordingState::PermissionPending {
            self.pending_request = None;
            self.transition(RecordingState::Idle).await;
        }

        if let Some(mut decoy) = self.decoy.take() {
            let stopped = tokio::task::spawn_blocking(move || decoy.stop()).await;
            if let Err(e) = stopped {
                warn!("Decoy did not stop cleanly: {}", e);
            }
        }
    }

    async fn transition(&mut self, to: RecordingState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!("Recording state {:?} -> {:?}", from, to);

        self.publish_status();
        self.emit(DecoycamEvent::StateChanged { from, to }).await;
    }

    fn publish_status(&self) {
        let session = self.session.as_ref();
        let status = ControllerStatus {
            state: self.state,
            session_active: session.is_some(),
            degraded: session.is_some_and(|active| active.capture.is_degraded()),
            output: session
                .and_then(|active| active.capture.output_path())
                .map(|path| path.to_path_buf()),
        };
        self.status_tx.send_replace(status);
    }

    async fn emit(&self, event: DecoycamEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            debug!("Controller event not delivered: {}", e);
        }
    }
}

fn spawn_completion_watcher(event_bus: Arc<EventBus>, completion: RecordingCompletion) {
    tokio::spawn(async move {
        let outcome = completion.await;
        match &outcome.error {
            None => info!("Recording saved to {}", outcome.path.display()),
            Some(e) => error!("Recording {} failed: {}", outcome.path.display(), e),
        }

        let _ = event_bus
            .publish(DecoycamEvent::RecordingFinished {
                path: outcome.path,
                error: outcome.error.map(|e| e.to_string()),
            })
            .await;
    });
}
