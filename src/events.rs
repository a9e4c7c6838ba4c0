use crate::error::EventBusError;
use crate::state::RecordingState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events that can occur in the decoycam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DecoycamEvent {
    /// The distinguishing toggle gesture was recognised
    ToggleGesture { timestamp: SystemTime },
    /// The application stopped being the active foreground surface
    LostFocus { timestamp: SystemTime },
    /// Recording controller moved between states
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    /// Permission oracle answered a pending request
    PermissionResolved { granted: bool },
    /// A capture session was built for a granted request
    SessionConstructed { session_id: String },
    /// The session runs without a file sink and will not produce output
    SessionDegraded { session_id: String, reason: String },
    /// File writing began after the settle window
    RecordingStarted { session_id: String, path: PathBuf },
    /// The file sink was asked to flush and close
    FinalizeRequested { session_id: String },
    /// Session pipeline, input and sink were dropped
    SessionReleased { session_id: String },
    /// Completion signal of the file sink
    RecordingFinished {
        path: PathBuf,
        error: Option<String>,
    },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl DecoycamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DecoycamEvent::ToggleGesture { .. } => "Toggle gesture".to_string(),
            DecoycamEvent::LostFocus { .. } => "Application lost focus".to_string(),
            DecoycamEvent::StateChanged { from, to } => {
                format!("Recording state {:?} -> {:?}", from, to)
            }
            DecoycamEvent::PermissionResolved { granted } => format!(
                "Camera permission {}",
                if *granted { "granted" } else { "denied" }
            ),
            DecoycamEvent::SessionConstructed { session_id } => {
                format!("Session {} constructed", session_id)
            }
            DecoycamEvent::SessionDegraded { session_id, reason } => {
                format!("Session {} degraded: {}", session_id, reason)
            }
            DecoycamEvent::RecordingStarted { session_id, path } => {
                format!("Session {} writing to {}", session_id, path.display())
            }
            DecoycamEvent::FinalizeRequested { session_id } => {
                format!("Session {} finalizing", session_id)
            }
            DecoycamEvent::SessionReleased { session_id } => {
                format!("Session {} released", session_id)
            }
            DecoycamEvent::RecordingFinished { path, error } => match error {
                Some(error) => format!("Recording {} failed: {}", path.display(), error),
                None => format!("Recording saved to {}", path.display()),
            },
            DecoycamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            DecoycamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DecoycamEvent::ToggleGesture { .. } => "toggle_gesture",
            DecoycamEvent::LostFocus { .. } => "lost_focus",
            DecoycamEvent::StateChanged { .. } => "state_changed",
            DecoycamEvent::PermissionResolved { .. } => "permission_resolved",
            DecoycamEvent::SessionConstructed { .. } => "session_constructed",
            DecoycamEvent::SessionDegraded { .. } => "session_degraded",
            DecoycamEvent::RecordingStarted { .. } => "recording_started",
            DecoycamEvent::FinalizeRequested { .. } => "finalize_requested",
            DecoycamEvent::SessionReleased { .. } => "session_released",
            DecoycamEvent::RecordingFinished { .. } => "recording_finished",
            DecoycamEvent::SystemError { .. } => "system_error",
            DecoycamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<DecoycamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<DecoycamEvent> {
        self.sender.subscribe()
    }

    /// Register a handler for matching events.
    ///
    /// The receiver is created before this returns, so events published after
    /// the call are never missed. The handler runs on a spawned task until the
    /// returned [`Subscription`] is released or dropped.
    pub fn subscribe_with<F>(&self, name: &str, filter: EventFilter, mut handler: F) -> Subscription
    where
        F: FnMut(DecoycamEvent) + Send + 'static,
    {
        let mut receiver = EventReceiver::new(self.subscribe(), filter, name.to_string());
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task_name = name.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => handler(event),
                        Err(EventBusError::Lagged { .. }) => continue,
                        Err(_) => break,
                    },
                }
            }
            debug!("Subscription '{}' ended", task_name);
        });

        debug!("Subscription '{}' registered", name);
        Subscription {
            name: name.to_string(),
            token,
            task: Some(task),
        }
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: DecoycamEvent) -> Result<usize, EventBusError> {
        match &event {
            DecoycamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            DecoycamEvent::RecordingFinished { error: Some(_), .. } => {
                warn!("{}", event.description());
            }
            DecoycamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Publishing event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &DecoycamEvent) -> bool {
        match self {
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<DecoycamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<DecoycamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<DecoycamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<DecoycamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

/// Handle for a handler registered with [`EventBus::subscribe_with`].
pub struct Subscription {
    name: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Unregister the handler. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                self.token.cancel();
                task.abort();
                debug!("Subscription '{}' released", self.name);
                true
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
