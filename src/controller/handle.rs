use super::messages::ControlMessage;
use crate::error::DecoyError;
use crate::state::{ControllerStatus, RecordingState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Caller side of a running [`RecordingController`](super::RecordingController).
///
/// Dropping the handle without [`teardown`](Self::teardown) still tears the
/// controller down, but nobody waits for it.
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
    status: watch::Receiver<ControllerStatus>,
    decoy_error: Option<DecoyError>,
    task: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<ControlMessage>,
        status: watch::Receiver<ControllerStatus>,
        decoy_error: Option<DecoyError>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            tx,
            status,
            decoy_error,
            task: Some(task),
        }
    }

    /// Same as a toggle gesture arriving on the bus
    pub fn toggle(&self) {
        self.send(ControlMessage::Toggle);
    }

    /// Same as a lost-focus event arriving on the bus
    pub fn lost_focus(&self) {
        self.send(ControlMessage::LostFocus);
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> RecordingState {
        self.status.borrow().state
    }

    /// Receiver updated after every transition
    pub fn subscribe_status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    /// Why the decoy is not playing, if it failed to start
    pub fn decoy_error(&self) -> Option<&DecoyError> {
        self.decoy_error.as_ref()
    }

    /// Stop any recording, release subscriptions and idle suppression, stop
    /// the decoy and wait for the control task to exit
    pub async fn teardown(mut self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .tx
            .send(ControlMessage::Teardown {
                done: Some(done_tx),
            })
            .is_ok()
        {
            let _ = done_rx.await;
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Controller task ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, message: ControlMessage) {
        if self.tx.send(message).is_err() {
            debug!("Controller already torn down, input dropped");
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            let _ = self.tx.send(ControlMessage::Teardown { done: None });
        }
    }
}
