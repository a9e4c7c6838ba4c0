use crate::error::CaptureError;
use tokio::sync::oneshot;

/// Inputs of the control task.
///
/// Results of spawned work carry the id of the request or session they
/// belong to; the control task drops ones that no longer match.
#[derive(Debug)]
pub(crate) enum ControlMessage {
    Toggle,
    LostFocus,
    PermissionResolved { request: u64, granted: bool },
    PipelineFailed { session: u64, error: CaptureError },
    SettleElapsed { session: u64 },
    Teardown { done: Option<oneshot::Sender<()>> },
}
