//! Recording state machine.
//!
//! A single control task owns [`RecordingState`](crate::state::RecordingState)
//! and the capture session. Gestures and lifecycle events reach it through
//! event bus subscriptions or the [`ControllerHandle`]; permission answers,
//! pipeline failures and settle expiries come back as messages tagged with
//! the request or session they belong to.

mod handle;
mod machine;
mod messages;

pub use self::handle::ControllerHandle;
pub use self::machine::{ControllerSettings, RecordingController};
