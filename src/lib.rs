pub mod app;
pub mod capture;
pub mod config;
pub mod controller;
pub mod decoy;
pub mod error;
pub mod events;
pub mod gesture;
pub mod idle;
pub mod permission;
pub mod state;
pub mod storage;

pub use app::{ComponentState, DecoycamApp, ShutdownReason};
pub use capture::{
    CaptureBackend, CapturePipeline, CaptureSession, RecordingCompletion, RecordingOutcome,
    SessionPreset, UnavailableCaptureBackend,
};
pub use config::DecoycamConfig;
pub use controller::{ControllerHandle, ControllerSettings, RecordingController};
pub use decoy::{DecoyPlayer, LoopingDecoy, MediaSurface, SurfaceEvent};
pub use error::{CaptureError, DecoyError, DecoycamError, Result, StorageError};
pub use events::{DecoycamEvent, EventBus, EventFilter, EventReceiver, Subscription};
pub use gesture::{DoubleTapDetector, KeyboardGestureSource};
pub use idle::{IdleCoordinator, IdleGuard, IdleInhibitor, LogOnlyInhibitor};
pub use permission::{
    resolve_access, DeviceNodePermissionOracle, FixedPermissionOracle, PermissionOracle,
    PermissionStatus,
};
pub use state::{ControllerStatus, RecordingState};
pub use storage::{DocumentStorage, OutputFile, RecordingStore, StorageLocator};
