//! Full-screen looping decoy video shown while the app is in the foreground.

#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod player;

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::GstSurface;
pub use player::{DecoyPlayer, LoopingDecoy, MediaSurface, SurfaceEvent};
