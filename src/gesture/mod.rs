mod double_tap;
mod keyboard;
#[cfg(all(feature = "touch", target_os = "linux"))]
mod touch;

pub use double_tap::DoubleTapDetector;
pub use keyboard::KeyboardGestureSource;
#[cfg(all(feature = "touch", target_os = "linux"))]
pub use touch::TouchGestureSource;
