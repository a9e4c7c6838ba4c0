use crate::capture::SessionPreset;
use crate::permission::PermissionStatus;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DecoycamConfig {
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
    pub decoy: DecoyConfig,
    pub gesture: GestureConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Private document directory the recordings folder lives under
    #[serde(default = "default_storage_base_path")]
    pub base_path: String,

    /// Fixed subdirectory created on first use
    #[serde(default = "default_storage_subdirectory")]
    pub subdirectory: String,

    /// Container extension appended to every recording
    #[serde(default = "default_storage_extension")]
    pub extension: String,

    /// IANA timezone for file names; local time when unset
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_capture_device_index")]
    pub device_index: u32,

    /// Session quality preset
    #[serde(default = "default_capture_preset")]
    pub preset: SessionPreset,

    /// Frames per second requested from the camera
    #[serde(default = "default_capture_fps")]
    pub fps: u32,

    /// Warm-up delay between pipeline start and the first written frame
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Abort the start transition instead of recording without an output sink
    #[serde(default = "default_abort_on_sink_failure")]
    pub abort_on_sink_failure: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DecoyConfig {
    /// Enable decoy playback
    #[serde(default = "default_decoy_enabled")]
    pub enabled: bool,

    /// Silent media asset looped on the primary surface
    #[serde(default = "default_decoy_asset_path")]
    pub asset_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GestureConfig {
    /// Maximum gap between the two taps of a toggle
    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,

    /// Read gestures from the controlling terminal
    #[serde(default = "default_keyboard_enabled")]
    pub keyboard: bool,

    /// Touch input device path
    pub touch_device: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PermissionConfig {
    /// Fixed answer for hosts without a camera permission model; the device
    /// node is checked when unset
    pub fixed_status: Option<PermissionStatus>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl CaptureConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn device_path(&self) -> String {
        format!("/dev/video{}", self.device_index)
    }
}

impl GestureConfig {
    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }
}

impl DecoycamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("decoycam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("storage.base_path", default_storage_base_path())?
            .set_default("storage.subdirectory", default_storage_subdirectory())?
            .set_default("storage.extension", default_storage_extension())?
            .set_default("capture.device_index", default_capture_device_index())?
            .set_default("capture.preset", "high")?
            .set_default("capture.fps", default_capture_fps())?
            .set_default("capture.settle_delay_ms", default_settle_delay_ms())?
            .set_default(
                "capture.abort_on_sink_failure",
                default_abort_on_sink_failure(),
            )?
            .set_default("decoy.enabled", default_decoy_enabled())?
            .set_default("decoy.asset_path", default_decoy_asset_path())?
            .set_default(
                "gesture.double_tap_window_ms",
                default_double_tap_window_ms(),
            )?
            .set_default("gesture.keyboard", default_keyboard_enabled())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // DECOYCAM__CAPTURE__SETTLE_DELAY_MS=250
            .add_source(Environment::with_prefix("DECOYCAM").separator("__"))
            .build()?;

        let config: DecoycamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.subdirectory.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage subdirectory must not be empty".to_string(),
            ));
        }

        if self.storage.subdirectory.contains(['/', '\\']) || self.storage.subdirectory == ".." {
            return Err(ConfigError::Message(
                "Storage subdirectory must be a single path component".to_string(),
            ));
        }

        let extension = self.storage.extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Message(format!(
                "Storage extension '{}' must be non-empty and alphanumeric",
                self.storage.extension
            )));
        }

        if let Some(tz) = &self.storage.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!(
                    "Unknown storage timezone '{}'",
                    tz
                )));
            }
        }

        if self.capture.fps == 0 {
            return Err(ConfigError::Message(
                "Capture fps must be greater than 0".to_string(),
            ));
        }

        if self.gesture.double_tap_window_ms == 0 {
            return Err(ConfigError::Message(
                "Double tap window must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for DecoycamConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                base_path: default_storage_base_path(),
                subdirectory: default_storage_subdirectory(),
                extension: default_storage_extension(),
                timezone: None,
            },
            capture: CaptureConfig {
                device_index: default_capture_device_index(),
                preset: default_capture_preset(),
                fps: default_capture_fps(),
                settle_delay_ms: default_settle_delay_ms(),
                abort_on_sink_failure: default_abort_on_sink_failure(),
            },
            decoy: DecoyConfig {
                enabled: default_decoy_enabled(),
                asset_path: default_decoy_asset_path(),
            },
            gesture: GestureConfig {
                double_tap_window_ms: default_double_tap_window_ms(),
                keyboard: default_keyboard_enabled(),
                touch_device: None,
            },
            permission: PermissionConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_storage_base_path() -> String {
    "./documents".to_string()
}
fn default_storage_subdirectory() -> String {
    "vipc".to_string()
}
fn default_storage_extension() -> String {
    "mp4".to_string()
}

fn default_capture_device_index() -> u32 {
    0
}
fn default_capture_preset() -> SessionPreset {
    SessionPreset::High
}
fn default_capture_fps() -> u32 {
    30
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_abort_on_sink_failure() -> bool {
    false
}

fn default_decoy_enabled() -> bool {
    true
}
fn default_decoy_asset_path() -> String {
    "assets/blackloop.mp4".to_string()
}

fn default_double_tap_window_ms() -> u64 {
    300
}
fn default_keyboard_enabled() -> bool {
    true
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DecoycamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.capture.device_path(), "/dev/video0");
        assert_eq!(config.storage.subdirectory, "vipc");
    }

    #[test]
    fn test_config_validation() {
        let mut config = DecoycamConfig::default();

        config.storage.extension = "m p4".to_string();
        assert!(config.validate().is_err());

        config.storage.extension = ".mov".to_string();
        assert!(config.validate().is_ok());

        config.storage.subdirectory = "../escape".to_string();
        assert!(config.validate().is_err());
        config.storage.subdirectory = "vipc".to_string();

        config.storage.timezone = Some("Mars/Olympus".to_string());
        assert!(config.validate().is_err());

        config.storage.timezone = Some("Europe/Berlin".to_string());
        assert!(config.validate().is_ok());

        config.capture.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[storage]
extension = "mov"

[capture]
settle_delay_ms = 250
preset = "medium"

[permission]
fixed_status = "authorized"
"#
        )
        .unwrap();

        let config = DecoycamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.storage.extension, "mov");
        assert_eq!(config.storage.subdirectory, "vipc");
        assert_eq!(config.capture.settle_delay_ms, 250);
        assert_eq!(config.capture.preset, SessionPreset::Medium);
        assert_eq!(
            config.permission.fixed_status,
            Some(PermissionStatus::Authorized)
        );
        assert_eq!(config.gesture.double_tap_window_ms, 300);
    }

    #[test]
    fn test_default_config_serializes() {
        let rendered = toml::to_string_pretty(&DecoycamConfig::default()).unwrap();
        assert!(rendered.contains("[capture]"));
        assert!(rendered.contains("settle_delay_ms = 500"));
    }
}
