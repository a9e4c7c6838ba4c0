use crate::config::StorageConfig;
use crate::error::StorageError;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name layout: `yyyy-MM-dd_HH-mm-ss`
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Resolves the writable directory recordings are placed in
pub trait StorageLocator: Send + Sync {
    /// Return the recordings directory, creating it on first use
    fn recordings_dir(&self) -> Result<PathBuf, StorageError>;
}

/// Fixed subdirectory under the application's private document storage
pub struct DocumentStorage {
    base_path: PathBuf,
    subdirectory: String,
}

impl DocumentStorage {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(base_path: P, subdirectory: S) -> Self {
        Self {
            base_path: base_path.into(),
            subdirectory: subdirectory.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.base_path, config.subdirectory.clone())
    }
}

impl StorageLocator for DocumentStorage {
    fn recordings_dir(&self) -> Result<PathBuf, StorageError> {
        if self.base_path.exists() && !self.base_path.is_dir() {
            return Err(StorageError::BaseUnavailable {
                details: format!("{} is not a directory", self.base_path.display()),
            });
        }

        let dir = self.base_path.join(&self.subdirectory);
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::DirectoryCreation {
                path: dir.display().to_string(),
                source: e,
            })?;
            info!("Created recordings directory: {}", dir.display());
        }

        Ok(dir)
    }
}

/// Time source for file naming
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Output path allocated for one recording attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// Allocates timestamp-named output files inside the located directory
pub struct RecordingStore {
    locator: Arc<dyn StorageLocator>,
    extension: String,
    timezone: Option<Tz>,
    clock: Arc<dyn Clock>,
}

impl RecordingStore {
    pub fn new(locator: Arc<dyn StorageLocator>, extension: &str) -> Self {
        Self {
            locator,
            extension: extension.trim_start_matches('.').to_string(),
            timezone: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        let store = Self::new(
            Arc::new(DocumentStorage::from_config(config)),
            &config.extension,
        );
        match &config.timezone {
            Some(name) => store.with_timezone(resolve_timezone(name)),
            None => store,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Format a timestamp the way recordings are named
    pub fn file_stem(&self, timestamp: DateTime<Utc>) -> String {
        match &self.timezone {
            Some(tz) => timestamp
                .with_timezone(tz)
                .format(FILE_TIMESTAMP_FORMAT)
                .to_string(),
            None => timestamp
                .with_timezone(&Local)
                .format(FILE_TIMESTAMP_FORMAT)
                .to_string(),
        }
    }

    /// Allocate a fresh output file. An existing file with the same name gets
    /// a numeric suffix instead of being overwritten.
    pub fn allocate(&self) -> Result<OutputFile, StorageError> {
        let dir = self.locator.recordings_dir()?;
        let started_at = self.clock.now();
        let stem = self.file_stem(started_at);
        let path = unique_path(&dir, &stem, &self.extension);

        debug!("Allocated output file {}", path.display());
        Ok(OutputFile { path, started_at })
    }
}

fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut suffix = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", stem, suffix, extension));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

pub(crate) fn resolve_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Invalid storage timezone '{}', falling back to UTC", tz_name);
            chrono_tz::UTC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn fixed_store(base: &Path, at: DateTime<Utc>) -> RecordingStore {
        RecordingStore::new(Arc::new(DocumentStorage::new(base, "vipc")), ".mp4")
            .with_timezone(chrono_tz::UTC)
            .with_clock(Arc::new(FixedClock(Mutex::new(at))))
    }

    #[test]
    fn test_directory_created_on_first_use() {
        let temp = tempfile::tempdir().unwrap();
        let locator = DocumentStorage::new(temp.path().join("documents"), "vipc");

        let dir = locator.recordings_dir().unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, temp.path().join("documents").join("vipc"));

        // Second call reuses the existing directory
        assert_eq!(locator.recordings_dir().unwrap(), dir);
    }

    #[test]
    fn test_base_that_is_a_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let locator = DocumentStorage::new(file.path(), "vipc");
        assert!(matches!(
            locator.recordings_dir(),
            Err(StorageError::BaseUnavailable { .. })
        ));
    }

    #[test]
    fn test_output_file_name() {
        let temp = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let store = fixed_store(temp.path(), at);

        let output = store.allocate().unwrap();
        assert_eq!(
            output.path,
            temp.path().join("vipc").join("2024-03-09_07-05-01.mp4")
        );
        assert_eq!(output.started_at, at);
        assert_eq!(store.extension(), "mp4");
    }

    #[test]
    fn test_timezone_applies_to_name() {
        let temp = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
        let store = fixed_store(temp.path(), at).with_timezone(resolve_timezone("Asia/Tokyo"));

        assert_eq!(store.file_stem(at), "2024-01-02_08-30-00");
    }

    #[test]
    fn test_same_second_does_not_overwrite() {
        let temp = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let store = fixed_store(temp.path(), at);

        let first = store.allocate().unwrap();
        std::fs::write(&first.path, b"recorded").unwrap();

        let second = store.allocate().unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(
            second.path.file_name().unwrap().to_str().unwrap(),
            "2024-03-09_07-05-01_1.mp4"
        );
    }

    #[test]
    fn test_invalid_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Nowhere/Special"), chrono_tz::UTC);
    }
}
