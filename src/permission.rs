use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current authorization for camera capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Authorized,
    Denied,
    /// Not decided yet; [`PermissionOracle::prompt`] asks the user
    PromptUser,
}

/// Asynchronous camera authorization boundary.
///
/// `prompt` resolves exactly once per call. Callers must not query again while
/// a prompt is outstanding.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn query(&self) -> PermissionStatus;

    async fn prompt(&self) -> bool;
}

/// Collapse the oracle's answer into a grant decision, prompting if needed.
pub async fn resolve_access(oracle: &dyn PermissionOracle) -> bool {
    match oracle.query().await {
        PermissionStatus::Authorized => true,
        PermissionStatus::Denied => false,
        PermissionStatus::PromptUser => {
            debug!("Camera permission undecided, prompting");
            oracle.prompt().await
        }
    }
}

/// Oracle answering from a fixed status. A `PromptUser` status prompts with
/// the configured answer.
pub struct FixedPermissionOracle {
    status: PermissionStatus,
    prompt_answer: bool,
}

impl FixedPermissionOracle {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status,
            prompt_answer: status == PermissionStatus::Authorized,
        }
    }

    pub fn prompting(answer: bool) -> Self {
        Self {
            status: PermissionStatus::PromptUser,
            prompt_answer: answer,
        }
    }
}

#[async_trait]
impl PermissionOracle for FixedPermissionOracle {
    async fn query(&self) -> PermissionStatus {
        self.status
    }

    async fn prompt(&self) -> bool {
        self.prompt_answer
    }
}

/// Oracle backed by access rights on a V4L2 device node.
///
/// Linux has no prompt flow: the node is either usable by this process or not.
pub struct DeviceNodePermissionOracle {
    device_path: PathBuf,
}

impl DeviceNodePermissionOracle {
    pub fn new<P: AsRef<Path>>(device_path: P) -> Self {
        Self {
            device_path: device_path.as_ref().to_path_buf(),
        }
    }

    fn check_access(path: &Path) -> PermissionStatus {
        if !path.exists() {
            warn!("Camera device {} not present", path.display());
            return PermissionStatus::Denied;
        }

        let c_path = match CString::new(path.to_string_lossy().as_bytes()) {
            Ok(c_path) => c_path,
            Err(_) => return PermissionStatus::Denied,
        };

        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
        let rc = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) };
        if rc == 0 {
            PermissionStatus::Authorized
        } else {
            info!(
                "No read/write access to camera device {}",
                path.display()
            );
            PermissionStatus::Denied
        }
    }
}

#[async_trait]
impl PermissionOracle for DeviceNodePermissionOracle {
    async fn query(&self) -> PermissionStatus {
        let path = self.device_path.clone();
        tokio::task::spawn_blocking(move || Self::check_access(&path))
            .await
            .unwrap_or(PermissionStatus::Denied)
    }

    async fn prompt(&self) -> bool {
        // No interactive flow; re-check instead
        self.query().await == PermissionStatus::Authorized
    }
}
