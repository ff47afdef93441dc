//! Capture artifact locations and digests

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::VerifyResult;
use crate::plan::{Capture, VerificationPlan};

/// Resolves capture names from the plan against the artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
    index: PathBuf,
    detail: PathBuf,
    failure: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>, plan: &VerificationPlan) -> Self {
        let root = root.into();
        Self {
            index: root.join(plan.capture_name(Capture::Index)),
            detail: root.join(plan.capture_name(Capture::Detail)),
            failure: root.join(plan.capture_name(Capture::Failure)),
            root,
        }
    }

    /// Create the directory and remove captures left by an earlier run
    pub fn prepare(&self) -> VerifyResult<()> {
        std::fs::create_dir_all(&self.root)?;

        for path in [&self.index, &self.detail, &self.failure] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed stale capture {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn path(&self, capture: Capture) -> &Path {
        match capture {
            Capture::Index => &self.index,
            Capture::Detail => &self.detail,
            Capture::Failure => &self.failure,
        }
    }

    /// Log the SHA-256 of a freshly written capture
    pub fn record(&self, capture: Capture) {
        let path = self.path(capture);
        match sha256_file(path) {
            Ok(digest) => info!(
                capture = ?capture,
                path = %path.display(),
                sha256 = %digest,
                "Captured screenshot"
            ),
            Err(e) => warn!("Captured {} but could not hash it: {}", path.display(), e),
        }
    }
}

/// Hash a file using SHA256
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
