//! Screenshot evidence written to the file system

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::driver::PageDriver;
use crate::error::{AcceptanceError, AcceptanceResult};

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("valid screenshot name pattern"));

/// A captured screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Writes full-page screenshots into one directory
#[derive(Debug, Clone)]
pub struct EvidenceSink {
    dir: PathBuf,
}

impl EvidenceSink {
    /// A relative `dir` is resolved against the current working directory.
    /// The browser writes from its own working directory, so paths handed
    /// to the driver are always absolute.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match std::env::current_dir() {
            Ok(cwd) => Self::rooted(&cwd, dir),
            Err(e) => {
                warn!("Cannot resolve {}: {}", dir.display(), e);
                Self { dir }
            }
        }
    }

    /// Resolve a relative `dir` against `base`
    pub fn rooted(base: &Path, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = if dir.is_absolute() { dir } else { base.join(dir) };
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a screenshot of the given name is written
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", sanitize_name(name)))
    }

    /// Capture the current page.
    ///
    /// Driver failures come back as [`AcceptanceError::Capture`] unless the
    /// transport itself is gone.
    pub async fn capture<D>(&self, driver: &mut D, name: &str) -> AcceptanceResult<EvidenceRecord>
    where
        D: PageDriver + ?Sized,
    {
        let path = self.path_for(name);
        let capture_error = |reason: String| AcceptanceError::Capture {
            path: path.display().to_string(),
            reason,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| capture_error(e.to_string()))?;

        match driver.screenshot(&path, true).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(AcceptanceError::Capture { reason, .. }) => return Err(capture_error(reason)),
            Err(e) => return Err(capture_error(e.to_string())),
        }

        let data = std::fs::read(&path)
            .map_err(|e| capture_error(format!("screenshot not written: {}", e)))?;
        let sha256 = hex::encode(Sha256::digest(&data));
        debug!("Captured {} ({} bytes)", path.display(), data.len());

        Ok(EvidenceRecord {
            name: name.to_string(),
            path,
            sha256,
            bytes: data.len() as u64,
        })
    }
}

/// Make a screenshot name safe to use as a file name
pub fn sanitize_name(name: &str) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "screenshot".to_string()
    } else {
        cleaned.to_string()
    }
}
