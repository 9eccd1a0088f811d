//! Exclusive per-project lock

use crate::core::{PipelineError, ProjectLayout, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Advisory lock on `<agent_dir>/.lock`, released on drop
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Take the lock or fail immediately with `ProjectLocked`
    pub fn acquire(layout: &ProjectLayout) -> Result<Self> {
        std::fs::create_dir_all(layout.agent_dir())?;
        let path = layout.lock_path();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired project lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(PipelineError::ProjectLocked(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release project lock {}: {}", self.path.display(), e);
        }
    }
}
