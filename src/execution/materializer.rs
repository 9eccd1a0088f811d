//! Materializer - decides per action between writing a file and flagging it
//! for manual review

use crate::core::{
    action::{validate_relative_path, FileAction, Operation},
    error::PipelineError,
    state::{AppliedFile, Materialization, ReviewItem, ReviewReason},
};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Applies scheduled actions under a target directory
///
/// Existing files are never overwritten; every action that is not written
/// becomes a review item pointing at the persisted plan.
#[derive(Debug, Clone)]
pub struct Materializer {
    target_dir: PathBuf,

    /// Persisted plan the review items refer to
    plan_path: PathBuf,

    /// Files owned by the pipeline itself, never written by an action
    reserved: Vec<PathBuf>,
}

impl Materializer {
    pub fn new(target_dir: impl Into<PathBuf>, plan_path: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            plan_path: plan_path.into(),
            reserved: Vec::new(),
        }
    }

    /// Refuse actions that resolve to any of `paths`
    pub fn with_reserved(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.reserved.extend(paths.into_iter().map(|p| normalize(&p)));
        self
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Process actions in order; one action's failure never stops the rest
    pub fn materialize(&self, actions: &[FileAction], auto_apply: bool) -> Materialization {
        let mut result = Materialization {
            ok: true,
            ..Materialization::default()
        };

        for action in actions {
            match self.apply_one(action, auto_apply) {
                Ok(applied) => {
                    info!("Created {}", applied.written_to.display());
                    result.applied.push(applied);
                }
                Err(reason) => {
                    if reason.is_failure() {
                        result.ok = false;
                    }
                    debug!("{} needs review: {}", action.path, reason);
                    result.needs_review.push(ReviewItem {
                        path: action.path.clone(),
                        reason,
                        pointer: self.plan_path.clone(),
                    });
                }
            }
        }

        result
    }

    fn apply_one(
        &self,
        action: &FileAction,
        auto_apply: bool,
    ) -> std::result::Result<AppliedFile, ReviewReason> {
        let relative = match validate_relative_path(&action.path) {
            Ok(relative) => relative,
            Err(PipelineError::InvalidPath { reason, .. }) => {
                warn!("Rejected path {:?}: {}", action.path, reason);
                return Err(ReviewReason::InvalidPath(reason));
            }
            Err(other) => return Err(ReviewReason::InvalidPath(other.to_string())),
        };

        match &action.operation {
            Operation::Create => {}
            Operation::Modify => return Err(ReviewReason::ModifyNotSupported),
            Operation::Other(op) => return Err(ReviewReason::UnknownAction(op.clone())),
        }

        let target = self.target_dir.join(relative);
        if self.reserved.contains(&normalize(&target)) {
            warn!("Rejected path {:?}: reserved pipeline file", action.path);
            return Err(ReviewReason::InvalidPath("reserved pipeline file".to_string()));
        }
        // symlink_metadata so a dangling link still counts as existing
        if target.symlink_metadata().is_ok() {
            return Err(ReviewReason::ExistingFile);
        }
        if !auto_apply {
            return Err(ReviewReason::NewFileManualApply);
        }

        write_new_file(&target, action.content.as_bytes()).map_err(|e| match e {
            PipelineError::Io(io) if io.kind() == ErrorKind::AlreadyExists => ReviewReason::ExistingFile,
            other => {
                warn!("{}", other);
                ReviewReason::WriteFailed(other.to_string())
            }
        })?;

        Ok(AppliedFile {
            path: action.path.clone(),
            written_to: target,
            bytes: action.content.len(),
        })
    }
}

/// Lexically drop `.` and resolve `..` so equal targets compare equal
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Write `data` to `path` only if nothing exists there yet
///
/// The content goes to a temp file in the same directory first and is moved
/// into place without clobbering, so a concurrent creator wins.
fn write_new_file(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    let write_failed = |source: std::io::Error| PipelineError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_failed)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(data).map_err(write_failed)?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Err(PipelineError::Io(e.error)),
        Err(e) => Err(write_failed(e.error)),
    }
}
