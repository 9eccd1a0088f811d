//! On-disk project layout

use crate::core::step::output_file_name;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SPEC_SUBDIR: &str = "spec";
const OUTPUT_SUBDIR: &str = "outputs";
const CONFIG_FILE: &str = "config.json";
const LOCK_FILE: &str = ".lock";
const HISTORY_FILE: &str = "history.db";

/// Paths of everything the pipeline persists for one project
///
/// ```text
/// <root>/<agent_dir>/
///   config.json
///   spec/<template>.md
///   outputs/<stepId>_output.md
///   outputs/<materialized files>
///   history.db
///   .lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    agent_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>, agent_dir_name: &str) -> Self {
        let root = root.into();
        let agent_dir = root.join(agent_dir_name);
        Self { root, agent_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agent_dir(&self) -> &Path {
        &self.agent_dir
    }

    pub fn spec_dir(&self) -> PathBuf {
        self.agent_dir.join(SPEC_SUBDIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.agent_dir.join(OUTPUT_SUBDIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.agent_dir.join(CONFIG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.agent_dir.join(LOCK_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.agent_dir.join(HISTORY_FILE)
    }

    pub fn template_path(&self, template: &str) -> PathBuf {
        self.spec_dir().join(template)
    }

    pub fn step_output_path(&self, step_id: &str) -> PathBuf {
        self.outputs_dir().join(output_file_name(step_id))
    }

    /// Whether `init` has created the expected directories
    pub fn is_initialized(&self) -> bool {
        self.spec_dir().is_dir() && self.outputs_dir().is_dir()
    }
}

/// Replace `path` with `data` via a temp file in the same directory
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
