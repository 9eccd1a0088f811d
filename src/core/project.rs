//! Project configuration record (`<agent_dir>/config.json`)

use crate::core::{
    error::{PipelineError, Result},
    layout::{atomic_write, ProjectLayout},
    step::StepCatalog,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys that may be changed after `init`
pub const ALLOWED_CONFIG_KEYS: &[&str] = &["model", "current_step"];

/// Flat record written by `init`
///
/// `problem_description` and `template_directory` are write-once; only the
/// keys in [`ALLOWED_CONFIG_KEYS`] can be updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub problem_description: String,

    /// Absolute path of the template source used by `init`, if any
    #[serde(default)]
    pub template_directory: Option<String>,

    pub model: String,

    /// Last step that completed without write failures
    #[serde(default)]
    pub current_step: Option<String>,
}

impl ProjectConfig {
    pub fn new(problem_description: &str, template_directory: Option<String>, model: &str) -> Self {
        Self {
            problem_description: problem_description.to_string(),
            template_directory,
            model: model.to_string(),
            current_step: None,
        }
    }

    /// Read the record from disk
    pub fn load(layout: &ProjectLayout) -> Result<Self> {
        let path = layout.config_path();
        if !path.is_file() {
            return Err(PipelineError::NotInitialized(path));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the record atomically
    pub fn save(&self, layout: &ProjectLayout) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        atomic_write(&layout.config_path(), json.as_bytes())?;
        Ok(())
    }

    /// All keys with their JSON values, in declaration order
    pub fn entries(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("problem_description", Value::from(self.problem_description.clone())),
            (
                "template_directory",
                self.template_directory.clone().map_or(Value::Null, Value::from),
            ),
            ("model", Value::from(self.model.clone())),
            (
                "current_step",
                self.current_step.clone().map_or(Value::Null, Value::from),
            ),
        ]
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Update one allow-listed key
    ///
    /// `current_step` accepts a catalog step id, or `null`/`none` to clear it.
    pub fn set(&mut self, key: &str, value: &str, catalog: &StepCatalog) -> Result<()> {
        ensure_key_allowed(key)?;

        match key {
            "model" => {
                let model = value.trim();
                if model.is_empty() {
                    return Err(PipelineError::InvalidConfigValue {
                        key: key.to_string(),
                        reason: "model name must not be empty".to_string(),
                    });
                }
                self.model = model.to_string();
            }
            "current_step" => {
                let step = value.trim();
                if step.is_empty() || step.eq_ignore_ascii_case("null") || step.eq_ignore_ascii_case("none") {
                    self.current_step = None;
                } else {
                    catalog.get(step)?;
                    self.current_step = Some(step.to_string());
                }
            }
            _ => unreachable!("allow-list checked above"),
        }

        Ok(())
    }

    /// Load, update one key, and save
    ///
    /// Disallowed keys are rejected before the file is touched.
    pub fn update(
        layout: &ProjectLayout,
        catalog: &StepCatalog,
        key: &str,
        value: &str,
    ) -> Result<Self> {
        ensure_key_allowed(key)?;
        let mut config = Self::load(layout)?;
        config.set(key, value, catalog)?;
        config.save(layout)?;
        Ok(config)
    }
}

fn ensure_key_allowed(key: &str) -> Result<()> {
    if ALLOWED_CONFIG_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(PipelineError::ConfigKeyNotAllowed {
            key: key.to_string(),
            allowed: ALLOWED_CONFIG_KEYS.join(", "),
        })
    }
}
