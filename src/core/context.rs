//! Persisted step outputs and context assembly

use crate::core::{
    error::{PipelineError, Result},
    layout::{atomic_write, ProjectLayout},
    step::{Step, StepCatalog},
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Append-only store of raw plan text, one file per step
#[derive(Debug, Clone)]
pub struct ContextStore {
    layout: ProjectLayout,
}

impl ContextStore {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn output_path(&self, step_id: &str) -> PathBuf {
        self.layout.step_output_path(step_id)
    }

    pub fn has_output(&self, step_id: &str) -> bool {
        self.output_path(step_id).is_file()
    }

    /// Read a step's output, `None` when it was never written
    pub fn read_output(&self, step_id: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.output_path(step_id)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the output of `step_id`, replacing only that step's own file
    pub fn write_output(&self, step_id: &str, text: &str) -> Result<PathBuf> {
        let path = self.output_path(step_id);
        atomic_write(&path, text.as_bytes())?;

        debug!("Saved output for {} to {}", step_id, path.display());
        Ok(path)
    }
}

/// Template and prior-step context for one step
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub step: Step,

    /// Contents of the step's specification template
    pub template: String,

    /// Concatenated outputs of earlier numbered steps, each wrapped in markers
    pub context: String,

    /// Ordinals whose output was found and included
    pub included: Vec<u32>,

    /// Ordinals with no persisted output
    pub missing: Vec<u32>,
}

impl AssembledContext {
    /// Highest ordinal treated as already completed (`n - 1`, or 0)
    pub fn completed_through(&self) -> u32 {
        self.step.ordinal.map_or(0, |n| n.saturating_sub(1))
    }
}

/// Loads a step's template and the outputs of the steps before it
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    catalog: StepCatalog,
    store: ContextStore,
}

impl ContextAssembler {
    pub fn new(catalog: StepCatalog, store: ContextStore) -> Self {
        Self { catalog, store }
    }

    /// Resolve `step_id` and gather its template and context
    ///
    /// Fails with `UnknownStep` or `TemplateNotFound`; missing earlier outputs
    /// are skipped with a warning.
    pub fn assemble(&self, step_id: &str) -> Result<AssembledContext> {
        let step = self.catalog.get(step_id)?.clone();

        let template_path = self.store.layout().template_path(&step.template);
        let template = match std::fs::read_to_string(&template_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::TemplateNotFound {
                    step: step.id.clone(),
                    path: template_path,
                });
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded template {}", template_path.display());

        let mut parts = Vec::new();
        let mut included = Vec::new();
        let mut missing = Vec::new();

        if let Some(n) = step.ordinal {
            for i in 1..n {
                let prev_id = format!("step{}", i);
                match self.store.read_output(&prev_id) {
                    Ok(Some(content)) => {
                        parts.push(format!(
                            "--- START CONTEXT FROM STEP {i} ---\n{content}\n--- END CONTEXT FROM STEP {i} ---\n"
                        ));
                        included.push(i);
                        debug!("Loaded context from {}", prev_id);
                    }
                    Ok(None) => {
                        warn!(
                            "No output found for {} at {}; continuing without it",
                            prev_id,
                            self.store.output_path(&prev_id).display()
                        );
                        missing.push(i);
                    }
                    Err(e) => {
                        warn!("Could not read output for {}: {}", prev_id, e);
                        missing.push(i);
                    }
                }
            }
        }

        Ok(AssembledContext {
            step,
            template,
            context: parts.join("\n"),
            included,
            missing,
        })
    }
}
