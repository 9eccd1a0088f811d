//! Project bootstrap - fills `spec/` with model-customized templates

use crate::{
    agent::{GenerationOptions, GenerationProvider},
    core::{PipelineError, ProjectLayout, Result, Step},
    execution::generator::bounded_generate,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Step whose spec gets the problem-definition prompt
const PROBLEM_DEFINITION_STEP: &str = "step1";

/// How a spec file's content was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecSource {
    /// Model output based on the real template
    Generated,
    /// Model output based on a placeholder outline
    GeneratedFromPlaceholder,
    /// Generation failed; the file holds an error notice
    ErrorNotice,
}

/// One spec file ready to be written
#[derive(Debug, Clone)]
pub struct SpecDraft {
    pub template: String,
    pub content: String,
    pub source: SpecSource,
}

/// Generates the per-step specification files used by later steps
#[derive(Debug, Clone, Copy)]
pub struct SpecBootstrapper {
    timeout_secs: u64,
}

impl SpecBootstrapper {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Create the project directories, clearing old state when `force` is set
    pub fn prepare(&self, layout: &ProjectLayout, force: bool) -> Result<()> {
        if layout.config_path().exists() {
            if !force {
                return Err(PipelineError::AlreadyInitialized(layout.agent_dir().to_path_buf()));
            }
            info!("Re-initializing {}", layout.agent_dir().display());
            remove_dir_if_present(&layout.spec_dir())?;
            remove_dir_if_present(&layout.outputs_dir())?;
            std::fs::remove_file(layout.config_path())?;
        }

        std::fs::create_dir_all(layout.spec_dir())?;
        std::fs::create_dir_all(layout.outputs_dir())?;
        debug!("Created {}", layout.agent_dir().display());
        Ok(())
    }

    /// Produce the spec file for one step
    ///
    /// Never fails: a missing template becomes a placeholder outline and a
    /// provider failure becomes an error notice the user can fill in.
    pub async fn draft_spec<P>(
        &self,
        provider: &P,
        model: &str,
        problem_description: &str,
        step: &Step,
        template_dir: Option<&Path>,
    ) -> SpecDraft
    where
        P: GenerationProvider + ?Sized,
    {
        let (template, from_placeholder) = match read_template(&step.template, template_dir) {
            Some(text) => (text, false),
            None => (placeholder_template(&step.template, template_dir), true),
        };

        let prompt = build_spec_prompt(problem_description, step, &template);
        let options = GenerationOptions::new(model);

        match bounded_generate(provider, &prompt, &options, self.timeout_secs).await {
            Ok(content) => SpecDraft {
                template: step.template.clone(),
                content,
                source: if from_placeholder {
                    SpecSource::GeneratedFromPlaceholder
                } else {
                    SpecSource::Generated
                },
            },
            Err(e) => {
                warn!("Error generating content for {}: {}", step.template, e);
                SpecDraft {
                    template: step.template.clone(),
                    content: error_notice(&step.template, problem_description, &e),
                    source: SpecSource::ErrorNotice,
                }
            }
        }
    }
}

/// Use `requested` if it is a directory, otherwise warn and return `None`
pub fn resolve_template_dir(requested: Option<&Path>) -> Option<PathBuf> {
    let dir = requested?;
    if dir.is_dir() {
        Some(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()))
    } else {
        warn!(
            "Template directory not found: {}. Specifications will be generated from placeholders",
            dir.display()
        );
        None
    }
}

fn read_template(template: &str, template_dir: Option<&Path>) -> Option<String> {
    let path = template_dir?.join(template);
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Template file not found: {}", path.display());
            None
        }
        Err(e) => {
            warn!("Could not read template file {}: {}", path.display(), e);
            None
        }
    }
}

fn placeholder_template(template: &str, template_dir: Option<&Path>) -> String {
    let source = template_dir
        .map(|d| format!("'{}'", d.display()))
        .unwrap_or_else(|| "any template directory".to_string());
    format!(
        "# {template}\n\n\
         This is a minimal placeholder template for {template} because the original could not be found or read from {source}.\n\n\
         Please customize this file with appropriate sections and content based on the project's needs.\n"
    )
}

fn error_notice(template: &str, problem_description: &str, err: &PipelineError) -> String {
    format!(
        "# Error Generating {template}\n\n\
         Unfortunately, there was an error generating this template: {err}\n\n\
         ## Manual Action Required\n\n\
         Please modify this file with the appropriate content for {template}.\n\n\
         The high-level problem description was:\n\"{problem_description}\"\n"
    )
}

/// Prompt asking the model to tailor one template to the problem
pub fn build_spec_prompt(problem_description: &str, step: &Step, template: &str) -> String {
    let task = if step.id == PROBLEM_DEFINITION_STEP {
        format!(
            "Your task is to create a detailed problem definition based on this high-level description.\n\n\
             Here is the template structure to follow:\n```\n{template}\n```\n\n\
             Based on the problem description, generate a customized version of this specification file that:\n\
             1. Maintains the same structure but tailors the content specifically to this problem domain\n\
             2. Includes the exact high-level problem description in the \"Output\" section under \"Validated Problem Statement\"\n\
             3. Expands on the description with more context, target audience details and core objectives\n\
             4. Keeps all sections and headings from the template\n"
        )
    } else {
        format!(
            "Your task is to: {}\n\n\
             Here is the template structure to follow:\n```\n{template}\n```\n\n\
             Based on the problem description, generate a customized version of this specification file that \
             maintains the same structure but tailors the content specifically to this problem domain. \
             Keep all sections and headings from the template, adapting the examples, suggestions and details \
             to the problem described above.\n",
            step.init_instruction
        )
    };

    format!(
        "You are an AI agent tasked with creating a specification file for an application.\n\n\
         The high-level problem description for the application is:\n\"{}\"\n\n\
         {task}\nThe content should be clear, specific, and actionable.\n",
        problem_description.trim()
    )
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
