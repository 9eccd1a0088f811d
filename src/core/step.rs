//! Step domain model and the fixed step catalog

use crate::core::error::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Keywords that mark a step as producing code rather than documents
const CODE_KEYWORDS: &[&str] = &["generate", "implement", "create", "code", "ui"];

/// What a step is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Produces source files; gets the skeleton and schema directives
    Code,
    /// Produces specification or documentation text
    Document,
}

/// A single step of the generation plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Step identifier (`stepN` or a named step such as `agent-plan`)
    pub id: String,

    /// File name of the specification template under `.agent/spec/`
    pub template: String,

    /// Position in the numbered sequence (`None` for named steps)
    pub ordinal: Option<u32>,

    /// Code-producing classification, decided once at catalog construction
    pub kind: StepKind,

    /// Instruction used by `init` when generating this step's spec file
    pub init_instruction: String,
}

impl Step {
    pub fn new(id: &str, template: &str, init_instruction: &str) -> Self {
        Step {
            id: id.to_string(),
            template: template.to_string(),
            ordinal: step_ordinal(id),
            kind: classify(id, template),
            init_instruction: init_instruction.to_string(),
        }
    }

    pub fn is_code_producing(&self) -> bool {
        self.kind == StepKind::Code
    }

    /// Name of the persisted StepOutput file for this step
    pub fn output_file_name(&self) -> String {
        output_file_name(&self.id)
    }
}

/// Name of the persisted StepOutput file for a step id
pub fn output_file_name(step_id: &str) -> String {
    format!("{}_output.md", step_id)
}

/// Extract the number from a step identifier like `step3`
pub fn step_ordinal(step_id: &str) -> Option<u32> {
    static STEP_RE: OnceLock<Regex> = OnceLock::new();
    let re = STEP_RE.get_or_init(|| Regex::new(r"^step(\d+)$").expect("valid step regex"));
    re.captures(step_id)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Classify a step from its identifier and template name
///
/// Both are split into lowercase word tokens; a step is code-producing when
/// any token equals one of the code keywords.
pub fn classify(step_id: &str, template: &str) -> StepKind {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid token regex"));

    let template_stem = template.strip_suffix(".md").unwrap_or(template);
    let haystack = format!("{} {}", step_id, template_stem).to_lowercase();

    let is_code = re
        .split(&haystack)
        .any(|token| CODE_KEYWORDS.contains(&token));

    if is_code {
        StepKind::Code
    } else {
        StepKind::Document
    }
}

/// Fixed, ordered registry of steps
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<Step>,
}

impl StepCatalog {
    /// The catalog shipped with the tool
    pub fn builtin() -> Self {
        Self::from_steps(vec![
            Step::new(
                "step1",
                "step1-problem-definition.md",
                "Generate a detailed problem definition based on the high-level description",
            ),
            Step::new(
                "step2",
                "step2-ia-entities.md",
                "Define information architecture and entities for the application",
            ),
            Step::new(
                "step3",
                "step3-dynamodb-model.md",
                "Design DynamoDB tables and access patterns",
            ),
            Step::new(
                "step4",
                "step4-generate-ui.md",
                "Design the UI/UX for the application",
            ),
            Step::new(
                "step5",
                "step5-integrate-backend-auth.md",
                "Design authentication and authorization",
            ),
            Step::new(
                "step6",
                "step6-prepare-deployment.md",
                "Prepare deployment strategy on AWS",
            ),
            Step::new(
                "agent-plan",
                "agent-plan.md",
                "Overall agent plan for the application",
            ),
        ])
    }

    /// Build a catalog from explicit steps
    ///
    /// # Panics
    /// Panics if two steps share an identifier; a corrupted catalog cannot be
    /// recovered from at runtime.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        let mut seen = HashSet::new();
        for step in &steps {
            assert!(
                seen.insert(step.id.clone()),
                "step catalog contains duplicate id '{}'",
                step.id
            );
        }
        Self { steps }
    }

    /// Look up a step by identifier
    pub fn get(&self, step_id: &str) -> Result<&Step, PipelineError> {
        self.steps
            .iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| PipelineError::UnknownStep {
                step: step_id.to_string(),
                available: self.ids().join(", "),
            })
    }

    /// All steps in catalog order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// The numbered step that follows `current`
    ///
    /// With no current step the lowest-numbered step is returned. Named steps
    /// have no successor.
    pub fn next_after(&self, current: Option<&str>) -> Option<&Step> {
        let floor = match current {
            None => 0,
            Some(id) => self.get(id).ok()?.ordinal?,
        };

        self.steps
            .iter()
            .filter(|s| s.ordinal.is_some_and(|n| n > floor))
            .min_by_key(|s| s.ordinal)
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
