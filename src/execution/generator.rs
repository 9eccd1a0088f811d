//! Plan generation - builds the step prompt and asks the model for a plan

use crate::{
    agent::{GenerationOptions, GenerationProvider},
    core::{AssembledContext, PipelineError, Result},
};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

const SKELETON_DIRECTIVE: &str = "\
--- INCREMENTAL GENERATION ---
This is the first pass over this step. Produce skeletons rather than full \
implementations: file layout, imports, type and function signatures, and short \
placeholder bodies. Mark such files as incomplete. Full implementations will be \
written in later passes, so keep each file small.
--- END INCREMENTAL GENERATION ---
";

const SCHEMA_DIRECTIVE: &str = "\
For every file you propose, state explicitly:
- its relative path (no leading slash and no '..' segments)
- whether it is code or documentation
- its priority: 1 = essential structure, 2 = component, 3 = optional
- whether its content is complete or a skeleton/placeholder
";

/// Everything the plan prompt is built from
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub problem_description: &'a str,
    pub model: &'a str,
    pub assembled: &'a AssembledContext,

    /// True when no plan has been persisted for this step yet
    pub first_plan: bool,
}

impl PlanRequest<'_> {
    fn wants_skeleton(&self) -> bool {
        self.first_plan && self.assembled.step.is_code_producing()
    }
}

/// Build the prompt for the first (free-text plan) model call
pub fn build_plan_prompt(request: &PlanRequest<'_>) -> String {
    let step_id = &request.assembled.step.id;
    let completed = request.assembled.completed_through();

    let mut prompt = format!(
        "You are an AI coding agent ({}) following a multi-step plan to build an application.\n\n\
         --- PROBLEM STATEMENT ---\n{}\n--- END PROBLEM STATEMENT ---\n\n",
        request.model,
        request.problem_description.trim()
    );

    if completed == 0 {
        prompt.push_str("No earlier steps have been completed yet.\n\n");
    } else {
        prompt.push_str(&format!(
            "You have already completed Steps 1 through {}. The context from those steps is provided below.\n\n",
            completed
        ));
        prompt.push_str(&request.assembled.context);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Your current task is to execute Step '{step_id}'. The template/guidelines for this step are:\n\n\
         --- TEMPLATE/GUIDELINES (Step: {step_id}) ---\n{}\n--- END TEMPLATE/GUIDELINES ---\n\n",
        request.assembled.template
    ));

    if request.wants_skeleton() {
        prompt.push_str(SKELETON_DIRECTIVE);
        prompt.push('\n');
    }

    if request.assembled.step.is_code_producing() {
        prompt.push_str(SCHEMA_DIRECTIVE);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Based on the previous context AND the template for Step '{step_id}', generate the plan for the \
         file changes required by this step. Describe each action (create/modify file) and include the \
         full intended content of each file in a Markdown code block.\n\
         Generate the plan for Step '{step_id}':"
    ));

    prompt
}

/// Call the provider once, bounded by `timeout_secs`
///
/// Provider failures map to `GenerationFailed`, expiry to `GenerationTimeout`.
pub async fn bounded_generate<P>(
    provider: &P,
    prompt: &str,
    options: &GenerationOptions,
    timeout_secs: u64,
) -> Result<String>
where
    P: GenerationProvider + ?Sized,
{
    match timeout(Duration::from_secs(timeout_secs), provider.generate(prompt, options)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PipelineError::GenerationFailed(e.to_string())),
        Err(_) => Err(PipelineError::GenerationTimeout(timeout_secs)),
    }
}

/// Produces the free-text plan for a step
#[derive(Debug, Clone, Copy)]
pub struct PlanGenerator {
    timeout_secs: u64,
}

impl PlanGenerator {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Build the prompt and make the single plan request; no retry
    pub async fn generate<P>(&self, provider: &P, request: &PlanRequest<'_>) -> Result<String>
    where
        P: GenerationProvider + ?Sized,
    {
        let step_id = &request.assembled.step.id;
        let prompt = build_plan_prompt(request);
        info!(
            "Requesting plan for {} from {}{}",
            step_id,
            request.model,
            if request.wants_skeleton() { " (skeleton pass)" } else { "" }
        );
        debug!("Plan prompt for {}: {} chars", step_id, prompt.len());

        let options = GenerationOptions::new(request.model);
        let plan = bounded_generate(provider, &prompt, &options, self.timeout_secs)
            .await
            .inspect_err(|e| error!("Plan generation for {} failed: {}", step_id, e))?;

        if plan.trim().is_empty() {
            return Err(PipelineError::GenerationFailed("empty plan".to_string()));
        }

        Ok(plan)
    }
}
