//! Structured extraction of file actions from a free-text plan

use crate::{
    agent::{GenerationOptions, GenerationProvider},
    core::{
        action::{clamp_priority, FileAction, FileType, Operation, PRIORITY_COMPONENT},
        PipelineError,
    },
    execution::generator::bounded_generate,
};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Build the prompt for the second (structured extraction) model call
pub fn build_extraction_prompt(plan: &str) -> String {
    format!(
        "Extract every file action proposed in the plan below as a JSON array.\n\
         Each element must be an object with exactly these fields:\n\
         \x20 \"action\": \"create\" or \"modify\"\n\
         \x20 \"path\": the relative file path (no leading slash, no \"..\" segments)\n\
         \x20 \"content\": the full file content proposed in the plan\n\
         \x20 \"isComplete\": true if the content is a finished implementation, false if it is a skeleton or placeholder\n\
         \x20 \"priority\": 1 (essential structure), 2 (component) or 3 (optional)\n\
         \x20 \"fileType\": \"code\" or \"documentation\"\n\n\
         Respond with the JSON array only. Do not write any prose, explanation or Markdown outside the array. \
         If the plan proposes no files, respond with [].\n\n\
         --- PLAN ---\n{}\n--- END PLAN ---\n",
        plan
    )
}

/// Result of action extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlan {
    /// Actions that passed validation, in the order the model listed them
    pub actions: Vec<FileAction>,

    /// One note per item that was dropped
    pub dropped: Vec<String>,

    /// Why nothing could be parsed at all, if that happened
    pub failure: Option<String>,
}

impl ParsedPlan {
    fn failed(reason: String) -> Self {
        Self {
            failure: Some(reason),
            ..Self::default()
        }
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.failure
            .iter()
            .chain(self.dropped.iter())
            .cloned()
            .collect()
    }
}

/// Runs the extraction call and validates its output
#[derive(Debug, Clone, Copy)]
pub struct PlanParser {
    timeout_secs: u64,
}

impl PlanParser {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Extract actions from `plan`
    ///
    /// Never fails: provider errors and malformed output yield an empty
    /// result with a diagnostic.
    pub async fn parse<P>(&self, provider: &P, plan: &str, model: &str) -> ParsedPlan
    where
        P: GenerationProvider + ?Sized,
    {
        let prompt = build_extraction_prompt(plan);
        // Extraction should be deterministic
        let options = GenerationOptions::new(model).with_temperature(0.0);
        debug!("Extraction prompt: {} chars", prompt.len());

        let raw = match bounded_generate(provider, &prompt, &options, self.timeout_secs).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = PipelineError::PlanParseFailed(e.to_string());
                warn!("{}", err);
                return ParsedPlan::failed(err.to_string());
            }
        };

        let parsed = parse_actions(&raw);
        info!(
            "Extracted {} file action(s), dropped {}",
            parsed.actions.len(),
            parsed.dropped.len()
        );
        parsed
    }
}

/// Parse the raw extraction response into validated actions
pub fn parse_actions(raw: &str) -> ParsedPlan {
    let stripped = strip_code_fences(raw);

    let value = match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => value,
        Err(first_err) => match extract_json_array(&stripped).map(|s| serde_json::from_str::<Value>(s)) {
            Some(Ok(value)) => value,
            _ => {
                let err = PipelineError::PlanParseFailed(format!("response is not valid JSON: {}", first_err));
                warn!("{}", err);
                return ParsedPlan::failed(err.to_string());
            }
        },
    };

    let Value::Array(items) = value else {
        let err = PipelineError::PlanParseFailed("expected a JSON array of file actions".to_string());
        warn!("{}", err);
        return ParsedPlan::failed(err.to_string());
    };

    let mut parsed = ParsedPlan::default();
    for (index, item) in items.iter().enumerate() {
        match validate_item(item) {
            Ok(action) => parsed.actions.push(action),
            Err(reason) => {
                warn!("Dropping extracted item {}: {}", index, reason);
                parsed.dropped.push(format!("item {} dropped: {}", index, reason));
            }
        }
    }
    parsed
}

/// Validate one extracted item, applying the lenient defaults
fn validate_item(item: &Value) -> std::result::Result<FileAction, String> {
    let obj = item.as_object().ok_or("not an object")?;

    let required = |field: &str| -> std::result::Result<&str, String> {
        match obj.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(Value::String(_)) => Err(format!("'{}' is empty", field)),
            Some(_) => Err(format!("'{}' is not a string", field)),
            None => Err(format!("missing '{}'", field)),
        }
    };

    let operation = match Operation::from(required("action")?.to_string()) {
        Operation::Other(op) => return Err(format!("unsupported action '{}'", op)),
        op => op,
    };
    let path = required("path")?.trim();
    let content = required("content")?;

    let is_complete = obj
        .get("isComplete")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let priority = obj
        .get("priority")
        .and_then(|p| p.as_i64().or_else(|| p.as_f64().map(|f| f.round() as i64)))
        .map(|p| clamp_priority(p.clamp(0, u8::MAX as i64) as u8))
        .unwrap_or(PRIORITY_COMPONENT);

    let file_type = obj
        .get("fileType")
        .and_then(Value::as_str)
        .and_then(FileType::parse)
        .unwrap_or_else(|| FileType::infer(path));

    Ok(FileAction {
        operation,
        path: path.to_string(),
        content: content.to_string(),
        is_complete,
        priority,
        file_type,
    })
}

/// Remove a surrounding Markdown code fence, if any
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    // Drop the opening fence line (with its language tag)
    let mut lines = trimmed.lines();
    lines.next();

    let mut body: Vec<&str> = lines.collect();
    while body.last().is_some_and(|last| last.trim().starts_with("```")) {
        body.pop();
    }

    body.join("\n").trim().to_string()
}

/// Slice from the first `[` to the last `]`
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end >= start).then(|| &text[start..=end])
}
