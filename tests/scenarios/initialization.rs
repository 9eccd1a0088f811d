//! Test: `initialize` generates specs and the config record

use crate::helpers::*;
use stepgen::agent::ProviderError;
use stepgen::core::{PipelineError, ProjectLayout, StepCatalog, DEFAULT_MODEL};
use stepgen::execution::RunOptions;
use tempfile::TempDir;

fn spec_replies(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("# Generated spec {}\n", i)).collect()
}

#[tokio::test]
async fn test_init_with_placeholders() {
    let dir = TempDir::new().unwrap();
    let catalog = StepCatalog::builtin();
    let provider = MockProvider::new(spec_replies(catalog.steps().len()));
    let pipeline = pipeline(dir.path(), provider.clone());

    let report = pipeline.initialize(PROBLEM, None, None, false).await.unwrap();

    assert_eq!(report.generated.len(), catalog.steps().len());
    assert_eq!(report.placeholder_templates.len(), catalog.steps().len());
    assert!(report.failed.is_empty());
    assert_eq!(report.template_directory, None);

    let layout = ProjectLayout::new(dir.path(), ".agent");
    assert!(layout.is_initialized());
    assert_eq!(
        std::fs::read_to_string(layout.template_path("step1-problem-definition.md")).unwrap(),
        "# Generated spec 1\n"
    );
    assert_eq!(
        std::fs::read_to_string(layout.template_path("agent-plan.md")).unwrap(),
        format!("# Generated spec {}\n", catalog.steps().len())
    );

    let config = read_config(&layout);
    assert_eq!(config.problem_description, PROBLEM);
    assert_eq!(config.model, DEFAULT_MODEL);
    assert_eq!(config.current_step, None);

    // The problem-definition prompt asks for the validated statement
    let prompts = provider.prompts();
    assert!(prompts[0].contains(PROBLEM));
    assert!(prompts[0].contains("Validated Problem Statement"));
    assert!(prompts[0].contains("minimal placeholder template"));
}

#[tokio::test]
async fn test_init_reads_templates_and_records_directory() {
    let dir = TempDir::new().unwrap();
    let templates = TempDir::new().unwrap();
    std::fs::write(
        templates.path().join("step2-ia-entities.md"),
        "# Entities\n## Core Entities\n",
    )
    .unwrap();

    let catalog = StepCatalog::builtin();
    let provider = MockProvider::new(spec_replies(catalog.steps().len()));
    let pipeline = pipeline(dir.path(), provider.clone());

    let report = pipeline
        .initialize(PROBLEM, Some(templates.path()), Some("gemini-2.0-flash"), false)
        .await
        .unwrap();

    assert!(!report
        .placeholder_templates
        .contains(&"step2-ia-entities.md".to_string()));
    assert_eq!(report.placeholder_templates.len(), catalog.steps().len() - 1);
    assert!(report.template_directory.is_some());

    let prompts = provider.prompts();
    assert!(prompts[1].contains("## Core Entities"));
    assert!(provider.models().iter().all(|m| m == "gemini-2.0-flash"));

    let config = read_config(&ProjectLayout::new(dir.path(), ".agent"));
    assert_eq!(config.model, "gemini-2.0-flash");
    assert!(config.template_directory.is_some());
}

#[tokio::test]
async fn test_init_writes_error_notice_for_failed_spec() {
    let dir = TempDir::new().unwrap();
    let catalog = StepCatalog::builtin();
    let mut replies: Vec<MockReply> = spec_replies(catalog.steps().len())
        .into_iter()
        .map(MockReply::Text)
        .collect();
    replies[2] = MockReply::Fail(ProviderError::Transport("connection reset".to_string()));

    let provider = MockProvider::from_replies(replies);
    let pipeline = pipeline(dir.path(), provider);

    let report = pipeline.initialize(PROBLEM, None, None, false).await.unwrap();
    assert_eq!(report.failed, vec!["step3-dynamodb-model.md".to_string()]);
    assert_eq!(report.generated.len(), catalog.steps().len() - 1);

    let layout = ProjectLayout::new(dir.path(), ".agent");
    let notice = std::fs::read_to_string(layout.template_path("step3-dynamodb-model.md")).unwrap();
    assert!(notice.contains("# Error Generating step3-dynamodb-model.md"));
    assert!(notice.contains("connection reset"));
    assert!(notice.contains(PROBLEM));
}

#[tokio::test]
async fn test_reinit_requires_force() {
    let (dir, layout) = project();
    layout_output(&layout, "step1", "old output");

    let catalog = StepCatalog::builtin();
    let provider = MockProvider::new(spec_replies(catalog.steps().len()));
    let pipeline = pipeline(dir.path(), provider.clone());

    let err = pipeline.initialize("Something else", None, None, false).await.unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyInitialized(_)));
    assert_eq!(provider.calls(), 0);
    assert_eq!(read_config(&layout).problem_description, PROBLEM);

    pipeline.initialize("Something else", None, None, true).await.unwrap();
    assert_eq!(read_config(&layout).problem_description, "Something else");
    assert!(!layout.step_output_path("step1").exists());
}

#[tokio::test]
async fn test_init_rejects_empty_problem() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(dir.path(), MockProvider::new(vec![]));

    let err = pipeline.initialize("   ", None, None, false).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfigValue { .. }));
    assert!(!dir.path().join(".agent").exists());
}

/// An initialized project is immediately runnable
#[tokio::test]
async fn test_generate_after_init() {
    let dir = TempDir::new().unwrap();
    let catalog = StepCatalog::builtin();
    let mut replies = spec_replies(catalog.steps().len());
    replies.push("Plan for step one.".to_string());
    replies.push("[]".to_string());

    let provider = MockProvider::new(replies);
    let pipeline = pipeline(dir.path(), provider.clone());
    pipeline.initialize(PROBLEM, None, None, false).await.unwrap();

    let report = pipeline.run_step(None, &RunOptions::default()).await.unwrap();
    assert_eq!(report.step_id, "step1");

    // The generated spec is the step's guideline text
    let plan_prompt = &provider.prompts()[catalog.steps().len()];
    assert!(plan_prompt.contains("# Generated spec 1"));
}

fn layout_output(layout: &ProjectLayout, step: &str, text: &str) {
    std::fs::write(layout.step_output_path(step), text).unwrap();
}
