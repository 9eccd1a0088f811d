//! Test: failures before materialization abort the step cleanly

use crate::helpers::*;
use stepgen::agent::ProviderError;
use stepgen::core::{PipelineError, RunOutcome, Settings};
use stepgen::execution::RunOptions;
use stepgen::persistence::HistoryBackend;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_blocked_plan_aborts_without_persisting() {
    let (dir, layout) = project();
    let provider = MockProvider::from_replies(vec![MockReply::Fail(ProviderError::Blocked(
        "SAFETY".to_string(),
    ))]);
    let pipeline = pipeline(dir.path(), provider.clone());

    let err = pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::GenerationFailed(ref msg) if msg.contains("SAFETY")));

    assert!(!layout.step_output_path("step1").exists());
    assert_eq!(read_config(&layout).current_step, None);
    // No extraction call after a failed plan
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_empty_plan_is_a_generation_failure() {
    let (dir, layout) = project();
    let provider = MockProvider::new(vec!["   \n".to_string()]);
    let pipeline = pipeline(dir.path(), provider);

    let err = pipeline.run_step(Some("step2"), &RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::GenerationFailed(_)));
    assert!(!layout.step_output_path("step2").exists());
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let (dir, layout) = project();
    let mut settings = Settings::default();
    settings.provider.timeout_secs = 1;

    let provider = MockProvider::from_replies(vec![MockReply::Slow(
        Duration::from_secs(3),
        "too late".to_string(),
    )]);
    let pipeline = pipeline_with_settings(dir.path(), provider, settings);

    let err = pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::GenerationTimeout(1)));
    assert!(!layout.step_output_path("step1").exists());
}

#[tokio::test]
async fn test_failed_extraction_keeps_plan() {
    let (dir, layout) = project();
    let provider = MockProvider::from_replies(vec![
        MockReply::Text("A perfectly good plan.".to_string()),
        MockReply::Fail(ProviderError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }),
    ]);
    let pipeline = pipeline(dir.path(), provider);

    let report = pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NoExtractableActions);
    assert!(report.parse_diagnostics.iter().any(|d| d.contains("overloaded")));
    assert_eq!(
        std::fs::read_to_string(layout.step_output_path("step1")).unwrap(),
        "A perfectly good plan."
    );
}

#[tokio::test]
async fn test_unknown_step_is_rejected_before_any_call() {
    let (dir, _layout) = project();
    let provider = MockProvider::new(vec![]);
    let pipeline = pipeline(dir.path(), provider.clone());

    let err = pipeline.run_step(Some("step9"), &RunOptions::default()).await.unwrap_err();
    match err {
        PipelineError::UnknownStep { step, available } => {
            assert_eq!(step, "step9");
            assert!(available.contains("agent-plan"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_missing_template_aborts_step() {
    let (dir, layout) = project();
    std::fs::remove_file(layout.template_path("step2-ia-entities.md")).unwrap();

    let provider = MockProvider::new(vec![]);
    let pipeline = pipeline(dir.path(), provider.clone());

    let err = pipeline.run_step(Some("step2"), &RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::TemplateNotFound { ref step, .. } if step == "step2"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_uninitialized_project_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new(vec![]);
    let pipeline = pipeline(dir.path(), provider);

    let err = pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotInitialized(_)));
    assert!(!dir.path().join(".agent").exists());
}

#[tokio::test]
async fn test_history_records_success_and_failure() {
    let (dir, _layout) = project();
    let provider = MockProvider::from_replies(vec![
        MockReply::Text("Plan one.".to_string()),
        MockReply::Text("[]".to_string()),
        MockReply::Fail(ProviderError::EmptyResponse),
    ]);
    let history = SharedHistory::new();
    let pipeline = pipeline(dir.path(), provider).with_history(history.boxed());

    pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap();
    pipeline.run_step(Some("step2"), &RunOptions::default()).await.unwrap_err();

    let runs = history.list(None, 10).await.unwrap();
    assert_eq!(runs.len(), 2);

    let failed = runs.iter().find(|r| r.step_id == "step2").unwrap();
    assert!(!failed.ok);
    assert_eq!(failed.outcome, None);
    assert!(failed.error.as_deref().unwrap().contains("Empty response"));

    let succeeded = runs.iter().find(|r| r.step_id == "step1").unwrap();
    assert!(succeeded.ok);
    assert_eq!(succeeded.outcome, Some(RunOutcome::NoExtractableActions));
    assert_eq!(succeeded.model, TEST_MODEL);

    let only_step1 = history.list(Some("step1"), 10).await.unwrap();
    assert_eq!(only_step1.len(), 1);
}
