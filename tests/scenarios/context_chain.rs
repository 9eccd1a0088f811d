//! Test: outputs of earlier steps flow into later prompts

use crate::helpers::*;
use stepgen::core::{ContextStore, ReviewReason};
use stepgen::execution::{PipelineEvent, RunOptions};
use std::sync::{Arc, Mutex};

fn no_actions() -> String {
    "[]".to_string()
}

#[tokio::test]
async fn test_later_step_sees_earlier_outputs_in_order() {
    let (dir, layout) = project();
    let store = ContextStore::new(layout.clone());
    store.write_output("step1", "PROBLEM DEFINITION OUTPUT").unwrap();
    store.write_output("step2", "ENTITIES OUTPUT").unwrap();

    let provider = MockProvider::new(vec!["Design the tables.".to_string(), no_actions()]);
    let pipeline = pipeline(dir.path(), provider.clone());
    pipeline.run_step(Some("step3"), &RunOptions::default()).await.unwrap();

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains(PROBLEM));
    assert!(prompt.contains("already completed Steps 1 through 2"));

    let first = prompt.find("--- START CONTEXT FROM STEP 1 ---").unwrap();
    let one = prompt.find("PROBLEM DEFINITION OUTPUT").unwrap();
    let second = prompt.find("--- START CONTEXT FROM STEP 2 ---").unwrap();
    let two = prompt.find("ENTITIES OUTPUT").unwrap();
    assert!(first < one && one < second && second < two);

    assert!(prompt.contains("# Guidelines for step3"));
}

#[tokio::test]
async fn test_missing_earlier_output_is_skipped() {
    let (dir, layout) = project();
    ContextStore::new(layout.clone())
        .write_output("step1", "ONLY STEP ONE")
        .unwrap();

    let provider = MockProvider::new(vec!["Plan.".to_string(), no_actions()]);
    let mut pipeline = pipeline(dir.path(), provider.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    pipeline.add_event_handler(move |event| {
        if let PipelineEvent::ContextAssembled { included, missing, .. } = event {
            sink.lock().unwrap().push((included, missing));
        }
    });

    let report = pipeline.run_step(Some("step3"), &RunOptions::default()).await.unwrap();
    assert!(report.ok);

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("ONLY STEP ONE"));
    assert!(!prompt.contains("CONTEXT FROM STEP 2"));

    assert_eq!(*seen.lock().unwrap(), vec![(vec![1u32], vec![2u32])]);
}

#[tokio::test]
async fn test_named_step_gets_no_numbered_context() {
    let (dir, layout) = project();
    ContextStore::new(layout.clone())
        .write_output("step1", "STEP ONE OUTPUT")
        .unwrap();

    let provider = MockProvider::new(vec!["Overall plan.".to_string(), no_actions()]);
    let pipeline = pipeline(dir.path(), provider.clone());
    pipeline.run_step(Some("agent-plan"), &RunOptions::default()).await.unwrap();

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("No earlier steps have been completed yet."));
    assert!(!prompt.contains("STEP ONE OUTPUT"));
    assert!(layout.step_output_path("agent-plan").is_file());
}

#[tokio::test]
async fn test_skeleton_directive_only_on_first_code_plan() {
    let (dir, _layout) = project();
    let provider = MockProvider::new(vec![
        "First UI plan.".to_string(),
        no_actions(),
        "Second UI plan.".to_string(),
        no_actions(),
    ]);
    let pipeline = pipeline(dir.path(), provider.clone());

    pipeline.run_step(Some("step4"), &RunOptions::default()).await.unwrap();
    pipeline.run_step(Some("step4"), &RunOptions::default()).await.unwrap();

    let prompts = provider.prompts();
    assert!(prompts[0].contains("--- INCREMENTAL GENERATION ---"));
    assert!(!prompts[2].contains("--- INCREMENTAL GENERATION ---"));

    // Code steps always ask for the per-file schema
    assert!(prompts[0].contains("whether it is code or documentation"));
    assert!(prompts[2].contains("whether it is code or documentation"));
}

#[tokio::test]
async fn test_document_step_gets_no_code_directives() {
    let (dir, _layout) = project();
    let provider = MockProvider::new(vec!["Problem definition.".to_string(), no_actions()]);
    let pipeline = pipeline(dir.path(), provider.clone());

    pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap();

    let prompt = &provider.prompts()[0];
    assert!(!prompt.contains("--- INCREMENTAL GENERATION ---"));
    assert!(!prompt.contains("whether it is code or documentation"));
}

#[tokio::test]
async fn test_rerun_replaces_only_its_own_output() {
    let (dir, layout) = project();
    let store = ContextStore::new(layout.clone());
    store.write_output("step1", "old step one").unwrap();
    store.write_output("step2", "step two stays").unwrap();

    let provider = MockProvider::new(vec!["new step one".to_string(), no_actions()]);
    let pipeline = pipeline(dir.path(), provider);
    pipeline.run_step(Some("step1"), &RunOptions::default()).await.unwrap();

    assert_eq!(store.read_output("step1").unwrap().as_deref(), Some("new step one"));
    assert_eq!(store.read_output("step2").unwrap().as_deref(), Some("step two stays"));
}

/// An extracted action cannot plant another step's saved plan
#[tokio::test]
async fn test_actions_cannot_forge_step_outputs() {
    let (dir, layout) = project();
    let store = ContextStore::new(layout.clone());

    // Default target is the outputs dir, next to the saved plans
    let provider = MockProvider::new(vec![
        "Plan for step one.".to_string(),
        actions_reply(&[
            doc_action("step2_output.md", "FORGED CONTEXT", 1),
            doc_action("overview.md", "real output", 2),
        ]),
        "Plan for step three.".to_string(),
        no_actions(),
    ]);
    let outputs_target = pipeline(dir.path(), provider.clone());
    let report = outputs_target
        .run_step(Some("step1"), &RunOptions { auto_apply: true, ..Default::default() })
        .await
        .unwrap();

    assert!(report.ok);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].path, "overview.md");
    assert_eq!(report.needs_review[0].path, "step2_output.md");
    assert!(matches!(report.needs_review[0].reason, ReviewReason::InvalidPath(_)));
    assert!(!store.has_output("step2"));

    outputs_target.run_step(Some("step3"), &RunOptions::default()).await.unwrap();
    let step3_prompt = &provider.prompts()[2];
    assert!(!step3_prompt.contains("FORGED CONTEXT"));
    assert!(!step3_prompt.contains("CONTEXT FROM STEP 2"));

    // Targeting the agent dir cannot reach the config either
    let provider = MockProvider::new(vec![
        "Plan for step one again.".to_string(),
        actions_reply(&[
            doc_action("outputs/step4_output.md", "FORGED CONTEXT", 1),
            doc_action("./config.json", "{}", 1),
        ]),
    ]);
    let agent_target = pipeline(dir.path(), provider);
    let options = RunOptions {
        auto_apply: true,
        target_dir: Some(layout.agent_dir().to_path_buf()),
        model: None,
    };
    let report = agent_target.run_step(Some("step1"), &options).await.unwrap();

    assert!(report.applied.is_empty());
    assert!(report
        .needs_review
        .iter()
        .all(|r| matches!(r.reason, ReviewReason::InvalidPath(_))));
    assert!(!store.has_output("step4"));
    assert_eq!(read_config(&layout).problem_description, PROBLEM);
}
