//! Test: plan, extract, schedule and materialize one step

use crate::helpers::*;
use stepgen::core::{FileType, ReviewReason, RunOutcome};
use stepgen::execution::RunOptions;
use tempfile::TempDir;

const PLAN: &str = "Create docs/README.md with an overview and src/main.rs with the entry point.";

fn two_actions() -> String {
    // Code listed first; the scheduler must put documentation ahead of it
    actions_reply(&[
        code_action("src/main.rs", "fn main() {}\n", 2, true),
        doc_action("docs/README.md", "# Todo app\n", 1),
    ])
}

fn apply_into(target: &TempDir) -> RunOptions {
    RunOptions {
        auto_apply: true,
        target_dir: Some(target.path().to_path_buf()),
        model: None,
    }
}

/// Fresh target directory: both files are written, documentation first
#[tokio::test]
async fn test_scenario_a_applies_documentation_then_code() {
    let (dir, layout) = project();
    let target = TempDir::new().unwrap();
    let provider = MockProvider::new(vec![PLAN.to_string(), two_actions()]);
    let pipeline = pipeline(dir.path(), provider.clone());

    let report = pipeline.run_step(Some("step1"), &apply_into(&target)).await.unwrap();

    let applied: Vec<&str> = report.applied.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(applied, vec!["docs/README.md", "src/main.rs"]);
    assert!(report.needs_review.is_empty());
    assert!(report.ok);
    assert_eq!(report.outcome, RunOutcome::Materialized);

    assert_eq!(report.actions[0].file_type, FileType::Documentation);
    assert_eq!(report.actions[1].file_type, FileType::Code);

    assert_eq!(
        std::fs::read_to_string(target.path().join("docs/README.md")).unwrap(),
        "# Todo app\n"
    );
    assert_eq!(
        std::fs::read_to_string(target.path().join("src/main.rs")).unwrap(),
        "fn main() {}\n"
    );

    // Plan persisted as the step's output
    assert_eq!(report.plan_path, layout.step_output_path("step1"));
    assert_eq!(std::fs::read_to_string(&report.plan_path).unwrap(), PLAN);

    // Two model calls: plan, then extraction of that plan
    assert_eq!(provider.calls(), 2);
    assert!(provider.prompts()[1].contains(PLAN));
    assert_eq!(provider.models(), vec![TEST_MODEL, TEST_MODEL]);
}

/// Existing code file: left untouched and listed for review, run still ok
#[tokio::test]
async fn test_scenario_b_existing_file_goes_to_review() {
    let (dir, layout) = project();
    let target = TempDir::new().unwrap();
    std::fs::create_dir_all(target.path().join("src")).unwrap();
    std::fs::write(target.path().join("src/main.rs"), "// hand written\n").unwrap();

    let provider = MockProvider::new(vec![PLAN.to_string(), two_actions()]);
    let pipeline = pipeline(dir.path(), provider);

    let report = pipeline.run_step(Some("step1"), &apply_into(&target)).await.unwrap();

    let applied: Vec<&str> = report.applied.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(applied, vec!["docs/README.md"]);

    assert_eq!(report.needs_review.len(), 1);
    let item = &report.needs_review[0];
    assert_eq!(item.path, "src/main.rs");
    assert_eq!(item.reason, ReviewReason::ExistingFile);
    assert_eq!(item.reason.to_string(), "existing file, manual review");
    assert_eq!(item.pointer, layout.step_output_path("step1"));

    assert!(report.ok);
    assert_eq!(
        std::fs::read_to_string(target.path().join("src/main.rs")).unwrap(),
        "// hand written\n"
    );
}

/// Malformed extraction output: plan kept, nothing applied, distinct outcome
#[tokio::test]
async fn test_scenario_c_malformed_json_yields_no_actions() {
    let (dir, layout) = project();
    let provider = MockProvider::new(vec![
        PLAN.to_string(),
        "Here are the files: {\"action\": \"create\", oops".to_string(),
    ]);
    let pipeline = pipeline(dir.path(), provider);

    let report = pipeline
        .run_step(Some("step1"), &RunOptions { auto_apply: true, ..Default::default() })
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::NoExtractableActions);
    assert!(report.applied.is_empty());
    assert!(report.needs_review.is_empty());
    assert!(report.actions.is_empty());
    assert!(!report.parse_diagnostics.is_empty());
    assert_eq!(std::fs::read_to_string(layout.step_output_path("step1")).unwrap(), PLAN);
}

/// Without auto-apply nothing is written; every action is listed
#[tokio::test]
async fn test_manual_mode_lists_everything_for_review() {
    let (dir, _layout) = project();
    let target = TempDir::new().unwrap();
    let provider = MockProvider::new(vec![PLAN.to_string(), two_actions()]);
    let pipeline = pipeline(dir.path(), provider);

    let options = RunOptions {
        auto_apply: false,
        target_dir: Some(target.path().to_path_buf()),
        model: None,
    };
    let report = pipeline.run_step(Some("step1"), &options).await.unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.needs_review.len(), 2);
    assert!(report
        .needs_review
        .iter()
        .all(|item| item.reason == ReviewReason::NewFileManualApply));
    assert!(report.ok);
    assert!(!target.path().join("docs").exists());
}

/// Unsafe paths and modifications never reach the disk
#[tokio::test]
async fn test_unsafe_actions_are_never_applied() {
    let (dir, _layout) = project();
    let target = TempDir::new().unwrap();
    let reply = actions_reply(&[
        doc_action("../escape.md", "x", 1),
        code_action("/etc/passwd", "x", 1, true),
        serde_json::json!({
            "action": "modify",
            "path": "src/lib.rs",
            "content": "pub fn changed() {}",
            "isComplete": true,
            "priority": 1,
            "fileType": "code"
        }),
        code_action("src/ok.rs", "pub fn ok() {}\n", 3, true),
    ]);
    let provider = MockProvider::new(vec![PLAN.to_string(), reply]);
    let pipeline = pipeline(dir.path(), provider);

    let options = RunOptions {
        auto_apply: true,
        target_dir: Some(target.path().to_path_buf()),
        model: None,
    };
    let report = pipeline.run_step(Some("step1"), &options).await.unwrap();

    let applied: Vec<&str> = report.applied.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(applied, vec!["src/ok.rs"]);
    assert_eq!(report.needs_review.len(), 3);
    assert!(report
        .needs_review
        .iter()
        .any(|item| item.reason == ReviewReason::ModifyNotSupported));
    assert_eq!(
        report
            .needs_review
            .iter()
            .filter(|item| matches!(item.reason, ReviewReason::InvalidPath(_)))
            .count(),
        2
    );
    assert!(report.ok);
    assert!(!dir.path().join("escape.md").exists());
    assert!(!target.path().join("src/lib.rs").exists());
}

/// Default target is the outputs directory under the agent dir
#[tokio::test]
async fn test_default_target_is_outputs_dir() {
    let (dir, layout) = project();
    let provider = MockProvider::new(vec![PLAN.to_string(), two_actions()]);
    let pipeline = pipeline(dir.path(), provider);

    let report = pipeline
        .run_step(Some("step1"), &RunOptions { auto_apply: true, ..Default::default() })
        .await
        .unwrap();

    assert_eq!(report.applied.len(), 2);
    assert!(layout.outputs_dir().join("docs/README.md").is_file());
    assert!(layout.outputs_dir().join("src/main.rs").is_file());
}

/// Relative target dirs resolve against the project root
#[tokio::test]
async fn test_relative_target_dir_resolves_against_project_root() {
    let (dir, _layout) = project();
    let provider = MockProvider::new(vec![PLAN.to_string(), two_actions()]);
    let pipeline = pipeline(dir.path(), provider);

    let options = RunOptions {
        auto_apply: true,
        target_dir: Some("app".into()),
        model: None,
    };
    pipeline.run_step(Some("step1"), &options).await.unwrap();

    assert!(dir.path().join("app/src/main.rs").is_file());
}

/// Long incomplete code is trimmed before it is written
#[tokio::test]
async fn test_incomplete_code_is_truncated_when_written() {
    let (dir, _layout) = project();
    let target = TempDir::new().unwrap();

    let long_body: String = (0..200)
        .map(|i| format!("    let value_{i} = compute_something({i});\n"))
        .collect();
    let content = format!("fn draft() {{\n{}}}\n", long_body);
    let short = "fn tiny() {}\n".to_string();

    let reply = actions_reply(&[
        code_action("src/draft.rs", &content, 2, false),
        code_action("src/tiny.rs", &short, 2, false),
    ]);
    let provider = MockProvider::new(vec!["Draft the UI.".to_string(), reply]);
    let pipeline = pipeline(dir.path(), provider);

    let options = RunOptions {
        auto_apply: true,
        target_dir: Some(target.path().to_path_buf()),
        model: None,
    };
    let report = pipeline.run_step(Some("step4"), &options).await.unwrap();
    assert_eq!(report.applied.len(), 2);

    let written = std::fs::read_to_string(target.path().join("src/draft.rs")).unwrap();
    assert!(written.len() < content.len());
    assert!(written.contains("lines omitted from incomplete draft]"));
    assert!(written.starts_with("fn draft() {"));

    // Short drafts are written unchanged
    assert_eq!(std::fs::read_to_string(target.path().join("src/tiny.rs")).unwrap(), short);
}
