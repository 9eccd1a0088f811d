//! Test utility functions for stepgen
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use stepgen::agent::{GenerationOptions, GenerationProvider, ProviderError};
use stepgen::core::{ProjectConfig, ProjectLayout, Settings, StepCatalog};
use stepgen::execution::StepPipeline;
use stepgen::persistence::{HistoryBackend, InMemoryHistory, RunRecord};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_MODEL: &str = "test-model";
pub const PROBLEM: &str = "A small todo list application with user accounts";

/// History handle that stays readable after the pipeline takes ownership
#[derive(Clone, Default)]
pub struct SharedHistory(Arc<InMemoryHistory>);

impl SharedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn HistoryBackend> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl HistoryBackend for SharedHistory {
    async fn record(&self, run: &RunRecord) -> anyhow::Result<()> {
        self.0.record(run).await
    }

    async fn load(&self, run_id: uuid::Uuid) -> anyhow::Result<Option<RunRecord>> {
        self.0.load(run_id).await
    }

    async fn list(&self, step_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<RunRecord>> {
        self.0.list(step_id, limit).await
    }
}

/// One scripted provider reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(ProviderError),
    /// Sleep, then answer
    Slow(Duration, String),
}

/// Provider that returns predefined replies in order and records prompts
#[derive(Clone)]
pub struct MockProvider {
    replies: Arc<Vec<MockReply>>,
    index: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self::from_replies(responses.into_iter().map(MockReply::Text).collect())
    }

    pub fn from_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(replies),
            index: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of generate calls made so far
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    /// Models requested per call
    pub fn models(&self) -> Vec<String> {
        self.prompts.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), options.model.clone()));

        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(idx) {
            None => Err(ProviderError::Internal(format!(
                "MockProvider: No response available for request {}",
                idx + 1
            ))),
            Some(MockReply::Text(text)) => Ok(text.clone()),
            Some(MockReply::Fail(err)) => Err(err.clone()),
            Some(MockReply::Slow(delay, text)) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
        }
    }
}

/// Create `.agent/` with a template per catalog step and a config record,
/// without going through `init`
pub fn setup_project(root: &Path) -> ProjectLayout {
    let layout = ProjectLayout::new(root, ".agent");
    std::fs::create_dir_all(layout.spec_dir()).unwrap();
    std::fs::create_dir_all(layout.outputs_dir()).unwrap();

    for step in StepCatalog::builtin().steps() {
        std::fs::write(
            layout.template_path(&step.template),
            format!("# Guidelines for {}\nFollow the project conventions.\n", step.id),
        )
        .unwrap();
    }

    ProjectConfig::new(PROBLEM, None, TEST_MODEL).save(&layout).unwrap();
    layout
}

pub fn pipeline(root: &Path, provider: MockProvider) -> StepPipeline<MockProvider> {
    StepPipeline::new(provider, Settings::default(), root)
}

pub fn pipeline_with_settings(root: &Path, provider: MockProvider, settings: Settings) -> StepPipeline<MockProvider> {
    StepPipeline::new(provider, settings, root)
}

/// Initialized project in a fresh temp dir
pub fn project() -> (TempDir, ProjectLayout) {
    let dir = TempDir::new().unwrap();
    let layout = setup_project(dir.path());
    (dir, layout)
}

/// Extraction-call reply: a JSON array of file actions
pub fn actions_reply(actions: &[serde_json::Value]) -> String {
    serde_json::to_string_pretty(&json!(actions)).unwrap()
}

pub fn doc_action(path: &str, content: &str, priority: u8) -> serde_json::Value {
    json!({
        "action": "create",
        "path": path,
        "content": content,
        "isComplete": true,
        "priority": priority,
        "fileType": "documentation"
    })
}

pub fn code_action(path: &str, content: &str, priority: u8, complete: bool) -> serde_json::Value {
    json!({
        "action": "create",
        "path": path,
        "content": content,
        "isComplete": complete,
        "priority": priority,
        "fileType": "code"
    })
}

pub fn read_config(layout: &ProjectLayout) -> ProjectConfig {
    ProjectConfig::load(layout).unwrap()
}
