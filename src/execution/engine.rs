//! Step pipeline - runs context assembly, plan generation, extraction,
//! scheduling and materialization for one step

use crate::{
    agent::GenerationProvider,
    core::{
        atomic_write, AssembledContext, ContextAssembler, ContextStore, InitReport, PipelineError,
        ProjectConfig, ProjectLayout, Result, RunOutcome, Settings, StepCatalog, StepRunReport,
    },
    execution::{
        bootstrap::{resolve_template_dir, SpecBootstrapper, SpecSource},
        generator::{PlanGenerator, PlanRequest},
        materializer::Materializer,
        parser::PlanParser,
        scheduler::ActionScheduler,
    },
    persistence::{HistoryBackend, ProjectLock, RunRecord},
};
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur while initializing or running a step
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SpecStarted {
        template: String,
    },
    SpecWritten {
        template: String,
        source: SpecSource,
    },
    StepStarted {
        run_id: Uuid,
        step_id: String,
        model: String,
    },
    ContextAssembled {
        step_id: String,
        included: Vec<u32>,
        missing: Vec<u32>,
    },
    PlanSaved {
        step_id: String,
        path: PathBuf,
    },
    ActionsExtracted {
        step_id: String,
        count: usize,
        dropped: usize,
    },
    StepCompleted {
        step_id: String,
        outcome: RunOutcome,
        ok: bool,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Per-run switches
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write missing files instead of only reporting them
    pub auto_apply: bool,

    /// Materialization root; `<agent_dir>/outputs` when unset, relative
    /// paths resolve against the project root
    pub target_dir: Option<PathBuf>,

    /// Model override for this run only
    pub model: Option<String>,
}

/// Runs pipeline operations against one project directory
pub struct StepPipeline<P> {
    provider: P,
    settings: Settings,
    layout: ProjectLayout,
    catalog: StepCatalog,
    history: Option<Box<dyn HistoryBackend>>,
    event_handlers: Vec<EventHandler>,
}

impl<P: GenerationProvider> StepPipeline<P> {
    pub fn new(provider: P, settings: Settings, project_root: impl Into<PathBuf>) -> Self {
        let layout = ProjectLayout::new(project_root, &settings.agent_dir);
        Self {
            provider,
            settings,
            layout,
            catalog: StepCatalog::builtin(),
            history: None,
            event_handlers: Vec::new(),
        }
    }

    /// Record every run in `history`
    pub fn with_history(mut self, history: Box<dyn HistoryBackend>) -> Self {
        self.history = Some(history);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: PipelineEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    fn store(&self) -> ContextStore {
        ContextStore::new(self.layout.clone())
    }

    /// Create the project: directories, generated spec files and config
    pub async fn initialize(
        &self,
        problem_description: &str,
        template_dir: Option<&Path>,
        model: Option<&str>,
        force: bool,
    ) -> Result<InitReport> {
        if problem_description.trim().is_empty() {
            return Err(PipelineError::InvalidConfigValue {
                key: "problem_description".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let _lock = ProjectLock::acquire(&self.layout)?;
        let bootstrapper = SpecBootstrapper::new(self.settings.provider.timeout_secs);
        bootstrapper.prepare(&self.layout, force)?;

        let template_dir = resolve_template_dir(template_dir);
        let model = model.unwrap_or(&self.settings.provider.default_model);
        info!(
            "Generating specifications with {} from {}",
            model,
            template_dir
                .as_deref()
                .map_or_else(|| "placeholders".to_string(), |d| d.display().to_string())
        );

        let mut report = InitReport {
            agent_dir: self.layout.agent_dir().to_path_buf(),
            config_path: self.layout.config_path(),
            template_directory: template_dir.clone(),
            generated: Vec::new(),
            placeholder_templates: Vec::new(),
            failed: Vec::new(),
        };

        for step in self.catalog.steps() {
            self.emit_event(PipelineEvent::SpecStarted {
                template: step.template.clone(),
            });

            let draft = bootstrapper
                .draft_spec(
                    &self.provider,
                    model,
                    problem_description,
                    step,
                    template_dir.as_deref(),
                )
                .await;
            atomic_write(&self.layout.template_path(&draft.template), draft.content.as_bytes())?;

            match draft.source {
                SpecSource::Generated => report.generated.push(draft.template.clone()),
                SpecSource::GeneratedFromPlaceholder => {
                    report.generated.push(draft.template.clone());
                    report.placeholder_templates.push(draft.template.clone());
                }
                SpecSource::ErrorNotice => report.failed.push(draft.template.clone()),
            }

            self.emit_event(PipelineEvent::SpecWritten {
                template: draft.template,
                source: draft.source,
            });
        }

        let config = ProjectConfig::new(
            problem_description,
            template_dir.map(|d| d.display().to_string()),
            model,
        );
        config.save(&self.layout)?;

        info!(
            "Initialized {} ({}/{} specs generated)",
            self.layout.agent_dir().display(),
            report.generated.len(),
            self.catalog.steps().len()
        );
        Ok(report)
    }

    /// Run one step; `None` runs the step after the last completed one
    pub async fn run_step(&self, step_id: Option<&str>, options: &RunOptions) -> Result<StepRunReport> {
        ensure_initialized(&self.layout)?;
        let _lock = ProjectLock::acquire(&self.layout)?;
        let config = ProjectConfig::load(&self.layout)?;

        let step_id = match step_id {
            Some(id) => self.catalog.get(id)?.id.clone(),
            None => self
                .catalog
                .next_after(config.current_step.as_deref())
                .map(|s| s.id.clone())
                .ok_or_else(|| {
                    PipelineError::NoNextStep(config.current_step.clone().unwrap_or_default())
                })?,
        };
        let model = options.model.clone().unwrap_or_else(|| config.model.clone());

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Running {} with {} (run {})", step_id, model, run_id);
        self.emit_event(PipelineEvent::StepStarted {
            run_id,
            step_id: step_id.clone(),
            model: model.clone(),
        });

        let result = self.execute_step(run_id, &step_id, &model, &config, options).await;

        match &result {
            Ok(report) => {
                // Files are already on disk, so a failed cursor save only warns
                if report.ok {
                    if let Err(e) = self.advance_current_step(config, &step_id) {
                        warn!("Could not record {} as the current step: {}", step_id, e);
                    }
                }
                self.emit_event(PipelineEvent::StepCompleted {
                    step_id: step_id.clone(),
                    outcome: report.outcome,
                    ok: report.ok,
                });
                self.record_history(RunRecord::from_report(report, started_at)).await;
            }
            Err(e) => {
                error!("Step {} failed: {}", step_id, e);
                self.emit_event(PipelineEvent::StepFailed {
                    step_id: step_id.clone(),
                    error: e.to_string(),
                });
                self.record_history(RunRecord::failed(run_id, &step_id, &model, started_at, &e.to_string()))
                    .await;
            }
        }

        result
    }

    async fn execute_step(
        &self,
        run_id: Uuid,
        step_id: &str,
        model: &str,
        config: &ProjectConfig,
        options: &RunOptions,
    ) -> Result<StepRunReport> {
        let store = self.store();
        let assembled: AssembledContext =
            ContextAssembler::new(self.catalog.clone(), store.clone()).assemble(step_id)?;
        self.emit_event(PipelineEvent::ContextAssembled {
            step_id: step_id.to_string(),
            included: assembled.included.clone(),
            missing: assembled.missing.clone(),
        });

        let timeout_secs = self.settings.provider.timeout_secs;
        let request = PlanRequest {
            problem_description: &config.problem_description,
            model,
            assembled: &assembled,
            first_plan: !store.has_output(step_id),
        };
        let plan = PlanGenerator::new(timeout_secs)
            .generate(&self.provider, &request)
            .await?;

        // Saved before extraction so a parse failure never loses the plan
        let plan_path = store.write_output(step_id, &plan)?;
        self.emit_event(PipelineEvent::PlanSaved {
            step_id: step_id.to_string(),
            path: plan_path.clone(),
        });

        let parsed = PlanParser::new(timeout_secs)
            .parse(&self.provider, &plan, model)
            .await;
        self.emit_event(PipelineEvent::ActionsExtracted {
            step_id: step_id.to_string(),
            count: parsed.actions.len(),
            dropped: parsed.dropped.len(),
        });
        let parse_diagnostics = parsed.diagnostics();

        let actions = ActionScheduler::new(self.settings.truncation).schedule(parsed.actions);

        let (applied, needs_review, ok, outcome) = if actions.is_empty() {
            info!("No extractable file actions for {}; plan saved to {}", step_id, plan_path.display());
            (Vec::new(), Vec::new(), true, RunOutcome::NoExtractableActions)
        } else {
            let target = self.resolve_target_dir(options.target_dir.as_deref());
            let materializer = Materializer::new(target, &plan_path).with_reserved(self.reserved_paths());
            info!(
                "Materializing {} actions into {}",
                actions.len(),
                materializer.target_dir().display()
            );
            let result = materializer.materialize(&actions, options.auto_apply);
            let outcome = if result.ok {
                RunOutcome::Materialized
            } else {
                RunOutcome::WriteFailures
            };
            (result.applied, result.needs_review, result.ok, outcome)
        };

        Ok(StepRunReport {
            run_id,
            step_id: step_id.to_string(),
            model: model.to_string(),
            plan_path,
            plan,
            actions,
            applied,
            needs_review,
            ok,
            outcome,
            parse_diagnostics,
        })
    }

    fn resolve_target_dir(&self, requested: Option<&Path>) -> PathBuf {
        match requested {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => self.layout.root().join(dir),
            None => self.layout.outputs_dir(),
        }
    }

    /// Pipeline-owned files that an extracted action must never create
    fn reserved_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![
            self.layout.config_path(),
            self.layout.lock_path(),
            self.layout.history_path(),
        ];
        for step in self.catalog.steps() {
            paths.push(self.layout.step_output_path(&step.id));
            paths.push(self.layout.template_path(&step.template));
        }
        paths
    }

    /// Move the numbered-step cursor forward; named steps leave it alone
    fn advance_current_step(&self, mut config: ProjectConfig, step_id: &str) -> Result<()> {
        let step = self.catalog.get(step_id)?;
        if step.ordinal.is_none() {
            return Ok(());
        }
        config.current_step = Some(step_id.to_string());
        config.save(&self.layout)
    }

    async fn record_history(&self, record: RunRecord) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record(&record).await {
                warn!("Failed to record run {} in history: {:#}", record.run_id, e);
            }
        }
    }

    /// Config keys and values
    pub fn config_entries(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(ProjectConfig::load(&self.layout)?.entries())
    }

    /// Update an allow-listed config key under the project lock
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<ProjectConfig> {
        set_config_value(&self.layout, &self.catalog, key, value)
    }
}

/// Update an allow-listed config key under the project lock
pub fn set_config_value(
    layout: &ProjectLayout,
    catalog: &StepCatalog,
    key: &str,
    value: &str,
) -> Result<ProjectConfig> {
    ensure_initialized(layout)?;
    let _lock = ProjectLock::acquire(layout)?;
    ProjectConfig::update(layout, catalog, key, value)
}

/// Fail with `NotInitialized` before anything is created on disk
fn ensure_initialized(layout: &ProjectLayout) -> Result<()> {
    if layout.config_path().is_file() {
        Ok(())
    } else {
        Err(PipelineError::NotInitialized(layout.config_path()))
    }
}
