//! Step generation pipeline

pub mod bootstrap;
pub mod engine;
pub mod generator;
pub mod materializer;
pub mod parser;
pub mod scheduler;

pub use bootstrap::{SpecBootstrapper, SpecDraft, SpecSource};
pub use engine::{set_config_value, EventHandler, PipelineEvent, RunOptions, StepPipeline};
pub use generator::{build_plan_prompt, PlanGenerator, PlanRequest};
pub use materializer::Materializer;
pub use parser::{parse_actions, ParsedPlan, PlanParser};
pub use scheduler::{truncate_content, ActionScheduler};
