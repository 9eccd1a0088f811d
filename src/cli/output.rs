//! CLI output formatting

use crate::{
    core::{InitReport, RunOutcome, Step, StepKind, StepRunReport},
    execution::{PipelineEvent, SpecSource},
    persistence::RunRecord,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub use console::style;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static PAGE: Emoji<'_, '_> = Emoji("📄 ", "- ");

/// Spinner shown while waiting on the provider
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Horizontal rule sized to the terminal
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
        .min(100);
    "─".repeat(width)
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One-line rendering of a pipeline event; `None` for events the spinner
/// message already covers
pub fn format_pipeline_event(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::SpecStarted { .. } => None,
        PipelineEvent::SpecWritten { template, source } => Some(match source {
            SpecSource::Generated => format!("{} {}", CHECK, style(template).green()),
            SpecSource::GeneratedFromPlaceholder => format!(
                "{} {} {}",
                CHECK,
                style(template).green(),
                style("(placeholder template)").dim()
            ),
            SpecSource::ErrorNotice => format!(
                "{} {} {}",
                CROSS,
                style(template).red(),
                style("(generation failed, error notice written)").dim()
            ),
        }),
        PipelineEvent::StepStarted {
            run_id,
            step_id,
            model,
        } => Some(format!(
            "{} Generating {} with {} ({})",
            ROCKET,
            style(step_id).bold(),
            style(model).cyan(),
            style(short_id(run_id)).dim()
        )),
        PipelineEvent::ContextAssembled {
            included, missing, ..
        } => {
            if missing.is_empty() {
                None
            } else {
                let missing: Vec<String> = missing.iter().map(|n| format!("step{}", n)).collect();
                Some(format!(
                    "{} No saved output for {}; continuing without it ({} earlier step(s) included)",
                    WARN,
                    missing.join(", "),
                    included.len()
                ))
            }
        }
        PipelineEvent::PlanSaved { path, .. } => Some(format!(
            "{} Plan saved to {}",
            PAGE,
            style(path.display()).dim()
        )),
        PipelineEvent::ActionsExtracted { count, dropped, .. } => Some(if *dropped > 0 {
            format!(
                "{} Extracted {} file action(s), dropped {}",
                INFO,
                style(count).cyan(),
                style(dropped).yellow()
            )
        } else {
            format!("{} Extracted {} file action(s)", INFO, style(count).cyan())
        }),
        PipelineEvent::StepCompleted { .. } => None,
        PipelineEvent::StepFailed { step_id, error } => Some(format!(
            "{} {}: {}",
            CROSS,
            style(step_id).red(),
            style(error).dim()
        )),
    }
}

/// Spinner text for events that start a wait
pub fn spinner_message(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::SpecStarted { template } => Some(format!("Generating {}", template)),
        PipelineEvent::ContextAssembled { step_id, .. } => Some(format!("Generating plan for {}", step_id)),
        PipelineEvent::PlanSaved { step_id, .. } => Some(format!("Extracting file actions for {}", step_id)),
        _ => None,
    }
}

pub fn format_outcome(outcome: RunOutcome, ok: bool) -> String {
    match outcome {
        RunOutcome::Materialized if ok => style("MATERIALIZED").green().to_string(),
        RunOutcome::Materialized => style("MATERIALIZED").yellow().to_string(),
        RunOutcome::NoExtractableActions => style("NO ACTIONS").yellow().to_string(),
        RunOutcome::WriteFailures => style("WRITE FAILURES").red().to_string(),
    }
}

/// Applied / needs-review partition of a run
pub fn print_run_report(report: &StepRunReport) {
    println!("{}", style(separator()).dim());
    println!(
        "{} {} {}",
        if report.ok { CHECK } else { CROSS },
        style(&report.step_id).bold(),
        format_outcome(report.outcome, report.ok)
    );

    for note in &report.parse_diagnostics {
        println!("  {} {}", WARN, style(note).dim());
    }

    if report.outcome == RunOutcome::NoExtractableActions {
        println!(
            "  {} No file actions could be extracted. Review the plan at {}",
            INFO,
            style(report.plan_path.display()).cyan()
        );
        return;
    }

    println!("\n  {} ({})", style("Applied").green().bold(), report.applied_count());
    if report.applied.is_empty() {
        println!("    {}", style("none").dim());
    }
    for file in &report.applied {
        println!(
            "    {} {} {}",
            CHECK,
            file.path,
            style(format!("({} bytes)", file.bytes)).dim()
        );
    }

    println!("\n  {} ({})", style("Needs review").yellow().bold(), report.review_count());
    if report.needs_review.is_empty() {
        println!("    {}", style("none").dim());
    }
    for item in &report.needs_review {
        let marker = if item.reason.is_failure() { CROSS } else { WARN };
        println!(
            "    {} {} - {} {}",
            marker,
            item.path,
            item.reason,
            style(format!("(see {})", file_name(&item.pointer))).dim()
        );
    }

    if !report.needs_review.is_empty() {
        println!(
            "\n  {} Full proposals are in {}",
            INFO,
            style(report.plan_path.display()).cyan()
        );
    }
}

pub fn print_init_report(report: &InitReport) {
    println!("{}", style(separator()).dim());
    println!(
        "{} Initialized {}",
        if report.failed.is_empty() { CHECK } else { WARN },
        style(report.agent_dir.display()).bold()
    );
    println!(
        "  Specs generated: {}",
        style(report.generated.len()).cyan()
    );
    if !report.placeholder_templates.is_empty() {
        println!(
            "  From placeholder templates: {}",
            style(report.placeholder_templates.join(", ")).dim()
        );
    }
    if !report.failed.is_empty() {
        println!(
            "  {} Failed (error notice written): {}",
            CROSS,
            style(report.failed.join(", ")).red()
        );
    }
    println!("  Config: {}", style(report.config_path.display()).dim());
}

/// Catalog row for `steps`
pub fn format_step(step: &Step, has_output: bool, is_current: bool) -> String {
    let kind = match step.kind {
        StepKind::Code => style("code").magenta().to_string(),
        StepKind::Document => style("document").blue().to_string(),
    };
    let status = if has_output {
        format!("{}output saved", CHECK)
    } else {
        style("no output").dim().to_string()
    };
    format!(
        "{} {:<8} {:<40} {:<10} {}",
        if is_current { style(">").cyan().bold().to_string() } else { " ".to_string() },
        style(&step.id).bold(),
        step.template,
        kind,
        status
    )
}

/// One history row
pub fn format_run_record(run: &RunRecord) -> String {
    let icon = match run.outcome {
        Some(_) if run.ok => CHECK,
        Some(_) => WARN,
        None => CROSS,
    };
    let duration = run
        .completed_at
        .signed_duration_since(run.started_at)
        .num_seconds()
        .max(0);

    let mut line = format!(
        "{} {} - {} - {} - {} applied, {} for review - {}s - {}",
        icon,
        style(short_id(&run.run_id)).dim(),
        style(&run.step_id).bold(),
        run.status(),
        run.applied_count,
        run.review_count,
        duration,
        style(run.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    if let Some(error) = &run.error {
        line.push_str(&format!("\n      {}", style(error).red()));
    }
    line
}
