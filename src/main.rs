use anyhow::{Context, Result};
use stepgen::{
    agent::{build_provider, GenerationProvider},
    cli::{
        commands::{ConfigAction, ConfigCommand, GenerateCommand, HistoryCommand, InitCommand, StepsCommand},
        output::*,
        Cli, Command,
    },
    core::{ContextStore, ProjectConfig, ProjectLayout, Settings, StepCatalog},
    execution::{set_config_value, RunOptions, StepPipeline},
    persistence::open_history,
    transport::StdioServer,
};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Logs go to stderr; stdout carries command output and JSON-RPC responses
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let settings = Settings::load(cli.settings.as_deref()).context("Failed to load settings")?;
    let layout = ProjectLayout::new(&cli.project, &settings.agent_dir);

    match &cli.command {
        Command::Init(cmd) => init_project(cmd, &cli, settings).await?,
        Command::Generate(cmd) => generate_step(cmd, &cli, settings).await?,
        Command::Config(cmd) => configure(cmd, &layout)?,
        Command::Steps(cmd) => list_steps(cmd, &layout)?,
        Command::History(cmd) => show_history(cmd, &layout).await?,
        Command::Serve(_) => serve(&cli, settings).await?,
    }

    Ok(())
}

fn make_pipeline(cli: &Cli, settings: Settings) -> Result<StepPipeline<Box<dyn GenerationProvider>>> {
    let provider = build_provider(&settings.provider, cli.api_key.clone())
        .context("Failed to create generation provider")?;
    Ok(StepPipeline::new(provider, settings, &cli.project))
}

/// Print events, driving a spinner between them
fn attach_console<P: GenerationProvider>(pipeline: &mut StepPipeline<P>) -> indicatif::ProgressBar {
    let spinner = create_spinner("Starting");
    let handle = spinner.clone();
    pipeline.add_event_handler(move |event| {
        if let Some(line) = format_pipeline_event(&event) {
            handle.println(line);
        }
        if let Some(message) = spinner_message(&event) {
            handle.set_message(message);
        }
    });
    spinner
}

async fn init_project(cmd: &InitCommand, cli: &Cli, settings: Settings) -> Result<()> {
    let mut pipeline = make_pipeline(cli, settings)?;
    println!(
        "{} Initializing project in {}",
        INFO,
        style(pipeline.layout().agent_dir().display()).bold()
    );

    let spinner = attach_console(&mut pipeline);
    let result = pipeline
        .initialize(&cmd.problem, cmd.template_dir.as_deref(), cli.model.as_deref(), cmd.force)
        .await;
    spinner.finish_and_clear();

    let report = result?;
    print_init_report(&report);
    Ok(())
}

async fn generate_step(cmd: &GenerateCommand, cli: &Cli, settings: Settings) -> Result<()> {
    let mut pipeline = make_pipeline(cli, settings)?;
    if !cmd.no_history && pipeline.layout().is_initialized() {
        let history = open_history(pipeline.layout())
            .await
            .context("Failed to open run history")?;
        pipeline = pipeline.with_history(history);
    }

    let options = RunOptions {
        auto_apply: cmd.apply,
        target_dir: cmd.target_dir.clone(),
        model: cli.model.clone(),
    };

    let spinner = attach_console(&mut pipeline);
    let result = pipeline.run_step(cmd.step.as_deref(), &options).await;
    spinner.finish_and_clear();

    let report = result?;
    print_run_report(&report);

    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn configure(cmd: &ConfigCommand, layout: &ProjectLayout) -> Result<()> {
    match &cmd.action {
        ConfigAction::List => {
            let config = ProjectConfig::load(layout)?;
            println!("{} Configuration ({}):", INFO, style(layout.config_path().display()).dim());
            for (key, value) in config.entries() {
                println!("  {}: {}", style(key).cyan(), value);
            }
        }
        ConfigAction::Get { key } => {
            let config = ProjectConfig::load(layout)?;
            match config.get(key) {
                Some(value) => println!("{}", value),
                None => anyhow::bail!("Unknown config key '{}'", key),
            }
        }
        ConfigAction::Set { key, value } => {
            let config = set_config_value(layout, &StepCatalog::builtin(), key, value)?;
            let stored = config.get(key).unwrap_or_default();
            println!("{} Set {} = {}", CHECK, style(key).cyan(), stored);
        }
    }
    Ok(())
}

fn list_steps(cmd: &StepsCommand, layout: &ProjectLayout) -> Result<()> {
    let catalog = StepCatalog::builtin();
    let store = ContextStore::new(layout.clone());
    let current = ProjectConfig::load(layout).ok().and_then(|c| c.current_step);

    if cmd.json {
        let steps: Vec<serde_json::Value> = catalog
            .steps()
            .iter()
            .map(|step| {
                serde_json::json!({
                    "id": step.id,
                    "template": step.template,
                    "ordinal": step.ordinal,
                    "kind": step.kind,
                    "has_output": store.has_output(&step.id),
                })
            })
            .collect();
        let data = serde_json::json!({ "current_step": current, "steps": steps });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Steps:", INFO);
    for step in catalog.steps() {
        let is_current = current.as_deref() == Some(step.id.as_str());
        println!("{}", format_step(step, store.has_output(&step.id), is_current));
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand, layout: &ProjectLayout) -> Result<()> {
    if !layout.history_path().is_file() {
        println!("{} No runs recorded", INFO);
        return Ok(());
    }

    let history = open_history(layout).await?;
    let runs = history.list(cmd.step.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs recorded", INFO);
        return Ok(());
    }

    println!("{} Run history (latest {}):", INFO, cmd.limit);
    for run in &runs {
        println!("  {}", format_run_record(run));
    }
    Ok(())
}

async fn serve(cli: &Cli, settings: Settings) -> Result<()> {
    let mut pipeline = make_pipeline(cli, settings)?;
    if pipeline.layout().is_initialized() {
        let history = open_history(pipeline.layout())
            .await
            .context("Failed to open run history")?;
        pipeline = pipeline.with_history(history);
    }

    StdioServer::new(pipeline).run().await
}
