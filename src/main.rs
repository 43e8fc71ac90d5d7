use anyhow::{Context, Result};
use ci_pipeline::cli::commands::{
    HistoryCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand,
};
use ci_pipeline::cli::output::*;
use ci_pipeline::cli::terminal_output::CommandOutputPrinter;
use ci_pipeline::cli::{Cli, Command};
use ci_pipeline::core::config::PipelineConfig;
use ci_pipeline::core::{ExecutionStatus, Phase};
use ci_pipeline::execution::{ExecutionEngine, ExecutionEvent};
use ci_pipeline::persistence::{
    create_summary, record_execution, ExecutionSummary, PersistenceBackend,
};
use ci_pipeline::runner::ShellRunner;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Plan(cmd) => plan_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Open the execution history store
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    {
        let store = ci_pipeline::persistence::SqliteExecutionStore::with_default_path().await?;
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Arc::new(ci_pipeline::persistence::InMemoryPersistence::new()))
    }
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let mut pipeline = config.to_pipeline();

    for (key, value) in &cmd.env {
        pipeline.set_env(key, value);
        println!(
            "{} Environment override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    pipeline.retain_versions(&cmd.only)?;

    if cmd.dry_run {
        for plan in pipeline.plan() {
            println!("{}", format_plan(&plan));
        }
        return Ok(());
    }

    // Opened up front so a broken store is reported before anything runs
    let store = if cmd.no_history {
        None
    } else {
        match open_store().await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Execution history unavailable, not saving this run: {:#}", e);
                None
            }
        }
    };

    let runner = ShellRunner::new(pipeline.shell.clone());
    let engine = ExecutionEngine::new(runner, cmd.scheduling_strategy());

    let progress = create_progress_bar(pipeline.entries.len());
    let bar = progress.clone();
    let printer = cmd.show_output.then(CommandOutputPrinter::default);
    engine
        .add_event_handler(move |event| {
            if let Some(line) = format_execution_event(&event) {
                bar.println(line);
            }
            match &event {
                ExecutionEvent::CommandFinished { entry_id, record } => {
                    if let Some(block) = printer.as_ref().and_then(|p| p.render(entry_id, record)) {
                        bar.println(block);
                    }
                }
                ExecutionEvent::EntryFinished { entry_id, .. } => {
                    bar.set_message(entry_id.clone());
                    bar.inc(1);
                }
                _ => {}
            }
        })
        .await;

    println!();
    let result = engine.execute(&mut pipeline).await;
    progress.finish_and_clear();
    let status = result?;

    let summary = create_summary(&pipeline);
    println!("\n{} Matrix results for {}:", INFO, style(&pipeline.name).bold());
    for entry in &summary.entries {
        println!("  {}", format_entry_summary(entry));
    }

    if let Some(store) = &store {
        if record_execution(store.as_ref(), &summary).await {
            println!(
                "\n{} Execution saved to history (ID: {})",
                INFO,
                style(short_id(&summary.execution_id.to_string())).dim()
            );
        }
    }

    match status {
        ExecutionStatus::Passed => {
            println!(
                "\n{} {} {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("PASSED").green()
            );
        }
        _ => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("FAILED").red()
            );
            error!("Pipeline {} failed", pipeline.name);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Versions: {}", style(config.versions().join(", ")).cyan());
            if !config.services.is_empty() {
                println!("  Services: {}", style(config.services.join(", ")).cyan());
            }
            println!("  Environment: {}", style(config.env_pairs()?.len()).cyan());
            for (phase, commands) in config.phase_configs() {
                println!("  {}: {}", phase, style(commands.len()).cyan());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let mut pipeline = config.to_pipeline();
    pipeline.retain_versions(&cmd.only)?;

    let plans = pipeline.plan();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!(
        "{} Plan for {} ({} phases: {})",
        INFO,
        style(&pipeline.name).bold(),
        Phase::ALL.len(),
        Phase::ALL.map(|p| p.as_str()).join(" → ")
    );
    if !pipeline.services.is_empty() {
        println!("  Services: {}", style(pipeline.services.join(", ")).cyan());
    }
    for plan in &plans {
        println!("{}", format_plan(plan));
    }

    Ok(())
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_store().await?;
    let pipelines = store.list_pipelines().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let executions = store.list_executions(pipeline).await?;
            json_data.push(serde_json::json!({
                "name": pipeline,
                "execution_count": executions.len()
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        if cmd.with_counts {
            let executions = store.list_executions(pipeline_name).await?;
            let passed = executions.iter().filter(|e| e.status == ExecutionStatus::Passed).count();
            let failed = executions.iter().filter(|e| e.status == ExecutionStatus::Failed).count();
            println!(
                "  {} ({} runs: {} passed, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(passed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.verbose)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let mut executions = match &cmd.pipeline {
        Some(pipeline_name) => store.list_executions(pipeline_name).await?,
        None => {
            let mut all_execs = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all_execs.extend(store.list_executions(&pipeline).await?);
            }
            all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_execs
        }
    };
    executions.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
        if cmd.verbose {
            for entry in &summary.entries {
                println!("      {}", format_entry_summary(entry));
            }
        }
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Entries: {}/{} passed",
        style(summary.passed_entries()).cyan(),
        summary.total_entries()
    );
    for entry in &summary.entries {
        println!("    {}", format_entry_summary(entry));
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
