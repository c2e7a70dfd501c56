//! Command handlers
//!
//! Each handler returns the process exit code. Failures are logged with
//! `error!` rather than propagated, so `main` only has to exit.

use crate::cli::commands::{CheckArgs, ListArgs, OptionsArgs, RunArgs};
use crate::cli::output::{
    CheckReport, OptionsView, OutputFormat, OutputFormatter, TaskCheck, TaskListing, TaskSummary,
};
use crate::cli::progress::ProgressObserver;
use crate::collect::{Collection, TaskDiscovery};
use crate::config::BuildrigConfig;
use crate::context::BuildContext;
use crate::observer::{ExecuteObserver, LoggingObserver};
use crate::options::{FormatMode, OptionsDocument, TaskOptions, UnknownPolicy};
use crate::pipeline::{BuildPipeline, PipelineSupervisor, SupervisorError};
use crate::services::ServiceRegistry;
use crate::task::BuildTask;
use crate::tasks::default_registry;
use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Exit code for failures before any task ran
const SETUP_FAILURE: i32 = -1;
const CANCELED: i32 = 2;

pub async fn handle_list(args: &ListArgs, config: &BuildrigConfig) -> i32 {
    info!(context = %args.context, "Listing tasks");

    let services = match probe_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!("{:#}", e);
            return SETUP_FAILURE;
        }
    };

    let context = BuildContext::metadata(&args.context);
    let collection = match discovery(config).collect(&context, &services).await {
        Ok(collection) => collection,
        Err(e) => {
            error!("Failed to collect tasks: {}", e);
            return SETUP_FAILURE;
        }
    };

    let listing = TaskListing {
        context: args.context.clone(),
        tasks: collection.tasks.iter().map(TaskSummary::from).collect(),
        rejected: collection.rejected,
    };
    print_output(OutputFormatter::new(args.format.into()).format_listing(&listing))
}

pub async fn handle_check(args: &CheckArgs, config: &BuildrigConfig) -> i32 {
    info!(context = %args.context, "Checking task requirements");

    let services = match probe_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!("{:#}", e);
            return SETUP_FAILURE;
        }
    };

    let context = build_context(&args.context, args.project.as_deref(), None, &[], config);
    let collection = match discovery(config).collect(&context, &services).await {
        Ok(collection) => collection,
        Err(e) => {
            error!("Failed to collect tasks: {}", e);
            return SETUP_FAILURE;
        }
    };

    let report = check_tasks(&args.context, &collection.tasks, &services);
    let code = print_output(OutputFormatter::new(args.format.into()).format_check(&report));
    if code != 0 {
        return code;
    }
    if report.is_satisfied() {
        0
    } else {
        1
    }
}

pub async fn handle_run(args: &RunArgs, config: &BuildrigConfig, quiet: bool, verbose: bool) -> i32 {
    info!(context = %args.context, "Starting build");

    let services = match probe_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!("{:#}", e);
            return SETUP_FAILURE;
        }
    };

    let context = build_context(
        &args.context,
        args.project.as_deref(),
        args.condition.as_deref(),
        &args.args,
        config,
    );
    let format: OutputFormat = args.format.into();

    // the bar would interleave with log lines on a non-terminal stderr
    let observer: Arc<dyn ExecuteObserver> = if !quiet && std::io::stderr().is_terminal() {
        Arc::new(ProgressObserver::new(verbose))
    } else {
        Arc::new(LoggingObserver)
    };

    let pipeline = match BuildPipeline::create(context, &discovery(config), services, observer).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to prepare pipeline: {}", e);
            return SETUP_FAILURE;
        }
    };
    if pipeline.tasks().is_empty() {
        warn!(context = %args.context, "No tasks to run");
    }

    let supervisor = Arc::new(PipelineSupervisor::new(config.shutdown_grace()));
    let handle = supervisor.spawn(pipeline);
    let run_id = handle.id();

    let wait = handle.wait();
    tokio::pin!(wait);
    let result = tokio::select! {
        result = &mut wait => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!(pipeline = %run_id, "Interrupted, stopping running tasks");
            let stopped = supervisor.stop_all_tasks_and_wait(true).await;
            debug!(stopped, "Pipeline runs stopped");
            wait.await
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(SupervisorError::Aborted(id)) => {
            error!(pipeline = %id, "Pipeline aborted after the shutdown grace period");
            return CANCELED;
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return SETUP_FAILURE;
        }
    };

    if !quiet || format != OutputFormat::Human {
        let code = print_output(OutputFormatter::new(format).format_report(&report));
        if code != 0 {
            return code;
        }
    }
    info!(status = %report.status, duration_ms = report.duration_ms, "Build finished");
    report.exit_code()
}

pub async fn handle_options(args: &OptionsArgs, config: &BuildrigConfig) -> i32 {
    let services = match probe_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!("{:#}", e);
            return SETUP_FAILURE;
        }
    };

    let context = BuildContext::metadata(&args.context);
    let collection = match discovery(config).collect(&context, &services).await {
        Ok(collection) => collection,
        Err(e) => {
            error!("Failed to collect tasks: {}", e);
            return SETUP_FAILURE;
        }
    };

    let Some(task) = find_task(&collection, &args.task) else {
        error!(context = %args.context, "No task named '{}'", args.task);
        return 1;
    };
    let Some(defaults) = task.options.as_ref() else {
        println!("{} takes no options", task.name());
        return 0;
    };

    let default_path = OptionsDocument::default_path(&config.options_dir, &args.context, task.name());
    let load = args
        .load
        .as_ref()
        .map(|path| path.clone().unwrap_or_else(|| default_path.clone()));

    let options = match resolve_options(task.name(), defaults, load.as_deref(), &args.args) {
        Ok(options) => options,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    if let Some(ref save) = args.save {
        let path = save.clone().unwrap_or(default_path);
        if let Err(e) = OptionsDocument::from_options(task.name(), &options).save(&path) {
            error!("{}", e);
            return 1;
        }
        info!(path = %path.display(), "Saved options");
    }

    let mode = if args.simplify {
        FormatMode::Simplify
    } else {
        FormatMode::Complete
    };
    let view = OptionsView::new(task.name(), &options, mode);
    print_output(OutputFormatter::new(args.format.into()).format_options(&view))
}

async fn probe_services(config: &BuildrigConfig) -> Result<Arc<ServiceRegistry>> {
    let config = config.clone();
    let services = tokio::task::spawn_blocking(move || ServiceRegistry::probe(&config))
        .await
        .context("Service probing panicked")?;
    Ok(Arc::new(services))
}

fn discovery(config: &BuildrigConfig) -> TaskDiscovery {
    TaskDiscovery::standard(Arc::new(default_registry()), config.script_dir.clone())
}

/// Live context for `check` and `run`; the condition falls back to the config
pub fn build_context(
    name: &str,
    project: Option<&Path>,
    condition: Option<&str>,
    arguments: &[String],
    config: &BuildrigConfig,
) -> BuildContext {
    let mut context = BuildContext::new(name).arguments(arguments.iter().cloned());
    if let Some(project) = project {
        context = context.project_path(absolute(project));
    }
    if let Some(condition) = condition.or(config.condition.as_deref()) {
        context = context.condition(condition);
    }
    context
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Evaluates every requirement of every task
pub fn check_tasks(context: &str, tasks: &[BuildTask], services: &ServiceRegistry) -> CheckReport {
    let tasks = tasks
        .iter()
        .map(|task| {
            let report = task.requirements.evaluate(services);
            TaskCheck {
                task: task.name().to_string(),
                satisfied: report.is_satisfied(),
                unsatisfied: report.unsatisfied(),
            }
        })
        .collect();
    CheckReport {
        context: context.to_string(),
        tasks,
    }
}

fn find_task<'a>(collection: &'a Collection, name: &str) -> Option<&'a BuildTask> {
    collection
        .tasks
        .iter()
        .find(|task| task.name().eq_ignore_ascii_case(name))
}

/// Layers a saved document and then `args` over `defaults`.
///
/// Arguments are parsed strictly: an option the task does not declare is an
/// error here, unlike during collection.
pub fn resolve_options(
    task: &str,
    defaults: &TaskOptions,
    document: Option<&Path>,
    args: &[String],
) -> Result<TaskOptions> {
    let mut options = defaults.clone();

    if let Some(path) = document {
        let document = OptionsDocument::load(path)?;
        let applied = document.apply_to(task, &mut options)?;
        debug!(path = %path.display(), applied, "Loaded options document");
    }

    if args.is_empty() {
        return Ok(options);
    }

    let mut layered = options.to_args(FormatMode::Complete);
    layered.extend(args.iter().cloned());
    options
        .schema()
        .parse(&layered, UnknownPolicy::Reject)
        .with_context(|| format!("Invalid arguments for task '{}'", task))
}

fn print_output(formatted: Result<String>) -> i32 {
    match formatted {
        Ok(output) => {
            println!("{}", output.trim_end());
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}
