//! Integration tests for collecting and running pipelines
//!
//! Tasks come from both a registered family and script plugins on disk, with
//! the script runtime and process runner replaced by in-memory fakes.

use buildrig::collect::{TaskDiscovery, TaskExporter, TaskMethod, TaskRegistry};
use buildrig::observer::{ExecuteEvent, RecordingObserver};
use buildrig::pipeline::{BuildPipeline, PipelineSupervisor, RunStatus, TaskResult};
use buildrig::script::{ExecutionMode, ScriptTaskSettings};
use buildrig::services::mock::{
    MockEnvironment, MockProcessBehavior, MockProcessRunner, MockScriptRuntime,
};
use buildrig::services::{
    Installation, ProcessExit, ProcessSpec, ServiceRegistry, Version, INTERPRETER_SERVICE,
};
use buildrig::task::{TaskHandler, TaskInput, TaskSettings};
use buildrig::BuildContext;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FAMILY: &str = "Demo";

fn script_root(files: &[&str]) -> TempDir {
    let root = TempDir::new().unwrap();
    let dir = root.path().join(FAMILY);
    fs::create_dir_all(&dir).unwrap();
    for file in files {
        fs::write(dir.join(file), "task_def = None\n").unwrap();
    }
    root
}

fn exit_with(code: i32) -> TaskHandler {
    TaskHandler::blocking(move |_| code)
}

fn registry(methods: Vec<TaskMethod>) -> Arc<TaskRegistry> {
    let exporter = methods
        .into_iter()
        .fold(TaskExporter::new(FAMILY), |exporter, method| exporter.method(method));
    Arc::new(TaskRegistry::new().with(exporter))
}

fn script_settings(name: &str, order: i32) -> ScriptTaskSettings {
    let mut settings = ScriptTaskSettings::new(name);
    settings.order = order;
    settings
}

fn outcome_names(report: &buildrig::PipelineReport) -> Vec<&str> {
    report.outcomes.iter().map(|o| o.task.as_str()).collect()
}

#[tokio::test]
async fn test_registered_and_script_tasks_run_by_order() {
    let root = script_root(&["task_lint.py", "task_broken.py", "notes.txt"]);
    let runtime = Arc::new(
        MockScriptRuntime::new("python")
            .with_settings("task_lint.py", script_settings("Lint", 5))
            .with_failure("task_broken.py", "division by zero"),
    );
    let services = Arc::new(ServiceRegistry::new().with_script_runtime(runtime.clone()));
    let discovery = TaskDiscovery::standard(
        registry(vec![
            TaskMethod::new(TaskSettings::new("Package").order(10), exit_with(0)),
            TaskMethod::new(TaskSettings::new("Compile").order(0), exit_with(0)),
        ]),
        root.path(),
    );
    let observer = Arc::new(RecordingObserver::new());

    let pipeline = BuildPipeline::create(BuildContext::new(FAMILY), &discovery, services, observer.clone())
        .await
        .unwrap();
    assert_eq!(pipeline.rejected().len(), 1);
    assert!(pipeline.rejected()[0].candidate.ends_with("task_broken.py"));
    assert!(pipeline.rejected()[0].reason.contains("division by zero"));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(outcome_names(&report), vec!["Compile", "Lint", "Package"]);
    assert_eq!(observer.started_tasks(), vec!["Compile", "Lint", "Package"]);
    assert_eq!(report.rejected.len(), 1);

    let requests = runtime.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].task, "Lint");
    assert!(requests[0].arguments.is_empty());
}

#[tokio::test]
async fn test_failure_stops_pipeline_unless_allowed() {
    let root = script_root(&[]);
    let discovery = TaskDiscovery::standard(
        registry(vec![
            TaskMethod::new(TaskSettings::new("Optional").order(0).can_failure(true), exit_with(4)),
            TaskMethod::new(TaskSettings::new("Required").order(1), exit_with(2)),
            TaskMethod::new(TaskSettings::new("Publish").order(2), exit_with(0)),
        ]),
        root.path(),
    );

    let pipeline = BuildPipeline::create(
        BuildContext::new(FAMILY),
        &discovery,
        Arc::new(ServiceRegistry::new()),
        Arc::new(RecordingObserver::new()),
    )
    .await
    .unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(
        report.outcome("Optional").unwrap().result,
        TaskResult::Failed { exit_code: 4 }
    );
    assert!(!report.outcome("Optional").unwrap().is_blocking_failure());
    assert_eq!(
        report.outcome("Required").unwrap().result,
        TaskResult::Failed { exit_code: 2 }
    );
    assert_eq!(report.outcome("Publish").unwrap().result, TaskResult::NotStarted);
}

#[tokio::test]
async fn test_condition_gates_script_tasks() {
    let root = script_root(&["task_nightly.py", "task_always.py"]);
    let mut nightly = script_settings("NightlyOnly", 0);
    nightly.active_condition = Some("Nightly".to_string());
    let runtime = Arc::new(
        MockScriptRuntime::new("python")
            .with_settings("task_nightly.py", nightly)
            .with_settings("task_always.py", script_settings("Always", 1)),
    );
    let services = Arc::new(ServiceRegistry::new().with_script_runtime(runtime));
    let discovery = TaskDiscovery::standard(registry(vec![]), root.path());

    let release = BuildPipeline::create(
        BuildContext::new(FAMILY).condition("Release"),
        &discovery,
        services.clone(),
        Arc::new(RecordingObserver::new()),
    )
    .await
    .unwrap();
    let names: Vec<&str> = release.tasks().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["Always"]);

    let nightly = BuildPipeline::create(
        BuildContext::new(FAMILY).condition("nightly"),
        &discovery,
        services,
        Arc::new(RecordingObserver::new()),
    )
    .await
    .unwrap();
    assert_eq!(nightly.tasks().len(), 2);
}

#[tokio::test]
async fn test_background_task_joined_before_report() {
    let root = script_root(&[]);
    let discovery = TaskDiscovery::standard(
        registry(vec![
            TaskMethod::new(
                TaskSettings::new("Indexer").order(0).background(),
                TaskHandler::from_async(|_| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    0
                }),
            ),
            TaskMethod::new(TaskSettings::new("Compile").order(1), exit_with(0)),
        ]),
        root.path(),
    );
    let observer = Arc::new(RecordingObserver::new());

    let pipeline = BuildPipeline::create(
        BuildContext::new(FAMILY),
        &discovery,
        Arc::new(ServiceRegistry::new()),
        observer.clone(),
    )
    .await
    .unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let indexer = report.outcome("Indexer").unwrap();
    assert!(indexer.background);
    assert_eq!(indexer.result, TaskResult::Succeeded);

    // the foreground task did not wait for the background one
    let finished: Vec<String> = observer
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ExecuteEvent::TaskFinished { task, .. } => Some(task),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec!["Compile", "Indexer"]);
}

async fn run_long_process(input: TaskInput) -> i32 {
    let Some(runner) = input.services.process() else {
        return -1;
    };
    match runner
        .run(
            ProcessSpec::new("long-build", "make"),
            Arc::clone(&input.observer),
            input.cancel.clone(),
        )
        .await
    {
        Ok(ProcessExit::Exited(code)) => code,
        _ => -1,
    }
}

#[tokio::test]
async fn test_supervisor_cancels_running_process() {
    let root = script_root(&[]);
    let runner = Arc::new(MockProcessRunner::new(MockProcessBehavior::WaitForCancel));
    let discovery = TaskDiscovery::standard(
        registry(vec![
            TaskMethod::new(
                TaskSettings::new("Build").order(0),
                TaskHandler::from_async(run_long_process),
            ),
            TaskMethod::new(TaskSettings::new("Publish").order(1), exit_with(0)),
        ]),
        root.path(),
    );
    let observer = Arc::new(RecordingObserver::new());

    let pipeline = BuildPipeline::create(
        BuildContext::new(FAMILY),
        &discovery,
        Arc::new(ServiceRegistry::new().with_process(runner.clone())),
        observer.clone(),
    )
    .await
    .unwrap();

    let supervisor = Arc::new(PipelineSupervisor::new(Duration::from_secs(5)));
    let handle = supervisor.spawn(pipeline);
    while runner.launch_count() == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(supervisor.stop_all_tasks_and_wait(true).await, 1);
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Canceled);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.outcome("Build").unwrap().result, TaskResult::Canceled);
    assert_eq!(report.outcome("Publish").unwrap().result, TaskResult::NotStarted);
    assert!(observer.canceled_sources().contains(&"long-build".to_string()));
}

#[tokio::test]
async fn test_supervisor_cancels_external_script() {
    let root = script_root(&["task_build.py"]);
    let mut build = script_settings("Build", 0);
    build.mode = ExecutionMode::External;
    let runtime = Arc::new(MockScriptRuntime::new("python").with_settings("task_build.py", build));
    let runner = Arc::new(MockProcessRunner::new(MockProcessBehavior::WaitForCancel));
    let interpreter = MockEnvironment::new(INTERPRETER_SERVICE)
        .with_installation(Installation::new(Version::new([3, 12]), "/usr/bin/python3"));
    let services = ServiceRegistry::new()
        .with_script_runtime(runtime.clone())
        .with_environment(Arc::new(interpreter))
        .with_process(runner.clone());

    let discovery = TaskDiscovery::standard(
        registry(vec![TaskMethod::new(TaskSettings::new("Publish").order(1), exit_with(0))]),
        root.path(),
    );
    let observer = Arc::new(RecordingObserver::new());
    let pipeline = BuildPipeline::create(BuildContext::new(FAMILY), &discovery, Arc::new(services), observer.clone())
        .await
        .unwrap();

    let supervisor = Arc::new(PipelineSupervisor::new(Duration::from_secs(5)));
    let handle = supervisor.spawn(pipeline);
    while runner.launch_count() == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(supervisor.stop_all_tasks_and_wait(true).await, 1);
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Canceled);
    assert_eq!(report.outcome("Build").unwrap().result, TaskResult::Canceled);
    assert_eq!(report.outcome("Publish").unwrap().result, TaskResult::NotStarted);
    assert!(observer.canceled_sources().contains(&"Build".to_string()));
    assert_eq!(runtime.requests()[0].mode, ExecutionMode::External);
}
