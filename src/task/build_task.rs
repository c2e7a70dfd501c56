use super::handler::{TaskHandler, TaskInput};
use super::settings::TaskSettings;
use crate::context::BuildContext;
use crate::observer::ExecuteObserver;
use crate::options::{FormatMode, TaskOptions};
use crate::requirement::RequirementCollection;
use crate::script::{ExecutionMode, ScriptRequest, ScriptRuntime};
use crate::services::{ServiceRegistry, PROCESS_SERVICE};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A script file bound to the runtime that handles it
#[derive(Clone)]
pub struct ScriptInvocation {
    pub runtime: Arc<dyn ScriptRuntime>,
    pub path: PathBuf,
    pub mode: ExecutionMode,
}

#[derive(Clone)]
pub enum TaskAction {
    Registered(TaskHandler),
    Scripted(ScriptInvocation),
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskAction::Registered(handler) => f.debug_tuple("Registered").field(handler).finish(),
            TaskAction::Scripted(script) => f
                .debug_struct("Scripted")
                .field("runtime", &script.runtime.name())
                .field("path", &script.path)
                .field("mode", &script.mode)
                .finish(),
        }
    }
}

/// One executable step of a pipeline
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub settings: TaskSettings,
    pub requirements: RequirementCollection,
    pub options: Option<TaskOptions>,
    pub action: TaskAction,
    /// Position in the collection pass, used to break order ties
    pub discovery_index: usize,
}

impl BuildTask {
    pub fn new(
        settings: TaskSettings,
        requirements: RequirementCollection,
        options: Option<TaskOptions>,
        action: TaskAction,
    ) -> Self {
        Self {
            settings,
            requirements,
            options,
            action,
            discovery_index: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn order(&self) -> i32 {
        self.settings.order
    }

    pub fn kind(&self) -> &'static str {
        match self.action {
            TaskAction::Registered(_) => "registered",
            TaskAction::Scripted(_) => "script",
        }
    }

    /// Runs the task and returns its exit code.
    ///
    /// 0 is success, -1 a setup failure (missing service, bad script host),
    /// anything else a failure reported by the task itself.
    pub async fn execute(
        &self,
        context: Arc<BuildContext>,
        services: Arc<ServiceRegistry>,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> i32 {
        match &self.action {
            TaskAction::Registered(handler) => {
                let input = TaskInput {
                    task_name: self.settings.name.clone(),
                    context,
                    observer,
                    cancel,
                    options: self.options.clone(),
                    services,
                };
                handler.invoke(input).await
            }
            TaskAction::Scripted(script) => {
                if script.mode == ExecutionMode::External {
                    let interpreter = script.runtime.interpreter_service();
                    let missing: Vec<&str> = [interpreter, PROCESS_SERVICE]
                        .into_iter()
                        .filter(|service| !services.is_available(service))
                        .collect();
                    if !missing.is_empty() {
                        observer.error(
                            &self.settings.name,
                            &format!(
                                "Cannot run '{}' externally, unavailable services: {}",
                                script.path.display(),
                                missing.join(", ")
                            ),
                        );
                        return -1;
                    }
                }

                let arguments = self
                    .options
                    .as_ref()
                    .map(|options| options.to_args(FormatMode::Simplify))
                    .unwrap_or_default();
                debug!(task = %self.settings.name, script = %script.path.display(), mode = %script.mode, ?arguments, "Delegating to script runtime");

                let request = ScriptRequest {
                    task: self.settings.name.clone(),
                    path: script.path.clone(),
                    arguments,
                    mode: script.mode,
                    working_dir: context
                        .project()
                        .and_then(|p| if p.is_dir() { Some(p) } else { p.parent() })
                        .map(|p| p.to_path_buf()),
                };
                script
                    .runtime
                    .execute(request, services, observer, cancel)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::options::{OptionKind, OptionSchema, OptionSpec, OptionValue};
    use crate::services::mock::{MockEnvironment, MockProcessRunner, MockScriptRuntime};
    use crate::services::{Installation, Version, INTERPRETER_SERVICE};

    fn scripted(runtime: Arc<MockScriptRuntime>, mode: ExecutionMode) -> BuildTask {
        BuildTask::new(
            TaskSettings::new("Pack"),
            RequirementCollection::new(),
            None,
            TaskAction::Scripted(ScriptInvocation {
                runtime,
                path: PathBuf::from("/scripts/Ctx/task_pack.py"),
                mode,
            }),
        )
    }

    fn interpreter() -> Arc<MockEnvironment> {
        Arc::new(
            MockEnvironment::new(INTERPRETER_SERVICE)
                .with_installation(Installation::new(Version::new([3, 11]), "/usr/bin/python3")),
        )
    }

    #[tokio::test]
    async fn test_registered_task_gets_options() {
        let schema = Arc::new(OptionSchema::new().with(OptionSpec::new("Fast", OptionKind::Bool)));
        let mut options = schema.defaults();
        options.set("Fast", OptionValue::Bool(true)).unwrap();

        let task = BuildTask::new(
            TaskSettings::new("Compile"),
            RequirementCollection::new(),
            Some(options),
            TaskAction::Registered(TaskHandler::blocking(|input| {
                match input.options.and_then(|o| o.get_bool("Fast")) {
                    Some(true) => 0,
                    _ => 1,
                }
            })),
        );

        let code = task
            .execute(
                Arc::new(BuildContext::new("ctx")),
                Arc::new(ServiceRegistry::new()),
                Arc::new(RecordingObserver::new()),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_external_mode_requires_services() {
        let runtime = Arc::new(MockScriptRuntime::new("python"));
        let process = Arc::new(MockProcessRunner::exiting(0));
        let observer = Arc::new(RecordingObserver::new());

        // process runner present, interpreter missing
        let services = Arc::new(ServiceRegistry::new().with_process(process.clone()));
        let code = scripted(runtime.clone(), ExecutionMode::External)
            .execute(
                Arc::new(BuildContext::new("ctx")),
                services,
                observer.clone(),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(code, -1);
        assert_eq!(process.launch_count(), 0);
        assert!(runtime.requests().is_empty());
        assert!(observer.errors()[0].contains(INTERPRETER_SERVICE));
    }

    #[tokio::test]
    async fn test_external_mode_runs_process() {
        let runtime = Arc::new(MockScriptRuntime::new("python"));
        let process = Arc::new(MockProcessRunner::exiting(3));
        let services = Arc::new(
            ServiceRegistry::new()
                .with_process(process.clone())
                .with_environment(interpreter()),
        );

        let code = scripted(runtime.clone(), ExecutionMode::External)
            .execute(
                Arc::new(BuildContext::new("ctx")),
                services,
                Arc::new(RecordingObserver::new()),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(code, 3);
        assert_eq!(process.launch_count(), 1);
        assert_eq!(process.launched()[0].args, vec!["/scripts/Ctx/task_pack.py"]);
    }

    #[tokio::test]
    async fn test_internal_mode_passes_simplified_arguments() {
        let runtime = Arc::new(MockScriptRuntime::new("python").with_exit_code(5));
        let schema = Arc::new(
            OptionSchema::new()
                .with(OptionSpec::new("Level", OptionKind::Int))
                .with(OptionSpec::new("Name", OptionKind::String)),
        );
        let mut options = schema.defaults();
        options.set("Level", OptionValue::Int(9)).unwrap();

        let mut task = scripted(runtime.clone(), ExecutionMode::Internal);
        task.options = Some(options);

        let code = task
            .execute(
                Arc::new(BuildContext::new("ctx")),
                Arc::new(ServiceRegistry::new()),
                Arc::new(RecordingObserver::new()),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(code, 5);
        assert_eq!(runtime.requests()[0].arguments, vec!["--Level=9"]);
    }
}
