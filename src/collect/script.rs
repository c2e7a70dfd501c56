use super::{bind_options, CollectError, TaskAccumulator, TaskCollector};
use crate::context::BuildContext;
use crate::requirement::{RequirementCollection, RequirementDef};
use crate::script::ScriptRuntime;
use crate::services::ServiceRegistry;
use crate::task::{BuildTask, ScriptInvocation, TaskAction};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const SCRIPT_PREFIX: &str = "task_";

/// Collects script tasks from `<root>/<context name>/task_*`.
///
/// Only active when at least one script runtime is available. Each file goes
/// to the first runtime that handles its extension.
#[derive(Debug, Clone)]
pub struct ScriptCollector {
    root: PathBuf,
}

impl ScriptCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn script_dir(&self, context: &BuildContext) -> PathBuf {
        self.root.join(&context.name)
    }

    async fn task_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_task = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(SCRIPT_PREFIX));
            if is_task && entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl TaskCollector for ScriptCollector {
    fn name(&self) -> &str {
        "script"
    }

    async fn collect(
        &self,
        context: &BuildContext,
        services: &Arc<ServiceRegistry>,
        tasks: &mut TaskAccumulator,
    ) -> Result<(), CollectError> {
        let runtimes: Vec<&Arc<dyn ScriptRuntime>> = services
            .script_runtimes()
            .iter()
            .filter(|runtime| runtime.is_available())
            .collect();
        if runtimes.is_empty() {
            debug!("No script runtime available, skipping script tasks");
            return Ok(());
        }

        let dir = self.script_dir(context);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "No script directory for context");
            return Ok(());
        }

        let files = match Self::task_files(&dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list script directory");
                return Ok(());
            }
        };

        for path in files {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let Some(runtime) = runtimes.iter().find(|r| r.can_handle(extension)) else {
                debug!(script = %path.display(), "No runtime handles this script");
                continue;
            };
            let candidate = path.display().to_string();

            let settings = match runtime.get_settings(&path).await {
                Ok(settings) => settings,
                Err(e) => {
                    tasks.reject(candidate, e.diagnostic());
                    continue;
                }
            };

            if let Some(condition) = settings.active_condition() {
                if !context.is_pure_collect() && !context.condition_matches(condition) {
                    debug!(
                        task = %settings.name,
                        condition = %condition,
                        current = ?context.condition,
                        "Active condition does not match, skipping"
                    );
                    continue;
                }
            }

            let schema = match settings.option_schema() {
                Ok(schema) => schema.map(Arc::new),
                Err(e) => {
                    tasks.reject(candidate, format!("Invalid options: {}", e));
                    continue;
                }
            };
            let options = bind_options(schema.as_ref(), context, &settings.name)?;

            let requirements = RequirementCollection::from(
                settings
                    .requirements
                    .iter()
                    .cloned()
                    .map(RequirementDef::into_requirement)
                    .collect::<Vec<_>>(),
            );

            let script_path = match &settings.script {
                Some(relative) => dir.join(relative),
                None => path.clone(),
            };

            tasks.push(BuildTask::new(
                settings.task_settings(),
                requirements,
                options,
                TaskAction::Scripted(ScriptInvocation {
                    runtime: Arc::clone(runtime),
                    path: script_path,
                    mode: settings.mode,
                }),
            ));
        }
        Ok(())
    }
}
