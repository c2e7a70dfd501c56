use super::registry::TaskRegistry;
use super::{bind_options, CollectError, TaskAccumulator, TaskCollector};
use crate::context::BuildContext;
use crate::requirement::RequirementCollection;
use crate::services::ServiceRegistry;
use crate::task::{BuildTask, TaskAction};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Collects tasks from exporters registered under the context's name
#[derive(Debug, Clone)]
pub struct RegisteredCollector {
    registry: Arc<TaskRegistry>,
}

impl RegisteredCollector {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl TaskCollector for RegisteredCollector {
    fn name(&self) -> &str {
        "registered"
    }

    async fn collect(
        &self,
        context: &BuildContext,
        _services: &Arc<ServiceRegistry>,
        tasks: &mut TaskAccumulator,
    ) -> Result<(), CollectError> {
        for exporter in self
            .registry
            .exporters()
            .iter()
            .filter(|e| e.name() == context.name)
        {
            if !context.is_pure_collect() && !exporter.accepts(context) {
                debug!(exporter = %exporter.name(), "Exporter does not accept this context");
                continue;
            }

            for method in exporter.methods() {
                if let Err(e) = method.validate() {
                    tasks.reject(format!("{}::{}", exporter.name(), method.name()), e.to_string());
                    continue;
                }

                let options = bind_options(method.options.as_ref(), context, method.name())?;
                tasks.push(BuildTask::new(
                    method.settings.clone(),
                    RequirementCollection::from(method.requirements.clone()),
                    options,
                    TaskAction::Registered(method.handler.clone()),
                ));
            }
        }
        Ok(())
    }
}
