use super::signature::{SignatureError, TaskSignature};
use crate::context::BuildContext;
use crate::options::OptionSchema;
use crate::requirement::EnvironmentRequirement;
use crate::task::{TaskHandler, TaskSettings};
use std::fmt;
use std::sync::Arc;

/// One task contributed by an exporter
#[derive(Clone)]
pub struct TaskMethod {
    pub settings: TaskSettings,
    pub handler: TaskHandler,
    pub requirements: Vec<Arc<dyn EnvironmentRequirement>>,
    pub options: Option<Arc<OptionSchema>>,
    signature: Option<TaskSignature>,
}

impl TaskMethod {
    pub fn new(settings: TaskSettings, handler: TaskHandler) -> Self {
        Self {
            settings,
            handler,
            requirements: Vec::new(),
            options: None,
            signature: None,
        }
    }

    pub fn with_options(mut self, schema: Arc<OptionSchema>) -> Self {
        self.options = Some(schema);
        self
    }

    pub fn with_requirement(mut self, requirement: Arc<dyn EnvironmentRequirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Overrides the derived signature, for methods declared in tables
    pub fn with_signature(mut self, signature: TaskSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn signature(&self) -> TaskSignature {
        self.signature.clone().unwrap_or_else(|| {
            TaskSignature::standard(self.options.is_some(), self.handler.return_kind())
        })
    }

    pub fn validate(&self) -> Result<(), SignatureError> {
        self.signature()
            .validate(&self.handler.return_kind(), self.options.is_some())
    }
}

impl fmt::Debug for TaskMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMethod")
            .field("name", &self.settings.name)
            .field("signature", &self.signature().to_string())
            .finish()
    }
}

type AcceptFn = Arc<dyn Fn(&BuildContext) -> bool + Send + Sync>;

/// A named task family
#[derive(Clone)]
pub struct TaskExporter {
    name: String,
    accept: Option<AcceptFn>,
    methods: Vec<TaskMethod>,
}

impl TaskExporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accept: None,
            methods: Vec::new(),
        }
    }

    /// Predicate a live context must pass before the exporter's tasks are collected
    pub fn accept<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BuildContext) -> bool + Send + Sync + 'static,
    {
        self.accept = Some(Arc::new(predicate));
        self
    }

    pub fn method(mut self, method: TaskMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[TaskMethod] {
        &self.methods
    }

    pub fn accepts(&self, context: &BuildContext) -> bool {
        self.accept.as_ref().map_or(true, |accept| accept(context))
    }
}

impl fmt::Debug for TaskExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExporter")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Exporters in registration order
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    exporters: Vec<TaskExporter>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, exporter: TaskExporter) -> &mut Self {
        self.exporters.push(exporter);
        self
    }

    pub fn with(mut self, exporter: TaskExporter) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn exporters(&self) -> &[TaskExporter] {
        &self.exporters
    }

    /// Distinct family names, first registration first
    pub fn families(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for exporter in &self.exporters {
            if !names.contains(&exporter.name()) {
                names.push(exporter.name());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::{ParameterKind, ReturnKind};

    fn noop() -> TaskHandler {
        TaskHandler::blocking(|_| 0)
    }

    #[test]
    fn test_derived_signature() {
        let plain = TaskMethod::new(TaskSettings::new("A"), noop());
        assert_eq!(plain.signature(), TaskSignature::standard(false, ReturnKind::ExitCode));
        assert!(plain.validate().is_ok());

        let with_options = TaskMethod::new(
            TaskSettings::new("B"),
            TaskHandler::from_async(|_| async { 0 }),
        )
        .with_options(Arc::new(OptionSchema::new()));
        assert!(with_options.signature().takes_options());
        assert!(with_options.validate().is_ok());
    }

    #[test]
    fn test_explicit_signature_is_validated() {
        let method = TaskMethod::new(TaskSettings::new("Bad"), noop()).with_signature(
            TaskSignature::new(
                vec![ParameterKind::Context, ParameterKind::Observer],
                ReturnKind::ExitCode,
            ),
        );
        assert_eq!(method.validate(), Err(SignatureError::Arity(2)));
    }

    #[test]
    fn test_exporter_accept() {
        let exporter = TaskExporter::new("Family").accept(|ctx| ctx.project_path.is_some());
        assert!(!exporter.accepts(&BuildContext::new("Family")));
        assert!(exporter.accepts(&BuildContext::new("Family").project_path("/p")));
        assert!(TaskExporter::new("Open").accepts(&BuildContext::new("Open")));
    }

    #[test]
    fn test_families_are_unique() {
        let registry = TaskRegistry::new()
            .with(TaskExporter::new("B"))
            .with(TaskExporter::new("A"))
            .with(TaskExporter::new("B"));
        assert_eq!(registry.families(), vec!["B", "A"]);
    }
}
