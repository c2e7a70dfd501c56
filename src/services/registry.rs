use super::environment::{
    EnvironmentService, InterpreterEnvironment, MsBuildEnvironment, VisualStudioEnvironment,
};
use super::process::{ProcessRunner, TokioProcessRunner};
use crate::config::BuildrigConfig;
use crate::script::{PythonRuntime, ScriptRuntime};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only container of every capability a pipeline may use
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    process: Option<Arc<dyn ProcessRunner>>,
    environments: Vec<Arc<dyn EnvironmentService>>,
    script_runtimes: Vec<Arc<dyn ScriptRuntime>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes the machine once and registers everything that was found
    pub fn probe(config: &BuildrigConfig) -> Self {
        let visual_studio = VisualStudioEnvironment::probe();
        let msbuild = MsBuildEnvironment::from_visual_studio(&visual_studio);
        let interpreter = InterpreterEnvironment::probe(&config.python);
        let python = PythonRuntime::from_environment(&interpreter);

        let registry = Self::new()
            .with_process(Arc::new(TokioProcessRunner))
            .with_environment(Arc::new(visual_studio))
            .with_environment(Arc::new(msbuild))
            .with_environment(Arc::new(interpreter))
            .with_script_runtime(Arc::new(python));

        info!(
            available = ?registry.available_services(),
            "Probed build services"
        );
        registry
    }

    pub fn with_process(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.process = Some(runner);
        self
    }

    /// Registers an environment, replacing an earlier one with the same name
    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentService>) -> Self {
        self.environments.retain(|e| e.name() != environment.name());
        debug!(service = environment.name(), "Registered environment");
        self.environments.push(environment);
        self
    }

    pub fn with_script_runtime(mut self, runtime: Arc<dyn ScriptRuntime>) -> Self {
        self.script_runtimes.push(runtime);
        self
    }

    pub fn process(&self) -> Option<&Arc<dyn ProcessRunner>> {
        self.process.as_ref()
    }

    pub fn environment(&self, name: &str) -> Option<&Arc<dyn EnvironmentService>> {
        self.environments.iter().find(|e| e.name() == name)
    }

    pub fn environments(&self) -> &[Arc<dyn EnvironmentService>] {
        &self.environments
    }

    /// Script runtimes in registration order
    pub fn script_runtimes(&self) -> &[Arc<dyn ScriptRuntime>] {
        &self.script_runtimes
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.service_names().iter().any(|n| n == name)
    }

    /// Whether a service with this name is registered and reports itself available
    pub fn is_available(&self, name: &str) -> bool {
        if let Some(process) = &self.process {
            if process.name() == name {
                return process.is_available();
            }
        }
        if let Some(environment) = self.environment(name) {
            return environment.is_available();
        }
        self.script_runtimes
            .iter()
            .find(|r| r.name() == name)
            .map(|r| r.is_available())
            .unwrap_or(false)
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(process) = &self.process {
            names.push(process.name().to_string());
        }
        names.extend(self.environments.iter().map(|e| e.name().to_string()));
        names.extend(self.script_runtimes.iter().map(|r| r.name().to_string()));
        names
    }

    pub fn available_services(&self) -> Vec<String> {
        self.service_names()
            .into_iter()
            .filter(|name| self.is_available(name))
            .collect()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .finish()
    }
}
