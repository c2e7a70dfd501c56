//! `CppExample`: builds a Visual Studio project with MSBuild

use crate::collect::{TaskExporter, TaskMethod};
use crate::options::{OptionKind, OptionSchema, OptionSpec, OptionValue, TaskOptions};
use crate::requirement::{EnvironmentVersionRequirement, ServiceRequirement};
use crate::services::{
    ProcessExit, ProcessSpec, Version, MSBUILD_SERVICE, PROCESS_SERVICE, VISUAL_STUDIO_SERVICE,
};
use crate::task::{TaskHandler, TaskInput, TaskSettings};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub const CPP_EXAMPLE: &str = "CppExample";
pub const BUILD_PROJECT: &str = "BuildProject";

const MSBUILD_SOURCE: &str = "msbuild";

/// Schema of `BuildProjectOptions`
pub fn build_project_options() -> OptionSchema {
    OptionSchema::new()
        .with(
            OptionSpec::new("Configuration", OptionKind::enumeration(["Debug", "Release"]))
                .description("Build configuration")
                .default_value(OptionValue::Enum("Release".to_string())),
        )
        .with(
            OptionSpec::new("Arch", OptionKind::enumeration(["x86", "x64", "ARM64"]))
                .display_name("Architecture")
                .description("Target platform")
                .default_value(OptionValue::Enum("x64".to_string())),
        )
        .with(
            OptionSpec::new("VSType", OptionKind::enumeration(["VS_2019", "VS_2022"]))
                .display_name("Visual Studio")
                .description("Visual Studio release used to build")
                .default_value(OptionValue::Enum("VS_2022".to_string())),
        )
        .with(
            OptionSpec::new("Rebuild", OptionKind::Bool)
                .description("Clean and build all targets"),
        )
}

pub fn exporter() -> TaskExporter {
    let method = TaskMethod::new(
        TaskSettings::new(BUILD_PROJECT)
            .description("Build the project with MSBuild")
            .order(0),
        TaskHandler::from_async(build_project),
    )
    .with_options(Arc::new(build_project_options()))
    .with_requirement(Arc::new(ServiceRequirement::new(PROCESS_SERVICE)))
    .with_requirement(Arc::new(
        EnvironmentVersionRequirement::new(VISUAL_STUDIO_SERVICE).min(Version::new([16])),
    ))
    .with_requirement(Arc::new(ServiceRequirement::new(MSBUILD_SERVICE)));

    TaskExporter::new(CPP_EXAMPLE)
        .accept(|ctx| ctx.project_path.is_some())
        .method(method)
}

/// Resolved values of `BuildProjectOptions`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProjectOptions {
    pub configuration: String,
    pub arch: String,
    pub vs_type: String,
    pub rebuild: bool,
}

impl Default for BuildProjectOptions {
    fn default() -> Self {
        Self {
            configuration: "Release".to_string(),
            arch: "x64".to_string(),
            vs_type: "VS_2022".to_string(),
            rebuild: false,
        }
    }
}

impl BuildProjectOptions {
    pub fn from_options(options: Option<&TaskOptions>) -> Self {
        let mut resolved = Self::default();
        let Some(options) = options else {
            return resolved;
        };
        if let Some(value) = options.get_str("Configuration") {
            resolved.configuration = value.to_string();
        }
        if let Some(value) = options.get_str("Arch") {
            resolved.arch = value.to_string();
        }
        if let Some(value) = options.get_str("VSType") {
            resolved.vs_type = value.to_string();
        }
        if let Some(value) = options.get_bool("Rebuild") {
            resolved.rebuild = value;
        }
        resolved
    }

    /// Major version of the selected Visual Studio release
    pub fn vs_major(&self) -> u64 {
        match self.vs_type.as_str() {
            "VS_2019" => 16,
            _ => 17,
        }
    }

    /// MSBuild's name for the architecture
    pub fn platform(&self) -> &str {
        match self.arch.as_str() {
            "x86" => "Win32",
            other => other,
        }
    }

    pub fn msbuild_args(&self, project: &Path) -> Vec<String> {
        let mut args = vec![
            project.display().to_string(),
            format!("/p:Configuration={}", self.configuration),
            format!("/p:Platform={}", self.platform()),
            "/m".to_string(),
        ];
        if self.rebuild {
            args.push("/t:Rebuild".to_string());
        }
        args
    }
}

async fn build_project(input: TaskInput) -> i32 {
    let options = BuildProjectOptions::from_options(input.options.as_ref());

    let Some(project) = input.context.project() else {
        input.error("No project path set for this context");
        return -1;
    };

    let installation = input
        .services
        .environment(VISUAL_STUDIO_SERVICE)
        .and_then(|vs| vs.find_major(options.vs_major()));
    let Some(installation) = installation else {
        input.error(&format!(
            "No Visual Studio installation matches {} (version {})",
            options.vs_type,
            options.vs_major()
        ));
        return -1;
    };

    let msbuild = input
        .services
        .environment(MSBUILD_SERVICE)
        .and_then(|env| env.find_major(options.vs_major()));
    let Some(msbuild) = msbuild else {
        input.error(&format!(
            "MSBuild not found in {}",
            installation.path.display()
        ));
        return -1;
    };

    let Some(runner) = input.services.process() else {
        input.error("No process runner registered");
        return -1;
    };

    let mut spec = ProcessSpec::new(MSBUILD_SOURCE, msbuild.path.clone())
        .args(options.msbuild_args(project));
    if let Some(dir) = project.parent().filter(|d| !d.as_os_str().is_empty()) {
        spec = spec.working_dir(dir);
    }

    input.info(&format!(
        "Building {} ({}|{}) with Visual Studio {}",
        project.display(),
        options.configuration,
        options.platform(),
        installation.version
    ));
    debug!(command = %spec.command_line(), "Launching MSBuild");

    match runner
        .run(spec, Arc::clone(&input.observer), input.cancel.clone())
        .await
    {
        Ok(ProcessExit::Exited(code)) => code,
        Ok(ProcessExit::Canceled) => -1,
        Err(e) => {
            input.error(&e.to_string());
            -1
        }
    }
}
