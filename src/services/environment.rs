//! Installed tool environments (Visual Studio, MSBuild, script interpreters)
//!
//! Every environment is probed once when the service registry is built. After
//! that, queries only read the recorded installations, which keeps requirement
//! checks free of side effects.

use super::version::Version;
use super::{INTERPRETER_SERVICE, MSBUILD_SERVICE, VISUAL_STUDIO_SERVICE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// One installed copy of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub version: Version,
    pub path: PathBuf,
    pub display_name: Option<String>,
}

impl Installation {
    pub fn new(version: Version, path: impl Into<PathBuf>) -> Self {
        Self {
            version,
            path: path.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A probed environment that can report its installations
pub trait EnvironmentService: Send + Sync {
    fn name(&self) -> &str;

    fn installations(&self) -> &[Installation];

    fn is_available(&self) -> bool {
        !self.installations().is_empty()
    }

    fn find_major(&self, major: u64) -> Option<&Installation> {
        self.installations()
            .iter()
            .find(|i| i.version.major() == major)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VsWhereEntry {
    installation_path: PathBuf,
    installation_version: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Visual Studio installations discovered through `vswhere.exe`
#[derive(Debug, Clone, Default)]
pub struct VisualStudioEnvironment {
    installations: Vec<Installation>,
}

impl VisualStudioEnvironment {
    pub fn probe() -> Self {
        let Some(vswhere) = Self::vswhere_path() else {
            debug!("vswhere.exe not found, no Visual Studio installations");
            return Self::default();
        };

        let output = Command::new(&vswhere)
            .args(["-all", "-prerelease", "-format", "json", "-utf8"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let json = String::from_utf8_lossy(&output.stdout);
                let installations = Self::parse_vswhere(&json);
                debug!(count = installations.len(), "Probed Visual Studio installations");
                Self { installations }
            }
            Ok(output) => {
                warn!(status = ?output.status.code(), "vswhere.exe reported a failure");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to run vswhere.exe");
                Self::default()
            }
        }
    }

    pub fn with_installations(installations: Vec<Installation>) -> Self {
        Self { installations }
    }

    fn vswhere_path() -> Option<PathBuf> {
        if !cfg!(windows) {
            return None;
        }
        let program_files = std::env::var_os("ProgramFiles(x86)")?;
        let path = PathBuf::from(program_files)
            .join("Microsoft Visual Studio")
            .join("Installer")
            .join("vswhere.exe");
        path.is_file().then_some(path)
    }

    pub(crate) fn parse_vswhere(json: &str) -> Vec<Installation> {
        let entries: Vec<VsWhereEntry> = match serde_json::from_str(json) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Unparseable vswhere output");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| {
                let version = entry.installation_version.parse().ok()?;
                let mut installation = Installation::new(version, entry.installation_path);
                installation.display_name = entry.display_name;
                Some(installation)
            })
            .collect()
    }
}

impl EnvironmentService for VisualStudioEnvironment {
    fn name(&self) -> &str {
        VISUAL_STUDIO_SERVICE
    }

    fn installations(&self) -> &[Installation] {
        &self.installations
    }
}

/// MSBuild executables shipped with the probed Visual Studio installations
#[derive(Debug, Clone, Default)]
pub struct MsBuildEnvironment {
    installations: Vec<Installation>,
}

impl MsBuildEnvironment {
    pub fn from_visual_studio(vs: &VisualStudioEnvironment) -> Self {
        let installations = vs
            .installations()
            .iter()
            .filter_map(|install| {
                let exe = Self::msbuild_in(&install.path)?;
                Some(Installation::new(install.version.clone(), exe))
            })
            .collect();
        Self { installations }
    }

    pub fn with_installations(installations: Vec<Installation>) -> Self {
        Self { installations }
    }

    fn msbuild_in(vs_root: &Path) -> Option<PathBuf> {
        let bin = vs_root.join("MSBuild").join("Current").join("Bin");
        [bin.join("amd64").join("MSBuild.exe"), bin.join("MSBuild.exe")]
            .into_iter()
            .find(|candidate| candidate.is_file())
    }
}

impl EnvironmentService for MsBuildEnvironment {
    fn name(&self) -> &str {
        MSBUILD_SERVICE
    }

    fn installations(&self) -> &[Installation] {
        &self.installations
    }
}

/// A script interpreter reachable on this machine
#[derive(Debug, Clone, Default)]
pub struct InterpreterEnvironment {
    installations: Vec<Installation>,
}

impl InterpreterEnvironment {
    pub fn probe(executable: &Path) -> Self {
        let output = match Command::new(executable).arg("--version").output() {
            Ok(output) => output,
            Err(e) => {
                debug!(interpreter = %executable.display(), error = %e, "Interpreter not found");
                return Self::default();
            }
        };

        // Older interpreters print the version banner on stderr.
        let banner = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        match Self::parse_banner(&banner) {
            Some(version) => {
                debug!(interpreter = %executable.display(), %version, "Probed interpreter");
                Self {
                    installations: vec![Installation::new(version, executable)],
                }
            }
            None => {
                warn!(interpreter = %executable.display(), banner = %banner.trim(), "Unrecognised interpreter version banner");
                Self::default()
            }
        }
    }

    pub fn with_installations(installations: Vec<Installation>) -> Self {
        Self { installations }
    }

    pub fn executable(&self) -> Option<&Path> {
        self.installations.first().map(|i| i.path.as_path())
    }

    pub(crate) fn parse_banner(banner: &str) -> Option<Version> {
        banner
            .split_whitespace()
            .find_map(|word| word.parse::<Version>().ok())
    }
}

impl EnvironmentService for InterpreterEnvironment {
    fn name(&self) -> &str {
        INTERPRETER_SERVICE
    }

    fn installations(&self) -> &[Installation] {
        &self.installations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vswhere_output() {
        let json = r#"[
            {
                "installationPath": "C:\\Program Files\\Microsoft Visual Studio\\2022\\Community",
                "installationVersion": "17.8.34330.188",
                "displayName": "Visual Studio Community 2022"
            },
            {
                "installationPath": "C:\\VS2019",
                "installationVersion": "16.11.33214.272"
            }
        ]"#;

        let installs = VisualStudioEnvironment::parse_vswhere(json);
        assert_eq!(installs.len(), 2);
        assert_eq!(installs[0].version.major(), 17);
        assert_eq!(
            installs[0].display_name.as_deref(),
            Some("Visual Studio Community 2022")
        );
        assert_eq!(installs[1].version.major(), 16);
    }

    #[test]
    fn test_parse_vswhere_garbage() {
        assert!(VisualStudioEnvironment::parse_vswhere("not json").is_empty());
    }

    #[test]
    fn test_find_major() {
        let env = VisualStudioEnvironment::with_installations(vec![
            Installation::new(Version::new([16, 11]), "/vs2019"),
            Installation::new(Version::new([17, 8]), "/vs2022"),
        ]);
        assert!(env.is_available());
        assert_eq!(env.find_major(17).unwrap().path, PathBuf::from("/vs2022"));
        assert!(env.find_major(15).is_none());
    }

    #[test]
    fn test_parse_interpreter_banner() {
        assert_eq!(
            InterpreterEnvironment::parse_banner("Python 3.11.4\n"),
            Some(Version::new([3, 11, 4]))
        );
        assert_eq!(InterpreterEnvironment::parse_banner("command not found"), None);
    }

    #[test]
    fn test_empty_environment_is_unavailable() {
        let env = MsBuildEnvironment::default();
        assert!(!env.is_available());
        assert_eq!(env.name(), MSBUILD_SERVICE);
    }

    #[test]
    fn test_probe_missing_interpreter() {
        let env = InterpreterEnvironment::probe(Path::new("/nonexistent/python-interpreter"));
        assert!(!env.is_available());
        assert!(env.executable().is_none());
    }
}
