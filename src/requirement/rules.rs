use super::{EnvironmentRequirement, RequirementCheck};
use crate::services::{ServiceRegistry, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A named service must be registered and report itself available
#[derive(Debug, Clone)]
pub struct ServiceRequirement {
    service: String,
}

impl ServiceRequirement {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl EnvironmentRequirement for ServiceRequirement {
    fn name(&self) -> &str {
        &self.service
    }

    fn description(&self) -> String {
        format!("Service '{}' is available", self.service)
    }

    fn check(&self, services: &ServiceRegistry) -> RequirementCheck {
        if services.is_available(&self.service) {
            RequirementCheck::satisfied(format!("Service '{}' is available", self.service))
        } else if services.is_registered(&self.service) {
            RequirementCheck::dissatisfied(format!(
                "Service '{}' is registered but not available",
                self.service
            ))
        } else {
            RequirementCheck::dissatisfied(format!("Service '{}' is not registered", self.service))
        }
    }
}

/// An environment must have an installation within a version range.
///
/// The lower bound is always inclusive; the upper bound is inclusive unless
/// [`max_exclusive`](Self::max_exclusive) is set.
#[derive(Debug, Clone)]
pub struct EnvironmentVersionRequirement {
    service: String,
    min: Option<Version>,
    max: Option<Version>,
    max_exclusive: bool,
}

impl EnvironmentVersionRequirement {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            min: None,
            max: None,
            max_exclusive: false,
        }
    }

    pub fn min(mut self, version: Version) -> Self {
        self.min = Some(version);
        self
    }

    pub fn max(mut self, version: Version) -> Self {
        self.max = Some(version);
        self
    }

    pub fn max_exclusive(mut self) -> Self {
        self.max_exclusive = true;
        self
    }

    pub fn contains(&self, version: &Version) -> bool {
        if let Some(min) = &self.min {
            if version < min {
                return false;
            }
        }
        match &self.max {
            Some(max) if self.max_exclusive => version < max,
            Some(max) => version <= max,
            None => true,
        }
    }

    fn range(&self) -> String {
        let upper = if self.max_exclusive { ")" } else { "]" };
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => format!("[{}, {}{}", min, max, upper),
            (Some(min), None) => format!(">= {}", min),
            (None, Some(max)) if self.max_exclusive => format!("< {}", max),
            (None, Some(max)) => format!("<= {}", max),
            (None, None) => "any version".to_string(),
        }
    }
}

impl EnvironmentRequirement for EnvironmentVersionRequirement {
    fn name(&self) -> &str {
        &self.service
    }

    fn description(&self) -> String {
        format!("'{}' {}", self.service, self.range())
    }

    fn check(&self, services: &ServiceRegistry) -> RequirementCheck {
        let Some(environment) = services.environment(&self.service) else {
            return RequirementCheck::dissatisfied(format!(
                "Environment '{}' is not registered",
                self.service
            ));
        };
        if !environment.is_available() {
            return RequirementCheck::dissatisfied(format!(
                "No installation of '{}' found",
                self.service
            ));
        }

        let matching = environment
            .installations()
            .iter()
            .find(|install| self.contains(&install.version));

        match matching {
            Some(install) => RequirementCheck::satisfied(format!(
                "'{}' {} found at {}",
                self.service,
                install.version,
                install.path.display()
            )),
            None => {
                let found: Vec<String> = environment
                    .installations()
                    .iter()
                    .map(|i| i.version.to_string())
                    .collect();
                RequirementCheck::partial(format!(
                    "'{}' requires {}, found {}",
                    self.service,
                    self.range(),
                    found.join(", ")
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    #[serde(alias = "osx", alias = "darwin")]
    MacOs,
}

impl Platform {
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "windows" => Some(Platform::Windows),
            "linux" => Some(Platform::Linux),
            "macos" => Some(Platform::MacOs),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
            Platform::MacOs => write!(f, "macos"),
        }
    }
}

/// The host must run one of the listed platforms, optionally at a minimum OS version
#[derive(Debug, Clone)]
pub struct OperatingSystemRequirement {
    name: String,
    platforms: Vec<Platform>,
    min_version: Option<Version>,
}

impl OperatingSystemRequirement {
    pub fn new(platforms: impl IntoIterator<Item = Platform>) -> Self {
        let platforms: Vec<Platform> = platforms.into_iter().collect();
        let names: Vec<String> = platforms.iter().map(|p| p.to_string()).collect();
        Self {
            name: format!("os:{}", names.join("|")),
            platforms,
            min_version: None,
        }
    }

    pub fn min_version(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn evaluate_for(
        &self,
        platform: Option<Platform>,
        os_version: Option<&Version>,
    ) -> RequirementCheck {
        let Some(platform) = platform.filter(|p| self.platforms.contains(p)) else {
            return RequirementCheck::dissatisfied(format!(
                "Operating system '{}' is not supported",
                std::env::consts::OS
            ));
        };

        match (&self.min_version, os_version) {
            (None, _) => RequirementCheck::satisfied(format!("Running on {}", platform)),
            (Some(min), Some(current)) if current >= min => {
                RequirementCheck::satisfied(format!("Running on {} {}", platform, current))
            }
            (Some(min), Some(current)) => RequirementCheck::dissatisfied(format!(
                "{} {} is older than the required {}",
                platform, current, min
            )),
            (Some(min), None) => RequirementCheck::dissatisfied(format!(
                "Could not determine the {} version (need {})",
                platform, min
            )),
        }
    }
}

impl EnvironmentRequirement for OperatingSystemRequirement {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        match &self.min_version {
            Some(min) => format!("{} >= {}", self.name, min),
            None => self.name.clone(),
        }
    }

    fn check(&self, _services: &ServiceRegistry) -> RequirementCheck {
        let os_version = sysinfo::System::os_version().and_then(|v| v.parse::<Version>().ok());
        self.evaluate_for(Platform::current(), os_version.as_ref())
    }
}

type CheckFn = Arc<dyn Fn(&ServiceRegistry) -> RequirementCheck + Send + Sync>;

/// Requirement backed by a closure
#[derive(Clone)]
pub struct CustomRequirement {
    name: String,
    description: String,
    check: CheckFn,
}

impl CustomRequirement {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ServiceRegistry) -> RequirementCheck + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for CustomRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRequirement")
            .field("name", &self.name)
            .finish()
    }
}

impl EnvironmentRequirement for CustomRequirement {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn check(&self, services: &ServiceRegistry) -> RequirementCheck {
        (self.check)(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::SatisfactionLevel;
    use crate::services::mock::{MockEnvironment, MockProcessRunner};
    use crate::services::{Installation, PROCESS_SERVICE, VISUAL_STUDIO_SERVICE};

    fn registry_with_vs(versions: &[[u64; 2]]) -> ServiceRegistry {
        let mut env = MockEnvironment::new(VISUAL_STUDIO_SERVICE);
        for v in versions {
            env = env.with_installation(Installation::new(Version::new(*v), "/vs"));
        }
        ServiceRegistry::new().with_environment(Arc::new(env))
    }

    #[test]
    fn test_service_requirement() {
        let registry = ServiceRegistry::new().with_process(Arc::new(MockProcessRunner::exiting(0)));
        assert!(ServiceRequirement::new(PROCESS_SERVICE)
            .check(&registry)
            .is_satisfied());

        let missing = ServiceRequirement::new("compressor").check(&registry);
        assert_eq!(missing.level, SatisfactionLevel::Dissatisfied);
        assert!(missing.message.contains("compressor"));
    }

    #[test]
    fn test_version_range_inclusive() {
        let req = EnvironmentVersionRequirement::new(VISUAL_STUDIO_SERVICE)
            .min(Version::new([16]))
            .max(Version::new([17]));
        assert!(req.contains(&Version::new([16, 0])));
        assert!(req.contains(&Version::new([17])));
        assert!(!req.contains(&Version::new([17, 1])));
        assert!(!req.contains(&Version::new([15, 9])));
    }

    #[test]
    fn test_version_range_exclusive() {
        let req = EnvironmentVersionRequirement::new(VISUAL_STUDIO_SERVICE)
            .min(Version::new([16]))
            .max(Version::new([17]))
            .max_exclusive();
        assert!(req.contains(&Version::new([16, 11])));
        assert!(!req.contains(&Version::new([17])));
    }

    #[test]
    fn test_version_requirement_levels() {
        let req = EnvironmentVersionRequirement::new(VISUAL_STUDIO_SERVICE).min(Version::new([17]));

        let ok = req.check(&registry_with_vs(&[[16, 11], [17, 8]]));
        assert!(ok.is_satisfied());

        let old = req.check(&registry_with_vs(&[[16, 11]]));
        assert_eq!(old.level, SatisfactionLevel::PartiallySatisfied);
        assert!(old.message.contains("16.11"));

        let none = req.check(&registry_with_vs(&[]));
        assert_eq!(none.level, SatisfactionLevel::Dissatisfied);

        let unregistered = req.check(&ServiceRegistry::new());
        assert_eq!(unregistered.level, SatisfactionLevel::Dissatisfied);
    }

    #[test]
    fn test_operating_system_requirement() {
        let req = OperatingSystemRequirement::new([Platform::Windows]).min_version(Version::new([10]));

        assert!(req
            .evaluate_for(Some(Platform::Windows), Some(&Version::new([11])))
            .is_satisfied());
        assert!(!req
            .evaluate_for(Some(Platform::Windows), Some(&Version::new([8, 1])))
            .is_satisfied());
        assert!(!req.evaluate_for(Some(Platform::Linux), None).is_satisfied());
        assert!(!req.evaluate_for(Some(Platform::Windows), None).is_satisfied());
        assert_eq!(req.name(), "os:windows");
    }

    #[test]
    fn test_current_platform_is_accepted() {
        let req = OperatingSystemRequirement::new([Platform::Windows, Platform::Linux, Platform::MacOs]);
        if Platform::current().is_some() {
            assert!(req.check(&ServiceRegistry::new()).is_satisfied());
        }
    }

    #[test]
    fn test_custom_requirement() {
        let req = CustomRequirement::new("disk", "Enough free disk", |_| {
            RequirementCheck::dissatisfied("Only 10MB free")
        });
        let check = req.check(&ServiceRegistry::new());
        assert_eq!(check.message, "Only 10MB free");
        assert_eq!(req.description(), "Enough free disk");
    }
}
