use super::{
    EnvironmentRequirement, EnvironmentVersionRequirement, OperatingSystemRequirement, Platform,
    ServiceRequirement,
};
use crate::services::Version;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serialized requirement declaration, as produced by script task settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequirementDef {
    Service {
        name: String,
    },
    Environment {
        name: String,
        #[serde(default)]
        min: Option<Version>,
        #[serde(default)]
        max: Option<Version>,
        #[serde(default)]
        max_exclusive: bool,
    },
    Os {
        platforms: Vec<Platform>,
        #[serde(default)]
        min_version: Option<Version>,
    },
}

impl RequirementDef {
    pub fn into_requirement(self) -> Arc<dyn EnvironmentRequirement> {
        match self {
            RequirementDef::Service { name } => Arc::new(ServiceRequirement::new(name)),
            RequirementDef::Environment {
                name,
                min,
                max,
                max_exclusive,
            } => {
                let mut requirement = EnvironmentVersionRequirement::new(name);
                if let Some(min) = min {
                    requirement = requirement.min(min);
                }
                if let Some(max) = max {
                    requirement = requirement.max(max);
                }
                if max_exclusive {
                    requirement = requirement.max_exclusive();
                }
                Arc::new(requirement)
            }
            RequirementDef::Os {
                platforms,
                min_version,
            } => {
                let mut requirement = OperatingSystemRequirement::new(platforms);
                if let Some(min) = min_version {
                    requirement = requirement.min_version(min);
                }
                Arc::new(requirement)
            }
        }
    }
}
