use super::{EnvironmentRequirement, RequirementCheck, SatisfactionLevel};
use crate::services::ServiceRegistry;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Ordered list of requirements that must all be completely satisfied
#[derive(Clone, Default)]
pub struct RequirementCollection {
    requirements: Vec<Arc<dyn EnvironmentRequirement>>,
}

impl RequirementCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, requirement: Arc<dyn EnvironmentRequirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn push(&mut self, requirement: Arc<dyn EnvironmentRequirement>) {
        self.requirements.push(requirement);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EnvironmentRequirement>> {
        self.requirements.iter()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Checks every requirement, never stopping at the first failure
    pub fn evaluate(&self, services: &ServiceRegistry) -> RequirementReport {
        let checks = self
            .requirements
            .iter()
            .map(|requirement| (requirement.name().to_string(), requirement.check(services)))
            .collect();
        RequirementReport { checks }
    }
}

impl From<Vec<Arc<dyn EnvironmentRequirement>>> for RequirementCollection {
    fn from(requirements: Vec<Arc<dyn EnvironmentRequirement>>) -> Self {
        Self { requirements }
    }
}

impl fmt::Debug for RequirementCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.requirements.iter().map(|r| r.name()))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsatisfiedRequirement {
    pub name: String,
    pub level: SatisfactionLevel,
    pub message: String,
}

impl fmt::Display for UnsatisfiedRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct RequirementReport {
    checks: Vec<(String, RequirementCheck)>,
}

impl RequirementReport {
    pub fn is_satisfied(&self) -> bool {
        self.checks.iter().all(|(_, check)| check.is_satisfied())
    }

    pub fn checks(&self) -> &[(String, RequirementCheck)] {
        &self.checks
    }

    /// Every member that is not completely satisfied, in declaration order
    pub fn unsatisfied(&self) -> Vec<UnsatisfiedRequirement> {
        self.checks
            .iter()
            .filter(|(_, check)| !check.is_satisfied())
            .map(|(name, check)| UnsatisfiedRequirement {
                name: name.clone(),
                level: check.level,
                message: check.message.clone(),
            })
            .collect()
    }
}
