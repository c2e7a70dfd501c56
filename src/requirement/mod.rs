//! Task preconditions checked against the service registry before execution

mod collection;
mod def;
mod rules;

pub use collection::{RequirementCollection, RequirementReport, UnsatisfiedRequirement};
pub use def::RequirementDef;
pub use rules::{
    CustomRequirement, EnvironmentVersionRequirement, OperatingSystemRequirement, Platform,
    ServiceRequirement,
};

use crate::services::ServiceRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How well a requirement is met, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatisfactionLevel {
    Dissatisfied,
    PartiallySatisfied,
    CompletelySatisfied,
}

impl fmt::Display for SatisfactionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatisfactionLevel::Dissatisfied => write!(f, "dissatisfied"),
            SatisfactionLevel::PartiallySatisfied => write!(f, "partially satisfied"),
            SatisfactionLevel::CompletelySatisfied => write!(f, "satisfied"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementCheck {
    pub level: SatisfactionLevel,
    pub message: String,
}

impl RequirementCheck {
    pub fn satisfied(message: impl Into<String>) -> Self {
        Self {
            level: SatisfactionLevel::CompletelySatisfied,
            message: message.into(),
        }
    }

    pub fn partial(message: impl Into<String>) -> Self {
        Self {
            level: SatisfactionLevel::PartiallySatisfied,
            message: message.into(),
        }
    }

    pub fn dissatisfied(message: impl Into<String>) -> Self {
        Self {
            level: SatisfactionLevel::Dissatisfied,
            message: message.into(),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.level == SatisfactionLevel::CompletelySatisfied
    }
}

/// A single precondition.
///
/// Checks only query the registry; they must not change any state, so
/// evaluating a requirement twice gives the same answer.
pub trait EnvironmentRequirement: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    fn check(&self, services: &ServiceRegistry) -> RequirementCheck;
}
