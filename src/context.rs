//! Build context selecting a task family

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context name cannot be empty")]
    EmptyName,

    #[error("Project path does not exist: {0}")]
    ProjectNotFound(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectMode {
    /// Collect runnable tasks for a live context
    #[default]
    Full,
    /// Metadata-only enumeration; accept predicates, active conditions and
    /// argument binding are skipped
    PureCollect,
}

/// Identifies a task family and carries the user's inputs for one pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildContext {
    pub name: String,
    pub project_path: Option<PathBuf>,
    /// Raw command-line arguments bound to each task's options
    pub arguments: Vec<String>,
    /// Current value compared against script tasks' active conditions
    pub condition: Option<String>,
    pub collect_mode: CollectMode,
    pub properties: BTreeMap<String, String>,
}

impl BuildContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Context used to enumerate tasks without a project
    pub fn metadata(name: impl Into<String>) -> Self {
        Self::new(name).collect_mode(CollectMode::PureCollect)
    }

    pub fn project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn collect_mode(mut self, mode: CollectMode) -> Self {
        self.collect_mode = mode;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn project(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn is_pure_collect(&self) -> bool {
        self.collect_mode == CollectMode::PureCollect
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.name.trim().is_empty() {
            return Err(ContextError::EmptyName);
        }
        if let Some(path) = &self.project_path {
            if !path.exists() {
                return Err(ContextError::ProjectNotFound(path.clone()));
            }
        }
        Ok(())
    }

    /// Case-insensitive comparison against the current condition; a context
    /// without a condition matches nothing
    pub fn condition_matches(&self, active_condition: &str) -> bool {
        self.condition
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(active_condition))
    }
}
