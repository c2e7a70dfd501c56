use super::ExecutionMode;
use crate::options::{OptionKind, OptionSchema, OptionSpec, OptionsError};
use crate::requirement::RequirementDef;
use crate::task::TaskSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// Option declared by a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOptionDef {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl ScriptOptionDef {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: String::new(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn to_spec(&self) -> Result<OptionSpec, OptionsError> {
        let mut spec = OptionSpec::new(self.name.clone(), self.kind.clone())
            .description(self.description.clone());
        if let Some(display_name) = &self.display_name {
            spec = spec.display_name(display_name.clone());
        }
        if self.required {
            spec = spec.required();
        }
        if let Some(default) = &self.default {
            let value = self
                .kind
                .value_from_json(default)
                .map_err(|reason| OptionsError::InvalidDefault {
                    name: self.name.clone(),
                    reason,
                })?;
            spec = spec.default_value(value);
        }
        Ok(spec)
    }
}

/// What a script's `task_def.get_settings()` returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptTaskSettings {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i32,
    /// Script to run, relative to the settings file's directory
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub active_condition: Option<String>,
    #[serde(default = "default_true")]
    pub can_async: bool,
    #[serde(default = "default_true")]
    pub wait_result: bool,
    #[serde(default)]
    pub can_failure: bool,
    #[serde(default)]
    pub options: Vec<ScriptOptionDef>,
    #[serde(default)]
    pub requirements: Vec<RequirementDef>,
}

impl ScriptTaskSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            order: 0,
            script: None,
            mode: ExecutionMode::Internal,
            active_condition: None,
            can_async: true,
            wait_result: true,
            can_failure: false,
            options: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Option schema, or `None` when the script declares no options
    pub fn option_schema(&self) -> Result<Option<OptionSchema>, OptionsError> {
        if self.options.is_empty() {
            return Ok(None);
        }
        let schema = self
            .options
            .iter()
            .try_fold(OptionSchema::new(), |schema, def| Ok::<_, OptionsError>(schema.with(def.to_spec()?)))?;
        schema.validate()?;
        Ok(Some(schema))
    }

    pub fn active_condition(&self) -> Option<&str> {
        self.active_condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn task_settings(&self) -> TaskSettings {
        let mut settings = TaskSettings::new(self.name.clone())
            .description(self.description.clone())
            .order(self.order)
            .can_failure(self.can_failure);
        settings.can_async = self.can_async;
        settings.wait_result = self.wait_result;
        settings.active_condition = self.active_condition().map(str::to_string);
        settings
    }
}
