use super::value::{OptionKind, OptionValue};
use super::values::TaskOptions;
use super::OptionsError;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Declaration of one option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
    pub default: OptionValue,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        let name = name.into();
        let default = kind.zero_value();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            kind,
            required: false,
            default,
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: OptionValue) -> Self {
        self.default = value;
        self
    }
}

/// What to do with flags a schema does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    Reject,
    /// Skip them. Used at collection time, where one argument list is shared
    /// by every task of a family.
    Ignore,
}

/// Ordered option declarations of one task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionSchema {
    specs: Vec<OptionSpec>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: OptionSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn specs(&self) -> &[OptionSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Index of the option, matching names case-insensitively
    pub fn position(&self, name: &str) -> Option<usize> {
        self.specs
            .iter()
            .position(|spec| spec.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.position(name).map(|i| &self.specs[i])
    }

    /// Rejects empty or duplicate names and defaults of the wrong type
    pub fn validate(&self) -> Result<(), OptionsError> {
        let mut seen = HashSet::new();
        for spec in &self.specs {
            if spec.name.is_empty() || spec.name.starts_with('-') || spec.name.contains('=') {
                return Err(OptionsError::InvalidDefault {
                    name: spec.name.clone(),
                    reason: "option names must be non-empty and contain no '-' prefix or '='"
                        .to_string(),
                });
            }
            if !seen.insert(spec.name.to_ascii_lowercase()) {
                return Err(OptionsError::DuplicateOption(spec.name.clone()));
            }
            if !spec.kind.accepts(&spec.default) {
                return Err(OptionsError::InvalidDefault {
                    name: spec.name.clone(),
                    reason: format!("expected {}, got {}", spec.kind, spec.default.type_name()),
                });
            }
        }
        Ok(())
    }

    pub fn defaults(self: &Arc<Self>) -> TaskOptions {
        let values = self.specs.iter().map(|spec| spec.default.clone()).collect();
        TaskOptions::from_parts(Arc::clone(self), values)
    }

    /// Parses command-line arguments on top of the defaults.
    ///
    /// Accepts `--name=value`, `--name value` and a bare `--flag` for bools.
    /// Repeating a list option accumulates its items; `--list=` clears it.
    pub fn parse(
        self: &Arc<Self>,
        args: &[String],
        policy: UnknownPolicy,
    ) -> Result<TaskOptions, OptionsError> {
        let mut values: Vec<OptionValue> =
            self.specs.iter().map(|spec| spec.default.clone()).collect();
        let mut provided = vec![false; self.specs.len()];

        let mut index = 0;
        while index < args.len() {
            let arg = &args[index];
            index += 1;

            let Some(body) = arg.strip_prefix("--") else {
                match policy {
                    UnknownPolicy::Reject => {
                        return Err(OptionsError::UnexpectedArgument(arg.clone()))
                    }
                    UnknownPolicy::Ignore => {
                        debug!(argument = %arg, "Ignoring positional argument");
                        continue;
                    }
                }
            };

            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };

            let Some(position) = self.position(name) else {
                match policy {
                    UnknownPolicy::Reject => return Err(OptionsError::UnknownOption(name.to_string())),
                    UnknownPolicy::Ignore => {
                        debug!(option = %name, "Ignoring option not declared by this task");
                        // `--other value` form: skip the value as well
                        if inline.is_none() && args.get(index).is_some_and(|next| !next.starts_with("--")) {
                            index += 1;
                        }
                        continue;
                    }
                }
            };

            let spec = &self.specs[position];
            let raw = match inline {
                Some(raw) => raw,
                None if spec.kind == OptionKind::Bool => "true".to_string(),
                None => {
                    let Some(next) = args.get(index) else {
                        return Err(OptionsError::MissingValue(spec.name.clone()));
                    };
                    index += 1;
                    next.clone()
                }
            };

            if spec.kind == OptionKind::StringList {
                if !provided[position] {
                    values[position] = OptionValue::StringList(Vec::new());
                }
                if let OptionValue::StringList(items) = &mut values[position] {
                    if !raw.is_empty() {
                        items.push(raw);
                    }
                }
            } else {
                values[position] =
                    spec.kind
                        .parse_value(&raw)
                        .map_err(|reason| OptionsError::InvalidValue {
                            name: spec.name.clone(),
                            value: raw.clone(),
                            reason,
                        })?;
            }
            provided[position] = true;
        }

        if let Some(missing) = self
            .specs
            .iter()
            .zip(&provided)
            .find(|(spec, provided)| spec.required && !**provided)
        {
            return Err(OptionsError::MissingRequired(missing.0.name.clone()));
        }

        Ok(TaskOptions::from_parts(Arc::clone(self), values))
    }
}
