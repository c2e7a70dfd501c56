use super::schema::OptionSchema;
use super::tokenize::quote;
use super::value::OptionValue;
use super::OptionsError;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    /// Every option, in schema order
    #[default]
    Complete,
    /// Only options that differ from their defaults, plus required ones
    Simplify,
}

/// Current values of a task's options
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    schema: Arc<OptionSchema>,
    values: Vec<OptionValue>,
}

impl TaskOptions {
    pub(crate) fn from_parts(schema: Arc<OptionSchema>, values: Vec<OptionValue>) -> Self {
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<OptionSchema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(OptionValue::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OptionValue::as_str)
    }

    pub fn set(&mut self, name: &str, value: OptionValue) -> Result<(), OptionsError> {
        let position = self
            .schema
            .position(name)
            .ok_or_else(|| OptionsError::UnknownOption(name.to_string()))?;
        let spec = &self.schema.specs()[position];
        if let Err(reason) = spec.kind.check(&value) {
            return Err(OptionsError::InvalidValue {
                name: spec.name.clone(),
                value: value.to_string(),
                reason,
            });
        }
        self.values[position] = value;
        Ok(())
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.schema
            .specs()
            .iter()
            .map(|spec| spec.name.as_str())
            .zip(self.values.iter())
    }

    /// Names of options whose value differs from a fresh default copy
    pub fn changed(&self) -> Vec<&str> {
        let defaults = self.schema.defaults();
        self.iter()
            .zip(defaults.values.iter())
            .filter(|((_, value), default)| value != default)
            .map(|((name, _), _)| name)
            .collect()
    }

    /// Unquoted `--name=value` arguments, ready to hand to a process
    pub fn to_args(&self, mode: FormatMode) -> Vec<String> {
        let mut args = Vec::new();
        for (spec, value) in self.schema.specs().iter().zip(&self.values) {
            let include = match mode {
                FormatMode::Complete => true,
                FormatMode::Simplify => spec.required || *value != spec.default,
            };
            if !include {
                continue;
            }

            let raw = value.raw_values();
            if raw.is_empty() {
                args.push(format!("--{}=", spec.name));
            }
            for item in raw {
                args.push(format!("--{}={}", spec.name, item));
            }
        }
        args
    }

    /// Single command-line string; values with whitespace or quotes are quoted
    pub fn format(&self, mode: FormatMode) -> String {
        self.to_args(mode)
            .iter()
            .map(|arg| match arg.split_once('=') {
                Some((flag, value)) if !value.is_empty() => format!("{}={}", flag, quote(value)),
                _ => arg.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
