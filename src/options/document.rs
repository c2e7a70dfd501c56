use super::value::OptionValue;
use super::values::TaskOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to access options document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed options document {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document belongs to task '{found}', expected '{expected}'")]
    TaskMismatch { expected: String, found: String },

    #[error("Option '{name}' is stored as {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },
}

/// One option as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedOption {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub value: OptionValue,
}

/// Saved option values of one task, shared by registered and script tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsDocument {
    pub task: String,
    pub saved_at: DateTime<Utc>,
    pub options: Vec<PersistedOption>,
}

impl OptionsDocument {
    pub fn from_options(task: impl Into<String>, options: &TaskOptions) -> Self {
        let persisted = options
            .schema()
            .specs()
            .iter()
            .map(|spec| PersistedOption {
                name: spec.name.clone(),
                display_name: spec.display_name.clone(),
                description: spec.description.clone(),
                value: options
                    .get(&spec.name)
                    .cloned()
                    .unwrap_or_else(|| spec.default.clone()),
            })
            .collect();

        Self {
            task: task.into(),
            saved_at: Utc::now(),
            options: persisted,
        }
    }

    /// Default location: `<dir>/<context>/<task>.json`
    pub fn default_path(options_dir: &Path, context: &str, task: &str) -> PathBuf {
        options_dir.join(context).join(format!("{}.json", task))
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let io_err = |source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| DocumentError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        debug!(path = %path.display(), task = %self.task, "Saved options document");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| DocumentError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Copies stored values into `options`, returning how many were applied.
    ///
    /// Options the task no longer declares are skipped with a warning; a
    /// stored value of the wrong type is an error and leaves `options`
    /// untouched.
    pub fn apply_to(&self, task: &str, options: &mut TaskOptions) -> Result<usize, DocumentError> {
        if self.task != task {
            return Err(DocumentError::TaskMismatch {
                expected: task.to_string(),
                found: self.task.clone(),
            });
        }

        let mut updated = options.clone();
        let mut applied = 0;
        for stored in &self.options {
            let Some(spec) = options.schema().get(&stored.name) else {
                warn!(option = %stored.name, task = %task, "Ignoring stored option the task does not declare");
                continue;
            };
            if !spec.kind.accepts(&stored.value) {
                return Err(DocumentError::TypeMismatch {
                    name: stored.name.clone(),
                    expected: spec.kind.to_string(),
                    found: stored.value.type_name().to_string(),
                });
            }
            if updated.set(&stored.name, stored.value.clone()).is_ok() {
                applied += 1;
            }
        }

        *options = updated;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionKind, OptionSchema, OptionSpec};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn schema() -> Arc<OptionSchema> {
        Arc::new(
            OptionSchema::new()
                .with(
                    OptionSpec::new("Arch", OptionKind::enumeration(["x86", "x64"]))
                        .display_name("Architecture")
                        .default_value(OptionValue::Enum("x64".to_string())),
                )
                .with(OptionSpec::new("Rebuild", OptionKind::Bool)),
        )
    }

    #[test]
    fn test_document_shape() {
        let doc = OptionsDocument::from_options("Build", &schema().defaults());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["task"], "Build");
        assert_eq!(
            json["options"][0],
            json!({
                "name": "Arch",
                "display_name": "Architecture",
                "description": "",
                "type": "enum",
                "value": "x64"
            })
        );
    }

    #[test]
    fn test_save_load_apply() {
        let dir = TempDir::new().unwrap();
        let path = OptionsDocument::default_path(dir.path(), "CppExample", "Build");

        let mut options = schema().defaults();
        options.set("Rebuild", OptionValue::Bool(true)).unwrap();
        OptionsDocument::from_options("Build", &options)
            .save(&path)
            .unwrap();

        let loaded = OptionsDocument::load(&path).unwrap();
        let mut fresh = schema().defaults();
        assert_eq!(loaded.apply_to("Build", &mut fresh).unwrap(), 2);
        assert_eq!(fresh.get_bool("Rebuild"), Some(true));
    }

    #[test]
    fn test_apply_rejects_wrong_type() {
        let doc = OptionsDocument {
            task: "Build".to_string(),
            saved_at: Utc::now(),
            options: vec![
                PersistedOption {
                    name: "Rebuild".to_string(),
                    display_name: String::new(),
                    description: String::new(),
                    value: OptionValue::Bool(true),
                },
                PersistedOption {
                    name: "Arch".to_string(),
                    display_name: String::new(),
                    description: String::new(),
                    value: OptionValue::String("x64".to_string()),
                },
            ],
        };

        let mut options = schema().defaults();
        let err = doc.apply_to("Build", &mut options).unwrap_err();
        assert!(matches!(err, DocumentError::TypeMismatch { ref name, .. } if name == "Arch"));
        // nothing applied on failure
        assert_eq!(options.get_bool("Rebuild"), Some(false));
    }

    #[test]
    fn test_apply_skips_unknown_and_checks_task() {
        let doc: OptionsDocument = serde_json::from_value(json!({
            "task": "Build",
            "saved_at": "2024-05-01T10:00:00Z",
            "options": [{"name": "Legacy", "type": "int", "value": 3}]
        }))
        .unwrap();

        let mut options = schema().defaults();
        assert_eq!(doc.apply_to("Build", &mut options).unwrap(), 0);
        assert!(matches!(
            doc.apply_to("Other", &mut options),
            Err(DocumentError::TaskMismatch { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = OptionsDocument::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }
}
