use crate::services::ProcessError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: u32,
        column: u32,
        snippet: Option<String>,
        message: String,
    },

    #[error("{kind}: {message}")]
    Runtime {
        kind: String,
        message: String,
        frames: Vec<StackFrame>,
    },

    #[error("Invalid task settings: {0}")]
    InvalidSettings(String),

    #[error("Script host failed: {0}")]
    Host(String),

    #[error("Script host timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Multi-line report with the source snippet or the stack frames
    pub fn diagnostic(&self) -> String {
        let mut out = self.to_string();
        match self {
            ScriptError::Syntax {
                snippet: Some(snippet),
                column,
                ..
            } => {
                let _ = write!(out, "\n    {}", snippet);
                if *column > 0 {
                    let _ = write!(out, "\n    {}^", " ".repeat(*column as usize - 1));
                }
            }
            ScriptError::Runtime { frames, .. } if !frames.is_empty() => {
                out.push_str("\nTraceback (most recent call last):");
                for frame in frames {
                    let _ = write!(
                        out,
                        "\n  File \"{}\", line {}, in {}",
                        frame.file, frame.line, frame.function
                    );
                    if let Some(code) = frame.code.as_deref().filter(|c| !c.is_empty()) {
                        let _ = write!(out, "\n    {}", code);
                    }
                }
            }
            _ => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_diagnostic_points_at_column() {
        let err = ScriptError::Syntax {
            file: "task_build.py".to_string(),
            line: 3,
            column: 5,
            snippet: Some("def (:".to_string()),
            message: "invalid syntax".to_string(),
        };
        assert_eq!(
            err.diagnostic(),
            "task_build.py:3:5: invalid syntax\n    def (:\n        ^"
        );
    }

    #[test]
    fn test_runtime_diagnostic_lists_frames() {
        let err = ScriptError::Runtime {
            kind: "KeyError".to_string(),
            message: "'name'".to_string(),
            frames: vec![StackFrame {
                file: "task_pack.py".to_string(),
                line: 12,
                function: "get_settings".to_string(),
                code: Some("return cfg['name']".to_string()),
            }],
        };
        let text = err.diagnostic();
        assert!(text.starts_with("KeyError: 'name'"));
        assert!(text.contains("File \"task_pack.py\", line 12, in get_settings"));
        assert!(text.contains("return cfg['name']"));
    }
}
