use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Declared type of a task method parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParameterKind {
    Context,
    Observer,
    Cancellation,
    Options,
    Other(String),
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::Context => write!(f, "context"),
            ParameterKind::Observer => write!(f, "observer"),
            ParameterKind::Cancellation => write!(f, "cancellation"),
            ParameterKind::Options => write!(f, "options"),
            ParameterKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Declared result of a task method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReturnKind {
    ExitCode,
    AsyncExitCode,
    Other(String),
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::ExitCode => write!(f, "exit code"),
            ReturnKind::AsyncExitCode => write!(f, "async exit code"),
            ReturnKind::Other(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("expected 3 or 4 parameters, found {0}")]
    Arity(usize),

    #[error("parameter {position} must be {expected}, found {found}")]
    Parameter {
        position: usize,
        expected: ParameterKind,
        found: ParameterKind,
    },

    #[error("return type must be an exit code or an async exit code, found {0}")]
    ReturnType(String),

    #[error("declared return type {declared} does not match the {handler} handler")]
    ReturnMismatch {
        declared: ReturnKind,
        handler: ReturnKind,
    },

    #[error("method takes options but declares no option schema")]
    MissingOptionsSchema,
}

/// Shape of a registered task method: `(context, observer, cancellation[, options]) -> exit code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSignature {
    pub parameters: Vec<ParameterKind>,
    pub returns: ReturnKind,
}

impl TaskSignature {
    pub fn new(parameters: Vec<ParameterKind>, returns: ReturnKind) -> Self {
        Self {
            parameters,
            returns,
        }
    }

    pub fn standard(with_options: bool, returns: ReturnKind) -> Self {
        let mut parameters = vec![
            ParameterKind::Context,
            ParameterKind::Observer,
            ParameterKind::Cancellation,
        ];
        if with_options {
            parameters.push(ParameterKind::Options);
        }
        Self::new(parameters, returns)
    }

    pub fn takes_options(&self) -> bool {
        self.parameters.len() == 4
    }

    pub fn validate(&self, handler: &ReturnKind, has_schema: bool) -> Result<(), SignatureError> {
        const EXPECTED: [ParameterKind; 4] = [
            ParameterKind::Context,
            ParameterKind::Observer,
            ParameterKind::Cancellation,
            ParameterKind::Options,
        ];

        if !(3..=4).contains(&self.parameters.len()) {
            return Err(SignatureError::Arity(self.parameters.len()));
        }
        for (position, (found, expected)) in self.parameters.iter().zip(EXPECTED.iter()).enumerate() {
            if found != expected {
                return Err(SignatureError::Parameter {
                    position: position + 1,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }

        if let ReturnKind::Other(name) = &self.returns {
            return Err(SignatureError::ReturnType(name.clone()));
        }
        if &self.returns != handler {
            return Err(SignatureError::ReturnMismatch {
                declared: self.returns.clone(),
                handler: handler.clone(),
            });
        }

        if self.takes_options() && !has_schema {
            return Err(SignatureError::MissingOptionsSchema);
        }
        Ok(())
    }
}

impl fmt::Display for TaskSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        write!(f, "({}) -> {}", params.join(", "), self.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn test_standard_signatures_are_valid() {
        let three = TaskSignature::standard(false, ReturnKind::ExitCode);
        assert!(three.validate(&ReturnKind::ExitCode, false).is_ok());

        let four = TaskSignature::standard(true, ReturnKind::AsyncExitCode);
        assert!(four.validate(&ReturnKind::AsyncExitCode, true).is_ok());
        assert_eq!(
            four.to_string(),
            "(context, observer, cancellation, options) -> async exit code"
        );
    }

    #[parameterized(
        two = { 2 },
        five = { 5 },
    )]
    fn test_wrong_arity(count: usize) {
        let mut parameters = vec![
            ParameterKind::Context,
            ParameterKind::Observer,
            ParameterKind::Cancellation,
            ParameterKind::Options,
            ParameterKind::Other("extra".to_string()),
        ];
        parameters.truncate(count);
        let signature = TaskSignature::new(parameters, ReturnKind::ExitCode);
        assert_eq!(
            signature.validate(&ReturnKind::ExitCode, true),
            Err(SignatureError::Arity(count))
        );
    }

    #[test]
    fn test_fourth_parameter_must_be_options() {
        let signature = TaskSignature::new(
            vec![
                ParameterKind::Context,
                ParameterKind::Observer,
                ParameterKind::Cancellation,
                ParameterKind::Other("String".to_string()),
            ],
            ReturnKind::ExitCode,
        );
        assert!(matches!(
            signature.validate(&ReturnKind::ExitCode, true),
            Err(SignatureError::Parameter { position: 4, .. })
        ));
    }

    #[test]
    fn test_parameter_order_matters() {
        let signature = TaskSignature::new(
            vec![
                ParameterKind::Observer,
                ParameterKind::Context,
                ParameterKind::Cancellation,
            ],
            ReturnKind::ExitCode,
        );
        assert!(matches!(
            signature.validate(&ReturnKind::ExitCode, false),
            Err(SignatureError::Parameter { position: 1, .. })
        ));
    }

    #[test]
    fn test_return_kinds() {
        let other = TaskSignature::standard(false, ReturnKind::Other("String".to_string()));
        assert!(matches!(
            other.validate(&ReturnKind::ExitCode, false),
            Err(SignatureError::ReturnType(_))
        ));

        let mismatch = TaskSignature::standard(false, ReturnKind::ExitCode);
        assert!(matches!(
            mismatch.validate(&ReturnKind::AsyncExitCode, false),
            Err(SignatureError::ReturnMismatch { .. })
        ));
    }

    #[test]
    fn test_options_parameter_needs_schema() {
        let signature = TaskSignature::standard(true, ReturnKind::ExitCode);
        assert_eq!(
            signature.validate(&ReturnKind::ExitCode, false),
            Err(SignatureError::MissingOptionsSchema)
        );
    }
}
