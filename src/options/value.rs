use serde::{Deserialize, Serialize};
use std::fmt;

const EMPTY_LIST_ITEM: &str = "list items cannot be empty";

/// The type of an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptionKind {
    Bool,
    Int,
    Float,
    String,
    StringList,
    Enum { variants: Vec<String> },
}

impl OptionKind {
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OptionKind::Enum {
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            OptionKind::Bool => "bool",
            OptionKind::Int => "int",
            OptionKind::Float => "float",
            OptionKind::String => "string",
            OptionKind::StringList => "string_list",
            OptionKind::Enum { .. } => "enum",
        }
    }

    /// Zero value used when a spec declares no default
    pub fn zero_value(&self) -> OptionValue {
        match self {
            OptionKind::Bool => OptionValue::Bool(false),
            OptionKind::Int => OptionValue::Int(0),
            OptionKind::Float => OptionValue::Float(0.0),
            OptionKind::String => OptionValue::String(String::new()),
            OptionKind::StringList => OptionValue::StringList(Vec::new()),
            OptionKind::Enum { variants } => {
                OptionValue::Enum(variants.first().cloned().unwrap_or_default())
            }
        }
    }

    pub fn accepts(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (OptionKind::Bool, OptionValue::Bool(_))
            | (OptionKind::Int, OptionValue::Int(_))
            | (OptionKind::Float, OptionValue::Float(_))
            | (OptionKind::String, OptionValue::String(_)) => true,
            // `--Name=` clears a list on the command line, so an empty item cannot be written back
            (OptionKind::StringList, OptionValue::StringList(items)) => {
                items.iter().all(|item| !item.is_empty())
            }
            (OptionKind::Enum { variants }, OptionValue::Enum(v)) => variants.contains(v),
            _ => false,
        }
    }

    /// Like [`accepts`](Self::accepts), with a reason when the value is refused
    pub fn check(&self, value: &OptionValue) -> Result<(), String> {
        if self.accepts(value) {
            return Ok(());
        }
        match (self, value) {
            (OptionKind::StringList, OptionValue::StringList(_)) => Err(EMPTY_LIST_ITEM.to_string()),
            _ => Err(format!("expected {}", self)),
        }
    }

    /// Parses one raw command-line value.
    ///
    /// List kinds yield a single-element list; enum values are matched
    /// case-insensitively and normalised to the declared spelling.
    pub fn parse_value(&self, raw: &str) -> Result<OptionValue, String> {
        match self {
            OptionKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(OptionValue::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(OptionValue::Bool(false)),
                _ => Err("expected true or false".to_string()),
            },
            OptionKind::Int => raw
                .trim()
                .parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|e| e.to_string()),
            OptionKind::Float => raw
                .trim()
                .parse::<f64>()
                .map(OptionValue::Float)
                .map_err(|e| e.to_string()),
            OptionKind::String => Ok(OptionValue::String(raw.to_string())),
            OptionKind::StringList => Ok(OptionValue::StringList(vec![raw.to_string()])),
            OptionKind::Enum { variants } => variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(raw))
                .map(|v| OptionValue::Enum(v.clone()))
                .ok_or_else(|| format!("expected one of {}", variants.join(", "))),
        }
    }

    /// Converts an untyped JSON value (from script settings) into this kind
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<OptionValue, String> {
        use serde_json::Value;

        match (self, json) {
            (OptionKind::Bool, Value::Bool(b)) => Ok(OptionValue::Bool(*b)),
            (OptionKind::Int, Value::Number(n)) => n
                .as_i64()
                .map(OptionValue::Int)
                .ok_or_else(|| format!("{} is not an integer", n)),
            (OptionKind::Float, Value::Number(n)) => n
                .as_f64()
                .map(OptionValue::Float)
                .ok_or_else(|| format!("{} is not a number", n)),
            (OptionKind::StringList, Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) if s.is_empty() => Err(EMPTY_LIST_ITEM.to_string()),
                    Value::String(s) => Ok(s.clone()),
                    other => Ok(other.to_string()),
                })
                .collect::<Result<Vec<_>, String>>()
                .map(OptionValue::StringList),
            (OptionKind::StringList, Value::String(s)) if s.is_empty() => {
                Ok(OptionValue::StringList(Vec::new()))
            }
            // a bare string where a list is expected becomes a one-element list
            (OptionKind::StringList, Value::String(s)) => Ok(OptionValue::StringList(vec![s.clone()])),
            (_, Value::String(s)) => self.parse_value(s),
            (_, Value::Null) => Ok(self.zero_value()),
            (kind, other) => Err(format!("{} is not a valid {}", other, kind.type_name())),
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Enum { variants } => write!(f, "enum({})", variants.join("|")),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

/// A typed option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    Enum(String),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Float(_) => "float",
            OptionValue::String(_) => "string",
            OptionValue::StringList(_) => "string_list",
            OptionValue::Enum(_) => "enum",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(f) => Some(*f),
            OptionValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String or enum contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) | OptionValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::StringList(items) => Some(items),
            _ => None,
        }
    }

    /// Raw values for command-line formatting, one per emitted flag
    pub(crate) fn raw_values(&self) -> Vec<String> {
        match self {
            OptionValue::StringList(items) => items.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::String(s) | OptionValue::Enum(s) => write!(f, "{}", s),
            OptionValue::StringList(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bool_spellings() {
        for raw in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(OptionKind::Bool.parse_value(raw), Ok(OptionValue::Bool(true)));
        }
        assert_eq!(OptionKind::Bool.parse_value("off"), Ok(OptionValue::Bool(false)));
        assert!(OptionKind::Bool.parse_value("maybe").is_err());
    }

    #[test]
    fn test_enum_is_normalised() {
        let kind = OptionKind::enumeration(["Debug", "Release"]);
        assert_eq!(
            kind.parse_value("release"),
            Ok(OptionValue::Enum("Release".to_string()))
        );
        let err = kind.parse_value("Profile").unwrap_err();
        assert!(err.contains("Debug, Release"));
    }

    #[test]
    fn test_accepts_checks_enum_variants() {
        let kind = OptionKind::enumeration(["x86", "x64"]);
        assert!(kind.accepts(&OptionValue::Enum("x64".to_string())));
        assert!(!kind.accepts(&OptionValue::Enum("ARM64".to_string())));
        assert!(!kind.accepts(&OptionValue::String("x64".to_string())));
    }

    #[test]
    fn test_list_items_must_not_be_empty() {
        let kind = OptionKind::StringList;
        assert!(kind.accepts(&OptionValue::StringList(vec![])));
        assert!(kind.accepts(&OptionValue::StringList(vec![" ".into()])));
        assert!(!kind.accepts(&OptionValue::StringList(vec!["a".into(), "".into()])));
        assert_eq!(
            kind.check(&OptionValue::StringList(vec!["".into()])),
            Err(EMPTY_LIST_ITEM.to_string())
        );
        assert_eq!(
            kind.check(&OptionValue::Bool(true)),
            Err("expected string_list".to_string())
        );
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(
            OptionKind::Int.value_from_json(&json!(4)),
            Ok(OptionValue::Int(4))
        );
        assert_eq!(
            OptionKind::StringList.value_from_json(&json!(["a", "b"])),
            Ok(OptionValue::StringList(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            OptionKind::StringList.value_from_json(&json!("solo")),
            Ok(OptionValue::StringList(vec!["solo".into()]))
        );
        assert_eq!(
            OptionKind::Bool.value_from_json(&json!("true")),
            Ok(OptionValue::Bool(true))
        );
        assert_eq!(
            OptionKind::StringList.value_from_json(&json!("")),
            Ok(OptionValue::StringList(vec![]))
        );
        assert_eq!(
            OptionKind::StringList.value_from_json(&json!(["a", ""])),
            Err(EMPTY_LIST_ITEM.to_string())
        );
        assert!(OptionKind::Int.value_from_json(&json!(1.5)).is_err());
        assert!(OptionKind::Bool.value_from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_value_serde_shape() {
        let value = OptionValue::Enum("Release".to_string());
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, json!({"type": "enum", "value": "Release"}));

        let kind: OptionKind =
            serde_json::from_value(json!({"type": "enum", "variants": ["a", "b"]})).unwrap();
        assert_eq!(kind, OptionKind::enumeration(["a", "b"]));
    }
}
