//! Runtime values of the pattern language.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::method::{AccessFlags, Opcode};
use crate::fingerprint::{
    escape_string, Fingerprint, InstructionFilter, InstructionLocation, InstructionMatcher,
};

/// Weight charged for every value and every optional field.
const CELL: usize = 8;

/// A value produced while executing a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// String
    Str(String),
    /// `listOf` / `setOf` result
    List(Vec<Value>),
    /// `AccessFlags.X`
    AccessFlag(AccessFlags),
    /// `Opcode.X`
    Opcode(Opcode),
    /// `InstructionLocation.X(...)`
    Location(InstructionLocation),
    /// Instruction filter
    Filter(Box<InstructionFilter>),
    /// Fingerprint
    Fingerprint(Box<Fingerprint>),
    /// `Error(message)`
    Error(String),
}

impl Value {
    /// Runtime type description, e.g. `Int` or `List<Opcode>`.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "Nothing?".to_string(),
            Value::Bool(_) => "Boolean".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::List(items) => {
                let mut names: Vec<String> = items
                    .iter()
                    .filter(|item| !matches!(item, Value::Null))
                    .map(Value::type_name)
                    .collect();
                names.dedup();
                let nullable = items.iter().any(|item| matches!(item, Value::Null));
                let element = match names.as_slice() {
                    [] if nullable => "Nothing?".to_string(),
                    [] => "Nothing".to_string(),
                    [single] if nullable => format!("{single}?"),
                    [single] => single.clone(),
                    _ => "Any".to_string(),
                };
                format!("List<{element}>")
            }
            Value::AccessFlag(_) => "AccessFlags".to_string(),
            Value::Opcode(_) => "Opcode".to_string(),
            Value::Location(_) => "InstructionLocation".to_string(),
            Value::Filter(_) => "InstructionFilter".to_string(),
            Value::Fingerprint(_) => "Fingerprint".to_string(),
            Value::Error(_) => "Error".to_string(),
        }
    }

    /// Approximate size in bytes, used to bound what a script may build.
    pub fn weight(&self) -> usize {
        match self {
            Value::Str(s) | Value::Error(s) => CELL + s.len(),
            Value::List(items) => items
                .iter()
                .fold(CELL, |acc, item| acc.saturating_add(item.weight())),
            Value::Filter(filter) => filter_weight(filter),
            Value::Fingerprint(fingerprint) => fingerprint_weight(fingerprint),
            _ => CELL,
        }
    }

    /// How many lists deep the value nests; scalars are 0.
    pub fn list_depth(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::list_depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Kotlin-like string form used by `+` concatenation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

fn text_weight(text: Option<&String>) -> usize {
    CELL + text.map_or(0, String::len)
}

fn texts_weight<'a>(texts: impl IntoIterator<Item = &'a String>) -> usize {
    texts
        .into_iter()
        .fold(CELL, |acc, text| acc.saturating_add(CELL + text.len()))
}

fn filter_weight(filter: &InstructionFilter) -> usize {
    let mut weight = 0usize;
    let mut current = Some(filter);
    while let Some(filter) = current {
        let matcher = match &filter.matcher {
            InstructionMatcher::Opcode { .. } => CELL,
            InstructionMatcher::String { value } => CELL + value.len(),
            InstructionMatcher::MethodCall {
                defining_class,
                name,
                parameters,
                return_type,
                ..
            } => {
                text_weight(defining_class.as_ref())
                    + text_weight(name.as_ref())
                    + parameters.as_ref().map_or(CELL, |types| texts_weight(types))
                    + text_weight(return_type.as_ref())
            }
            InstructionMatcher::FieldAccess {
                defining_class,
                name,
                field_type,
                ..
            } => {
                text_weight(defining_class.as_ref())
                    + text_weight(name.as_ref())
                    + text_weight(field_type.as_ref())
            }
        };
        weight = weight.saturating_add(CELL + matcher);
        current = filter.after.as_deref();
    }
    weight
}

fn fingerprint_weight(fingerprint: &Fingerprint) -> usize {
    let mut weight = 0usize;
    let mut current = Some(fingerprint);
    while let Some(fingerprint) = current {
        let own = text_weight(fingerprint.defining_class.as_ref())
            + text_weight(fingerprint.name.as_ref())
            + CELL
            + text_weight(fingerprint.return_type.as_ref())
            + fingerprint.parameters.as_ref().map_or(CELL, |types| texts_weight(types))
            + texts_weight(&fingerprint.strings)
            + CELL * (1 + fingerprint.opcodes.as_ref().map_or(0, Vec::len))
            + fingerprint
                .filters
                .iter()
                .fold(CELL, |acc, filter| acc.saturating_add(filter_weight(filter)));
        weight = weight.saturating_add(own);
        current = fingerprint.anchor.as_deref();
    }
    weight
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => f.write_str(&escape_string(s)),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::AccessFlag(flag) => {
                let names: Vec<&str> = flag.iter_names().map(|(name, _)| name).collect();
                f.write_str(&names.join(" | "))
            }
            Value::Opcode(op) => write!(f, "{op}"),
            Value::Location(location) => write!(f, "{location:?}"),
            Value::Filter(filter) => write!(f, "{filter:?}"),
            Value::Fingerprint(fingerprint) => f.write_str(&fingerprint.to_pattern_text()),
            Value::Error(message) => write!(f, "Error({})", escape_string(message)),
        }
    }
}

/// Final value of a script run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// Nothing was executed (empty or comment-only script)
    NotEvaluated,
    /// Last statement was a declaration
    Unit,
    /// Script produced an error value
    Error {
        /// Error message
        message: String,
    },
    /// Script produced a value
    Value(Value),
}

impl ScriptValue {
    /// The fingerprint, when the script produced one
    pub fn as_fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            ScriptValue::Value(Value::Fingerprint(fingerprint)) => Some(fingerprint),
            _ => None,
        }
    }

    /// Short label for logs and reports
    pub fn summary(&self) -> ValueSummary {
        match self {
            ScriptValue::NotEvaluated => ValueSummary {
                kind: "not_evaluated".to_string(),
                type_name: None,
                rendered: None,
            },
            ScriptValue::Unit => ValueSummary {
                kind: "unit".to_string(),
                type_name: None,
                rendered: None,
            },
            ScriptValue::Error { message } => ValueSummary {
                kind: "error".to_string(),
                type_name: None,
                rendered: Some(message.clone()),
            },
            ScriptValue::Value(value) => ValueSummary {
                kind: "value".to_string(),
                type_name: Some(value.type_name()),
                rendered: Some(value.to_string()),
            },
        }
    }
}

/// Serializable description of a [`ScriptValue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSummary {
    /// `not_evaluated`, `unit`, `error` or `value`
    pub kind: String,
    /// Runtime type for values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Rendered value or error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(3).type_name(), "Int");
        assert_eq!(Value::List(vec![]).type_name(), "List<Nothing>");
        assert_eq!(
            Value::List(vec![Value::Opcode(Opcode::Nop), Value::Null]).type_name(),
            "List<Opcode?>"
        );
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("a".into())]).type_name(),
            "List<Any>"
        );
        assert_eq!(
            Value::List(vec![Value::List(vec![Value::Int(1)])]).type_name(),
            "List<List<Int>>"
        );
    }

    #[test]
    fn test_weight_and_depth() {
        let text = Value::Str("x".repeat(100));
        assert_eq!(text.weight(), 108);

        let nested = Value::List(vec![Value::List(vec![text.clone(), Value::Int(1)])]);
        assert_eq!(nested.weight(), 8 + 8 + 108 + 8);
        assert_eq!(nested.list_depth(), 2);
        assert_eq!(text.list_depth(), 0);

        let small = Value::Fingerprint(Box::default());
        let named = Value::Fingerprint(Box::new(Fingerprint {
            name: Some("x".repeat(1000)),
            anchor: Some(Box::default()),
            ..Fingerprint::default()
        }));
        assert!(named.weight() > small.weight() + 1000);
    }

    #[test]
    fn test_script_value_fingerprint() {
        let value = ScriptValue::Value(Value::Fingerprint(Box::default()));
        assert!(value.as_fingerprint().is_some());
        assert!(ScriptValue::Unit.as_fingerprint().is_none());
        assert_eq!(ScriptValue::Value(Value::Int(42)).summary().rendered.as_deref(), Some("42"));
    }
}
