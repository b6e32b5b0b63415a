//! The pattern language and its evaluation host.
//!
//! Pattern text goes through three compile phases (lexing, parsing and name
//! checking) and is then executed by a tree-walking interpreter. Problems in
//! the compile phases produce [`EvaluationOutcome::CompileFailure`]; problems
//! during execution produce [`EvaluationOutcome::RuntimeFailure`]. A script
//! that runs to completion yields [`EvaluationOutcome::Success`] with one of
//! the [`ScriptValue`] shapes, only one of which is a fingerprint.

mod ast;
mod checker;
pub mod diagnostics;
mod host;
mod interpreter;
mod lexer;
mod parser;
mod prelude;
pub mod value;

use serde::Serialize;

pub use diagnostics::{Diagnostic, Severity, SourceLocation};
pub use host::EvaluationHost;
pub use value::{ScriptValue, Value, ValueSummary};

use crate::fingerprint::Fingerprint;

/// Result of evaluating pattern text.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Text is malformed; nothing was executed
    CompileFailure {
        /// At least one error diagnostic
        diagnostics: Vec<Diagnostic>,
    },
    /// Text compiled but raised while executing
    RuntimeFailure {
        /// Compile warnings plus the runtime error
        diagnostics: Vec<Diagnostic>,
        /// Error message of the raised failure
        cause: String,
    },
    /// Text ran to completion
    Success {
        /// Final value
        value: ScriptValue,
        /// Compile warnings
        diagnostics: Vec<Diagnostic>,
    },
}

impl EvaluationOutcome {
    /// Every diagnostic collected along the way
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            EvaluationOutcome::CompileFailure { diagnostics }
            | EvaluationOutcome::RuntimeFailure { diagnostics, .. }
            | EvaluationOutcome::Success { diagnostics, .. } => diagnostics,
        }
    }

    /// The fingerprint, if the script produced one
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            EvaluationOutcome::Success { value, .. } => value.as_fingerprint(),
            _ => None,
        }
    }

    /// Take the fingerprint out of a successful evaluation
    pub fn into_fingerprint(self) -> Option<Fingerprint> {
        match self {
            EvaluationOutcome::Success {
                value: ScriptValue::Value(Value::Fingerprint(fingerprint)),
                ..
            } => Some(*fingerprint),
            _ => None,
        }
    }

    /// Kind label for reports
    pub fn kind(&self) -> OutcomeKind {
        match self {
            EvaluationOutcome::CompileFailure { .. } => OutcomeKind::CompileFailure,
            EvaluationOutcome::RuntimeFailure { .. } => OutcomeKind::RuntimeFailure,
            EvaluationOutcome::Success { .. } => OutcomeKind::Success,
        }
    }
}

/// Variant label of an [`EvaluationOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Compile phase failed
    CompileFailure,
    /// Execution raised
    RuntimeFailure,
    /// Execution completed
    Success,
}

#[cfg(test)]
mod tests;
