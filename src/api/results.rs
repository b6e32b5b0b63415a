//! Caller-facing reports for pattern evaluation and resolution.

use std::fmt;

use serde::Serialize;

use crate::core::method::MethodId;
use crate::fingerprint::Fingerprint;
use crate::resolver::{ResolveOutcome, ResolvedMethod};
use crate::script::{Diagnostic, EvaluationOutcome, ScriptValue, Severity, ValueSummary};

/// What happened to one piece of pattern text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    /// Text did not compile
    CompileFailure,
    /// Text raised while executing
    RuntimeFailure {
        /// Raised message
        cause: String,
    },
    /// Text produced something other than a fingerprint
    WrongValueType {
        /// What it produced instead
        value: ValueSummary,
    },
    /// Text produced a fingerprint that was not resolved
    Evaluated,
    /// Fingerprint matched exactly one method
    Found {
        /// The matched method
        method: ResolvedMethod,
    },
    /// Fingerprint matched no method
    NotFound,
    /// Fingerprint matched several methods
    Ambiguous {
        /// Every matching method
        candidates: Vec<MethodId>,
    },
    /// The match primitive failed
    ResolutionFailed {
        /// Failure message
        cause: String,
    },
}

/// Result of evaluating (and possibly resolving) pattern text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Outcome
    #[serde(flatten)]
    pub status: ReportStatus,
    /// Diagnostics from every phase, verbatim
    pub diagnostics: Vec<Diagnostic>,
    /// The evaluated fingerprint, if there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    /// Wall time
    pub elapsed_ms: u64,
}

impl EvaluationReport {
    /// Report for an evaluation that did not produce a fingerprint.
    ///
    /// Returns the fingerprint and diagnostics back when it did.
    pub fn from_outcome(
        outcome: EvaluationOutcome,
    ) -> std::result::Result<(Fingerprint, Vec<Diagnostic>), Self> {
        match outcome {
            EvaluationOutcome::CompileFailure { diagnostics } => {
                Err(Self::new(ReportStatus::CompileFailure, diagnostics))
            }
            EvaluationOutcome::RuntimeFailure { diagnostics, cause } => {
                Err(Self::new(ReportStatus::RuntimeFailure { cause }, diagnostics))
            }
            EvaluationOutcome::Success {
                value: ScriptValue::Value(crate::script::Value::Fingerprint(fingerprint)),
                diagnostics,
            } => Ok((*fingerprint, diagnostics)),
            EvaluationOutcome::Success { value, diagnostics } => Err(Self::new(
                ReportStatus::WrongValueType {
                    value: value.summary(),
                },
                diagnostics,
            )),
        }
    }

    /// Report for an evaluated fingerprint that was not resolved
    pub fn evaluated(fingerprint: Fingerprint, diagnostics: Vec<Diagnostic>) -> Self {
        Self::new(ReportStatus::Evaluated, diagnostics).with_fingerprint(fingerprint)
    }

    /// Report for a resolved fingerprint
    pub fn resolved(
        fingerprint: Fingerprint,
        diagnostics: Vec<Diagnostic>,
        outcome: ResolveOutcome,
    ) -> Self {
        let status = match outcome {
            ResolveOutcome::Found { method } => ReportStatus::Found { method },
            ResolveOutcome::NotFound => ReportStatus::NotFound,
            ResolveOutcome::Ambiguous { candidates } => ReportStatus::Ambiguous { candidates },
            ResolveOutcome::Failed { cause } => ReportStatus::ResolutionFailed { cause },
        };
        Self::new(status, diagnostics).with_fingerprint(fingerprint)
    }

    fn new(status: ReportStatus, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            status,
            diagnostics,
            fingerprint: None,
            elapsed_ms: 0,
        }
    }

    fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Set the wall time
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// The matched method, if exactly one was found
    pub fn method(&self) -> Option<&ResolvedMethod> {
        match &self.status {
            ReportStatus::Found { method } => Some(method),
            _ => None,
        }
    }

    /// True when the text compiled and ran, whatever it produced
    pub fn evaluated_cleanly(&self) -> bool {
        !matches!(
            self.status,
            ReportStatus::CompileFailure | ReportStatus::RuntimeFailure { .. }
        )
    }

    /// Number of error diagnostics
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// One-line human message for the outcome.
    pub fn message(&self) -> String {
        match &self.status {
            ReportStatus::CompileFailure => format!(
                "Pattern failed to compile with {} error(s)",
                self.error_count()
            ),
            ReportStatus::RuntimeFailure { cause } => format!("Pattern raised an error: {cause}"),
            ReportStatus::WrongValueType { value } => match (&value.type_name, value.kind.as_str()) {
                (Some(type_name), _) => {
                    format!("Pattern returned a value of type {type_name}, expected Fingerprint")
                }
                (None, "error") => format!(
                    "Pattern returned an error value: {}",
                    value.rendered.as_deref().unwrap_or_default()
                ),
                (None, "unit") => "Pattern returned no value; end it with a Fingerprint(...) expression".to_string(),
                (None, _) => "Pattern contains no expression to evaluate".to_string(),
            },
            ReportStatus::Evaluated => "Pattern evaluated to a fingerprint".to_string(),
            ReportStatus::Found { method } => format!("Fingerprint matched method: {}", method.short_id),
            ReportStatus::NotFound => "Fingerprint did not match any method".to_string(),
            ReportStatus::Ambiguous { candidates } => {
                format!("Fingerprint matched {} methods", candidates.len())
            }
            ReportStatus::ResolutionFailed { cause } => {
                format!("Failed to match fingerprint: {cause}")
            }
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n  {diagnostic}")?;
        }
        Ok(())
    }
}
