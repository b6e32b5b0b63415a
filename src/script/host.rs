//! The process-wide evaluation context.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use super::checker::check;
use super::diagnostics::{Diagnostic, LineIndex};
use super::interpreter::execute;
use super::lexer::tokenize;
use super::parser::parse;
use super::value::ScriptValue;
use super::EvaluationOutcome;
use crate::core::config::EvaluationConfig;
use crate::core::errors::{DexprintError, Result};

static GLOBAL: OnceCell<EvaluationHost> = OnceCell::new();

/// Evaluates pattern text into values inside an isolated context.
///
/// Scripts have no access to the corpus, the filesystem or any engine
/// state; the only things they can build are prelude values. Each call to
/// [`evaluate`](Self::evaluate) is independent, so a host can be shared
/// freely between threads.
#[derive(Debug)]
pub struct EvaluationHost {
    config: EvaluationConfig,
    preloaded: OnceCell<Duration>,
}

impl EvaluationHost {
    /// Create a standalone host
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            preloaded: OnceCell::new(),
        }
    }

    /// The process-wide host, created with default limits on first use.
    pub fn global() -> &'static EvaluationHost {
        GLOBAL.get_or_init(|| EvaluationHost::new(EvaluationConfig::default()))
    }

    /// Initialise the process-wide host with explicit limits.
    ///
    /// Succeeds if the host is created now or already exists with the same
    /// configuration; re-initialisation with different limits is rejected.
    pub fn init_global(config: EvaluationConfig) -> Result<&'static EvaluationHost> {
        let mut created = false;
        let host = GLOBAL.get_or_init(|| {
            created = true;
            EvaluationHost::new(config.clone())
        });

        if !created && host.config != config {
            return Err(DexprintError::config_field(
                "Evaluation context is already initialised with different limits",
                "evaluation",
            ));
        }
        Ok(host)
    }

    /// Evaluation limits
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Warm the evaluator once; later calls return the first duration.
    pub fn preload(&self) -> Duration {
        *self.preloaded.get_or_init(|| {
            info!("Preloading evaluation context...");
            let start = Instant::now();
            let _ = self.run("", false);
            let elapsed = start.elapsed();
            info!("Preloading completed in {}ms", elapsed.as_millis());
            elapsed
        })
    }

    /// True once [`preload`](Self::preload) has run
    pub fn is_preloaded(&self) -> bool {
        self.preloaded.get().is_some()
    }

    /// Compile and execute pattern text.
    pub fn evaluate(&self, text: &str) -> EvaluationOutcome {
        self.run(text, self.config.log_scripts)
    }

    fn run(&self, text: &str, log: bool) -> EvaluationOutcome {
        if log {
            info!("Evaluating script:\n{text}");
        }
        let start = Instant::now();
        let outcome = self.compile_and_execute(text);
        if log {
            info!(
                "Script evaluation completed in {}ms",
                start.elapsed().as_millis()
            );
            log_outcome(&outcome);
        }
        outcome
    }

    fn compile_and_execute(&self, text: &str) -> EvaluationOutcome {
        if text.len() > self.config.max_source_bytes {
            return EvaluationOutcome::CompileFailure {
                diagnostics: vec![Diagnostic::error(format!(
                    "Script exceeds the maximum size of {} bytes",
                    self.config.max_source_bytes
                ))],
            };
        }

        let lines = LineIndex::new(text);
        let (tokens, mut diagnostics) = tokenize(text, &lines);
        let (script, syntax) = parse(&tokens, &lines, self.config.max_nesting_depth);
        diagnostics.extend(syntax);
        if !diagnostics.iter().any(Diagnostic::is_error) {
            diagnostics.extend(check(&script, &lines));
        }
        if diagnostics.iter().any(Diagnostic::is_error) {
            return EvaluationOutcome::CompileFailure { diagnostics };
        }

        debug!("Executing {} statements", script.statements.len());
        match panic::catch_unwind(AssertUnwindSafe(|| execute(&script, &self.config))) {
            Ok(Ok(value)) => EvaluationOutcome::Success { value, diagnostics },
            Ok(Err(err)) => {
                diagnostics.push(
                    Diagnostic::error(format!("Script execution failed: {}", err.message))
                        .at(lines.locate(err.span.start)),
                );
                EvaluationOutcome::RuntimeFailure {
                    diagnostics,
                    cause: err.message,
                }
            }
            Err(payload) => {
                let cause = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                diagnostics.push(
                    Diagnostic::error("Internal evaluator error").with_cause(cause.clone()),
                );
                EvaluationOutcome::RuntimeFailure { diagnostics, cause }
            }
        }
    }
}

fn log_outcome(outcome: &EvaluationOutcome) {
    const PREFIX: &str = "Script evaluation SUCCEEDED and returned ";

    match outcome {
        EvaluationOutcome::CompileFailure { diagnostics }
        | EvaluationOutcome::RuntimeFailure { diagnostics, .. } => {
            let mut log = String::from("Script evaluation FAILED");
            for diagnostic in diagnostics {
                log.push_str(&format!("\n  {diagnostic}"));
            }
            warn!("{log}");
        }
        EvaluationOutcome::Success { value, .. } => match value {
            ScriptValue::NotEvaluated => warn!("{PREFIX}NOT_EVALUATED"),
            ScriptValue::Unit => warn!("{PREFIX}UNIT"),
            ScriptValue::Error { message } => warn!("{PREFIX}ERROR: {message}"),
            ScriptValue::Value(value) if value.type_name() == "Fingerprint" => {
                info!("{PREFIX}VALUE (Fingerprint)");
            }
            ScriptValue::Value(value) => warn!("{PREFIX}VALUE ({})", value.type_name()),
        },
    }
}
