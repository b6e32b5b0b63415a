//! Resolution of evaluated fingerprints against a corpus.
//!
//! Every call to [`FingerprintResolver::resolve`] opens its own
//! [`MatchSession`], hands the primitive a fresh context and closes the
//! session before returning. Sessions share nothing, so resolutions may run
//! concurrently against the same corpus.

mod primitive;
mod session;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

pub use primitive::{CorpusMatcher, MatchFailure, MatchPrimitive};
pub use session::{MatchContext, MatchSession};

use crate::core::config::ResolverConfig;
use crate::core::corpus::{Corpus, MethodRecord};
use crate::core::method::MethodId;
use crate::fingerprint::Fingerprint;

/// The uniquely matched method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMethod {
    /// Descriptor identity
    pub id: MethodId,
    /// Listing position in the corpus
    pub position: usize,
    /// `name(params)ret` form
    pub short_id: String,
}

impl ResolvedMethod {
    fn from_record(record: &MethodRecord) -> Self {
        Self {
            id: record.id().clone(),
            position: record.position(),
            short_id: record.method().short_id(),
        }
    }
}

/// Result of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Exactly one method matched
    Found {
        /// The matched method
        method: ResolvedMethod,
    },
    /// No method matched
    NotFound,
    /// More than one method matched
    Ambiguous {
        /// Every matching method, in listing order
        candidates: Vec<MethodId>,
    },
    /// The primitive failed while applying the fingerprint
    Failed {
        /// Failure message
        cause: String,
    },
}

impl ResolveOutcome {
    /// The matched method, if exactly one was found
    pub fn method(&self) -> Option<&ResolvedMethod> {
        match self {
            ResolveOutcome::Found { method } => Some(method),
            _ => None,
        }
    }
}

/// Resolves fingerprints to the unique method they identify.
#[derive(Clone)]
pub struct FingerprintResolver {
    config: ResolverConfig,
    primitive: Arc<dyn MatchPrimitive>,
}

impl std::fmt::Debug for FingerprintResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintResolver")
            .field("config", &self.config)
            .field("primitive", &self.primitive.name())
            .finish()
    }
}

impl FingerprintResolver {
    /// Create a resolver backed by the in-process [`CorpusMatcher`]
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_primitive(config, Arc::new(CorpusMatcher::new()))
    }

    /// Create a resolver backed by a custom primitive
    pub fn with_primitive(config: ResolverConfig, primitive: Arc<dyn MatchPrimitive>) -> Self {
        Self { config, primitive }
    }

    /// Resolver settings
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Apply a fingerprint to the corpus in a new match session.
    ///
    /// Failures of the primitive, including panics, end the session and are
    /// reported as [`ResolveOutcome::Failed`]; they are never retried.
    pub fn resolve(&self, fingerprint: &Fingerprint, corpus: &Corpus) -> ResolveOutcome {
        let session = match MatchSession::open(&self.config.scratch_root) {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to open match session: {e}");
                return ResolveOutcome::Failed {
                    cause: e.to_string(),
                };
            }
        };

        let context = session.context(corpus);
        let applied = panic::catch_unwind(AssertUnwindSafe(|| {
            self.primitive.apply(fingerprint, &context)
        }));

        let outcome = match applied {
            Ok(Ok(positions)) => classify(&positions, corpus),
            Ok(Err(failure)) => ResolveOutcome::Failed {
                cause: failure.message,
            },
            Err(payload) => ResolveOutcome::Failed {
                cause: panic_message(payload.as_ref()),
            },
        };
        drop(session);

        log_outcome(fingerprint, &outcome);
        outcome
    }

    /// Resolve and return the matched record, or `None` for every other outcome.
    pub fn resolve_method<'c>(
        &self,
        fingerprint: &Fingerprint,
        corpus: &'c Corpus,
    ) -> Option<&'c MethodRecord> {
        self.resolve(fingerprint, corpus)
            .method()
            .and_then(|method| corpus.get(method.position))
    }
}

fn classify(positions: &[usize], corpus: &Corpus) -> ResolveOutcome {
    let records: Vec<&MethodRecord> = positions.iter().filter_map(|&p| corpus.get(p)).collect();
    if records.len() != positions.len() {
        return ResolveOutcome::Failed {
            cause: format!(
                "Match primitive returned {} positions outside the corpus",
                positions.len() - records.len()
            ),
        };
    }

    match records.as_slice() {
        [] => ResolveOutcome::NotFound,
        [record] => ResolveOutcome::Found {
            method: ResolvedMethod::from_record(record),
        },
        many => ResolveOutcome::Ambiguous {
            candidates: many.iter().map(|record| record.id().clone()).collect(),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Match primitive panicked".to_string())
}

fn log_outcome(fingerprint: &Fingerprint, outcome: &ResolveOutcome) {
    let described = fingerprint
        .short_id()
        .unwrap_or_else(|| format!("{} constraints", fingerprint.constraint_count()));

    match outcome {
        ResolveOutcome::Found { method } => {
            info!("Fingerprint matched method: {}", method.short_id);
        }
        ResolveOutcome::NotFound => info!("Fingerprint did not match any method ({described})"),
        ResolveOutcome::Ambiguous { candidates } => {
            warn!("Fingerprint matched {} methods ({described})", candidates.len());
        }
        ResolveOutcome::Failed { cause } => {
            warn!("Failed to match fingerprint ({described}): {cause}");
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
