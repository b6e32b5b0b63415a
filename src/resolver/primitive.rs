//! Match-application primitives.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use thiserror::Error;

use super::session::MatchContext;
use crate::core::corpus::{Corpus, MethodRecord};
use crate::fingerprint::{Fingerprint, MAX_CHAIN_DEPTH};

/// Failure raised by a primitive while applying a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MatchFailure {
    /// Description of what went wrong
    pub message: String,
}

impl MatchFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Applies one fingerprint to a package and reports the matching methods.
///
/// Implementations receive a fresh [`MatchContext`] for every call and must
/// not carry state from one call into the next. Candidates are returned as
/// corpus listing positions in ascending order.
pub trait MatchPrimitive: Send + Sync {
    /// Get the primitive name
    fn name(&self) -> &str;

    /// Apply a fingerprint as a single throwaway predicate
    fn apply(
        &self,
        fingerprint: &Fingerprint,
        context: &MatchContext<'_, '_>,
    ) -> Result<Vec<usize>, MatchFailure>;
}

/// In-process primitive that scans the corpus records directly.
#[derive(Debug, Clone)]
pub struct CorpusMatcher {
    max_anchor_depth: usize,
}

impl Default for CorpusMatcher {
    fn default() -> Self {
        Self {
            max_anchor_depth: MAX_CHAIN_DEPTH,
        }
    }
}

impl CorpusMatcher {
    /// Create a matcher
    pub fn new() -> Self {
        Self::default()
    }

    fn candidates(
        &self,
        fingerprint: &Fingerprint,
        corpus: &Corpus,
        depth: usize,
    ) -> Result<Vec<usize>, MatchFailure> {
        if depth > self.max_anchor_depth {
            return Err(MatchFailure::new(format!(
                "Anchor chain is deeper than {} fingerprints",
                self.max_anchor_depth
            )));
        }

        let scope: Vec<&MethodRecord> = match &fingerprint.anchor {
            Some(anchor) => {
                let anchors = self.candidates(anchor, corpus, depth + 1)?;
                let [position] = anchors.as_slice() else {
                    return Ok(Vec::new());
                };
                let class = corpus.records()[*position].defining_class();
                corpus.methods_in_class(class).collect()
            }
            None => match &fingerprint.defining_class {
                Some(class) => corpus.methods_in_class(class).collect(),
                None => corpus.records().iter().collect(),
            },
        };

        Ok(filter_matching(&scope, fingerprint))
    }
}

impl MatchPrimitive for CorpusMatcher {
    fn name(&self) -> &str {
        "corpus"
    }

    fn apply(
        &self,
        fingerprint: &Fingerprint,
        context: &MatchContext<'_, '_>,
    ) -> Result<Vec<usize>, MatchFailure> {
        self.candidates(fingerprint, context.corpus(), 0)
    }
}

#[cfg(feature = "parallel")]
fn filter_matching(scope: &[&MethodRecord], fingerprint: &Fingerprint) -> Vec<usize> {
    scope
        .par_iter()
        .filter(|record| fingerprint.matches_method(record.method()))
        .map(|record| record.position())
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn filter_matching(scope: &[&MethodRecord], fingerprint: &Fingerprint) -> Vec<usize> {
    scope
        .iter()
        .filter(|record| fingerprint.matches_method(record.method()))
        .map(|record| record.position())
        .collect()
}
