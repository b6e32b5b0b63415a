//! Minimal distinguishing feature sets.
//!
//! Given a target method, the solver finds every inclusion-minimal subset of
//! its feature vector that no other corpus method satisfies. Results are
//! ordered by size, then lexicographically by canonical feature index, so the
//! output does not depend on corpus iteration order.

mod search;
mod subset;

use std::time::Instant;

use bitvec::prelude::*;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use search::SearchStats;
pub use subset::FeatureSubset;

use search::{minimal_subsets, SearchLimits, MAX_SEARCH_FEATURES};
use crate::core::config::SolverConfig;
use crate::core::corpus::{Corpus, MethodRecord};
use crate::core::errors::{DexprintError, Result};
use crate::core::featureset::Feature;
use crate::core::method::MethodId;

/// Everything one solver run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SolverReport {
    /// Target method
    pub target: MethodId,
    /// Accepted subsets, by size then canonical index order
    pub subsets: Vec<FeatureSubset>,
    /// Features in the target's vector
    pub feature_count: usize,
    /// Features the search actually used
    pub features_considered: usize,
    /// The vector was cut to `max_features`
    pub truncated: bool,
    /// Every subset up to the considered size was examined
    pub complete: bool,
    /// Methods satisfying every considered feature, when nothing distinguishes the target
    pub indistinguishable_from: Vec<MethodId>,
    /// Search counters
    pub stats: SearchStats,
    /// Wall time
    pub elapsed_ms: u64,
}

impl SolverReport {
    /// Size of the smallest accepted subset
    pub fn minimal_size(&self) -> Option<usize> {
        self.subsets.first().map(FeatureSubset::len)
    }
}

/// Searches for minimal distinguishing feature subsets.
#[derive(Debug, Clone, Default)]
pub struct MinimalFeatureSetSolver {
    config: SolverConfig,
}

impl MinimalFeatureSetSolver {
    /// Create a solver
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solver settings
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Every minimal distinguishing subset of the target's features.
    ///
    /// An empty list means the target cannot be told apart from some other
    /// method with the extracted features.
    pub fn minimal_distinguishing_sets(
        &self,
        target: &MethodId,
        corpus: &Corpus,
    ) -> Result<Vec<FeatureSubset>> {
        Ok(self.solve(target, corpus)?.subsets)
    }

    /// Run the search and return the full report.
    pub fn solve(&self, target: &MethodId, corpus: &Corpus) -> Result<SolverReport> {
        let start = Instant::now();
        let vector = corpus.features_of(target)?;
        let target_position = corpus
            .position_of(target)
            .ok_or_else(|| DexprintError::solver_uncomputed(target.to_string()))?;

        let features_considered = vector
            .len()
            .min(self.config.max_features)
            .min(MAX_SEARCH_FEATURES);
        let truncated = features_considered < vector.len();
        if truncated {
            warn!(
                "Target {} has {} features; only the first {} are considered",
                target,
                vector.len(),
                features_considered
            );
        }

        let others: Vec<&MethodRecord> = corpus
            .records()
            .iter()
            .filter(|record| record.position() != target_position)
            .collect();
        let features: Vec<&Feature> = vector.iter().take(features_considered).collect();
        let satisfaction = satisfaction_bitsets(&features, &others);
        debug!(
            "Built {} satisfaction bitsets over {} methods",
            satisfaction.len(),
            others.len()
        );

        let limits = SearchLimits {
            max_subset_size: self
                .config
                .max_subset_size
                .unwrap_or(features_considered)
                .min(features_considered),
            max_candidates: self.config.max_candidates,
        };
        let result = minimal_subsets(&satisfaction, others.len(), &limits);

        let subsets: Vec<FeatureSubset> = result
            .accepted
            .iter()
            .map(|key| FeatureSubset::from_key(key, vector))
            .collect();

        let indistinguishable_from = if subsets.is_empty() {
            indistinguishable(&satisfaction, &others)
        } else {
            Vec::new()
        };

        let complete = !result.exhausted_budget && !result.hit_size_limit;
        if result.exhausted_budget {
            warn!(
                "Solver stopped after evaluating {} candidate subsets",
                result.stats.candidates_evaluated
            );
        }

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            "Found {} minimal feature sets for {} in {}ms",
            subsets.len(),
            target,
            elapsed_ms
        );

        Ok(SolverReport {
            target: target.clone(),
            subsets,
            feature_count: vector.len(),
            features_considered,
            truncated,
            complete,
            indistinguishable_from,
            stats: result.stats,
            elapsed_ms,
        })
    }
}

/// One bitset per feature; bit `j` is set when `others[j]` satisfies it.
fn satisfaction_bitsets(features: &[&Feature], others: &[&MethodRecord]) -> Vec<BitVec> {
    let build = |feature: &&Feature| -> BitVec {
        others
            .iter()
            .map(|record| feature.matches(record.method()))
            .collect()
    };

    #[cfg(feature = "parallel")]
    {
        features.par_iter().map(build).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        features.iter().map(build).collect()
    }
}

fn indistinguishable(satisfaction: &[BitVec], others: &[&MethodRecord]) -> Vec<MethodId> {
    let mut survivors: BitVec = BitVec::repeat(true, others.len());
    for bits in satisfaction {
        survivors &= bits.as_bitslice();
    }
    survivors
        .iter_ones()
        .map(|index| others[index].id().clone())
        .collect()
}

#[cfg(test)]
#[path = "solver_tests.rs"]
mod tests;
