//! Accepted feature subsets.

use std::fmt;

use serde::Serialize;

use super::search::SubsetKey;
use crate::core::featureset::{Feature, FeatureVector};
use crate::fingerprint::Fingerprint;

/// A subset of a target's features that matches only the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSubset {
    indices: Vec<usize>,
    features: Vec<Feature>,
}

impl FeatureSubset {
    pub(crate) fn from_key(key: &SubsetKey, vector: &FeatureVector) -> Self {
        let indices: Vec<usize> = key.iter().map(|&index| usize::from(index)).collect();
        let features = indices
            .iter()
            .filter_map(|&index| vector.get(index).cloned())
            .collect();
        Self { indices, features }
    }

    /// Canonical positions in the target's feature vector, ascending
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The features, in canonical order
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True for the empty subset (the target is alone in its corpus)
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Fingerprint asserting exactly these features.
    pub fn to_fingerprint(&self) -> Fingerprint {
        Fingerprint::from_features(self.features.iter())
    }

    /// Pattern text that can be pasted into a new fingerprint definition.
    pub fn to_pattern_text(&self) -> String {
        self.to_fingerprint().to_pattern_text()
    }
}

impl fmt::Display for FeatureSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            return f.write_str("(no features needed)");
        }
        for (i, feature) in self.features.iter().enumerate() {
            if i > 0 {
                f.write_str(" & ")?;
            }
            write!(f, "{feature}")?;
        }
        Ok(())
    }
}
