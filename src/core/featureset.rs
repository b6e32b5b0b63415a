//! Feature extraction framework and data structures.
//!
//! A [`Feature`] is one atomic structural predicate over a method. A
//! [`FeatureVector`] is the ordered, deduplicated list of features that hold
//! for one method. Vector order is canonical: category first, then the order
//! in which the extractor discovered the feature. The solver enumerates
//! subsets by position in this order, so it must never depend on hashing or
//! corpus iteration order.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::core::config::ExtractorConfig;
use crate::core::method::{AccessFlags, MethodDef, MethodId, Opcode};
use crate::fingerprint::Fingerprint;

/// Feature categories in canonical vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    /// Single access flag
    AccessFlag,
    /// Return type descriptor
    ReturnType,
    /// Full parameter list
    Parameters,
    /// Declared method name
    Name,
    /// Containing class descriptor
    DefiningClass,
    /// Referenced string literal
    StringLiteral,
    /// Opcode present anywhere in the body
    Opcode,
    /// Opcode following an anchor opcode within a bounded distance
    OpcodeWindow,
}

impl FeatureCategory {
    /// All categories in canonical order.
    pub const ALL: [FeatureCategory; 8] = [
        FeatureCategory::AccessFlag,
        FeatureCategory::ReturnType,
        FeatureCategory::Parameters,
        FeatureCategory::Name,
        FeatureCategory::DefiningClass,
        FeatureCategory::StringLiteral,
        FeatureCategory::Opcode,
        FeatureCategory::OpcodeWindow,
    ];
}

/// An atomic, self-describing predicate over a method.
///
/// Equality is structural. Each variant corresponds to exactly one fingerprint
/// constraint with identical meaning, see [`Fingerprint::from_features`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// Method has this (single) access flag
    AccessFlag {
        /// Flag, always exactly one bit
        flag: AccessFlags,
    },
    /// Return type equals the descriptor
    ReturnType {
        /// Type descriptor
        descriptor: String,
    },
    /// Parameter list equals the list
    Parameters {
        /// Parameter type descriptors
        types: Vec<String>,
    },
    /// Declared name equals the name
    Name {
        /// Method name
        name: String,
    },
    /// Containing class equals the descriptor
    DefiningClass {
        /// Class descriptor
        descriptor: String,
    },
    /// Some instruction loads this string literal
    StringLiteral {
        /// Literal value
        value: String,
    },
    /// Some instruction has this opcode
    Opcode {
        /// Opcode
        opcode: Opcode,
    },
    /// `opcode` occurs 1..=`within` instructions after an `anchor` instruction
    OpcodeWindow {
        /// Anchor opcode
        anchor: Opcode,
        /// Following opcode
        opcode: Opcode,
        /// Maximum distance from the anchor
        within: usize,
    },
}

impl Feature {
    /// Category this feature belongs to.
    pub fn category(&self) -> FeatureCategory {
        match self {
            Feature::AccessFlag { .. } => FeatureCategory::AccessFlag,
            Feature::ReturnType { .. } => FeatureCategory::ReturnType,
            Feature::Parameters { .. } => FeatureCategory::Parameters,
            Feature::Name { .. } => FeatureCategory::Name,
            Feature::DefiningClass { .. } => FeatureCategory::DefiningClass,
            Feature::StringLiteral { .. } => FeatureCategory::StringLiteral,
            Feature::Opcode { .. } => FeatureCategory::Opcode,
            Feature::OpcodeWindow { .. } => FeatureCategory::OpcodeWindow,
        }
    }

    /// Stable identifier, unique per structurally distinct feature.
    pub fn id(&self) -> String {
        match self {
            Feature::AccessFlag { flag } => {
                format!("access_flag:{}", flag.flag_name().unwrap_or("?"))
            }
            Feature::ReturnType { descriptor } => format!("return_type:{descriptor}"),
            Feature::Parameters { types } => format!("parameters:({})", types.join(",")),
            Feature::Name { name } => format!("name:{name}"),
            Feature::DefiningClass { descriptor } => format!("defining_class:{descriptor}"),
            Feature::StringLiteral { value } => format!("string:{value:?}"),
            Feature::Opcode { opcode } => format!("opcode:{opcode}"),
            Feature::OpcodeWindow {
                anchor,
                opcode,
                within,
            } => format!("opcode_window:{anchor}..{opcode}@{within}"),
        }
    }

    /// Pure evaluation of the predicate against a method's attributes.
    pub fn matches(&self, method: &MethodDef) -> bool {
        match self {
            Feature::AccessFlag { flag } => method.access_flags.contains(*flag),
            Feature::ReturnType { descriptor } => method.return_type == *descriptor,
            Feature::Parameters { types } => method.parameter_types == *types,
            Feature::Name { name } => method.name == *name,
            Feature::DefiningClass { descriptor } => method.defining_class == *descriptor,
            Feature::StringLiteral { value } => method.string_literals().any(|s| s == value),
            Feature::Opcode { opcode } => method.instructions.iter().any(|i| i.opcode == *opcode),
            Feature::OpcodeWindow {
                anchor,
                opcode,
                within,
            } => {
                let ops: Vec<Opcode> = method.instructions.iter().map(|i| i.opcode).collect();
                ops.iter().enumerate().any(|(start, op)| {
                    *op == *anchor
                        && ops
                            .iter()
                            .skip(start + 1)
                            .take(*within)
                            .any(|follower| follower == opcode)
                })
            }
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::AccessFlag { flag } => {
                write!(f, "has access flag {}", flag.flag_name().unwrap_or("?"))
            }
            Feature::ReturnType { descriptor } => write!(f, "returns {descriptor}"),
            Feature::Parameters { types } => write!(f, "parameters equal [{}]", types.join(", ")),
            Feature::Name { name } => write!(f, "is named {name}"),
            Feature::DefiningClass { descriptor } => write!(f, "is defined in {descriptor}"),
            Feature::StringLiteral { value } => write!(f, "references string {value:?}"),
            Feature::Opcode { opcode } => write!(f, "contains opcode {opcode}"),
            Feature::OpcodeWindow {
                anchor,
                opcode,
                within,
            } => write!(f, "contains {opcode} within {within} instructions after {anchor}"),
        }
    }
}

/// Ordered, deduplicated feature list describing one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Method the features were extracted from
    pub method: MethodId,

    features: IndexSet<Feature>,
}

impl FeatureVector {
    /// Build a vector in canonical order.
    ///
    /// Features are stable-sorted by category, so discovery order is kept
    /// within a category, and structural duplicates are dropped.
    pub fn canonical(method: MethodId, features: impl IntoIterator<Item = Feature>) -> Self {
        let mut collected: Vec<Feature> = features.into_iter().collect();
        collected.sort_by_key(Feature::category);

        Self {
            method,
            features: collected.into_iter().collect(),
        }
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when no feature was extracted
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature at a canonical position
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get_index(index)
    }

    /// Canonical position of a feature
    pub fn position(&self, feature: &Feature) -> Option<usize> {
        self.features.get_index_of(feature)
    }

    /// Check if the vector contains a feature
    pub fn contains(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }

    /// Iterate in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Count features per category
    pub fn category_count(&self, category: FeatureCategory) -> usize {
        self.features
            .iter()
            .filter(|feature| feature.category() == category)
            .count()
    }

    /// Fingerprint asserting every feature in the vector.
    pub fn to_fingerprint(&self) -> Fingerprint {
        Fingerprint::from_features(self.features.iter())
    }

    /// Pattern text for the full vector.
    pub fn to_pattern_text(&self) -> String {
        self.to_fingerprint().to_pattern_text()
    }
}

impl PartialEq for FeatureVector {
    /// Order-sensitive: two vectors are equal only if they agree position by position.
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.features.iter().eq(other.features.iter())
    }
}

impl Eq for FeatureVector {}

/// Trait for deriving feature vectors from methods.
pub trait FeatureExtractor: Send + Sync {
    /// Get the name of this extractor
    fn name(&self) -> &str;

    /// Categories this extractor can emit
    fn categories(&self) -> &[FeatureCategory];

    /// Extract the canonical feature vector of a method.
    ///
    /// Must be a deterministic, pure function of the method's attributes.
    fn extract(&self, method: &MethodDef) -> FeatureVector;
}

/// Extractor covering every [`FeatureCategory`].
#[derive(Debug, Clone, Default)]
pub struct DefaultFeatureExtractor {
    config: ExtractorConfig,
}

impl DefaultFeatureExtractor {
    /// Create an extractor with the given tunables
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extractor tunables
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn opcode_windows(&self, method: &MethodDef) -> Vec<Feature> {
        let within = self.config.opcode_window;
        if within == 0 {
            return Vec::new();
        }

        let ops: Vec<Opcode> = method.instructions.iter().map(|i| i.opcode).collect();
        let mut seen = IndexSet::new();

        'outer: for (start, anchor) in ops.iter().enumerate() {
            for follower in ops.iter().skip(start + 1).take(within) {
                if seen.len() >= self.config.max_opcode_windows {
                    break 'outer;
                }
                seen.insert(Feature::OpcodeWindow {
                    anchor: *anchor,
                    opcode: *follower,
                    within,
                });
            }
        }

        seen.into_iter().collect()
    }
}

impl FeatureExtractor for DefaultFeatureExtractor {
    fn name(&self) -> &str {
        "default"
    }

    fn categories(&self) -> &[FeatureCategory] {
        &FeatureCategory::ALL
    }

    fn extract(&self, method: &MethodDef) -> FeatureVector {
        let mut features = Vec::new();

        features.extend(
            method
                .access_flags
                .single_flags()
                .map(|flag| Feature::AccessFlag { flag }),
        );
        features.push(Feature::ReturnType {
            descriptor: method.return_type.clone(),
        });
        features.push(Feature::Parameters {
            types: method.parameter_types.clone(),
        });
        features.push(Feature::Name {
            name: method.name.clone(),
        });
        if self.config.include_defining_class {
            features.push(Feature::DefiningClass {
                descriptor: method.defining_class.clone(),
            });
        }

        let mut strings = IndexSet::new();
        for literal in method.string_literals() {
            if strings.len() >= self.config.max_string_literals {
                break;
            }
            strings.insert(literal);
        }
        features.extend(strings.into_iter().map(|value| Feature::StringLiteral {
            value: value.to_string(),
        }));

        if self.config.include_opcodes {
            features.extend(
                method
                    .instructions
                    .iter()
                    .map(|i| Feature::Opcode { opcode: i.opcode }),
            );
        }
        features.extend(self.opcode_windows(method));

        FeatureVector::canonical(method.id(), features)
    }
}

#[cfg(test)]
#[path = "featureset_tests.rs"]
mod tests;
