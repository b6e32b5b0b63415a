//! Structural method predicates.
//!
//! A [`Fingerprint`] is a conjunction of constraints over one method. Absent
//! constraints hold trivially, so `Fingerprint::default()` matches every
//! method. Everything except the `anchor` can be checked against a single
//! [`MethodDef`]; the anchor needs the corpus and is handled by the resolver.
//!
//! Instruction filters locate instructions either absolutely or relative to
//! an earlier instruction matched by their `after` filter. Locations measure
//! the *gap*: the number of instructions strictly between the anchor
//! instruction and the target. Without an `after` filter the anchor sits
//! just before the first instruction, so the gap equals the target index.

mod render;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::featureset::Feature;
use crate::core::method::{AccessFlags, Instruction, InstructionReference, MethodDef, Opcode};

pub use render::escape_string;

/// Longest `anchor` or `after` chain a fingerprint may carry.
pub const MAX_CHAIN_DEPTH: usize = 16;

/// Where a filter's target instruction may sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstructionLocation {
    /// Any position after the anchor (or anywhere without one)
    #[default]
    MatchAnywhere,
    /// The first instruction of the method
    MatchFirst,
    /// Directly after the anchor
    MatchAfterImmediately,
    /// At most `max` instructions between anchor and target
    MatchAfterWithin {
        /// Largest allowed gap
        max: usize,
    },
    /// At least `min` instructions between anchor and target
    MatchAfterAtLeast {
        /// Smallest allowed gap
        min: usize,
    },
    /// Between `min` and `max` instructions between anchor and target
    MatchAfterRange {
        /// Smallest allowed gap
        min: usize,
        /// Largest allowed gap
        max: usize,
    },
}

impl InstructionLocation {
    /// True when a target at `index` satisfies the location relative to an
    /// anchor at `anchor` (`None` for "before the first instruction").
    pub fn accepts(self, anchor: Option<usize>, index: usize) -> bool {
        let gap = match anchor {
            Some(anchor) if index <= anchor => return false,
            Some(anchor) => index - anchor - 1,
            None => index,
        };

        match self {
            InstructionLocation::MatchAnywhere => true,
            InstructionLocation::MatchFirst => index == 0,
            InstructionLocation::MatchAfterImmediately => gap == 0,
            InstructionLocation::MatchAfterWithin { max } => gap <= max,
            InstructionLocation::MatchAfterAtLeast { min } => gap >= min,
            InstructionLocation::MatchAfterRange { min, max } => (min..=max).contains(&gap),
        }
    }

    /// True for the relative `MatchAfter*` family
    pub fn is_relative(self) -> bool {
        !matches!(
            self,
            InstructionLocation::MatchAnywhere | InstructionLocation::MatchFirst
        )
    }
}

/// Predicate over a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstructionMatcher {
    /// Instruction has the opcode
    Opcode {
        /// Required opcode
        opcode: Opcode,
    },
    /// Instruction loads the string literal
    String {
        /// Literal value
        value: String,
    },
    /// Instruction invokes a method matching every present field
    MethodCall {
        /// Declaring class of the callee
        defining_class: Option<String>,
        /// Callee name
        name: Option<String>,
        /// Callee parameter types
        parameters: Option<Vec<String>>,
        /// Callee return type
        return_type: Option<String>,
        /// Invoke opcode
        opcode: Option<Opcode>,
    },
    /// Instruction accesses a field matching every present field
    FieldAccess {
        /// Declaring class of the field
        defining_class: Option<String>,
        /// Field name
        name: Option<String>,
        /// Field type
        field_type: Option<String>,
        /// Get/put opcode
        opcode: Option<Opcode>,
    },
}

fn holds<T: PartialEq + ?Sized>(expected: Option<&T>, actual: &T) -> bool {
    expected.map_or(true, |expected| expected == actual)
}

impl InstructionMatcher {
    /// Evaluate against one instruction
    pub fn matches(&self, instruction: &Instruction) -> bool {
        match self {
            InstructionMatcher::Opcode { opcode } => instruction.opcode == *opcode,
            InstructionMatcher::String { value } => instruction.string_literal() == Some(value.as_str()),
            InstructionMatcher::MethodCall {
                defining_class,
                name,
                parameters,
                return_type,
                opcode,
            } => match &instruction.reference {
                Some(InstructionReference::Method(callee)) => {
                    holds(opcode.as_ref(), &instruction.opcode)
                        && holds(defining_class.as_deref(), callee.defining_class.as_str())
                        && holds(name.as_deref(), callee.name.as_str())
                        && holds(parameters.as_ref(), &callee.parameter_types)
                        && holds(return_type.as_deref(), callee.return_type.as_str())
                }
                _ => false,
            },
            InstructionMatcher::FieldAccess {
                defining_class,
                name,
                field_type,
                opcode,
            } => match &instruction.reference {
                Some(InstructionReference::Field(field)) => {
                    holds(opcode.as_ref(), &instruction.opcode)
                        && holds(defining_class.as_deref(), field.defining_class.as_str())
                        && holds(name.as_deref(), field.name.as_str())
                        && holds(field_type.as_deref(), field.field_type.as_str())
                }
                _ => false,
            },
        }
    }
}

/// An instruction matcher placed at a location, optionally relative to
/// another filter's match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructionFilter {
    /// Predicate on the target instruction
    pub matcher: InstructionMatcher,
    /// Allowed target position
    #[serde(default)]
    pub location: InstructionLocation,
    /// Filter locating the anchor instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Box<InstructionFilter>>,
}

impl InstructionFilter {
    /// Filter matching anywhere
    pub fn new(matcher: InstructionMatcher) -> Self {
        Self {
            matcher,
            location: InstructionLocation::MatchAnywhere,
            after: None,
        }
    }

    /// `opcode(op)`
    pub fn opcode(opcode: Opcode) -> Self {
        Self::new(InstructionMatcher::Opcode { opcode })
    }

    /// `string(value)`
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(InstructionMatcher::String {
            value: value.into(),
        })
    }

    /// Set the location
    pub fn at(mut self, location: InstructionLocation) -> Self {
        self.location = location;
        self
    }

    /// Anchor on another filter
    pub fn after(mut self, anchor: InstructionFilter) -> Self {
        self.after = Some(Box::new(anchor));
        self
    }

    /// Number of filters in the `after` chain, this one included.
    pub fn chain_depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let Some(after) = &current.after {
            depth += 1;
            current = after;
        }
        depth
    }

    /// Every instruction index at which the filter holds, ascending.
    pub fn positions(&self, instructions: &[Instruction]) -> Vec<usize> {
        let anchors: Vec<Option<usize>> = match &self.after {
            Some(after) => after.positions(instructions).into_iter().map(Some).collect(),
            None => vec![None],
        };

        instructions
            .iter()
            .enumerate()
            .filter(|(_, instruction)| self.matcher.matches(instruction))
            .filter(|(index, _)| {
                anchors
                    .iter()
                    .any(|&anchor| self.location.accepts(anchor, *index))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// True when the filter holds somewhere in the method
    pub fn matches(&self, method: &MethodDef) -> bool {
        !self.positions(&method.instructions).is_empty()
    }
}

/// A conjunction of structural constraints identifying at most one method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Exact containing class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_class: Option<String>,
    /// Exact method name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Flags that must all be present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_flags: Option<AccessFlags>,
    /// Exact return type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Exact parameter list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    /// String literals that must each be referenced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<String>,
    /// Contiguous opcode run, `None` entries match any opcode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opcodes: Option<Vec<Option<Opcode>>>,
    /// Instruction filters that must each hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<InstructionFilter>,
    /// Fingerprint of a method in the same class that must resolve uniquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Box<Fingerprint>>,
}

impl Fingerprint {
    /// Fingerprint asserting every feature of the iterator.
    ///
    /// A method matches the result iff it satisfies every feature.
    pub fn from_features<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Self {
        let mut fingerprint = Fingerprint::default();

        for feature in features {
            match feature {
                Feature::AccessFlag { flag } => {
                    let flags = fingerprint.access_flags.get_or_insert(AccessFlags::empty());
                    *flags |= *flag;
                }
                Feature::ReturnType { descriptor } => {
                    fingerprint.return_type = Some(descriptor.clone());
                }
                Feature::Parameters { types } => fingerprint.parameters = Some(types.clone()),
                Feature::Name { name } => fingerprint.name = Some(name.clone()),
                Feature::DefiningClass { descriptor } => {
                    fingerprint.defining_class = Some(descriptor.clone());
                }
                Feature::StringLiteral { value } => fingerprint.strings.push(value.clone()),
                Feature::Opcode { opcode } => {
                    fingerprint.filters.push(InstructionFilter::opcode(*opcode));
                }
                Feature::OpcodeWindow {
                    anchor,
                    opcode,
                    within,
                } => {
                    let location = match within.checked_sub(1) {
                        Some(max) => InstructionLocation::MatchAfterWithin { max },
                        None => InstructionLocation::MatchAfterRange { min: 1, max: 0 },
                    };
                    fingerprint.filters.push(
                        InstructionFilter::opcode(*opcode)
                            .after(InstructionFilter::opcode(*anchor))
                            .at(location),
                    );
                }
            }
        }

        fingerprint
    }

    /// Number of constraints, counting each string and filter separately.
    pub fn constraint_count(&self) -> usize {
        usize::from(self.defining_class.is_some())
            + usize::from(self.name.is_some())
            + usize::from(self.access_flags.is_some())
            + usize::from(self.return_type.is_some())
            + usize::from(self.parameters.is_some())
            + self.strings.len()
            + usize::from(self.opcodes.is_some())
            + self.filters.len()
            + usize::from(self.anchor.is_some())
    }

    /// Number of fingerprints in the anchor chain, this one included.
    pub fn anchor_depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let Some(anchor) = &current.anchor {
            depth += 1;
            current = anchor;
        }
        depth
    }

    /// Check every constraint except the anchor against one method.
    pub fn matches_method(&self, method: &MethodDef) -> bool {
        holds(self.defining_class.as_deref(), method.defining_class.as_str())
            && holds(self.name.as_deref(), method.name.as_str())
            && self
                .access_flags
                .map_or(true, |flags| method.access_flags.contains(flags))
            && holds(self.return_type.as_deref(), method.return_type.as_str())
            && holds(self.parameters.as_ref(), &method.parameter_types)
            && self
                .strings
                .iter()
                .all(|wanted| method.string_literals().any(|s| s == wanted))
            && self
                .opcodes
                .as_ref()
                .map_or(true, |run| contains_run(&method.instructions, run))
            && self.filters.iter().all(|filter| filter.matches(method))
    }

    /// `name(params)ret` when name, parameters and return type are all fixed.
    pub fn short_id(&self) -> Option<String> {
        match (&self.name, &self.parameters, &self.return_type) {
            (Some(name), Some(parameters), Some(return_type)) => {
                Some(format!("{name}({}){return_type}", parameters.concat()))
            }
            _ => None,
        }
    }

    /// Canonical pattern text that evaluates back to this fingerprint.
    pub fn to_pattern_text(&self) -> String {
        render::render_fingerprint(self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pattern_text())
    }
}

fn contains_run(instructions: &[Instruction], run: &[Option<Opcode>]) -> bool {
    if run.is_empty() {
        return true;
    }
    instructions.windows(run.len()).any(|window| {
        window
            .iter()
            .zip(run)
            .all(|(instruction, wanted)| wanted.map_or(true, |op| instruction.opcode == op))
    })
}

#[cfg(test)]
mod tests;
