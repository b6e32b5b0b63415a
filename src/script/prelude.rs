//! Names predefined in every pattern script.
//!
//! The prelude is static: its signatures are shared by the checker, which
//! rejects bad calls before execution, and the interpreter, which binds
//! arguments the same way.

use super::ast::Arg;
use super::diagnostics::Span;
use crate::core::method::{AccessFlags, Opcode};

/// Namespaces reachable by member access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// `AccessFlags.PUBLIC`, ...
    AccessFlags,
    /// `Opcode.CONST_STRING`, ...
    Opcode,
    /// `InstructionLocation.MatchFirst()`, ...
    InstructionLocation,
}

impl Namespace {
    /// Look a namespace up by name
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "AccessFlags" => Some(Namespace::AccessFlags),
            "Opcode" => Some(Namespace::Opcode),
            "InstructionLocation" => Some(Namespace::InstructionLocation),
            _ => None,
        }
    }

    /// Source spelling
    pub fn name(self) -> &'static str {
        match self {
            Namespace::AccessFlags => "AccessFlags",
            Namespace::Opcode => "Opcode",
            Namespace::InstructionLocation => "InstructionLocation",
        }
    }

    /// True when `member` names a constant or function of the namespace
    pub fn has_member(self, member: &str) -> bool {
        match self {
            Namespace::AccessFlags => AccessFlags::from_name(member).is_some(),
            Namespace::Opcode => member.parse::<Opcode>().is_ok(),
            Namespace::InstructionLocation => Builtin::location(member).is_some(),
        }
    }
}

/// Parameter shape of a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Params {
    /// Any number of positional arguments
    Variadic,
    /// Named parameters, the first `required` of which must be given
    Fixed {
        /// Parameter names in positional order
        names: &'static [&'static str],
        /// Number of leading required parameters
        required: usize,
    },
}

/// Builtin functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `Fingerprint(...)`
    Fingerprint,
    /// `listOf(...)`
    ListOf,
    /// `setOf(...)`
    SetOf,
    /// `opcode(op)`
    OpcodeFilter,
    /// `string(text)`
    StringFilter,
    /// `methodCall(...)`
    MethodCall,
    /// `fieldAccess(...)`
    FieldAccess,
    /// `Error(message)`
    ErrorValue,
    /// `fail(message)`
    Fail,
    /// `InstructionLocation.MatchFirst()`
    MatchFirst,
    /// `InstructionLocation.MatchAfterImmediately()`
    MatchAfterImmediately,
    /// `InstructionLocation.MatchAfterWithin(n)`
    MatchAfterWithin,
    /// `InstructionLocation.MatchAfterAtLeast(n)`
    MatchAfterAtLeast,
    /// `InstructionLocation.MatchAfterRange(min, max)`
    MatchAfterRange,
}

impl Builtin {
    /// Top-level function by name
    pub fn function(name: &str) -> Option<Self> {
        let builtin = match name {
            "Fingerprint" => Builtin::Fingerprint,
            "listOf" => Builtin::ListOf,
            "setOf" => Builtin::SetOf,
            "opcode" => Builtin::OpcodeFilter,
            "string" => Builtin::StringFilter,
            "methodCall" => Builtin::MethodCall,
            "fieldAccess" => Builtin::FieldAccess,
            "Error" => Builtin::ErrorValue,
            "fail" => Builtin::Fail,
            _ => return None,
        };
        Some(builtin)
    }

    /// `InstructionLocation` member by name
    pub fn location(name: &str) -> Option<Self> {
        let builtin = match name {
            "MatchFirst" => Builtin::MatchFirst,
            "MatchAfterImmediately" => Builtin::MatchAfterImmediately,
            "MatchAfterWithin" => Builtin::MatchAfterWithin,
            "MatchAfterAtLeast" => Builtin::MatchAfterAtLeast,
            "MatchAfterRange" => Builtin::MatchAfterRange,
            _ => return None,
        };
        Some(builtin)
    }

    /// Source spelling
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Fingerprint => "Fingerprint",
            Builtin::ListOf => "listOf",
            Builtin::SetOf => "setOf",
            Builtin::OpcodeFilter => "opcode",
            Builtin::StringFilter => "string",
            Builtin::MethodCall => "methodCall",
            Builtin::FieldAccess => "fieldAccess",
            Builtin::ErrorValue => "Error",
            Builtin::Fail => "fail",
            Builtin::MatchFirst => "MatchFirst",
            Builtin::MatchAfterImmediately => "MatchAfterImmediately",
            Builtin::MatchAfterWithin => "MatchAfterWithin",
            Builtin::MatchAfterAtLeast => "MatchAfterAtLeast",
            Builtin::MatchAfterRange => "MatchAfterRange",
        }
    }

    /// Parameter shape
    pub fn params(self) -> Params {
        let (names, required): (&'static [&'static str], usize) = match self {
            Builtin::ListOf | Builtin::SetOf => return Params::Variadic,
            Builtin::Fingerprint => (
                &[
                    "definingClass",
                    "name",
                    "accessFlags",
                    "returnType",
                    "parameters",
                    "strings",
                    "opcodes",
                    "filters",
                    "anchor",
                ],
                0,
            ),
            Builtin::OpcodeFilter => (&["opcode", "location", "after"], 1),
            Builtin::StringFilter => (&["string", "location", "after"], 1),
            Builtin::MethodCall => (
                &[
                    "definingClass",
                    "name",
                    "parameters",
                    "returnType",
                    "opcode",
                    "location",
                    "after",
                ],
                0,
            ),
            Builtin::FieldAccess => (
                &["definingClass", "name", "type", "opcode", "location", "after"],
                0,
            ),
            Builtin::ErrorValue | Builtin::Fail => (&["message"], 1),
            Builtin::MatchFirst | Builtin::MatchAfterImmediately => (&[], 0),
            Builtin::MatchAfterWithin => (&["matchDistance"], 1),
            Builtin::MatchAfterAtLeast => (&["minimumDistance"], 1),
            Builtin::MatchAfterRange => (&["minimumDistance", "maximumDistance"], 2),
        };
        Params::Fixed { names, required }
    }
}

/// A call-site error found while binding arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BindError {
    /// Message
    pub message: String,
    /// Offending span
    pub span: Span,
}

/// Arguments bound to a builtin's parameters.
#[derive(Debug, Clone)]
pub enum Bound<'a> {
    /// Variadic values in order
    Variadic(Vec<&'a Arg>),
    /// One slot per declared parameter
    Fixed(Vec<Option<&'a Arg>>),
}

impl<'a> Bound<'a> {
    /// Argument bound to a parameter slot
    pub fn slot(&self, index: usize) -> Option<&'a Arg> {
        match self {
            Bound::Fixed(slots) => slots.get(index).copied().flatten(),
            Bound::Variadic(_) => None,
        }
    }
}

/// Bind call arguments to a builtin's parameters.
pub fn bind<'a>(builtin: Builtin, args: &'a [Arg], call_span: &Span) -> Result<Bound<'a>, BindError> {
    let (names, required) = match builtin.params() {
        Params::Variadic => {
            if let Some(named) = args.iter().find(|arg| arg.name.is_some()) {
                return Err(BindError {
                    message: format!(
                        "Named arguments are not allowed for vararg function {}",
                        builtin.name()
                    ),
                    span: named.name_span.clone().unwrap_or_else(|| named.value.span.clone()),
                });
            }
            return Ok(Bound::Variadic(args.iter().collect()));
        }
        Params::Fixed { names, required } => (names, required),
    };

    let mut slots: Vec<Option<&Arg>> = vec![None; names.len()];
    let mut seen_named = false;

    for (position, arg) in args.iter().enumerate() {
        let span = arg.name_span.clone().unwrap_or_else(|| arg.value.span.clone());
        let index = match &arg.name {
            None if seen_named => {
                return Err(BindError {
                    message: "Mixing named and positioned arguments is not allowed".to_string(),
                    span,
                });
            }
            None if position >= names.len() => {
                return Err(BindError {
                    message: format!(
                        "Too many arguments for {}: expected at most {}",
                        builtin.name(),
                        names.len()
                    ),
                    span,
                });
            }
            None => position,
            Some(name) => {
                seen_named = true;
                names.iter().position(|p| p == name).ok_or_else(|| BindError {
                    message: format!("Cannot find a parameter with this name: {name}"),
                    span: span.clone(),
                })?
            }
        };

        if slots[index].is_some() {
            return Err(BindError {
                message: format!("An argument is already passed for parameter '{}'", names[index]),
                span,
            });
        }
        slots[index] = Some(arg);
    }

    if let Some(missing) = names[..required].iter().zip(&slots).find(|(_, slot)| slot.is_none()) {
        return Err(BindError {
            message: format!("No value passed for parameter '{}'", missing.0),
            span: call_span.clone(),
        });
    }

    Ok(Bound::Fixed(slots))
}
