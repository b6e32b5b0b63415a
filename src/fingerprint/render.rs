//! Pattern-text rendering of fingerprints.

use std::fmt::Write;

use super::{Fingerprint, InstructionFilter, InstructionLocation, InstructionMatcher};
use crate::core::method::{AccessFlags, Opcode};

const INDENT: &str = "    ";

/// Quote a string as a pattern-text literal.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' => out.push_str("\\$"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn string_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| escape_string(v)).collect();
    format!("listOf({})", items.join(", "))
}

fn opcode_ref(opcode: Opcode) -> String {
    format!("Opcode.{opcode}")
}

fn access_flags(flags: AccessFlags) -> String {
    let items: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| format!("AccessFlags.{name}"))
        .collect();
    format!("listOf({})", items.join(", "))
}

fn render_location(location: InstructionLocation) -> Option<String> {
    let text = match location {
        InstructionLocation::MatchAnywhere => return None,
        InstructionLocation::MatchFirst => "MatchFirst()".to_string(),
        InstructionLocation::MatchAfterImmediately => "MatchAfterImmediately()".to_string(),
        InstructionLocation::MatchAfterWithin { max } => format!("MatchAfterWithin({max})"),
        InstructionLocation::MatchAfterAtLeast { min } => format!("MatchAfterAtLeast({min})"),
        InstructionLocation::MatchAfterRange { min, max } => {
            format!("MatchAfterRange({min}, {max})")
        }
    };
    Some(format!("InstructionLocation.{text}"))
}

fn render_filter(filter: &InstructionFilter) -> String {
    let mut args: Vec<String> = Vec::new();
    let builder = match &filter.matcher {
        InstructionMatcher::Opcode { opcode } => {
            args.push(opcode_ref(*opcode));
            "opcode"
        }
        InstructionMatcher::String { value } => {
            args.push(escape_string(value));
            "string"
        }
        InstructionMatcher::MethodCall {
            defining_class,
            name,
            parameters,
            return_type,
            opcode,
        } => {
            if let Some(class) = defining_class {
                args.push(format!("definingClass = {}", escape_string(class)));
            }
            if let Some(name) = name {
                args.push(format!("name = {}", escape_string(name)));
            }
            if let Some(parameters) = parameters {
                args.push(format!("parameters = {}", string_list(parameters)));
            }
            if let Some(return_type) = return_type {
                args.push(format!("returnType = {}", escape_string(return_type)));
            }
            if let Some(opcode) = opcode {
                args.push(format!("opcode = {}", opcode_ref(*opcode)));
            }
            "methodCall"
        }
        InstructionMatcher::FieldAccess {
            defining_class,
            name,
            field_type,
            opcode,
        } => {
            if let Some(class) = defining_class {
                args.push(format!("definingClass = {}", escape_string(class)));
            }
            if let Some(name) = name {
                args.push(format!("name = {}", escape_string(name)));
            }
            if let Some(field_type) = field_type {
                args.push(format!("type = {}", escape_string(field_type)));
            }
            if let Some(opcode) = opcode {
                args.push(format!("opcode = {}", opcode_ref(*opcode)));
            }
            "fieldAccess"
        }
    };

    if let Some(after) = &filter.after {
        args.push(format!("after = {}", render_filter(after)));
    }
    if let Some(location) = render_location(filter.location) {
        args.push(format!("location = {location}"));
    }

    format!("{builder}({})", args.join(", "))
}

fn write_fingerprint(out: &mut String, fingerprint: &Fingerprint, depth: usize) {
    let mut fields: Vec<(&str, String)> = Vec::new();

    if let Some(class) = &fingerprint.defining_class {
        fields.push(("definingClass", escape_string(class)));
    }
    if let Some(name) = &fingerprint.name {
        fields.push(("name", escape_string(name)));
    }
    if let Some(flags) = fingerprint.access_flags {
        fields.push(("accessFlags", access_flags(flags)));
    }
    if let Some(return_type) = &fingerprint.return_type {
        fields.push(("returnType", escape_string(return_type)));
    }
    if let Some(parameters) = &fingerprint.parameters {
        fields.push(("parameters", string_list(parameters)));
    }
    if !fingerprint.strings.is_empty() {
        fields.push(("strings", string_list(&fingerprint.strings)));
    }
    if let Some(run) = &fingerprint.opcodes {
        let items: Vec<String> = run
            .iter()
            .map(|op| op.map_or_else(|| "null".to_string(), opcode_ref))
            .collect();
        fields.push(("opcodes", format!("listOf({})", items.join(", "))));
    }

    if fields.is_empty() && fingerprint.filters.is_empty() && fingerprint.anchor.is_none() {
        out.push_str("Fingerprint()");
        return;
    }

    let inner = INDENT.repeat(depth + 1);
    out.push_str("Fingerprint(\n");
    for (name, value) in fields {
        let _ = writeln!(out, "{inner}{name} = {value},");
    }

    if !fingerprint.filters.is_empty() {
        let _ = writeln!(out, "{inner}filters = listOf(");
        for item in &fingerprint.filters {
            let _ = writeln!(out, "{inner}{INDENT}{},", render_filter(item));
        }
        let _ = writeln!(out, "{inner}),");
    }

    if let Some(anchor) = &fingerprint.anchor {
        let _ = write!(out, "{inner}anchor = ");
        write_fingerprint(out, anchor, depth + 1);
        out.push_str(",\n");
    }

    out.push_str(&INDENT.repeat(depth));
    out.push(')');
}

pub(super) fn render_fingerprint(fingerprint: &Fingerprint) -> String {
    let mut out = String::new();
    write_fingerprint(&mut out, fingerprint, 0);
    out
}
