use super::*;
use crate::core::config::EvaluationConfig;
use crate::core::featureset::{DefaultFeatureExtractor, FeatureExtractor};
use crate::core::method::{AccessFlags, Instruction, MethodDef, Opcode};
use crate::fingerprint::{InstructionFilter, InstructionLocation, InstructionMatcher};

fn host() -> EvaluationHost {
    EvaluationHost::new(EvaluationConfig {
        log_scripts: false,
        ..EvaluationConfig::default()
    })
}

#[test]
fn test_number_is_not_a_fingerprint() {
    let outcome = host().evaluate("40 + 2");

    match &outcome {
        EvaluationOutcome::Success {
            value: ScriptValue::Value(value),
            ..
        } => assert_eq!(value.type_name(), "Int"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(outcome.fingerprint().is_none());
}

#[test]
fn test_syntax_error_is_compile_failure() {
    let outcome = host().evaluate("Fingerprint(name = \"a\"");

    let EvaluationOutcome::CompileFailure { diagnostics } = outcome else {
        panic!("expected compile failure");
    };
    assert!(!diagnostics.is_empty());
    assert!(diagnostics.iter().all(|d| d.location.is_some()));
}

#[test]
fn test_fail_is_runtime_failure() {
    let outcome = host().evaluate("val unused = 1\nfail(\"boom\")");

    let EvaluationOutcome::RuntimeFailure { diagnostics, cause } = outcome else {
        panic!("expected runtime failure");
    };
    assert_eq!(cause, "boom");
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(diagnostics[1].location.map(|l| l.line), Some(2));
}

#[test]
fn test_value_shapes() {
    let host = host();

    assert!(matches!(
        host.evaluate("// nothing here"),
        EvaluationOutcome::Success {
            value: ScriptValue::NotEvaluated,
            ..
        }
    ));
    assert!(matches!(
        host.evaluate("val fp = Fingerprint()"),
        EvaluationOutcome::Success {
            value: ScriptValue::Unit,
            ..
        }
    ));
    assert!(matches!(
        host.evaluate("Error(\"bad\")"),
        EvaluationOutcome::Success {
            value: ScriptValue::Error { .. },
            ..
        }
    ));
}

#[test]
fn test_limits() {
    let host = EvaluationHost::new(EvaluationConfig {
        max_source_bytes: 32,
        max_nesting_depth: 4,
        log_scripts: false,
        ..EvaluationConfig::default()
    });

    assert!(matches!(
        host.evaluate("Fingerprint(name = \"far too long for the limit\")"),
        EvaluationOutcome::CompileFailure { .. }
    ));
    assert!(matches!(
        host.evaluate("-(-(-(-(-(-1)))))"),
        EvaluationOutcome::CompileFailure { .. }
    ));
    assert!(matches!(
        host.evaluate("-(-1)"),
        EvaluationOutcome::Success { .. }
    ));
}

fn runtime_cause(outcome: EvaluationOutcome) -> String {
    match outcome {
        EvaluationOutcome::RuntimeFailure { cause, .. } => cause,
        other => panic!("expected runtime failure, got {other:?}"),
    }
}

#[test]
fn test_doubling_string_is_bounded() {
    let mut source = String::from("val s0 = \"xxxxxxxx\"\n");
    for i in 1..=40 {
        source.push_str(&format!("val s{i} = s{prev} + s{prev}\n", prev = i - 1));
    }
    source.push_str("s40");

    let cause = runtime_cause(host().evaluate(&source));
    assert!(cause.contains("maximum size"), "{cause}");
}

#[test]
fn test_doubling_list_is_bounded() {
    let mut source = String::from("val l0 = listOf(\"xxxxxxxx\", \"yyyyyyyy\")\n");
    for i in 1..=40 {
        source.push_str(&format!("val l{i} = listOf(l{prev}, l{prev})\n", prev = i - 1));
    }
    source.push_str("l40");

    let cause = runtime_cause(host().evaluate(&source));
    assert!(cause.contains("maximum size"), "{cause}");
}

#[test]
fn test_list_nesting_is_bounded() {
    let mut source = String::from("val l0 = listOf(1)\n");
    for i in 1..=100 {
        source.push_str(&format!("val l{i} = listOf(l{})\n", i - 1));
    }
    source.push_str("l100");

    let cause = runtime_cause(host().evaluate(&source));
    assert!(cause.contains("nested deeper"), "{cause}");
}

#[test]
fn test_anchor_chain_is_bounded() {
    let mut source = String::from("val f0 = Fingerprint(name = \"run\")\n");
    for i in 1..=40 {
        source.push_str(&format!("val f{i} = Fingerprint(anchor = f{})\n", i - 1));
    }
    source.push_str("f40");

    let cause = runtime_cause(host().evaluate(&source));
    assert!(cause.contains("Anchor chain"), "{cause}");

    let short = "val f0 = Fingerprint(name = \"run\")\nFingerprint(anchor = f0)";
    let fingerprint = host().evaluate(short).fingerprint().cloned().unwrap();
    assert_eq!(fingerprint.anchor_depth(), 2);
}

#[test]
fn test_after_chain_is_bounded() {
    let mut source = String::from("val a0 = opcode(Opcode.NOP)\n");
    for i in 1..=40 {
        source.push_str(&format!("val a{i} = opcode(Opcode.NOP, after = a{})\n", i - 1));
    }
    source.push_str("Fingerprint(filters = listOf(a40))");

    let cause = runtime_cause(host().evaluate(&source));
    assert!(cause.contains("Filter chain"), "{cause}");
}

#[test]
fn test_evaluation_is_deterministic() {
    let host = host();
    let text = "Fingerprint(name = \"a\", strings = listOf(\"x\", \"y\"))";

    assert_eq!(host.evaluate(text), host.evaluate(text));
}

#[test]
fn test_preload_is_idempotent() {
    let host = host();
    assert!(!host.is_preloaded());

    let first = host.preload();
    assert!(host.is_preloaded());
    assert_eq!(host.preload(), first);
}

#[test]
fn test_global_host_reinit_with_other_limits_fails() {
    let global = EvaluationHost::global();
    let mut other = global.config().clone();
    other.max_nesting_depth += 1;

    assert!(EvaluationHost::init_global(global.config().clone()).is_ok());
    assert!(EvaluationHost::init_global(other).is_err());
}

#[test]
fn test_rendered_fingerprint_round_trips() {
    let fingerprint = Fingerprint {
        defining_class: Some("Lcom/app/Player;".into()),
        name: Some("se\"ek$".into()),
        access_flags: Some(AccessFlags::PUBLIC | AccessFlags::STATIC),
        return_type: Some("V".into()),
        parameters: Some(vec![]),
        strings: vec!["line\nbreak".into(), "tab\t\u{7}".into()],
        opcodes: Some(vec![Some(Opcode::ConstString), None, Some(Opcode::ReturnVoid)]),
        filters: vec![
            InstructionFilter::new(InstructionMatcher::MethodCall {
                defining_class: Some("Lcom/app/Engine;".into()),
                name: None,
                parameters: Some(vec!["J".into()]),
                return_type: Some("Z".into()),
                opcode: Some(Opcode::InvokeVirtual),
            }),
            InstructionFilter::new(InstructionMatcher::FieldAccess {
                defining_class: None,
                name: Some("ready".into()),
                field_type: Some("Z".into()),
                opcode: None,
            })
            .after(InstructionFilter::string("x").at(InstructionLocation::MatchFirst))
            .at(InstructionLocation::MatchAfterRange { min: 1, max: 3 }),
            InstructionFilter::opcode(Opcode::Throw).at(InstructionLocation::MatchAfterAtLeast { min: 2 }),
            InstructionFilter::opcode(Opcode::Nop).at(InstructionLocation::MatchAfterImmediately),
        ],
        anchor: Some(Box::new(Fingerprint {
            name: Some("anchor".into()),
            ..Fingerprint::default()
        })),
    };

    let text = fingerprint.to_pattern_text();
    let outcome = host().evaluate(&text);
    assert_eq!(outcome.fingerprint(), Some(&fingerprint), "{text}");
}

#[test]
fn test_feature_vector_text_round_trips() {
    let method = MethodDef::new("Lcom/app/Player;", "seek", "Z")
        .with_flags(AccessFlags::PUBLIC | AccessFlags::FINAL)
        .with_parameters(["J"])
        .with_instructions(vec![
            Instruction::const_string("seek_position"),
            Instruction::new(Opcode::InvokeVirtual),
            Instruction::new(Opcode::MoveResult),
            Instruction::new(Opcode::IfEqz),
            Instruction::new(Opcode::Return),
        ]);
    let vector = DefaultFeatureExtractor::default().extract(&method);

    let outcome = host().evaluate(&vector.to_pattern_text());
    let fingerprint = outcome.into_fingerprint().unwrap();
    assert_eq!(fingerprint, vector.to_fingerprint());
    assert!(fingerprint.matches_method(&method));
}
