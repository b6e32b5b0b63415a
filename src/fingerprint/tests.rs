use super::*;
use crate::core::featureset::{DefaultFeatureExtractor, FeatureExtractor};
use crate::core::method::{FieldReference, MethodReference};

fn player_seek() -> MethodDef {
    MethodDef::new("Lcom/app/Player;", "seek", "Z")
        .with_flags(AccessFlags::PUBLIC | AccessFlags::FINAL)
        .with_parameters(["J"])
        .with_instructions(vec![
            Instruction::const_string("seek_position"),
            Instruction::with_reference(
                Opcode::InvokeVirtual,
                InstructionReference::Method(MethodReference {
                    defining_class: "Lcom/app/Engine;".into(),
                    name: "seekTo".into(),
                    parameter_types: vec!["J".into()],
                    return_type: "Z".into(),
                }),
            ),
            Instruction::new(Opcode::MoveResult),
            Instruction::with_reference(
                Opcode::IgetBoolean,
                InstructionReference::Field(FieldReference {
                    defining_class: "Lcom/app/Player;".into(),
                    name: "ready".into(),
                    field_type: "Z".into(),
                }),
            ),
            Instruction::new(Opcode::IfEqz),
            Instruction::new(Opcode::Return),
        ])
}

#[test]
fn test_empty_fingerprint_matches_everything() {
    assert!(Fingerprint::default().matches_method(&player_seek()));
    assert!(Fingerprint::default().matches_method(&MethodDef::new("La;", "b", "V")));
}

#[test]
fn test_scalar_constraints() {
    let method = player_seek();

    let fingerprint = Fingerprint {
        defining_class: Some("Lcom/app/Player;".into()),
        name: Some("seek".into()),
        access_flags: Some(AccessFlags::PUBLIC),
        return_type: Some("Z".into()),
        parameters: Some(vec!["J".into()]),
        ..Fingerprint::default()
    };
    assert!(fingerprint.matches_method(&method));

    let static_only = Fingerprint {
        access_flags: Some(AccessFlags::PUBLIC | AccessFlags::STATIC),
        ..Fingerprint::default()
    };
    assert!(!static_only.matches_method(&method));

    let prefix_params = Fingerprint {
        parameters: Some(vec![]),
        ..Fingerprint::default()
    };
    assert!(!prefix_params.matches_method(&method));
}

#[test]
fn test_opcode_run_with_wildcard() {
    let method = player_seek();

    let run = Fingerprint {
        opcodes: Some(vec![Some(Opcode::InvokeVirtual), None, Some(Opcode::IgetBoolean)]),
        ..Fingerprint::default()
    };
    assert!(run.matches_method(&method));

    let broken = Fingerprint {
        opcodes: Some(vec![Some(Opcode::InvokeVirtual), Some(Opcode::IgetBoolean)]),
        ..Fingerprint::default()
    };
    assert!(!broken.matches_method(&method));
}

#[test]
fn test_reference_matchers() {
    let method = player_seek();

    let call = InstructionFilter::new(InstructionMatcher::MethodCall {
        defining_class: Some("Lcom/app/Engine;".into()),
        name: Some("seekTo".into()),
        parameters: None,
        return_type: None,
        opcode: Some(Opcode::InvokeVirtual),
    });
    assert!(call.matches(&method));

    let wrong_opcode = InstructionFilter::new(InstructionMatcher::MethodCall {
        defining_class: None,
        name: Some("seekTo".into()),
        parameters: None,
        return_type: None,
        opcode: Some(Opcode::InvokeStatic),
    });
    assert!(!wrong_opcode.matches(&method));

    let field = InstructionFilter::new(InstructionMatcher::FieldAccess {
        defining_class: None,
        name: Some("ready".into()),
        field_type: Some("Z".into()),
        opcode: None,
    });
    assert!(field.matches(&method));
}

#[test]
fn test_relative_locations() {
    let method = player_seek();
    let invoke = || InstructionFilter::opcode(Opcode::InvokeVirtual);

    let immediately = InstructionFilter::opcode(Opcode::MoveResult)
        .after(invoke())
        .at(InstructionLocation::MatchAfterImmediately);
    assert!(immediately.matches(&method));

    let too_close = InstructionFilter::opcode(Opcode::IfEqz)
        .after(invoke())
        .at(InstructionLocation::MatchAfterImmediately);
    assert!(!too_close.matches(&method));

    let within = InstructionFilter::opcode(Opcode::IfEqz)
        .after(invoke())
        .at(InstructionLocation::MatchAfterWithin { max: 2 });
    assert_eq!(within.positions(&method.instructions), vec![4]);

    let at_least = InstructionFilter::opcode(Opcode::Return)
        .after(invoke())
        .at(InstructionLocation::MatchAfterAtLeast { min: 4 });
    assert!(!at_least.matches(&method));

    let range = InstructionFilter::opcode(Opcode::Return)
        .after(invoke())
        .at(InstructionLocation::MatchAfterRange { min: 2, max: 3 });
    assert!(range.matches(&method));

    let backwards = InstructionFilter::opcode(Opcode::ConstString).after(invoke());
    assert!(!backwards.matches(&method));
}

#[test]
fn test_absolute_locations() {
    let method = player_seek();

    let first = InstructionFilter::string("seek_position").at(InstructionLocation::MatchFirst);
    assert!(first.matches(&method));

    let not_first = InstructionFilter::opcode(Opcode::Return).at(InstructionLocation::MatchFirst);
    assert!(!not_first.matches(&method));

    let early = InstructionFilter::opcode(Opcode::MoveResult)
        .at(InstructionLocation::MatchAfterWithin { max: 2 });
    assert!(early.matches(&method));
}

#[test]
fn test_from_features_is_equivalent_to_feature_conjunction() {
    let method = player_seek();
    let other = MethodDef::new("Lcom/app/Player;", "seek", "Z")
        .with_flags(AccessFlags::PUBLIC)
        .with_parameters(["J"])
        .with_instructions(vec![
            Instruction::new(Opcode::InvokeVirtual),
            Instruction::new(Opcode::Return),
        ]);
    let vector = DefaultFeatureExtractor::default().extract(&method);

    let fingerprint = vector.to_fingerprint();
    assert!(fingerprint.matches_method(&method));
    assert!(!fingerprint.matches_method(&other));

    for feature in vector.iter() {
        let single = Fingerprint::from_features([feature]);
        assert_eq!(single.matches_method(&other), feature.matches(&other), "{feature}");
    }
}

#[test]
fn test_short_id() {
    let fingerprint = Fingerprint {
        name: Some("seek".into()),
        parameters: Some(vec!["J".into(), "I".into()]),
        return_type: Some("Z".into()),
        ..Fingerprint::default()
    };
    assert_eq!(fingerprint.short_id().as_deref(), Some("seek(JI)Z"));
    assert_eq!(Fingerprint::default().short_id(), None);
}

#[test]
fn test_chain_depths() {
    let filter = InstructionFilter::opcode(Opcode::Return)
        .after(InstructionFilter::opcode(Opcode::Nop).after(InstructionFilter::string("a")));
    assert_eq!(filter.chain_depth(), 3);
    assert_eq!(InstructionFilter::opcode(Opcode::Nop).chain_depth(), 1);

    let anchored = Fingerprint {
        anchor: Some(Box::new(Fingerprint::default())),
        ..Fingerprint::default()
    };
    assert_eq!(Fingerprint::default().anchor_depth(), 1);
    assert_eq!(anchored.anchor_depth(), 2);
}
