use super::*;
use crate::core::method::Instruction;

fn sample_method() -> MethodDef {
    MethodDef::new("Lcom/app/Player;", "seek", "Z")
        .with_flags(AccessFlags::PUBLIC | AccessFlags::FINAL)
        .with_parameters(["J", "Ljava/lang/String;"])
        .with_instructions(vec![
            Instruction::const_string("seek_position"),
            Instruction::new(Opcode::InvokeVirtual),
            Instruction::new(Opcode::MoveResult),
            Instruction::new(Opcode::IfEqz),
            Instruction::const_string("seek_position"),
            Instruction::new(Opcode::Return),
        ])
}

#[test]
fn test_extraction_is_deterministic() {
    let extractor = DefaultFeatureExtractor::default();
    let method = sample_method();

    assert_eq!(extractor.extract(&method), extractor.extract(&method));
}

#[test]
fn test_vector_is_in_category_order() {
    let vector = DefaultFeatureExtractor::default().extract(&sample_method());

    let categories: Vec<_> = vector.iter().map(Feature::category).collect();
    let mut sorted = categories.clone();
    sorted.sort();
    assert_eq!(categories, sorted);

    assert_eq!(
        vector.get(0),
        Some(&Feature::AccessFlag {
            flag: AccessFlags::PUBLIC
        })
    );
    assert_eq!(
        vector.get(1),
        Some(&Feature::AccessFlag {
            flag: AccessFlags::FINAL
        })
    );
}

#[test]
fn test_vector_is_deduplicated() {
    let vector = DefaultFeatureExtractor::default().extract(&sample_method());

    assert_eq!(vector.category_count(FeatureCategory::StringLiteral), 1);
    let ids: Vec<_> = vector.iter().map(Feature::id).collect();
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
}

#[test]
fn test_every_extracted_feature_matches_its_source() {
    let method = sample_method();
    let vector = DefaultFeatureExtractor::default().extract(&method);

    for feature in vector.iter() {
        assert!(feature.matches(&method), "{feature} should hold");
    }
}

#[test]
fn test_opcode_window_semantics() {
    let method = sample_method();
    let near = Feature::OpcodeWindow {
        anchor: Opcode::InvokeVirtual,
        opcode: Opcode::IfEqz,
        within: 2,
    };
    let far = Feature::OpcodeWindow {
        anchor: Opcode::InvokeVirtual,
        opcode: Opcode::Return,
        within: 2,
    };
    let backwards = Feature::OpcodeWindow {
        anchor: Opcode::IfEqz,
        opcode: Opcode::InvokeVirtual,
        within: 5,
    };

    assert!(near.matches(&method));
    assert!(!far.matches(&method));
    assert!(!backwards.matches(&method));
}

#[test]
fn test_extractor_caps_and_toggles() {
    let config = ExtractorConfig {
        include_defining_class: false,
        include_opcodes: false,
        opcode_window: 1,
        max_opcode_windows: 2,
        max_string_literals: 0,
    };
    let vector = DefaultFeatureExtractor::new(config).extract(&sample_method());

    assert_eq!(vector.category_count(FeatureCategory::DefiningClass), 0);
    assert_eq!(vector.category_count(FeatureCategory::Opcode), 0);
    assert_eq!(vector.category_count(FeatureCategory::StringLiteral), 0);
    assert_eq!(vector.category_count(FeatureCategory::OpcodeWindow), 2);
}

#[test]
fn test_empty_parameter_list_is_a_feature() {
    let method = MethodDef::new("La;", "run", "V");
    let vector = DefaultFeatureExtractor::default().extract(&method);

    assert!(vector.contains(&Feature::Parameters { types: vec![] }));
    assert!(!Feature::Parameters { types: vec![] }.matches(&sample_method()));
}

#[test]
fn test_canonical_order_ignores_input_order() {
    let id = MethodId::new("La;->b()V");
    let a = FeatureVector::canonical(
        id.clone(),
        vec![
            Feature::Name { name: "b".into() },
            Feature::AccessFlag {
                flag: AccessFlags::STATIC,
            },
        ],
    );
    let b = FeatureVector::canonical(
        id,
        vec![
            Feature::AccessFlag {
                flag: AccessFlags::STATIC,
            },
            Feature::Name { name: "b".into() },
        ],
    );

    assert_eq!(a, b);
    assert_eq!(a.position(&Feature::Name { name: "b".into() }), Some(1));
}
