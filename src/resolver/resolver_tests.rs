use super::*;
use crate::core::featureset::DefaultFeatureExtractor;
use crate::core::method::{AccessFlags, Instruction, MethodDef, Opcode};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

fn corpus() -> Corpus {
    let methods = vec![
        MethodDef::new("Lcom/app/Player;", "seek", "Z")
            .with_flags(AccessFlags::PUBLIC)
            .with_parameters(["J"])
            .with_instructions(vec![
                Instruction::const_string("seek_position"),
                Instruction::new(Opcode::InvokeVirtual),
                Instruction::new(Opcode::Return),
            ]),
        MethodDef::new("Lcom/app/Player;", "stop", "V")
            .with_flags(AccessFlags::PUBLIC)
            .with_instructions(vec![Instruction::new(Opcode::ReturnVoid)]),
        MethodDef::new("Lcom/app/Player;", "pause", "V")
            .with_flags(AccessFlags::PRIVATE)
            .with_instructions(vec![Instruction::new(Opcode::ReturnVoid)]),
    ];
    Corpus::build(None, methods, &DefaultFeatureExtractor::default()).unwrap()
}

fn resolver(root: &TempDir) -> FingerprintResolver {
    FingerprintResolver::new(ResolverConfig {
        scratch_root: root.path().to_path_buf(),
    })
}

fn scratch_entries(root: &TempDir) -> usize {
    std::fs::read_dir(root.path()).unwrap().count()
}

#[test]
fn test_found_not_found_and_ambiguous() {
    let root = TempDir::new().unwrap();
    let resolver = resolver(&root);
    let corpus = corpus();

    let found = resolver.resolve(
        &Fingerprint {
            strings: vec!["seek_position".into()],
            ..Fingerprint::default()
        },
        &corpus,
    );
    let method = found.method().unwrap();
    assert_eq!(method.position, 0);
    assert_eq!(method.short_id, "seek(J)Z");

    let missing = Fingerprint {
        name: Some("play".into()),
        ..Fingerprint::default()
    };
    assert_eq!(resolver.resolve(&missing, &corpus), ResolveOutcome::NotFound);

    let ambiguous = Fingerprint {
        return_type: Some("V".into()),
        ..Fingerprint::default()
    };
    match resolver.resolve(&ambiguous, &corpus) {
        ResolveOutcome::Ambiguous { candidates } => {
            assert_eq!(
                candidates,
                vec![
                    MethodId::from("Lcom/app/Player;->stop()V"),
                    MethodId::from("Lcom/app/Player;->pause()V"),
                ]
            );
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    assert_eq!(scratch_entries(&root), 0);
}

#[test]
fn test_full_feature_vectors_resolve_to_their_source() {
    let root = TempDir::new().unwrap();
    let resolver = resolver(&root);
    let corpus = corpus();

    for record in corpus.records() {
        let fingerprint = record.features().to_fingerprint();
        let resolved = resolver.resolve_method(&fingerprint, &corpus).unwrap();
        assert_eq!(resolved.id(), record.id());
    }
}

#[test]
fn test_resolve_is_idempotent() {
    let root = TempDir::new().unwrap();
    let resolver = resolver(&root);
    let corpus = corpus();
    let fingerprint = Fingerprint {
        access_flags: Some(AccessFlags::PUBLIC),
        ..Fingerprint::default()
    };

    assert_eq!(
        resolver.resolve(&fingerprint, &corpus),
        resolver.resolve(&fingerprint, &corpus)
    );
}

struct FailingPrimitive;

impl MatchPrimitive for FailingPrimitive {
    fn name(&self) -> &str {
        "failing"
    }

    fn apply(
        &self,
        _fingerprint: &Fingerprint,
        _context: &MatchContext<'_, '_>,
    ) -> Result<Vec<usize>, MatchFailure> {
        Err(MatchFailure::new("decoder crashed"))
    }
}

struct PanickingPrimitive;

impl MatchPrimitive for PanickingPrimitive {
    fn name(&self) -> &str {
        "panicking"
    }

    fn apply(
        &self,
        _fingerprint: &Fingerprint,
        _context: &MatchContext<'_, '_>,
    ) -> Result<Vec<usize>, MatchFailure> {
        panic!("primitive blew up")
    }
}

/// Records every scratch directory it was handed.
#[derive(Default)]
struct RecordingPrimitive {
    seen: Mutex<Vec<PathBuf>>,
}

impl MatchPrimitive for RecordingPrimitive {
    fn name(&self) -> &str {
        "recording"
    }

    fn apply(
        &self,
        fingerprint: &Fingerprint,
        context: &MatchContext<'_, '_>,
    ) -> Result<Vec<usize>, MatchFailure> {
        assert!(context.scratch_dir().is_dir());
        self.seen.lock().unwrap().push(context.scratch_dir().to_path_buf());
        CorpusMatcher::new().apply(fingerprint, context)
    }
}

#[test]
fn test_primitive_failure_is_reported_with_cause() {
    let root = TempDir::new().unwrap();
    let config = ResolverConfig {
        scratch_root: root.path().to_path_buf(),
    };
    let corpus = corpus();

    let failing = FingerprintResolver::with_primitive(config.clone(), Arc::new(FailingPrimitive));
    assert_eq!(
        failing.resolve(&Fingerprint::default(), &corpus),
        ResolveOutcome::Failed {
            cause: "decoder crashed".into()
        }
    );

    let panicking = FingerprintResolver::with_primitive(config, Arc::new(PanickingPrimitive));
    assert_eq!(
        panicking.resolve(&Fingerprint::default(), &corpus),
        ResolveOutcome::Failed {
            cause: "primitive blew up".into()
        }
    );
    assert!(panicking
        .resolve_method(&Fingerprint::default(), &corpus)
        .is_none());

    assert_eq!(scratch_entries(&root), 0);
}

#[test]
fn test_each_resolve_gets_a_fresh_session() {
    let root = TempDir::new().unwrap();
    let primitive = Arc::new(RecordingPrimitive::default());
    let resolver = FingerprintResolver::with_primitive(
        ResolverConfig {
            scratch_root: root.path().to_path_buf(),
        },
        primitive.clone(),
    );
    let corpus = corpus();

    resolver.resolve(&Fingerprint::default(), &corpus);
    resolver.resolve(&Fingerprint::default(), &corpus);

    let seen = primitive.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0], seen[1]);
    assert!(seen.iter().all(|dir| !dir.exists()));
}

#[test]
fn test_concurrent_resolves_do_not_interfere() {
    let root = TempDir::new().unwrap();
    let resolver = resolver(&root);
    let corpus = corpus();

    let seek = Fingerprint {
        name: Some("seek".into()),
        ..Fingerprint::default()
    };
    let pause = Fingerprint {
        access_flags: Some(AccessFlags::PRIVATE),
        ..Fingerprint::default()
    };

    std::thread::scope(|scope| {
        let first = scope.spawn(|| resolver.resolve(&seek, &corpus));
        let second = scope.spawn(|| resolver.resolve(&pause, &corpus));

        let first = first.join().unwrap();
        let second = second.join().unwrap();
        assert_eq!(first.method().unwrap().short_id, "seek(J)Z");
        assert_eq!(second.method().unwrap().short_id, "pause()V");
    });

    assert_eq!(scratch_entries(&root), 0);
}
