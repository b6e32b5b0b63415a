//! The immutable method corpus of one loaded package.
//!
//! A [`Corpus`] is built exactly once per session from the external method
//! listing. Construction extracts every method's feature vector, after which
//! nothing is added, removed or mutated. Records are shared freely across
//! threads behind an `Arc`.

use std::time::Instant;

use ahash::AHashMap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::errors::{DexprintError, Result};
use crate::core::featureset::{FeatureExtractor, FeatureVector};
use crate::core::method::{MethodDef, MethodId};
use crate::io::corpus_source::CorpusSource;

/// One method of the corpus with its identity and extracted features.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    id: MethodId,
    position: usize,
    method: MethodDef,
    features: FeatureVector,
}

impl MethodRecord {
    /// Descriptor identity
    pub fn id(&self) -> &MethodId {
        &self.id
    }

    /// Position in listing order, used by match primitives to re-locate the method
    pub fn position(&self) -> usize {
        self.position
    }

    /// Raw method attributes
    pub fn method(&self) -> &MethodDef {
        &self.method
    }

    /// Extracted feature vector
    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    /// Containing class descriptor
    pub fn defining_class(&self) -> &str {
        &self.method.defining_class
    }
}

/// Read-only collection of every method in a loaded package.
#[derive(Debug)]
pub struct Corpus {
    package: Option<String>,
    records: Vec<MethodRecord>,
    by_id: AHashMap<MethodId, usize>,
    by_class: AHashMap<String, Vec<usize>>,
    extractor_name: String,
}

impl Corpus {
    /// Build a corpus from raw methods, extracting every feature vector.
    ///
    /// Record order is the listing order. Duplicate method identities are
    /// rejected.
    pub fn build(
        package: Option<String>,
        methods: Vec<MethodDef>,
        extractor: &dyn FeatureExtractor,
    ) -> Result<Self> {
        let start = Instant::now();

        let mut by_id = AHashMap::with_capacity(methods.len());
        for (position, method) in methods.iter().enumerate() {
            if by_id.insert(method.id(), position).is_some() {
                return Err(DexprintError::corpus_method(
                    "Duplicate method in corpus listing",
                    method.id().to_string(),
                ));
            }
        }

        let features = extract_all(&methods, extractor);

        let mut by_class: AHashMap<String, Vec<usize>> = AHashMap::new();
        let records: Vec<MethodRecord> = methods
            .into_iter()
            .zip(features)
            .enumerate()
            .map(|(position, (method, features))| {
                by_class
                    .entry(method.defining_class.clone())
                    .or_default()
                    .push(position);
                MethodRecord {
                    id: features.method.clone(),
                    position,
                    method,
                    features,
                }
            })
            .collect();

        info!(
            "Built corpus of {} methods in {} classes in {:?}",
            records.len(),
            by_class.len(),
            start.elapsed()
        );

        Ok(Self {
            package,
            records,
            by_id,
            by_class,
            extractor_name: extractor.name().to_string(),
        })
    }

    /// Load the method listing from a source and build the corpus.
    pub async fn load(source: &dyn CorpusSource, extractor: &dyn FeatureExtractor) -> Result<Self> {
        debug!("Loading corpus from {}", source.describe());
        let listing = source.load_methods().await?;
        Self::build(listing.package, listing.methods, extractor)
    }

    /// Package name, if the listing carried one
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Name of the extractor that produced the feature vectors
    pub fn extractor_name(&self) -> &str {
        &self.extractor_name
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True for an empty corpus
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in listing order
    pub fn records(&self) -> &[MethodRecord] {
        &self.records
    }

    /// Record at a listing position
    pub fn get(&self, position: usize) -> Option<&MethodRecord> {
        self.records.get(position)
    }

    /// Look a method up by identity
    pub fn find(&self, id: &MethodId) -> Option<&MethodRecord> {
        self.by_id.get(id).map(|&position| &self.records[position])
    }

    /// Listing position of a method
    pub fn position_of(&self, id: &MethodId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Feature vector of a method, failing if it was never extracted.
    pub fn features_of(&self, id: &MethodId) -> Result<&FeatureVector> {
        self.find(id)
            .map(MethodRecord::features)
            .ok_or_else(|| DexprintError::solver_uncomputed(id.to_string()))
    }

    /// Records declared in a class, in listing order
    pub fn methods_in_class<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a MethodRecord> + 'a {
        self.by_class
            .get(class)
            .into_iter()
            .flatten()
            .map(move |&position| &self.records[position])
    }
}

#[cfg(feature = "parallel")]
fn extract_all(methods: &[MethodDef], extractor: &dyn FeatureExtractor) -> Vec<FeatureVector> {
    methods.par_iter().map(|m| extractor.extract(m)).collect()
}

#[cfg(not(feature = "parallel"))]
fn extract_all(methods: &[MethodDef], extractor: &dyn FeatureExtractor) -> Vec<FeatureVector> {
    methods.iter().map(|m| extractor.extract(m)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::featureset::DefaultFeatureExtractor;
    use crate::core::method::AccessFlags;
    use crate::io::corpus_source::InMemoryCorpusSource;

    fn methods() -> Vec<MethodDef> {
        vec![
            MethodDef::new("La;", "foo", "I").with_flags(AccessFlags::PUBLIC),
            MethodDef::new("La;", "foo", "I")
                .with_flags(AccessFlags::PRIVATE)
                .with_parameters(["I"]),
            MethodDef::new("Lb;", "bar", "V"),
        ]
    }

    #[test]
    fn test_build_keeps_listing_order() {
        let corpus = Corpus::build(None, methods(), &DefaultFeatureExtractor::default()).unwrap();

        assert_eq!(corpus.len(), 3);
        let names: Vec<_> = corpus.records().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(names, vec!["La;->foo()I", "La;->foo(I)I", "Lb;->bar()V"]);
        assert_eq!(corpus.get(2).unwrap().position(), 2);
        assert_eq!(corpus.methods_in_class("La;").count(), 2);
        assert_eq!(corpus.methods_in_class("Lmissing;").count(), 0);
    }

    #[test]
    fn test_duplicate_methods_are_rejected() {
        let mut listing = methods();
        listing.push(MethodDef::new("Lb;", "bar", "V"));

        let err = Corpus::build(None, listing, &DefaultFeatureExtractor::default()).unwrap_err();
        assert!(matches!(err, DexprintError::Corpus { method: Some(_), .. }));
    }

    #[test]
    fn test_features_of_unknown_method() {
        let corpus = Corpus::build(None, methods(), &DefaultFeatureExtractor::default()).unwrap();

        let known = MethodId::from("La;->foo()I");
        assert!(corpus.features_of(&known).is_ok());

        let err = corpus.features_of(&MethodId::from("Lz;->nope()V")).unwrap_err();
        assert!(matches!(err, DexprintError::SolverUncomputed { .. }));
    }

    #[tokio::test]
    async fn test_load_from_source() {
        let source = InMemoryCorpusSource::new(Some("com.app".to_string()), methods());
        let corpus = Corpus::load(&source, &DefaultFeatureExtractor::default())
            .await
            .unwrap();

        assert_eq!(corpus.package(), Some("com.app"));
        assert_eq!(corpus.extractor_name(), "default");
        assert!(!corpus.is_empty());
    }
}
