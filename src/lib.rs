//! # Dexprint-RS: Fingerprint Resolution for Compiled Android Methods
//!
//! Dexprint locates methods inside a decoded Android package by structural
//! fingerprints, and works out which fingerprints are worth writing:
//!
//! - **Pattern language**: analysts write fingerprints as short pattern text
//!   which is compiled and executed in an isolated evaluation context
//! - **Resolution**: an evaluated fingerprint is applied to the method corpus
//!   and yields the unique matching method, nothing, or an ambiguity
//! - **Feature extraction**: every method is described by an ordered vector of
//!   atomic structural predicates
//! - **Minimal feature sets**: for a target method, every inclusion-minimal
//!   subset of its features that no other method satisfies
//!
//! ## Architecture
//!
//! ```text
//! pattern text ──► EvaluationHost ──► Fingerprint ──► FingerprintResolver ──► method?
//!                                                          ▲
//!                     CorpusSource ──► Corpus ─────────────┤
//!                                        │                 │
//!          target ──► FeatureExtractor ──┴──► MinimalFeatureSetSolver ──► subsets ──► pattern text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dexprint_rs::{DexprintConfig, FingerprintEngine, JsonCorpusSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = JsonCorpusSource::new("methods.json");
//!     let engine = FingerprintEngine::load(DexprintConfig::default(), &source).await?;
//!
//!     let report = engine
//!         .evaluate_and_resolve(r#"Fingerprint(name = "seekTo", returnType = "V")"#)
//!         .await?;
//!     println!("{}", report.message());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

// Core data model
pub mod core {
    //! Method model, features, corpus, configuration and errors.

    pub mod config;
    pub mod corpus;
    pub mod errors;
    pub mod featureset;
    pub mod method;
}

// Corpus input
pub mod io {
    //! Corpus input.
    //!
    //! The engine never reads a binary package itself. It receives the decoded
    //! method listing through a [`CorpusSource`](corpus_source::CorpusSource),
    //! either from a JSON listing on disk or from methods already in memory.

    pub mod corpus_source;
}

pub mod fingerprint;
pub mod resolver;
pub mod script;
pub mod solver;

// Public API and engine interface
pub mod api {
    //! Engine, background offload and caller-facing reports.

    pub mod engine;
    pub mod results;
}

// Re-export primary types for convenience
pub use api::engine::{
    Completion, EngineHandle, FingerprintEngine, LatestRunFilter, Request, Response, RunId,
};
pub use api::results::{EvaluationReport, ReportStatus};
pub use crate::core::config::DexprintConfig;
pub use crate::core::corpus::{Corpus, MethodRecord};
pub use crate::core::errors::{DexprintError, Result};
pub use crate::core::featureset::{DefaultFeatureExtractor, Feature, FeatureExtractor, FeatureVector};
pub use crate::core::method::{MethodDef, MethodId};
pub use fingerprint::Fingerprint;
pub use io::corpus_source::{CorpusSource, InMemoryCorpusSource, JsonCorpusSource};
pub use resolver::{FingerprintResolver, ResolveOutcome};
pub use script::{EvaluationHost, EvaluationOutcome};
pub use solver::{FeatureSubset, MinimalFeatureSetSolver, SolverReport};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build-time feature detection
pub mod features {
    //! Runtime feature detection.

    /// Check if parallel processing is enabled
    pub const fn has_parallel() -> bool {
        cfg!(feature = "parallel")
    }
}
