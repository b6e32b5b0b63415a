//! The fingerprint engine and its background offload.
//!
//! Evaluation, resolution and solving are CPU-bound and may take arbitrarily
//! long, so the engine runs them on Tokio's blocking pool, bounded by a
//! semaphore sized from the configured worker count. Interactive callers
//! use [`EngineHandle`], which posts completions to a single-consumer channel
//! instead of making the caller wait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::api::results::EvaluationReport;
use crate::core::config::DexprintConfig;
use crate::core::corpus::Corpus;
use crate::core::errors::{DexprintError, Result};
use crate::core::featureset::{DefaultFeatureExtractor, FeatureExtractor, FeatureVector};
use crate::core::method::{MethodDef, MethodId};
use crate::fingerprint::Fingerprint;
use crate::io::corpus_source::CorpusSource;
use crate::resolver::{FingerprintResolver, ResolveOutcome};
use crate::script::{EvaluationHost, EvaluationOutcome};
use crate::solver::{MinimalFeatureSetSolver, SolverReport};

struct EngineInner {
    config: DexprintConfig,
    corpus: Arc<Corpus>,
    extractor: Arc<dyn FeatureExtractor>,
    host: &'static EvaluationHost,
    resolver: FingerprintResolver,
    solver: MinimalFeatureSetSolver,
    permits: Arc<Semaphore>,
}

/// Evaluates, resolves and solves against one corpus.
///
/// Cloning is cheap; clones share the corpus and the worker budget.
#[derive(Clone)]
pub struct FingerprintEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for FingerprintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintEngine")
            .field("methods", &self.inner.corpus.len())
            .field("extractor", &self.inner.extractor.name())
            .field("engine", &self.inner.config.engine)
            .finish()
    }
}

impl FingerprintEngine {
    /// Load the corpus from a source and create an engine over it.
    pub async fn load(config: DexprintConfig, source: &dyn CorpusSource) -> Result<Self> {
        config.validate()?;
        let extractor: Arc<dyn FeatureExtractor> =
            Arc::new(DefaultFeatureExtractor::new(config.extractor.clone()));
        let corpus = Corpus::load(source, extractor.as_ref()).await?;
        Self::from_corpus(config, Arc::new(corpus), extractor)
    }

    /// Create an engine over an already built corpus.
    ///
    /// The process-wide evaluation context is initialised from
    /// `config.evaluation` on first use; a later engine with different
    /// evaluation limits is rejected.
    pub fn from_corpus(
        config: DexprintConfig,
        corpus: Arc<Corpus>,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        let host = EvaluationHost::init_global(config.evaluation.clone())?;
        if config.engine.preload {
            host.preload();
        }

        info!(
            "Fingerprint engine ready: {} methods, {} workers",
            corpus.len(),
            config.engine.worker_threads
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                resolver: FingerprintResolver::new(config.resolver.clone()),
                solver: MinimalFeatureSetSolver::new(config.solver.clone()),
                permits: Arc::new(Semaphore::new(config.engine.worker_threads)),
                config,
                corpus,
                extractor,
                host,
            }),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &DexprintConfig {
        &self.inner.config
    }

    /// Shared corpus
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.inner.corpus
    }

    /// Extract features of a method that need not be in the corpus
    pub fn extract(&self, method: &MethodDef) -> FeatureVector {
        self.inner.extractor.extract(method)
    }

    /// Feature vector of a corpus method
    pub fn features(&self, target: &MethodId) -> Result<&FeatureVector> {
        self.inner.corpus.features_of(target)
    }

    /// Evaluate pattern text without resolving it.
    pub async fn evaluate(&self, text: impl Into<String>) -> Result<EvaluationReport> {
        let start = Instant::now();
        let outcome = self.evaluate_outcome(text.into()).await?;
        let report = match EvaluationReport::from_outcome(outcome) {
            Ok((fingerprint, diagnostics)) => EvaluationReport::evaluated(fingerprint, diagnostics),
            Err(report) => report,
        };
        Ok(report.with_elapsed_ms(elapsed_ms(start)))
    }

    /// Evaluate pattern text and, if it produced a fingerprint, resolve it.
    pub async fn evaluate_and_resolve(&self, text: impl Into<String>) -> Result<EvaluationReport> {
        let start = Instant::now();
        let outcome = self.evaluate_outcome(text.into()).await?;
        let report = match EvaluationReport::from_outcome(outcome) {
            Ok((fingerprint, diagnostics)) => {
                let resolved = self.resolve(fingerprint.clone()).await?;
                EvaluationReport::resolved(fingerprint, diagnostics, resolved)
            }
            Err(report) => {
                debug!("Skipping resolution: {}", report.message());
                report
            }
        };
        Ok(report.with_elapsed_ms(elapsed_ms(start)))
    }

    /// Resolve an already evaluated fingerprint.
    pub async fn resolve(&self, fingerprint: Fingerprint) -> Result<ResolveOutcome> {
        let inner = Arc::clone(&self.inner);
        self.offload(move || inner.resolver.resolve(&fingerprint, &inner.corpus))
            .await
    }

    /// Search minimal distinguishing feature sets for a corpus method.
    pub async fn solve(&self, target: MethodId) -> Result<SolverReport> {
        let inner = Arc::clone(&self.inner);
        self.offload(move || inner.solver.solve(&target, &inner.corpus))
            .await?
    }

    async fn evaluate_outcome(&self, text: String) -> Result<EvaluationOutcome> {
        let host = self.inner.host;
        let evaluation = self.offload(move || host.evaluate(&text));

        match self.inner.config.engine.evaluation_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), evaluation)
                .await
                .map_err(|_| {
                    warn!("Pattern evaluation abandoned after {ms}ms");
                    DexprintError::timeout("evaluate", ms)
                })?,
            None => evaluation.await,
        }
    }

    /// Run a closure on the blocking pool once a worker permit is free.
    async fn offload<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| DexprintError::concurrency("Engine worker pool is closed"))?;

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await?;
        Ok(result)
    }
}

/// Identity of one submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(u64);

impl RunId {
    /// Raw sequence number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Work that can be submitted to an [`EngineHandle`].
#[derive(Debug, Clone)]
pub enum Request {
    /// Evaluate pattern text
    Evaluate {
        /// Pattern text
        text: String,
    },
    /// Evaluate pattern text and resolve the fingerprint
    EvaluateAndResolve {
        /// Pattern text
        text: String,
    },
    /// Search minimal distinguishing feature sets
    Solve {
        /// Target method
        target: MethodId,
    },
}

/// Successful result of a [`Request`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Result of `Evaluate` or `EvaluateAndResolve`
    Evaluation(EvaluationReport),
    /// Result of `Solve`
    Solver(SolverReport),
}

/// A finished request, posted to the completion channel.
#[derive(Debug)]
pub struct Completion {
    /// Request identity
    pub id: RunId,
    /// What the request produced
    pub result: Result<Response>,
}

/// Submits requests in the background and posts their completions.
#[derive(Debug)]
pub struct EngineHandle {
    engine: FingerprintEngine,
    next_id: AtomicU64,
    completions: mpsc::UnboundedSender<Completion>,
}

impl EngineHandle {
    /// Create a handle and the receiving end of its completion channel.
    pub fn new(engine: FingerprintEngine) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            engine,
            next_id: AtomicU64::new(1),
            completions,
        };
        (handle, receiver)
    }

    /// Engine the handle submits to
    pub fn engine(&self) -> &FingerprintEngine {
        &self.engine
    }

    /// Start a request and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: Request) -> RunId {
        let id = RunId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let engine = self.engine.clone();
        let completions = self.completions.clone();

        debug!("Submitting {id}");
        tokio::spawn(async move {
            let result = match request {
                Request::Evaluate { text } => engine.evaluate(text).await.map(Response::Evaluation),
                Request::EvaluateAndResolve { text } => engine
                    .evaluate_and_resolve(text)
                    .await
                    .map(Response::Evaluation),
                Request::Solve { target } => engine.solve(target).await.map(Response::Solver),
            };
            if completions.send(Completion { id, result }).is_err() {
                debug!("Completion receiver dropped; discarding {id}");
            }
        });
        id
    }
}

/// Keeps only the completion of the most recently tracked run.
#[derive(Debug, Default)]
pub struct LatestRunFilter {
    latest: Mutex<Option<RunId>>,
}

impl LatestRunFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a run as the latest, superseding earlier ones
    pub fn track(&self, id: RunId) {
        *self.latest.lock() = Some(id);
    }

    /// Most recently tracked run
    pub fn latest(&self) -> Option<RunId> {
        *self.latest.lock()
    }

    /// Pass the completion through if it belongs to the latest run.
    pub fn accept(&self, completion: Completion) -> Option<Completion> {
        if self.latest() == Some(completion.id) {
            Some(completion)
        } else {
            debug!("Discarding stale completion {}", completion.id);
            None
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
