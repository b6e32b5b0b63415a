//! Configuration types and management for dexprint-rs.
//!
//! Every tunable the engine exposes lives here, grouped by the component that
//! reads it. The whole tree round-trips through YAML so the CLI can layer a
//! config file over defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DexprintError, Result};
use crate::fingerprint::MAX_CHAIN_DEPTH;

/// Main configuration for the fingerprint engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DexprintConfig {
    /// Feature extraction settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Minimal distinguishing set search settings
    #[serde(default)]
    pub solver: SolverConfig,

    /// Pattern evaluation limits
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Resolver scratch storage
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Background execution
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DexprintConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            DexprintError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            DexprintError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.extractor.validate()?;
        self.solver.validate()?;
        self.evaluation.validate()?;
        self.resolver.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Feature extraction tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Emit a feature for the containing class descriptor
    pub include_defining_class: bool,

    /// Emit one feature per distinct opcode
    pub include_opcodes: bool,

    /// Distance bound for opcode-window features (0 disables them)
    pub opcode_window: usize,

    /// Maximum opcode-window features per method
    pub max_opcode_windows: usize,

    /// Maximum string-literal features per method
    pub max_string_literals: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            include_defining_class: true,
            include_opcodes: true,
            opcode_window: 2,
            max_opcode_windows: 64,
            max_string_literals: 64,
        }
    }
}

impl ExtractorConfig {
    /// Validate extractor settings
    pub fn validate(&self) -> Result<()> {
        if self.opcode_window > 64 {
            return Err(DexprintError::validation_mismatch(
                "opcode window is too wide to be a useful predicate",
                "extractor.opcode_window",
                "<= 64",
                self.opcode_window.to_string(),
            ));
        }
        Ok(())
    }
}

/// Minimal distinguishing set search tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Hard cap on the number of target features considered.
    ///
    /// Features past the cap (in canonical order) are ignored and the report
    /// says so.
    pub max_features: usize,

    /// Largest subset size to examine (`None` means up to `max_features`)
    pub max_subset_size: Option<usize>,

    /// Budget on evaluated candidate subsets before the search gives up
    pub max_candidates: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_features: 64,
            max_subset_size: None,
            max_candidates: 2_000_000,
        }
    }
}

impl SolverConfig {
    /// Validate solver settings
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(DexprintError::config_field(
                "max_features must be at least 1",
                "solver.max_features",
            ));
        }
        // Subsets are indexed with u16 positions.
        if self.max_features > usize::from(u16::MAX) {
            return Err(DexprintError::config_field(
                format!("max_features must not exceed {}", u16::MAX),
                "solver.max_features",
            ));
        }
        if self.max_subset_size == Some(0) {
            return Err(DexprintError::config_field(
                "max_subset_size must be at least 1",
                "solver.max_subset_size",
            ));
        }
        if self.max_candidates == 0 {
            return Err(DexprintError::config_field(
                "max_candidates must be at least 1",
                "solver.max_candidates",
            ));
        }
        Ok(())
    }
}

/// Pattern evaluation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Maximum accepted pattern text size in bytes
    pub max_source_bytes: usize,

    /// Maximum expression nesting depth, also applied to nested lists
    pub max_nesting_depth: usize,

    /// Maximum approximate size in bytes of any value a script builds
    pub max_value_bytes: usize,

    /// Maximum length of `anchor` and `after` chains
    pub max_chain_depth: usize,

    /// Log the full pattern text of each evaluation
    pub log_scripts: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 256 * 1024,
            max_nesting_depth: 64,
            max_value_bytes: 1024 * 1024,
            max_chain_depth: MAX_CHAIN_DEPTH,
            log_scripts: true,
        }
    }
}

impl EvaluationConfig {
    /// Validate evaluation limits
    pub fn validate(&self) -> Result<()> {
        if self.max_source_bytes == 0 {
            return Err(DexprintError::config_field(
                "max_source_bytes must be positive",
                "evaluation.max_source_bytes",
            ));
        }
        if !(4..=1024).contains(&self.max_nesting_depth) {
            return Err(DexprintError::validation_mismatch(
                "nesting depth out of range",
                "evaluation.max_nesting_depth",
                "4..=1024",
                self.max_nesting_depth.to_string(),
            ));
        }
        if self.max_value_bytes == 0 {
            return Err(DexprintError::config_field(
                "max_value_bytes must be positive",
                "evaluation.max_value_bytes",
            ));
        }
        if !(1..=MAX_CHAIN_DEPTH).contains(&self.max_chain_depth) {
            return Err(DexprintError::validation_mismatch(
                "chain depth out of range",
                "evaluation.max_chain_depth",
                format!("1..={MAX_CHAIN_DEPTH}"),
                self.max_chain_depth.to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolver scratch storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory under which each match session creates its own scratch folder
    pub scratch_root: PathBuf,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("dexprint"),
        }
    }
}

impl ResolverConfig {
    /// Validate resolver settings
    pub fn validate(&self) -> Result<()> {
        if self.scratch_root.as_os_str().is_empty() {
            return Err(DexprintError::config_field(
                "scratch_root must not be empty",
                "resolver.scratch_root",
            ));
        }
        Ok(())
    }
}

/// Background execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum concurrently running background jobs
    pub worker_threads: usize,

    /// Abandon pattern evaluation after this many milliseconds
    pub evaluation_timeout_ms: Option<u64>,

    /// Warm the evaluation context when the engine starts
    pub preload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            evaluation_timeout_ms: None,
            preload: true,
        }
    }
}

impl EngineConfig {
    /// Validate engine settings
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(DexprintError::config_field(
                "worker_threads must be at least 1",
                "engine.worker_threads",
            ));
        }
        if self.evaluation_timeout_ms == Some(0) {
            return Err(DexprintError::config_field(
                "evaluation_timeout_ms must be positive when set",
                "engine.evaluation_timeout_ms",
            ));
        }
        Ok(())
    }
}
