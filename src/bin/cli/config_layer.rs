//! Configuration Layer Management
//!
//! Layers configuration for the CLI: built-in defaults, then a configuration
//! file (explicit `--config` or an implicit `.dexprint.yml` in the working
//! directory), then command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use dexprint_rs::DexprintConfig;

use crate::cli::args::{CorpusArgs, EvalArgs, SolveArgs};

const IMPLICIT_CONFIG_FILES: [&str; 2] = [".dexprint.yml", ".dexprint.yaml"];

/// Apply command-line overrides on top of a loaded configuration.
pub trait ApplyCliOverrides {
    /// Overwrite every setting the user passed explicitly.
    fn apply_to(&self, config: &mut DexprintConfig);
}

impl ApplyCliOverrides for EvalArgs {
    fn apply_to(&self, config: &mut DexprintConfig) {
        if let Some(ms) = self.timeout_ms {
            config.engine.evaluation_timeout_ms = Some(ms);
        }
        if let Some(root) = &self.scratch_root {
            config.resolver.scratch_root = root.clone();
        }
    }
}

impl ApplyCliOverrides for SolveArgs {
    fn apply_to(&self, config: &mut DexprintConfig) {
        if let Some(max_features) = self.max_features {
            config.solver.max_features = max_features;
        }
        if let Some(max_subset_size) = self.max_subset_size {
            config.solver.max_subset_size = Some(max_subset_size);
        }
        if let Some(max_candidates) = self.max_candidates {
            config.solver.max_candidates = max_candidates;
        }
    }
}

/// Find the configuration file to load, if any.
fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    IMPLICIT_CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
}

/// Load a configuration file, or defaults when there is none.
pub fn load_configuration(explicit: Option<&Path>) -> anyhow::Result<DexprintConfig> {
    match config_file(explicit) {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            DexprintConfig::from_yaml_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok(DexprintConfig::default())
        }
    }
}

/// Build the effective configuration: defaults ← file ← CLI flags.
pub fn build_layered_config(
    corpus: &CorpusArgs,
    overrides: Option<&dyn ApplyCliOverrides>,
) -> anyhow::Result<DexprintConfig> {
    let mut config = load_configuration(corpus.config.as_deref())?;
    if let Some(overrides) = overrides {
        overrides.apply_to(&mut config);
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;
    Ok(config)
}
