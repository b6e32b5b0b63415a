//! CLI Argument Structures
//!
//! This module contains all CLI argument definitions and command structures
//! used by the dexprint binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fingerprint evaluation, resolution and minimal feature search
#[derive(Parser)]
#[command(name = "dexprint")]
#[command(version = VERSION)]
#[command(about = "Dexprint - locate Android methods by structural fingerprints")]
#[command(long_about = "
Evaluate fingerprint pattern text against a decoded method listing, and find
the smallest feature sets that identify a method uniquely.

Common Usage:

  # Evaluate a fingerprint file and resolve it against the corpus
  dexprint eval --corpus methods.json --file seek.fp

  # Evaluate inline pattern text without resolving it
  dexprint eval --corpus methods.json --no-resolve --text 'Fingerprint(name = \"seekTo\")'

  # Minimal distinguishing feature sets for one method
  dexprint solve --corpus methods.json --method 'Lcom/app/Player;->seekTo(J)V'

  # Show a method's feature vector as pattern text
  dexprint features --corpus methods.json --method 'Lcom/app/Player;->seekTo(J)V' --pattern
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate pattern text and resolve the fingerprint it produces
    Eval(EvalArgs),

    /// Find minimal distinguishing feature sets for a method
    Solve(SolveArgs),

    /// Print the feature vector of a method
    Features(FeaturesArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a dexprint configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

/// Options shared by every command that loads a corpus
#[derive(Args, Clone)]
pub struct CorpusArgs {
    /// JSON method listing of the decoded package
    #[arg(long, value_name = "PATH", env = "DEXPRINT_CORPUS")]
    pub corpus: PathBuf,

    /// Configuration file (defaults to .dexprint.yml when present)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct EvalArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Read pattern text from a file ('-' for stdin)
    #[arg(long, value_name = "PATH", conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Pattern text given inline
    #[arg(long, value_name = "PATTERN")]
    pub text: Option<String>,

    /// Only evaluate; do not resolve the fingerprint
    #[arg(long)]
    pub no_resolve: bool,

    /// Abandon evaluation after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Directory under which match sessions create scratch folders
    #[arg(long, value_name = "PATH")]
    pub scratch_root: Option<PathBuf>,
}

#[derive(Args)]
pub struct SolveArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Target method descriptor, e.g. 'Lcom/app/Player;->seekTo(J)V'
    #[arg(short, long, value_name = "DESCRIPTOR")]
    pub method: String,

    /// Hard cap on the number of target features considered
    #[arg(long)]
    pub max_features: Option<usize>,

    /// Largest subset size to examine
    #[arg(long)]
    pub max_subset_size: Option<usize>,

    /// Budget on evaluated candidate subsets
    #[arg(long)]
    pub max_candidates: Option<usize>,

    /// Show at most this many subsets in text output
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Print each subset as pattern text
    #[arg(long)]
    pub pattern: bool,
}

#[derive(Args)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Method descriptor, e.g. 'Lcom/app/Player;->seekTo(J)V'
    #[arg(short, long, value_name = "DESCRIPTOR")]
    pub method: String,

    /// Print the full vector as pattern text
    #[arg(long)]
    pub pattern: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to validate
    #[arg(short, long, value_name = "PATH")]
    pub config: PathBuf,

    /// Print every setting after validation
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text
    Text,
    /// JSON format output
    Json,
}
