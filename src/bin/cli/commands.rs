//! Command execution for the dexprint binary.

use std::path::Path;

use anyhow::Context;
use owo_colors::OwoColorize;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use dexprint_rs::{
    DexprintConfig, EvaluationReport, FingerprintEngine, JsonCorpusSource, MethodId, ReportStatus,
};

use crate::cli::args::{CorpusArgs, EvalArgs, FeaturesArgs, SolveArgs, ValidateConfigArgs};
use crate::cli::config_layer::{build_layered_config, ApplyCliOverrides};
use crate::cli::output::{print_evaluation, print_features, print_solver_report};

async fn load_engine(corpus: &CorpusArgs, config: DexprintConfig) -> anyhow::Result<FingerprintEngine> {
    if !corpus.corpus.exists() {
        anyhow::bail!("Corpus listing does not exist: {}", corpus.corpus.display());
    }
    let source = JsonCorpusSource::new(&corpus.corpus);
    let engine = FingerprintEngine::load(config, &source)
        .await
        .with_context(|| format!("Failed to load corpus from {}", corpus.corpus.display()))?;
    info!("Loaded {} methods", engine.corpus().len());
    Ok(engine)
}

async fn read_pattern_text(args: &EvalArgs) -> anyhow::Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    match args.file.as_deref() {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read pattern file {}", path.display())),
        _ => {
            debug!("Reading pattern text from stdin");
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read pattern text from stdin")?;
            Ok(text)
        }
    }
}

/// Exit status for a finished evaluation: zero only when the caller got what they asked for.
fn exit_code(report: &EvaluationReport, resolve: bool) -> i32 {
    match (&report.status, resolve) {
        (ReportStatus::Found { .. }, true) | (ReportStatus::Evaluated, false) => 0,
        (ReportStatus::NotFound | ReportStatus::Ambiguous { .. }, _) => 2,
        _ => 1,
    }
}

/// Evaluate pattern text and optionally resolve the resulting fingerprint.
pub async fn eval_command(args: EvalArgs) -> anyhow::Result<()> {
    let config = build_layered_config(&args.corpus, Some(&args as &dyn ApplyCliOverrides))?;
    let text = read_pattern_text(&args).await?;
    let engine = load_engine(&args.corpus, config).await?;

    let resolve = !args.no_resolve;
    let report = if resolve {
        engine.evaluate_and_resolve(text).await?
    } else {
        engine.evaluate(text).await?
    };

    print_evaluation(&report, args.corpus.format)?;

    let code = exit_code(&report, resolve);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Find minimal distinguishing feature sets for one method.
pub async fn solve_command(args: SolveArgs) -> anyhow::Result<()> {
    let config = build_layered_config(&args.corpus, Some(&args as &dyn ApplyCliOverrides))?;
    let engine = load_engine(&args.corpus, config).await?;

    let report = engine.solve(MethodId::from(args.method.as_str())).await?;
    print_solver_report(&report, args.corpus.format, args.limit, args.pattern)?;

    if report.subsets.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}

/// Print the feature vector of one method.
pub async fn features_command(args: FeaturesArgs) -> anyhow::Result<()> {
    let config = build_layered_config(&args.corpus, None)?;
    let engine = load_engine(&args.corpus, config).await?;

    let vector = engine.features(&MethodId::from(args.method.as_str()))?;
    print_features(vector, args.corpus.format, args.pattern)
}

/// Print default configuration in YAML format
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default dexprint configuration".dimmed());
    println!("{}", "# Save this to .dexprint.yml or pass it with --config".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&DexprintConfig::default())?;
    println!("{yaml_output}");
    Ok(())
}

/// Validate a dexprint configuration file
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        args.config.display().to_string().cyan()
    );
    println!();

    let config = match DexprintConfig::from_yaml_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "❌ Failed to load configuration:".red(), e);
            println!();
            println!("{}", "💡 Common issues:".bright_blue().bold());
            println!("   • Check YAML syntax (indentation, colons, quotes)");
            println!("   • Section names are extractor, solver, evaluation, resolver, engine");
            println!("   • Run 'dexprint print-default-config' for a valid starting point");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("{} {}", "❌ Invalid configuration:".red(), e);
        std::process::exit(1);
    }

    println!("{}", "✅ Configuration is valid!".bright_green().bold());
    println!();
    println!("{}", "📊 Configuration Summary:".bright_blue().bold());
    println!("   {} {}", "Max features:".dimmed(), config.solver.max_features);
    println!(
        "   {} {}",
        "Max subset size:".dimmed(),
        config
            .solver
            .max_subset_size
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );
    println!("   {} {}", "Worker threads:".dimmed(), config.engine.worker_threads);
    println!(
        "   {} {}",
        "Scratch root:".dimmed(),
        config.resolver.scratch_root.display()
    );

    if args.show {
        println!();
        println!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}
