//! Output formatting for the dexprint commands.

use owo_colors::OwoColorize;
use serde::Serialize;

use dexprint_rs::core::featureset::{FeatureCategory, FeatureVector};
use dexprint_rs::script::Severity;
use dexprint_rs::{EvaluationReport, ReportStatus, SolverReport};

use crate::cli::args::OutputFormat;

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an evaluation report.
pub fn print_evaluation(report: &EvaluationReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            print_evaluation_text(report);
            Ok(())
        }
    }
}

fn print_evaluation_text(report: &EvaluationReport) {
    let message = report.message();
    match &report.status {
        ReportStatus::Found { method } => {
            println!("{} {}", "✅".bright_green(), message.bright_green().bold());
            println!("   {} {}", "Descriptor:".dimmed(), method.id);
            println!("   {} {}", "Position:".dimmed(), method.position);
        }
        ReportStatus::Evaluated => {
            println!("{} {}", "✅".bright_green(), message.bright_green().bold());
        }
        ReportStatus::Ambiguous { candidates } => {
            println!("{} {}", "⚠️ ".yellow(), message.yellow().bold());
            for candidate in candidates {
                println!("   • {candidate}");
            }
        }
        ReportStatus::NotFound | ReportStatus::WrongValueType { .. } => {
            println!("{} {}", "⚠️ ".yellow(), message.yellow().bold());
        }
        ReportStatus::CompileFailure
        | ReportStatus::RuntimeFailure { .. }
        | ReportStatus::ResolutionFailed { .. } => {
            println!("{} {}", "❌".red(), message.red().bold());
        }
    }

    if let Some(fingerprint) = &report.fingerprint {
        println!("   {} {}", "Fingerprint:".dimmed(), fingerprint);
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!("{}", "Diagnostics".bright_blue().bold());
        for diagnostic in &report.diagnostics {
            let line = diagnostic.to_string();
            match diagnostic.severity {
                Severity::Error => println!("  {}", line.red()),
                Severity::Warning => println!("  {}", line.yellow()),
                Severity::Info => println!("  {}", line.dimmed()),
            }
        }
    }
    println!("{}", format!("Completed in {}ms", report.elapsed_ms).dimmed());
}

/// Print a solver report.
pub fn print_solver_report(
    report: &SolverReport,
    format: OutputFormat,
    limit: usize,
    as_pattern: bool,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    println!(
        "{} {}",
        "🎯 Minimal feature sets for".bright_blue().bold(),
        report.target.to_string().cyan()
    );
    println!(
        "   {} {} of {}{}",
        "Features considered:".dimmed(),
        report.features_considered,
        report.feature_count,
        if report.truncated { " (truncated)" } else { "" }
    );

    if report.subsets.is_empty() {
        println!();
        println!(
            "{}",
            "No feature subset distinguishes this method".yellow().bold()
        );
        for other in &report.indistinguishable_from {
            println!("   • {other}");
        }
    } else {
        println!();
        for (rank, subset) in report.subsets.iter().take(limit).enumerate() {
            if as_pattern {
                println!("{:>3}. {}", rank + 1, subset.to_pattern_text());
            } else {
                println!("{:>3}. [{}] {}", rank + 1, subset.len(), subset);
            }
        }
        if report.subsets.len() > limit {
            println!(
                "{}",
                format!("     ... {} more", report.subsets.len() - limit).dimmed()
            );
        }
    }

    println!();
    if !report.complete {
        println!(
            "{}",
            "⚠️  Search stopped early; larger subsets were not examined".yellow()
        );
    }
    println!(
        "{}",
        format!(
            "{} candidates evaluated, {} redundant, {} subsumed, {} levels in {}ms",
            report.stats.candidates_evaluated,
            report.stats.pruned_redundant,
            report.stats.pruned_subsumed,
            report.stats.levels,
            report.elapsed_ms
        )
        .dimmed()
    );
    Ok(())
}

/// Print a feature vector.
pub fn print_features(
    vector: &FeatureVector,
    format: OutputFormat,
    as_pattern: bool,
) -> anyhow::Result<()> {
    match (format, as_pattern) {
        (OutputFormat::Json, _) => print_json(vector),
        (OutputFormat::Text, true) => {
            println!("{}", vector.to_pattern_text());
            Ok(())
        }
        (OutputFormat::Text, false) => {
            println!(
                "{} {}",
                "📋 Features of".bright_blue().bold(),
                vector.method.to_string().cyan()
            );
            for (index, feature) in vector.iter().enumerate() {
                println!("{:>4}  {}", index.to_string().dimmed(), feature);
            }
            let summary: Vec<String> = FeatureCategory::ALL
                .iter()
                .filter_map(|&category| match vector.category_count(category) {
                    0 => None,
                    n => Some(format!("{category:?}={n}")),
                })
                .collect();
            println!("{}", format!("{} features: {}", vector.len(), summary.join(", ")).dimmed());
            Ok(())
        }
    }
}
