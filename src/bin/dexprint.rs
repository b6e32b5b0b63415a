//! Dexprint CLI - fingerprint evaluation, resolution and minimal feature search
//!
//! Loads a decoded method listing, evaluates fingerprint pattern text against
//! it and reports the smallest feature sets that identify a method.

use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eval(args) => {
            cli::eval_command(args).await?;
        }
        Commands::Solve(args) => {
            cli::solve_command(args).await?;
        }
        Commands::Features(args) => {
            cli::features_command(args).await?;
        }
        Commands::PrintDefaultConfig => {
            cli::print_default_config().await?;
        }
        Commands::ValidateConfig(args) => {
            cli::validate_config(args).await?;
        }
    }

    Ok(())
}
