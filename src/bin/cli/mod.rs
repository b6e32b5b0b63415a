//! CLI Module Organization
//!
//! - args: CLI argument structures
//! - commands: command execution
//! - config_layer: defaults, configuration file and flag layering
//! - output: text and JSON rendering of reports

pub mod args;
pub mod commands;
pub mod config_layer;
pub mod output;

pub use args::*;
pub use commands::*;
