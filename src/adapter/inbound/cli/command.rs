//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Marketplace gift delivery engine tooling
#[derive(Parser, Debug)]
#[command(name = "giftcourier")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration, catalog, bundles and message templates
    Check,
    /// List gift codes and bundles with their prices
    Catalog,
    /// List message template keys and whether they are overridden
    Messages,
}
