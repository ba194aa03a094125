//! CLI Module
//!
//! Command-line interface for appc.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// appc - app-tree compiler front-end, exercised from the command line
#[derive(Parser, Debug)]
#[command(
    name = "appc",
    version,
    about = "Static analysis and overlay generation for an Encore-style app tree",
    long_about = "appc walks a Go app tree, resolves its packages, extracts endpoint and \
                  resource declarations, and emits build metadata plus a source overlay."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline and report diagnostics
    Check {
        /// Root directory of the app tree
        #[arg(default_value = ".")]
        app_root: PathBuf,

        /// Output format for diagnostics
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,

        /// Optional path to an `appc.toml` config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the pipeline and write the rendered overlay to a directory
    EmitOverlay {
        /// Root directory of the app tree
        app_root: PathBuf,

        /// Directory the rewritten sources are written into
        workdir: PathBuf,

        /// Optional path to an `appc.toml` config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the build metadata document for an app tree as JSON
    Metadata {
        /// Root directory of the app tree
        #[arg(default_value = ".")]
        app_root: PathBuf,

        /// Optional path to an `appc.toml` config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default `appc.toml` configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Human-readable with file:line:column context
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON output
    Json,
}

impl Cli {
    /// Parse CLI arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Terminal output helpers
pub mod output {
    use appc_core::Diagnostic;

    /// Print a diagnostic in `path:line:col: message` form
    pub fn print_diagnostic(diagnostic: &Diagnostic, path: &str) {
        println!("{}", diagnostic.format(path));
    }

    /// Print a one-line summary of a check run
    pub fn print_summary(packages_checked: usize, errors: usize, warnings: usize) {
        println!();
        if errors == 0 && warnings == 0 {
            println!("checked {packages_checked} packages, no issues found");
        } else {
            println!("checked {packages_checked} packages: {errors} errors, {warnings} warnings");
        }
    }
}
