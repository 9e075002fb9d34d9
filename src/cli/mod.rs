//! CLI module for Steward
//!
//! Provides command-line interface parsing for the steward-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Steward - workflow execution with approval gates
///
/// Runs declarative workflows made of automated action steps and
/// human approval gates, persisting every transition.
#[derive(Parser, Debug)]
#[command(
    name = "steward-server",
    version,
    about = "Steward - workflow execution with approval gates",
    long_about = "Runs declarative workflows made of automated action steps and multi-party\n\
                  approval gates. Every transition is persisted; executions suspend on\n\
                  approval steps and resume when votes arrive.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a config.",
    after_help = "EXAMPLES:\n    \
                  steward-server init                  # Scaffold steward.toml\n    \
                  steward-server                       # Start the server (requires steward.toml)\n    \
                  steward-server config --validate     # Check the configuration\n    \
                  steward-server workflow list         # List configured workflows\n    \
                  steward-server --config my.toml      # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "steward.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a starter steward.toml, .env.example and data directory
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Skip the sample workflow
        #[arg(short, long)]
        minimal: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Start the HTTP server (the default)
    Serve,

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Inspect configured workflows
    #[command(subcommand)]
    Workflow(WorkflowCommands),
}

/// Workflow inspection subcommands
#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// List all configured workflows
    List,

    /// Show the steps of one workflow
    Show {
        /// Workflow id
        id: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
