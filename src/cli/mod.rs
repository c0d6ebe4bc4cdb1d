//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod config_cmd;
mod helpers;
mod review;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "docroute")]
#[command(about = "Document field extraction with confidence-based review routing")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Per-request overrides shared by both analyze commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Analysis model id (defaults to the configured model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Confidence threshold for acceptance, 0.0 to 1.0
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Correlation id to attach to the request
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Document type label recorded with the result
    #[arg(long)]
    pub document_type: Option<String>,

    /// Caller metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,

    /// Print the raw result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind address: port, host, or host:port (defaults to the configured bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Analyze a document by URL
    Analyze {
        /// HTTPS URL of the document
        url: String,
        #[command(flatten)]
        args: AnalyzeArgs,
    },

    /// Analyze a local document file
    AnalyzeFile {
        /// Path to the document
        path: PathBuf,
        /// Content type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
        #[command(flatten)]
        args: AnalyzeArgs,
    },

    /// Check analysis service and review storage health
    Health {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List documents waiting for review
    Pending {
        /// How many days back to look
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stored review metadata for an analysis
    Show {
        /// Analysis id returned by an analyze call
        analysis_id: String,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        ignore_env: false,
    };
    let (settings, _config) = load_settings(options).await?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Analyze { url, args } => analyze::cmd_analyze_url(&settings, url, args).await,
        Commands::AnalyzeFile {
            path,
            content_type,
            args,
        } => analyze::cmd_analyze_file(&settings, &path, content_type, args).await,
        Commands::Health { json } => review::cmd_health(&settings, json).await,
        Commands::Pending { days, json } => review::cmd_pending(&settings, days, json).await,
        Commands::Show { analysis_id } => review::cmd_show(&settings, &analysis_id).await,
        Commands::Config { json } => config_cmd::cmd_config_show(&settings, json),
    }
}
