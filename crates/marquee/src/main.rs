//! marquee CLI - static site builder for small marketing sites.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use marquee_static::Task;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "Static site builder for small marketing sites")]
#[command(version)]
pub struct Cli {
    /// Command to run; builds everything when omitted
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to site.toml config file
    #[arg(short, long, default_value = "site.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Compile the stylesheet
    CompileStyles,

    /// Bundle scripts into one file
    BundleScripts,

    /// Copy images, library scripts and enhanced views
    CopyAssets,

    /// Fetch and aggregate upcoming events
    FetchEvents {
        /// Print the aggregated events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch events, then render every page
    GeneratePages,

    /// Rebuild on change and live-reload connected browsers
    Watch {
        /// Port to listen on (defaults to config or 35729)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open the site in a browser
        #[arg(long)]
        open: bool,
    },

    /// Run every task: styles, scripts, assets, events and pages
    Build {
        /// Output directory (defaults to config or "target")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command.unwrap_or(Commands::Build { output: None }) {
        Commands::Init { yes } => {
            commands::init::run(&PathBuf::from("."), yes).await?;
        }
        Commands::CompileStyles => commands::build::run_task(&cli.config, Task::CompileStyles).await?,
        Commands::BundleScripts => commands::build::run_task(&cli.config, Task::BundleScripts).await?,
        Commands::CopyAssets => commands::build::run_task(&cli.config, Task::CopyAssets).await?,
        Commands::FetchEvents { json } => {
            commands::build::fetch_events(&cli.config, json).await?;
        }
        Commands::GeneratePages => commands::build::run_task(&cli.config, Task::GeneratePages).await?,
        Commands::Watch { port, open } => {
            commands::watch::run(&cli.config, port, open).await?;
        }
        Commands::Build { output } => {
            commands::build::run(&cli.config, output).await?;
        }
    }

    Ok(())
}
