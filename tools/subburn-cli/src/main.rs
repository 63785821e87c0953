//! Subburn CLI: burn word-timed captions into videos.
//!
//! Usage:
//!   subburn render <VIDEO> --alignment <JSON> --font <FONT>   Render captions
//!   subburn fonts                                             List available fonts
//!   subburn check                                             Check external tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "subburn",
    about = "Burn animated captions into video files",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Burn captions from an alignment file into a video
    Render(commands::render::RenderArgs),

    /// List fonts in the font directory
    Fonts {
        /// Font directory (defaults to the configured one)
        #[arg(long)]
        font_dir: Option<PathBuf>,
    },

    /// Check that the external tools are runnable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = subburn_common::config::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    subburn_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render(args) => commands::render::run(args, config).await,
        Commands::Fonts { font_dir } => commands::fonts::run(font_dir, &config),
        Commands::Check => commands::check::run(&config),
    }
}
