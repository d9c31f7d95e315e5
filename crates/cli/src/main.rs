//! rwmod-monitor - archive quiet directories and ship them to S3

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Watch a directory tree, archive each subdirectory once it settles and
/// upload the archive to S3-compatible storage
#[derive(Parser)]
#[command(name = "rwmod-monitor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: config.toml next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor in the foreground until interrupted
    Start,
    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the config file location
    Path,
    /// Write the config template if no file exists
    Init,
    /// Print the config template
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, INFO unless RUST_LOG says otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Start => cmd::start::run(config).await,
        Commands::Config(ConfigCommands::Path) => cmd::config::run_path(config),
        Commands::Config(ConfigCommands::Init) => cmd::config::run_init(config),
        Commands::Config(ConfigCommands::Example) => {
            cmd::config::run_example();
            Ok(())
        }
    }
}
