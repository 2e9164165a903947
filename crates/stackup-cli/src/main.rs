use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "stackup",
    about = "stackup — bootstrap the application stack from a cold start",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Stack config file
    #[arg(short, long, global = true, default_value = stackup_core::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Debug-level logs for stackup crates
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the full bootstrap sequence (default)
    Up,
    /// Rescale a service group
    Scale {
        service: String,
        count: u32,
    },
    /// Delete a storage bucket
    RemoveBucket {
        name: String,
    },
    /// Resolve and print service endpoints
    Endpoints,
    /// Stop and remove every service group in the project
    Down,
    /// Write a default stackup.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) -> anyhow::Result<()> {
    let default = if verbose {
        "info,stackup=debug"
    } else {
        "info,stackup=info"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => commands::up::up(&cli.config).await,
        Commands::Scale { service, count } => {
            commands::ops::scale(&cli.config, &service, count).await
        }
        Commands::RemoveBucket { name } => commands::ops::remove_bucket(&cli.config, &name).await,
        Commands::Endpoints => commands::ops::endpoints(&cli.config).await,
        Commands::Down => commands::ops::down(&cli.config).await,
        Commands::Init { force } => commands::init::init(&cli.config, force),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose, cli.json) {
        eprintln!("stackup: bad log filter: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
