mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use masterymap_core::AppConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "masterymap")]
#[command(about = "MasteryMap learning platform API server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Overrides MASTERYMAP_PORT
        #[arg(short, long)]
        port: Option<u16>,
        /// Overrides MASTERYMAP_HOST
        #[arg(short = 'H', long)]
        host: Option<String>,
    },
    /// Check that the database answers `SELECT 1`, retrying with backoff
    CheckDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            commands::serve::run(config).await?;
        },
        Commands::CheckDb => commands::check_db::run(&config).await?,
    }

    Ok(())
}
