mod api;
mod cli;
mod config;
mod error;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::models::{CompetitionId, TeamId};

#[derive(Parser)]
#[command(name = "sniperbet")]
#[command(about = "Daily football fixtures enriched with team form, standings and live data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Enrich today's fixtures
    Today {
        /// Comma-separated competition ids (defaults to COMPETITIONS)
        #[arg(short, long, value_delimiter = ',')]
        competitions: Option<Vec<CompetitionId>>,
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show a team's recent form
    Form {
        #[arg(short, long)]
        team: TeamId,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a team's rank in a competition
    Rank {
        #[arg(short, long)]
        competition: CompetitionId,
        #[arg(short, long)]
        team: TeamId,
    },
    /// Look up live telemetry for a match, e.g. "Arsenal x Chelsea"
    Live {
        #[arg(short, long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(config.server.port);
            tracing::info!("Starting fixture enrichment API on port {}", port);
            api::serve(&config, port).await?;
        }
        Some(Commands::Today { competitions, format }) => {
            cli::show_today(&config, competitions, format).await?;
        }
        Some(Commands::Form { team, limit }) => {
            cli::show_form(&config, team, limit).await?;
        }
        Some(Commands::Rank { competition, team }) => {
            cli::show_rank(&config, competition, team).await?;
        }
        Some(Commands::Live { query }) => {
            cli::show_live(&config, &query).await?;
        }
        None => {
            tracing::info!("Starting fixture enrichment API on port {}", config.server.port);
            api::serve(&config, config.server.port).await?;
        }
    }

    Ok(())
}
