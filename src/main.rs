use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use plextwatch::cli::{actions, collect, players, portals, stats};
use plextwatch::config::Config;
use plextwatch::store::StateStore;

#[derive(Parser)]
#[command(name = "plextwatch")]
#[command(about = "Ingests the Intel activity feed into portal, player and action state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "plextwatch.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and apply new feed records once
    Collect {
        /// Replay a saved getPlexts response instead of calling the feed
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Collect repeatedly on a fixed interval
    Watch {
        /// Seconds between runs
        #[arg(short, long, default_value_t = 60)]
        interval: u64,

        /// Stop after this many runs
        #[arg(long)]
        ticks: Option<u32>,

        /// Replay a saved getPlexts response instead of calling the feed
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// List portals
    Portals {
        /// Filter by team code (R, E, M, N)
        #[arg(short, long)]
        team: Option<String>,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// List recent actions
    Actions {
        /// Filter by player id
        #[arg(short, long)]
        player: Option<String>,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// List players
    Players {
        /// Only players seen deploying level 8 resonators
        #[arg(long)]
        over_lv8: bool,
    },

    /// Show statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;

    // Initialize store
    let store = StateStore::open(&config.database_path())?;

    match cli.command {
        Commands::Collect { replay } => {
            collect::run(&store, &config, replay.as_deref())?;
        }
        Commands::Watch {
            interval,
            ticks,
            replay,
        } => {
            collect::watch(
                &store,
                &config,
                replay.as_deref(),
                Duration::from_secs(interval),
                ticks,
            )?;
        }
        Commands::Portals { team, limit } => {
            portals::run(&store, team, limit)?;
        }
        Commands::Actions { player, limit } => {
            actions::run(&store, player, limit)?;
        }
        Commands::Players { over_lv8 } => {
            players::run(&store, over_lv8)?;
        }
        Commands::Stats => {
            stats::run(&store)?;
        }
    }

    Ok(())
}
