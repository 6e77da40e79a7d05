//! # Rival Radar CLI (`rival`)
//!
//! Competitive analysis over a CSV of competitor profiles, answered by a
//! retrieval-augmented pipeline on the Cohere API.
//!
//! ## Usage
//!
//! ```bash
//! rival [--config rival.toml] [command]
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rival chat` | Interactive session (default) |
//! | `rival ask "<query>"` | Answer one question and exit |
//! | `rival serve` | Start the web interface |
//! | `rival data [--init]` | Validate the CSV; `--init` writes the demo dataset |
//!
//! `COHERE_API_KEY` must be set for `chat`, `ask` and `serve`. A `.env`
//! file in the working directory is loaded first.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rival_radar::{cli, config, server, telemetry};

/// Rival Radar: ask questions about your competitors.
#[derive(Parser)]
#[command(
    name = "rival",
    about = "Rival Radar: retrieval-augmented competitive analysis",
    version,
    long_about = "Rival Radar loads competitor profiles from a CSV file, indexes them with \
    Cohere embeddings, and answers questions about products, marketing and financials \
    from the most relevant profiles."
)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// Defaults to `./rival.toml` when that file exists. Environment
    /// variables override file values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session.
    Chat,

    /// Answer a single question and exit.
    Ask {
        /// The question to ask.
        query: String,
    },

    /// Start the web interface.
    Serve {
        /// Address to bind, overriding `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Load and validate the competitor CSV without calling the API.
    Data {
        /// Write the demo dataset if the file does not exist.
        #[arg(long)]
        init: bool,

        /// CSV path, overriding `[data].csv_path`.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    let default_level = match command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    telemetry::init_logging(default_level);

    let mut cfg = config::load_config(cli.config.as_deref())?;

    match command {
        Commands::Chat => cli::run_chat(&cfg).await?,
        Commands::Ask { query } => cli::run_ask(&cfg, &query).await?,
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Data { init, csv } => {
            let path = csv.unwrap_or_else(|| cfg.data.csv_path.clone());
            cli::run_data(&path, init)?;
        }
    }

    Ok(())
}
