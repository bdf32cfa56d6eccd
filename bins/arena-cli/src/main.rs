mod commands;

use std::path::PathBuf;

use anyhow::Result;
use arena_common::config::ClientConfig;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "arena-cli")]
#[command(about = "Arena CLI - Run, submit and get hints on practice problems", long_about = None)]
struct Cli {
    /// Client config file (defaults to config/client.json, then environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs and results as JSON
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Problem and editor content an action operates on
#[derive(Args, Debug)]
pub struct Target {
    /// Problem slug (e.g., two-sum)
    #[arg(short, long)]
    pub slug: String,

    /// Language (e.g., python, java, cpp). Defaults to the last one used.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Source file to load into the editor. Defaults to the cached code.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the code against the problem's sample test cases
    Run {
        #[command(flatten)]
        target: Target,
    },

    /// Submit the code for grading against the hidden test set
    Submit {
        #[command(flatten)]
        target: Target,
    },

    /// Ask the assistant about the problem and the current code
    Ask {
        #[command(flatten)]
        target: Target,

        /// Question for the assistant
        #[arg(short, long)]
        question: String,
    },

    /// Show remaining usage credits
    Credits,

    /// Record engagement time until interrupted
    Watch,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::load_default()?,
    };
    debug!(api = %config.api_base_url, user = ?config.user_id, "configuration loaded");

    match cli.command {
        Commands::Run { target } => commands::run(&config, &target, cli.json).await?,
        Commands::Submit { target } => commands::submit(&config, &target, cli.json).await?,
        Commands::Ask { target, question } => {
            commands::ask(&config, &target, &question, cli.json).await?
        }
        Commands::Credits => commands::credits(&config, cli.json).await?,
        Commands::Watch => commands::watch(&config).await?,
    }

    info!("done");
    Ok(())
}
