use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use mentionbot::commands;

#[derive(Parser, Debug)]
#[command(
    name = "mentionbot",
    version,
    about = "Plugin-driven mention-reply bot",
    long_about = "A long-running bot that polls for mentions and dispatches them to plugins"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(
        short,
        long,
        env = "MENTIONBOT_CONFIG",
        default_value = "config.json",
        global = true
    )]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot until interrupted
    Run,

    /// Verify credentials and print the authenticated identity
    Whoami,

    /// Post a one-off status
    Post {
        /// Text to post
        #[arg(required = true)]
        text: String,

        /// URL or ID of the status to reply to
        #[arg(long)]
        reply_to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Parse command line arguments
    let args = Cli::parse();

    if args.verbose {
        debug!("Verbose mode enabled");
    }

    match args.command {
        Commands::Run => commands::run::execute(&args.config).await?,
        Commands::Whoami => commands::whoami::execute(&args.config).await?,
        Commands::Post { text, reply_to } => {
            commands::post::execute(&args.config, &text, reply_to.as_deref()).await?
        }
    }

    Ok(())
}
