//! AI debate bots that coordinate only through a shared channel log.
//!
//! # Usage
//!
//! ```bash
//! # Offline debate with scripted models
//! debate-bot simulate --topic "Should cities ban cars?" --rounds 2 --offline
//!
//! # Hosted models (needs ANTHROPIC_API_KEY, OPENAI_API_KEY, GOOGLE_AI_API_KEY)
//! debate-bot simulate --topic "Tabs or spaces?" --config bots.toml --save run.json
//!
//! # Inspect a saved log
//! debate-bot replay run.json
//! ```

mod replay;
mod simulation;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coordination::channel::LogMessage;
use coordination::config::ConfigFile;
use coordination::debate::DebateState;
use tracing::info;

use simulation::SimulationOptions;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (`[debate]` table and `[[bots]]` entries)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a debate between in-process bots on an in-memory channel
    Simulate {
        /// What the bots argue about
        #[arg(long)]
        topic: String,

        /// Number of rounds (clamped to 1..=max_rounds)
        #[arg(long)]
        rounds: Option<u32>,

        /// Article text the debate is about
        #[arg(long)]
        article: Option<String>,

        /// Use scripted models instead of hosted APIs
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Human message posted after a bot turn (repeatable)
        #[arg(long)]
        interject: Vec<String>,

        /// Seconds to wait for the debate to finish
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,

        /// Write the final channel log as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Reconstruct a debate from a saved JSON log
    Replay {
        /// JSON array of channel messages
        file: PathBuf,
    },
}

fn print_log(log: &[LogMessage]) {
    for message in log {
        println!("── #{} {} ──", message.id, message.author.name);
        println!("{}\n", message.text);
    }
}

fn print_state(state: &DebateState) {
    println!("{}", state.status_line());
    if let Some(article) = &state.article_context {
        println!("article: {}", article);
    }
    println!();
    println!("{}", state.transcript());
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    info!(
        participants = ?config.debate.participants,
        moderator = config.debate.moderator.as_deref().unwrap_or("none"),
        "Debate bots configured"
    );

    match args.command {
        Command::Simulate {
            topic,
            rounds,
            article,
            offline,
            interject,
            timeout_secs,
            save,
        } => {
            let options = SimulationOptions {
                topic,
                rounds,
                article,
                offline,
                interjections: interject,
                timeout: Duration::from_secs(timeout_secs),
            };
            let report = simulation::run(&config, options).await?;
            print_log(&report.log);
            println!("{}", report.state.status_line());
            if let Some(path) = save {
                replay::save_log(&path, &report.log)?;
                info!(path = %path.display(), messages = report.log.len(), "Saved channel log");
            }
        }
        Command::Replay { file } => {
            let log = replay::load_log(&file)?;
            let state = replay::reconstruct(&log, &config.debate)?;
            print_state(&state);
        }
    }

    Ok(())
}
