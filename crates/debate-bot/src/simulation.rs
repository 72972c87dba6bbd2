//! Run a whole debate in one process.
//!
//! Every bot gets its own driver task, its own account on a shared
//! [`InMemoryChannel`] and its own event subscription, so the bots only ever
//! learn about each other through the log.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use coordination::channel::{Author, ChannelEvent, ChannelLog, InMemoryChannel, LogMessage};
use coordination::config::{BotConfig, BotRole, ConfigFile};
use coordination::debate::protocol::parse_turn;
use coordination::debate::{DebateState, DriverOutcome, TurnDriver};
use coordination::model::{ModelCapability, ScriptedModel};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Display name used for `--interject` messages.
pub const AUDIENCE: &str = "audience";

/// What to simulate.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub topic: String,
    pub rounds: Option<u32>,
    pub article: Option<String>,
    /// Use scripted models instead of hosted APIs.
    pub offline: bool,
    /// Human messages, posted one after each of the first bot turns.
    pub interjections: Vec<String>,
    /// Give up if the debate has not finished by then.
    pub timeout: Duration,
}

/// Final log and reconstructed state.
#[derive(Debug)]
pub struct SimulationReport {
    pub log: Vec<LogMessage>,
    pub state: DebateState,
}

/// Offline stand-in for a bot's model.
fn scripted_model(bot: &BotConfig) -> ScriptedModel {
    match bot.role {
        BotRole::Participant => ScriptedModel::new(bot.identifier.clone()),
        BotRole::Moderator => ScriptedModel::new(bot.identifier.clone())
            .with_fallback(Some("NO_CONSENSUS: Check #{n} found the bots still split.")),
    }
}

fn build_model(bot: &BotConfig, offline: bool) -> Result<Arc<dyn ModelCapability>> {
    if offline {
        return Ok(Arc::new(scripted_model(bot)));
    }
    Ok(Arc::new(bot.chat_model()?))
}

/// Spawn the event loop for one bot.
fn spawn_driver(driver: Arc<TurnDriver>, channel: &InMemoryChannel) -> JoinHandle<()> {
    let mut rx = channel.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(participant = driver.identifier(), skipped, "Driver lagged behind channel");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match driver.handle_event(&event).await {
                Ok(DriverOutcome::Ignored(_)) => {}
                Ok(outcome) => debug!(participant = driver.identifier(), ?outcome, "Handled event"),
                Err(e) => warn!(participant = driver.identifier(), error = %e, "Event handling failed"),
            }
        }
    })
}

/// Run one debate to completion (or stall) and return the log.
pub async fn run(config: &ConfigFile, options: SimulationOptions) -> Result<SimulationReport> {
    let settings = config.debate.clone();
    let registry = settings.registry()?;
    let bots = config.bots_or_default();

    for id in registry
        .participants()
        .iter()
        .map(String::as_str)
        .chain(registry.moderator())
    {
        if !bots.iter().any(|b| b.identifier == id) {
            bail!("No bot configured for {}", id);
        }
    }

    let channel = InMemoryChannel::new();
    let mut watcher = channel.subscribe();

    let mut drivers = Vec::new();
    for bot in &bots {
        let model = build_model(bot, options.offline)
            .with_context(|| format!("Failed to set up model for {}", bot.identifier))?;
        let driver = TurnDriver::new(
            bot.identifier.clone(),
            Arc::new(channel.client(Author::bot(bot.identifier.clone()))),
            model,
            registry.clone(),
            settings.clone(),
        )
        .with_context(|| format!("Failed to set up driver for {}", bot.identifier))?;
        debug!(participant = driver.identifier(), role = %driver.role(), "Driver ready");
        drivers.push(Arc::new(driver));
    }

    // The moderator announces debates when there is one, else the first speaker.
    let starter = drivers
        .iter()
        .find(|d| d.role() == BotRole::Moderator)
        .or_else(|| drivers.iter().find(|d| d.identifier() == registry.first()))
        .cloned()
        .context("No bot available to start the debate")?;

    let tasks: Vec<JoinHandle<()>> = drivers
        .iter()
        .map(|d| spawn_driver(d.clone(), &channel))
        .collect();

    info!(
        topic = %options.topic,
        bots = drivers.len(),
        offline = options.offline,
        "Starting simulated debate"
    );
    starter
        .start_debate(&options.topic, options.rounds, options.article.clone())
        .await
        .context("Failed to start debate")?;

    let audience = channel.client(Author::human(AUDIENCE));
    let mut interjections = options.interjections.iter();

    let finished = tokio::time::timeout(options.timeout, async {
        loop {
            let message = match watcher.recv().await {
                Ok(ChannelEvent::Created(message)) => message,
                Ok(ChannelEvent::Edited(_)) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => bail!("Channel closed"),
            };
            if !message.author.is_bot {
                continue;
            }
            if parse_turn(&message.text).is_some() {
                if let Some(text) = interjections.next() {
                    audience.append(text).await?;
                }
            }

            let state = starter.current_state().await?;
            if state.is_finished() {
                return Ok::<_, anyhow::Error>(state);
            }
        }
    })
    .await;

    for task in &tasks {
        task.abort();
    }

    let state = match finished {
        Ok(state) => state?,
        Err(_) => bail!("Debate did not finish within {:?}", options.timeout),
    };
    info!(status = %state.status, turns = state.turns().count(), "Simulated debate finished");

    Ok(SimulationReport {
        log: channel.snapshot().await,
        state,
    })
}
