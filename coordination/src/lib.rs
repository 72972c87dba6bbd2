//! Decentralized debate coordination for chat bots.
//!
//! Several independent bot processes share one channel and nothing else.
//! This library provides:
//! - the marker wire format bots use to hand the floor to each other
//! - deterministic turn scheduling and history reconstruction
//! - a moderator consensus check between rounds
//! - a per-bot turn driver wired to a channel log and a model capability
//!
//! # Usage
//!
//! ```bash
//! # Run a debate between in-process bots with scripted models
//! debate-bot simulate --topic "Is remote work here to stay?" --offline
//!
//! # Inspect a saved channel log
//! debate-bot replay channel.json
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod channel;
pub mod config;
pub mod debate;
pub mod model;

// Re-export key channel types
pub use channel::{
    Author, ChannelError, ChannelEvent, ChannelLog, InMemoryChannel, InMemoryClient, LogMessage,
    MessageHandle, MessageId,
};

// Re-export key config types
pub use config::{BotConfig, BotRole, ConfigFile, DebateSettings};

// Re-export key debate types
pub use debate::{
    ConsensusOutcome, DebateError, DebateStart, DebateState, DebateStatus, DriverOutcome,
    HistoryReconstructor, ParticipantRegistry, Turn, TurnDriver, TurnScheduler,
};

// Re-export key model types
pub use model::{ChatModel, ModelCapability, ModelError, Persona, Provider, ScriptedModel};
