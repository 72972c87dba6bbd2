//! Shared channel log, the only medium between bot processes.
//!
//! The log is append-only and totally ordered by append order. Bots read a
//! bounded window of it and append new messages; nothing else is shared.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{ChannelEvent, InMemoryChannel, InMemoryClient};

/// Position of a message in the log.
pub type MessageId = u64;

/// Errors from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Unknown message: {0}")]
    UnknownMessage(MessageId),

    #[error("Message {0} belongs to another account")]
    NotAuthor(MessageId),
}

/// Account that posted a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    /// Stable account identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the account is a bot (as reported by the chat surface).
    pub is_bot: bool,
}

impl Author {
    pub fn bot(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("bot:{}", name.to_lowercase()),
            name,
            is_bot: true,
        }
    }

    pub fn human(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("user:{}", name.to_lowercase()),
            name,
            is_bot: false,
        }
    }
}

/// One message as read back from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: MessageId,
    pub author: Author,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Handle returned by `append`, used to edit the message later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub id: MessageId,
}

/// A bot's view of the channel, bound to the bot's own account.
#[async_trait]
pub trait ChannelLog: Send + Sync {
    /// The account this view posts as.
    fn account(&self) -> &Author;

    /// Append a message authored by [`ChannelLog::account`].
    async fn append(&self, text: &str) -> Result<MessageHandle, ChannelError>;

    /// Replace the text of one of our own messages.
    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), ChannelError>;

    /// Most recent `window` messages (strictly before `before` if given),
    /// ordered oldest → newest.
    async fn fetch(
        &self,
        window: usize,
        before: Option<MessageId>,
    ) -> Result<Vec<LogMessage>, ChannelError>;
}
