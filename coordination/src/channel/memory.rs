//! In-process channel log with broadcast of new messages.
//!
//! Several bots in one process each get an [`InMemoryClient`] bound to their
//! own account and a broadcast receiver that plays the role of the chat
//! surface's "message created" event.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{Author, ChannelError, ChannelLog, LogMessage, MessageHandle, MessageId};

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A message was appended.
    Created(LogMessage),
    /// A message was edited in place. Never triggers a turn.
    Edited(LogMessage),
}

impl ChannelEvent {
    pub fn message(&self) -> &LogMessage {
        match self {
            Self::Created(m) | Self::Edited(m) => m,
        }
    }
}

struct Inner {
    messages: RwLock<Vec<LogMessage>>,
    sender: broadcast::Sender<ChannelEvent>,
}

/// Shared append-only log. Cheap to clone; clones see the same log.
#[derive(Clone)]
pub struct InMemoryChannel {
    inner: Arc<Inner>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::from_messages(Vec::new())
    }

    /// Seed the log with existing history (e.g. a replay file).
    pub fn from_messages(messages: Vec<LogMessage>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                messages: RwLock::new(messages),
                sender,
            }),
        }
    }

    /// A view of the log that posts as `author`.
    pub fn client(&self, author: Author) -> InMemoryClient {
        InMemoryClient {
            channel: self.clone(),
            author,
        }
    }

    /// Subscribe to channel events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.sender.subscribe()
    }

    /// Full copy of the log, oldest first.
    pub async fn snapshot(&self) -> Vec<LogMessage> {
        self.inner.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.messages.read().await.is_empty()
    }

    async fn push(&self, author: &Author, text: &str) -> MessageHandle {
        let mut messages = self.inner.messages.write().await;
        let id = messages.last().map_or(1, |m| m.id + 1);
        let message = LogMessage {
            id,
            author: author.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        messages.push(message.clone());

        // Sent under the write lock so event order matches log order.
        match self.inner.sender.send(ChannelEvent::Created(message)) {
            Ok(count) => debug!(message_id = id, receivers = count, "Message appended"),
            Err(_) => debug!(message_id = id, "Message appended (no receivers)"),
        }
        MessageHandle { id }
    }

    async fn replace(
        &self,
        author: &Author,
        handle: &MessageHandle,
        text: &str,
    ) -> Result<(), ChannelError> {
        let mut messages = self.inner.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == handle.id)
            .ok_or(ChannelError::UnknownMessage(handle.id))?;
        if message.author.id != author.id {
            return Err(ChannelError::NotAuthor(handle.id));
        }
        message.text = text.to_string();
        let _ = self.inner.sender.send(ChannelEvent::Edited(message.clone()));
        Ok(())
    }

    async fn window(&self, window: usize, before: Option<MessageId>) -> Vec<LogMessage> {
        let messages = self.inner.messages.read().await;
        let end = match before {
            Some(id) => messages.partition_point(|m| m.id < id),
            None => messages.len(),
        };
        let start = end.saturating_sub(window);
        messages[start..end].to_vec()
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// One account's connection to an [`InMemoryChannel`].
#[derive(Clone)]
pub struct InMemoryClient {
    channel: InMemoryChannel,
    author: Author,
}

impl InMemoryClient {
    pub fn channel(&self) -> &InMemoryChannel {
        &self.channel
    }
}

#[async_trait]
impl ChannelLog for InMemoryClient {
    fn account(&self) -> &Author {
        &self.author
    }

    async fn append(&self, text: &str) -> Result<MessageHandle, ChannelError> {
        Ok(self.channel.push(&self.author, text).await)
    }

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), ChannelError> {
        self.channel.replace(&self.author, handle, text).await
    }

    async fn fetch(
        &self,
        window: usize,
        before: Option<MessageId>,
    ) -> Result<Vec<LogMessage>, ChannelError> {
        Ok(self.channel.window(window, before).await)
    }
}
