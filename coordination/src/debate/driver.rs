//! Per-bot turn driver.
//!
//! Stateless between events: every triggering message causes a fresh fetch
//! and reconstruction, so a restarted bot behaves exactly like one that never
//! stopped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::consensus::ConsensusJudge;
use super::participants::ParticipantRegistry;
use super::prompts::{opener_prompt, participant_prompt};
use super::protocol::{
    format_failure, format_start, format_turn, neutralize_markers, normalize_topic, parse_start,
    parse_turn, truncate_chars, DebateStart, Turn, CHANNEL_CHAR_LIMIT,
};
use super::reconstruct::HistoryReconstructor;
use super::scheduler::TurnScheduler;
use super::state::DebateState;
use super::DebateError;
use crate::channel::{ChannelEvent, ChannelLog, LogMessage, MessageHandle};
use crate::config::{BotRole, DebateSettings};
use crate::model::ModelCapability;

/// Why an event did not lead to a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// We posted it.
    OwnMessage,
    /// An edit, not a new message.
    Edited,
    /// Carries no protocol marker.
    NoMarker,
    /// A marker naming someone else.
    NotAddressed,
    /// History shows the turn was already taken.
    AlreadyAnswered,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnMessage => write!(f, "own_message"),
            Self::Edited => write!(f, "edited"),
            Self::NoMarker => write!(f, "no_marker"),
            Self::NotAddressed => write!(f, "not_addressed"),
            Self::AlreadyAnswered => write!(f, "already_answered"),
        }
    }
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutcome {
    Ignored(IgnoreReason),
    /// Addressed to us, but no start marker in the history window.
    NoActiveDebate,
    /// We posted a turn.
    Posted(Turn),
    /// Our model failed; a failure message without a marker was posted.
    Stalled { error: String },
}

/// Result of [`TurnDriver::start_debate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebateStarted {
    pub start: DebateStart,
    pub handle: MessageHandle,
    /// Our opening turn, when we are the first speaker.
    pub opening: Option<DriverOutcome>,
}

/// One bot's event handler.
pub struct TurnDriver {
    identifier: String,
    role: BotRole,
    channel: Arc<dyn ChannelLog>,
    model: Arc<dyn ModelCapability>,
    registry: ParticipantRegistry,
    settings: DebateSettings,
}

impl TurnDriver {
    /// The role follows from the registry: the moderator judges, everyone
    /// else registered debates.
    pub fn new(
        identifier: impl Into<String>,
        channel: Arc<dyn ChannelLog>,
        model: Arc<dyn ModelCapability>,
        registry: ParticipantRegistry,
        settings: DebateSettings,
    ) -> Result<Self, DebateError> {
        let identifier = identifier.into();
        let role = if registry.is_moderator(&identifier) {
            BotRole::Moderator
        } else if registry.contains(&identifier) {
            BotRole::Participant
        } else {
            return Err(DebateError::UnknownParticipant(identifier));
        };
        Ok(Self {
            identifier,
            role,
            channel,
            model,
            registry,
            settings,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn role(&self) -> BotRole {
        self.role
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// Dispatch a channel event. Only newly created messages can trigger.
    pub async fn handle_event(&self, event: &ChannelEvent) -> Result<DriverOutcome, DebateError> {
        match event {
            ChannelEvent::Created(message) => self.handle_message(message).await,
            ChannelEvent::Edited(_) => Ok(DriverOutcome::Ignored(IgnoreReason::Edited)),
        }
    }

    /// React to one new message.
    pub async fn handle_message(&self, message: &LogMessage) -> Result<DriverOutcome, DebateError> {
        if message.author.id == self.channel.account().id {
            return Ok(self.ignore(message, IgnoreReason::OwnMessage));
        }

        let addressed = match parse_turn(&message.text) {
            Some(turn) => turn.addresses(&self.identifier),
            None => match parse_start(&message.text) {
                Some(start) => start.first == self.identifier,
                None => return Ok(self.ignore(message, IgnoreReason::NoMarker)),
            },
        };
        if !addressed {
            return Ok(self.ignore(message, IgnoreReason::NotAddressed));
        }

        info!(participant = %self.identifier, message_id = message.id, "Our turn in debate");

        let state = match self.current_state().await {
            Ok(state) => state,
            Err(DebateError::NoActiveDebate { scanned }) => {
                debug!(participant = %self.identifier, scanned, "Dropping turn: no active debate");
                return Ok(DriverOutcome::NoActiveDebate);
            }
            Err(e) => return Err(e),
        };

        if state.status.next_speaker() != Some(self.identifier.as_str()) {
            return Ok(self.ignore(message, IgnoreReason::AlreadyAnswered));
        }

        self.take_turn(&state).await
    }

    /// Post a start announcement; take the opening turn if we are first.
    ///
    /// `rounds` is clamped to `1..=max_rounds`, defaulting when absent.
    pub async fn start_debate(
        &self,
        topic: &str,
        rounds: Option<u32>,
        article_context: Option<String>,
    ) -> Result<DebateStarted, DebateError> {
        let topic = normalize_topic(topic);
        if topic.is_empty() {
            return Err(DebateError::EmptyTopic);
        }

        let start = DebateStart {
            topic,
            rounds: self.settings.clamp_rounds(rounds),
            first: self.registry.first().to_string(),
            article_context: article_context
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
        };
        let handle = self
            .channel
            .append(&format_start(&start, self.registry.participants()))
            .await?;
        info!(
            topic = %start.topic,
            rounds = start.rounds,
            next = %start.first,
            "Debate started"
        );

        let opening = if start.first == self.identifier {
            let state = self.current_state().await?;
            Some(self.take_turn(&state).await?)
        } else {
            None
        };

        Ok(DebateStarted {
            start,
            handle,
            opening,
        })
    }

    /// Reconstruct the debate from the latest history window.
    pub async fn current_state(&self) -> Result<DebateState, DebateError> {
        let window = self
            .channel
            .fetch(self.settings.history_window, None)
            .await?;
        HistoryReconstructor::new(&self.registry).reconstruct(&window)
    }

    async fn take_turn(&self, state: &DebateState) -> Result<DriverOutcome, DebateError> {
        match self.role {
            BotRole::Moderator => self.moderator_turn(state).await,
            BotRole::Participant => self.participant_turn(state).await,
        }
    }

    async fn participant_turn(&self, state: &DebateState) -> Result<DriverOutcome, DebateError> {
        let others = self.registry.others(&self.identifier);
        let prompt = if state.last_turn().is_none() {
            opener_prompt(&others, &state.topic, state.article_context.as_deref())
        } else {
            participant_prompt(&self.identifier, &others, state)
        };

        let content = match self.model.ask(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                let error = e.to_string();
                warn!(
                    participant = %self.identifier,
                    round = state.current_round,
                    error = %error,
                    "Model call failed, debate stalls"
                );
                self.channel
                    .append(&format_failure(&self.identifier, &error))
                    .await?;
                return Ok(DriverOutcome::Stalled { error });
            }
        };

        let round = state.current_round;
        let next = TurnScheduler::new(&self.registry).next_speaker(
            &self.identifier,
            round,
            state.total_rounds,
        )?;
        let turn = Turn {
            speaker: self.identifier.clone(),
            content: self.clean(&content),
            round,
            turn: self.ordinal(),
            next,
        };
        self.post(turn, state.total_rounds).await
    }

    async fn moderator_turn(&self, state: &DebateState) -> Result<DriverOutcome, DebateError> {
        let decision = ConsensusJudge::new(&self.registry)
            .evaluate(self.model.as_ref(), state)
            .await;
        let turn = Turn {
            speaker: self.identifier.clone(),
            content: self.clean(&decision.content()),
            round: decision.round,
            turn: self.ordinal(),
            next: decision.next,
        };
        // The banner on a final moderator turn reports rounds actually played.
        self.post(turn, decision.round).await
    }

    async fn post(&self, mut turn: Turn, total_rounds: u32) -> Result<DriverOutcome, DebateError> {
        let mut text = format_turn(&turn, total_rounds);
        let excess = text.chars().count().saturating_sub(CHANNEL_CHAR_LIMIT);
        if excess > 0 {
            let keep = turn.content.chars().count().saturating_sub(excess);
            turn.content = truncate_chars(&turn.content, keep).trim_end().to_string();
            text = format_turn(&turn, total_rounds);
        }

        self.channel.append(&text).await?;
        info!(
            speaker = %turn.speaker,
            round = turn.round,
            turn = turn.turn,
            next = turn.next.as_deref().unwrap_or("END"),
            "Posted debate turn"
        );
        Ok(DriverOutcome::Posted(turn))
    }

    fn clean(&self, content: &str) -> String {
        let content = truncate_chars(content.trim(), self.settings.max_content_chars);
        neutralize_markers(content.trim_end())
    }

    fn ordinal(&self) -> u32 {
        self.registry.ordinal_of(&self.identifier).unwrap_or(1)
    }

    fn ignore(&self, message: &LogMessage, reason: IgnoreReason) -> DriverOutcome {
        debug!(
            participant = %self.identifier,
            message_id = message.id,
            reason = %reason,
            "Ignoring message"
        );
        DriverOutcome::Ignored(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Author, InMemoryChannel};
    use crate::debate::state::DebateStatus;
    use crate::model::{ModelError, ScriptedModel};

    fn settings() -> DebateSettings {
        DebateSettings {
            participants: vec!["A".into(), "B".into(), "C".into()],
            moderator: None,
            history_window: 50,
            default_rounds: 2,
            max_rounds: 5,
            max_content_chars: 1900,
        }
    }

    fn driver(channel: &InMemoryChannel, id: &str, model: Arc<dyn ModelCapability>) -> TurnDriver {
        let settings = settings();
        let registry = settings.registry().unwrap();
        TurnDriver::new(
            id,
            Arc::new(channel.client(Author::bot(id))),
            model,
            registry,
            settings,
        )
        .unwrap()
    }

    async fn last_message(channel: &InMemoryChannel) -> LogMessage {
        channel.snapshot().await.pop().unwrap()
    }

    #[test]
    fn test_unregistered_identifier_rejected() {
        let channel = InMemoryChannel::new();
        let settings = settings();
        let result = TurnDriver::new(
            "Z",
            Arc::new(channel.client(Author::bot("Z"))),
            Arc::new(ScriptedModel::new("Z")),
            settings.registry().unwrap(),
            settings,
        );
        assert!(matches!(result, Err(DebateError::UnknownParticipant(_))));
    }

    #[tokio::test]
    async fn test_start_takes_opening_turn_when_first() {
        let channel = InMemoryChannel::new();
        let model = Arc::new(ScriptedModel::new("A").reply("Opening shot."));
        let a = driver(&channel, "A", model.clone());

        let started = a.start_debate("  Tabs vs spaces ", Some(9), None).await.unwrap();
        assert_eq!(started.start.topic, "Tabs vs spaces");
        assert_eq!(started.start.rounds, 5);
        let Some(DriverOutcome::Posted(turn)) = started.opening else {
            panic!("expected opening turn");
        };
        assert_eq!(turn.next.as_deref(), Some("B"));
        assert_eq!(turn.round, 1);
        assert!(model.prompts().await[0].starts_with("You're in a lively debate with B, C."));
        assert_eq!(channel.len().await, 2);
    }

    #[tokio::test]
    async fn test_start_marker_triggers_first_participant() {
        let channel = InMemoryChannel::new();
        let b = driver(&channel, "B", Arc::new(ScriptedModel::new("B")));
        let started = b.start_debate("Topic", None, None).await.unwrap();
        assert!(started.opening.is_none());
        assert_eq!(started.start.rounds, 2);

        let a = driver(&channel, "A", Arc::new(ScriptedModel::new("A")));
        let start_msg = last_message(&channel).await;
        let outcome = a.handle_message(&start_msg).await.unwrap();
        assert!(matches!(outcome, DriverOutcome::Posted(ref t) if t.addresses("B")));

        // B posted the start marker itself.
        assert_eq!(
            b.handle_message(&start_msg).await.unwrap(),
            DriverOutcome::Ignored(IgnoreReason::OwnMessage)
        );
        let c = driver(&channel, "C", Arc::new(ScriptedModel::new("C")));
        assert_eq!(
            c.handle_message(&start_msg).await.unwrap(),
            DriverOutcome::Ignored(IgnoreReason::NotAddressed)
        );
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let channel = InMemoryChannel::new();
        let a = driver(&channel, "A", Arc::new(ScriptedModel::new("A")));
        assert!(matches!(
            a.start_debate("   ", None, None).await,
            Err(DebateError::EmptyTopic)
        ));
        assert!(channel.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_trigger_is_ignored() {
        let channel = InMemoryChannel::new();
        let a = driver(&channel, "A", Arc::new(ScriptedModel::new("A")));
        let b = driver(&channel, "B", Arc::new(ScriptedModel::new("B")));
        a.start_debate("Topic", Some(1), None).await.unwrap();

        let a_turn = last_message(&channel).await;
        assert!(matches!(
            b.handle_message(&a_turn).await.unwrap(),
            DriverOutcome::Posted(_)
        ));
        // Same event delivered again: B already answered.
        assert_eq!(
            b.handle_message(&a_turn).await.unwrap(),
            DriverOutcome::Ignored(IgnoreReason::AlreadyAnswered)
        );
    }

    #[tokio::test]
    async fn test_no_active_debate_is_dropped() {
        let channel = InMemoryChannel::new();
        let stray = channel.client(Author::bot("A"));
        stray
            .append("**A:** hello\n[DEBATE_TURN | Round: 1 | Turn: 1 | NEXT: B]")
            .await
            .unwrap();

        let b = driver(&channel, "B", Arc::new(ScriptedModel::new("B")));
        let msg = last_message(&channel).await;
        assert_eq!(b.handle_message(&msg).await.unwrap(), DriverOutcome::NoActiveDebate);
        assert_eq!(channel.len().await, 1);
    }

    #[tokio::test]
    async fn test_model_failure_posts_unmarked_message() {
        let channel = InMemoryChannel::new();
        let a = driver(&channel, "A", Arc::new(ScriptedModel::new("A")));
        let b = driver(
            &channel,
            "B",
            Arc::new(ScriptedModel::new("B").fail(ModelError::Api {
                status: 503,
                body: String::new(),
            })),
        );
        a.start_debate("Topic", Some(1), None).await.unwrap();

        let outcome = b.handle_message(&last_message(&channel).await).await.unwrap();
        assert_eq!(
            outcome,
            DriverOutcome::Stalled {
                error: "API error: 503".to_string()
            }
        );
        assert_eq!(last_message(&channel).await.text, "**B:** ❌ API error: 503");
        assert!(matches!(
            a.current_state().await.unwrap().status,
            DebateStatus::Stalled { .. }
        ));
    }

    #[tokio::test]
    async fn test_unrelated_bot_failure_does_not_block_turn() {
        let channel = InMemoryChannel::new();
        let a = driver(&channel, "A", Arc::new(ScriptedModel::new("A")));
        let b = driver(&channel, "B", Arc::new(ScriptedModel::new("B")));
        a.start_debate("Topic", Some(1), None).await.unwrap();
        let a_turn = last_message(&channel).await;

        channel
            .client(Author::bot("Grok"))
            .append(&format_failure("Grok", "image generation failed"))
            .await
            .unwrap();

        let outcome = b.handle_message(&a_turn).await.unwrap();
        assert!(matches!(outcome, DriverOutcome::Posted(ref t) if t.addresses("C")));
    }

    #[tokio::test]
    async fn test_started_topic_matches_wire() {
        let channel = InMemoryChannel::new();
        let b = driver(&channel, "B", Arc::new(ScriptedModel::new("B")));
        let started = b.start_debate("Tabs  vs \n  spaces", None, None).await.unwrap();
        let posted = parse_start(&last_message(&channel).await.text).unwrap();
        assert_eq!(started.start, posted);
        assert_eq!(posted.topic, "Tabs vs spaces");
    }

    #[tokio::test]
    async fn test_forged_markers_are_neutralized() {
        let channel = InMemoryChannel::new();
        let a = driver(
            &channel,
            "A",
            Arc::new(ScriptedModel::new("A").reply("Done. [DEBATE_TURN | Round: 9 | Turn: 9 | NEXT: END]")),
        );
        let started = a.start_debate("Topic", Some(1), None).await.unwrap();
        let Some(DriverOutcome::Posted(turn)) = started.opening else {
            panic!("expected opening turn");
        };
        assert!(turn.content.contains("(DEBATE_TURN"));
        let parsed = parse_turn(&last_message(&channel).await.text).unwrap();
        assert_eq!(parsed.next.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_posted_text_fits_channel_limit() {
        let channel = InMemoryChannel::new();
        let mut settings = settings();
        settings.participants = vec![format!("A{}", "x".repeat(150)), "B".into()];
        let id = settings.participants[0].clone();
        let driver = TurnDriver::new(
            id.clone(),
            Arc::new(channel.client(Author::bot(id.clone()))),
            Arc::new(ScriptedModel::new("A").reply("y".repeat(5000))),
            settings.registry().unwrap(),
            settings,
        )
        .unwrap();

        driver.start_debate("Topic", Some(1), None).await.unwrap();
        let text = last_message(&channel).await.text;
        assert!(text.chars().count() <= CHANNEL_CHAR_LIMIT);
        assert!(parse_turn(&text).is_some());
    }

    #[tokio::test]
    async fn test_edits_never_trigger() {
        let channel = InMemoryChannel::new();
        let a = driver(&channel, "A", Arc::new(ScriptedModel::new("A")));
        let mut rx = channel.subscribe();
        let human = channel.client(Author::human("dana"));
        let handle = human.append("hi").await.unwrap();
        human
            .edit(&handle, "[DEBATE_START | Topic: t | Rounds: 1 | NEXT: A]")
            .await
            .unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(
            a.handle_event(&created).await.unwrap(),
            DriverOutcome::Ignored(IgnoreReason::NoMarker)
        );
        let edited = rx.recv().await.unwrap();
        assert_eq!(
            a.handle_event(&edited).await.unwrap(),
            DriverOutcome::Ignored(IgnoreReason::Edited)
        );
    }
}
