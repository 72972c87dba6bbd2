//! Rebuild the current debate from a window of channel history.
//!
//! Pure function over a log snapshot: no transport, no clock, no cache.

use tracing::{debug, warn};

use super::participants::ParticipantRegistry;
use super::protocol::{parse_failure, parse_start, parse_turn, DebateStart};
use super::state::{DebateState, DebateStatus, HistoryEntry, HumanInterjection};
use super::DebateError;
use crate::channel::LogMessage;

/// Last protocol-relevant message seen after the start marker.
enum Latest {
    Start,
    Turn { next: Option<String> },
    Failure { speaker: String, error: String },
}

/// Replays a history window into a [`DebateState`].
pub struct HistoryReconstructor<'a> {
    registry: &'a ParticipantRegistry,
}

impl<'a> HistoryReconstructor<'a> {
    pub fn new(registry: &'a ParticipantRegistry) -> Self {
        Self { registry }
    }

    /// Replay `window` (oldest → newest).
    ///
    /// Only the most recent start marker counts; everything before it belongs
    /// to an earlier debate. Fails with [`DebateError::NoActiveDebate`] when the
    /// window holds no start marker at all.
    pub fn reconstruct(&self, window: &[LogMessage]) -> Result<DebateState, DebateError> {
        let mut start: Option<DebateStart> = None;
        let mut history: Vec<HistoryEntry> = Vec::new();
        let mut latest = Latest::Start;

        for message in window {
            if let Some(turn) = parse_turn(&message.text) {
                if start.is_some() {
                    latest = Latest::Turn {
                        next: turn.next.clone(),
                    };
                    history.push(HistoryEntry::Turn(turn));
                }
                continue;
            }

            if let Some(found) = parse_start(&message.text) {
                debug!(message_id = message.id, topic = %found.topic, "Debate start marker");
                start = Some(found);
                history.clear();
                latest = Latest::Start;
                continue;
            }

            if start.is_none() {
                continue;
            }

            if message.author.is_bot {
                // Only the speaker who owes the turn can stall the debate.
                let Some(failure) = parse_failure(&message.text) else {
                    continue;
                };
                let owed = match &latest {
                    Latest::Start => start.as_ref().map(|s| s.first.as_str()),
                    Latest::Turn { next } => next.as_deref(),
                    Latest::Failure { .. } => None,
                };
                if owed == Some(failure.speaker.as_str()) {
                    latest = Latest::Failure {
                        speaker: failure.speaker,
                        error: failure.error,
                    };
                } else {
                    debug!(
                        message_id = message.id,
                        speaker = %failure.speaker,
                        "Ignoring failure from a bot that was not addressed"
                    );
                }
            } else {
                history.push(HistoryEntry::Human(HumanInterjection {
                    author: message.author.name.clone(),
                    content: message.text.trim().to_string(),
                }));
            }
        }

        let Some(start) = start else {
            warn!(
                scanned = window.len(),
                "Could not find debate topic in history window"
            );
            return Err(DebateError::NoActiveDebate {
                scanned: window.len(),
            });
        };

        let participant_turns = history
            .iter()
            .filter(|entry| {
                matches!(entry, HistoryEntry::Turn(turn) if self.registry.contains(&turn.speaker))
            })
            .count();
        let count = self.registry.len();
        let rounds_reached = (participant_turns.div_ceil(count) as u32).max(1);
        let mut current_round = (participant_turns / count + 1) as u32;

        let status = match latest {
            Latest::Start => DebateStatus::Opening {
                next: start.first.clone(),
            },
            Latest::Turn { next: Some(next) } => DebateStatus::AwaitingTurn {
                next,
                round: current_round,
            },
            Latest::Turn { next: None } => {
                // Nobody owes a turn, so report the last round that happened.
                current_round = rounds_reached;
                DebateStatus::Complete {
                    rounds: rounds_reached,
                }
            }
            Latest::Failure { speaker, error } => DebateStatus::Stalled { speaker, error },
        };

        Ok(DebateState {
            topic: start.topic,
            total_rounds: start.rounds,
            current_round,
            participant_turns,
            history,
            article_context: start.article_context,
            status,
        })
    }
}
