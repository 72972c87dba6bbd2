//! Debate state as projected from channel history.
//!
//! Nothing here is stored. A [`DebateState`] is rebuilt from the log on every
//! triggering event and dropped right after use.

use serde::{Deserialize, Serialize};

use super::protocol::Turn;

/// A human message that arrived after the start marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanInterjection {
    /// Display name of the human.
    pub author: String,
    pub content: String,
}

/// One entry of the debate transcript, in log order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEntry {
    Turn(Turn),
    Human(HumanInterjection),
}

/// Where the debate stands, judged from the last protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebateStatus {
    /// Start posted; the named participant owes the opening turn.
    Opening { next: String },
    /// A turn named `next`, who owes a turn in `round`.
    AwaitingTurn { next: String, round: u32 },
    /// A turn ended the debate.
    Complete { rounds: u32 },
    /// A model failure was posted and nobody was named next.
    Stalled { speaker: String, error: String },
}

impl DebateStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Stalled { .. })
    }

    /// Participant that currently owes a message, if any.
    pub fn next_speaker(&self) -> Option<&str> {
        match self {
            Self::Opening { next } | Self::AwaitingTurn { next, .. } => Some(next),
            Self::Complete { .. } | Self::Stalled { .. } => None,
        }
    }
}

impl std::fmt::Display for DebateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening { next } => write!(f, "opening (next: {})", next),
            Self::AwaitingTurn { next, round } => {
                write!(f, "awaiting {} in round {}", next, round)
            }
            Self::Complete { rounds } => write!(f, "complete after {} rounds", rounds),
            Self::Stalled { speaker, error } => write!(f, "stalled at {}: {}", speaker, error),
        }
    }
}

/// The current debate, reconstructed from a window of channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateState {
    pub topic: String,
    pub total_rounds: u32,
    /// Round the next participant turn belongs to, recomputed from the
    /// number of participant turns (marker round fields are not trusted).
    /// Once complete, the last round that was played.
    pub current_round: u32,
    /// Turns by registered participants only.
    pub participant_turns: usize,
    pub history: Vec<HistoryEntry>,
    pub article_context: Option<String>,
    pub status: DebateStatus,
}

impl DebateState {
    /// Turns in log order (participants and moderator).
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter().filter_map(|entry| match entry {
            HistoryEntry::Turn(turn) => Some(turn),
            HistoryEntry::Human(_) => None,
        })
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns().last()
    }

    /// Most recent human message, if any.
    pub fn latest_interjection(&self) -> Option<&HumanInterjection> {
        self.history.iter().rev().find_map(|entry| match entry {
            HistoryEntry::Human(h) => Some(h),
            HistoryEntry::Turn(_) => None,
        })
    }

    /// Rounds with at least one participant turn (at least 1).
    pub fn rounds_reached(&self, participant_count: usize) -> u32 {
        let count = participant_count.max(1);
        (self.participant_turns.div_ceil(count) as u32).max(1)
    }

    /// `"<speaker>: <content>"` per turn, humans excluded.
    pub fn transcript(&self) -> String {
        self.turns()
            .map(|t| format!("{}: {}", t.speaker, t.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Whether nobody is owed a turn any more.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | {} turns | topic={}",
            self.status,
            self.current_round,
            self.total_rounds,
            self.turns().count(),
            self.topic
        )
    }
}
