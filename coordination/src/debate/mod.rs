//! Multi-bot debate coordinated through a shared channel log.
//!
//! Bots never talk to each other directly. Each one watches the channel,
//! acts only when a marker names it, rebuilds the debate from recent history
//! and appends its turn.
//!
//! # Debate Flow
//!
//! ```text
//! DEBATE_START(NEXT: p0) → p0 → p1 → … → pN ─┬─ no moderator ─┬─ rounds left → p0
//!                                             │                └─ last round  → END
//!                                             └─ moderator ─ judge ─┬─ CONSENSUS      → END
//!                                                                   ├─ rounds left    → p0
//!                                                                   └─ last round     → END
//!
//! model failure (participant) → "**p:** ❌ err", no marker → Stalled
//! ```

pub mod consensus;
pub mod driver;
pub mod participants;
pub mod prompts;
pub mod protocol;
pub mod reconstruct;
pub mod scheduler;
pub mod state;

use thiserror::Error;

use crate::channel::ChannelError;

pub use consensus::{ConsensusJudge, ConsensusOutcome, ModeratorDecision};
pub use driver::{DebateStarted, DriverOutcome, IgnoreReason, TurnDriver};
pub use participants::{ParticipantRegistry, DEFAULT_PARTICIPANTS};
pub use protocol::{DebateStart, Turn, TurnFailure};
pub use reconstruct::HistoryReconstructor;
pub use scheduler::TurnScheduler;
pub use state::{DebateState, DebateStatus, HistoryEntry, HumanInterjection};

/// Errors from debate coordination.
#[derive(Debug, Error)]
pub enum DebateError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Invalid participant registry: {0}")]
    InvalidRegistry(String),

    #[error("No active debate in the last {scanned} messages")]
    NoActiveDebate { scanned: usize },

    #[error("Debate topic is empty")]
    EmptyTopic,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
