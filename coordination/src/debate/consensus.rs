//! Consensus judge: the moderator's between-rounds verdict.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::participants::ParticipantRegistry;
use super::prompts::{judge_prompt, CONSENSUS_PREFIX, NO_CONSENSUS_PREFIX};
use super::state::DebateState;
use crate::model::ModelCapability;

/// What the judge concluded about a finished round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusOutcome {
    /// Participants agree. Ends the debate regardless of rounds left.
    Reached { summary: String },
    /// Participants still disagree.
    NotReached { disagreement: String },
    /// The model call failed. Treated like `NotReached`.
    Unavailable { error: String },
}

impl ConsensusOutcome {
    /// Classify a judge reply by literal, case-sensitive prefix.
    ///
    /// Replies in neither format count as no consensus.
    pub fn classify(response: &str) -> Self {
        let response = response.trim();
        if let Some(summary) = response.strip_prefix(CONSENSUS_PREFIX) {
            return Self::Reached {
                summary: summary.trim().to_string(),
            };
        }
        let disagreement = response
            .strip_prefix(NO_CONSENSUS_PREFIX)
            .map(|rest| rest.trim_start_matches(':'))
            .unwrap_or(response);
        Self::NotReached {
            disagreement: disagreement.trim().to_string(),
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, Self::Reached { .. })
    }
}

impl std::fmt::Display for ConsensusOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reached { .. } => write!(f, "reached"),
            Self::NotReached { .. } => write!(f, "not_reached"),
            Self::Unavailable { .. } => write!(f, "unavailable"),
        }
    }
}

/// The moderator's turn: verdict plus where the debate goes next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeratorDecision {
    pub outcome: ConsensusOutcome,
    /// Round the moderator's turn is posted under.
    pub round: u32,
    /// First participant of the next round, or `None` to end.
    pub next: Option<String>,
}

impl ModeratorDecision {
    pub fn is_final(&self) -> bool {
        self.next.is_none()
    }

    /// Body of the moderator's turn.
    pub fn content(&self) -> String {
        let follow_up = match &self.next {
            Some(next) => format!("\n\nRound {}: {}, you're up.", self.round, next),
            None => String::new(),
        };
        match &self.outcome {
            ConsensusOutcome::Reached { summary } => {
                format!("✅ **Consensus reached:** {}", summary)
            }
            ConsensusOutcome::NotReached { disagreement } if self.next.is_none() => {
                format!("🤝 **No consensus, and we're out of rounds.** {}", disagreement)
            }
            ConsensusOutcome::NotReached { disagreement } => {
                format!("🔄 **No consensus yet.** {}{}", disagreement, follow_up)
            }
            ConsensusOutcome::Unavailable { error } if self.next.is_none() => {
                format!(
                    "⚠️ Consensus check failed: {}\n\n🏁 That's all the rounds we have.",
                    error
                )
            }
            ConsensusOutcome::Unavailable { error } => format!(
                "⚠️ Consensus check failed: {}\n\n🔄 Let's keep going!{}",
                error, follow_up
            ),
        }
    }
}

/// Applies the between-rounds rules for the moderator.
pub struct ConsensusJudge<'a> {
    registry: &'a ParticipantRegistry,
}

impl<'a> ConsensusJudge<'a> {
    pub fn new(registry: &'a ParticipantRegistry) -> Self {
        Self { registry }
    }

    /// Decide the next step after `round` of `total_rounds`.
    ///
    /// Consensus ends immediately. Otherwise the debate ends once
    /// `round + 1 > total_rounds`, else participant 0 opens `round + 1`.
    pub fn decide(&self, outcome: ConsensusOutcome, round: u32, total_rounds: u32) -> ModeratorDecision {
        if outcome.is_reached() || round + 1 > total_rounds {
            return ModeratorDecision {
                outcome,
                round,
                next: None,
            };
        }
        ModeratorDecision {
            outcome,
            round: round + 1,
            next: Some(self.registry.first().to_string()),
        }
    }

    /// Ask `model` for a verdict on the finished round and decide.
    ///
    /// Never fails: a model error is treated as no consensus so the debate
    /// cannot get stuck on the moderator.
    pub async fn evaluate(&self, model: &dyn ModelCapability, state: &DebateState) -> ModeratorDecision {
        let round = state.rounds_reached(self.registry.len());
        let outcome = match model.ask(&judge_prompt(state, round)).await {
            Ok(response) => ConsensusOutcome::classify(&response),
            Err(e) => {
                warn!(model = model.name(), round, error = %e, "Consensus check failed, continuing debate");
                ConsensusOutcome::Unavailable {
                    error: e.to_string(),
                }
            }
        };

        let decision = self.decide(outcome, round, state.total_rounds);
        info!(
            round,
            total_rounds = state.total_rounds,
            outcome = %decision.outcome,
            next = decision.next.as_deref().unwrap_or("END"),
            "Consensus check complete"
        );
        decision
    }
}
