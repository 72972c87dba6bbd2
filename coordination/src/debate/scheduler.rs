//! Deterministic turn order.

use tracing::error;

use super::participants::ParticipantRegistry;
use super::DebateError;

/// Computes who speaks after a given participant.
///
/// Depends only on the static registry and the numbers passed in, so every
/// process reaches the same answer.
pub struct TurnScheduler<'a> {
    registry: &'a ParticipantRegistry,
}

impl<'a> TurnScheduler<'a> {
    pub fn new(registry: &'a ParticipantRegistry) -> Self {
        Self { registry }
    }

    /// Plain rotation: the next participant in the same round, participant 0
    /// of the next round, or `None` once `round >= total_rounds`.
    pub fn next_participant(
        &self,
        current: &str,
        round: u32,
        total_rounds: u32,
    ) -> Result<Option<String>, DebateError> {
        let Some(i) = self.registry.index_of(current) else {
            error!(participant = current, "scheduler asked about unregistered participant");
            return Err(DebateError::UnknownParticipant(current.to_string()));
        };

        if let Some(next) = self.registry.at(i + 1) {
            return Ok(Some(next.to_string()));
        }
        if round >= total_rounds {
            return Ok(None);
        }
        Ok(Some(self.registry.first().to_string()))
    }

    /// Rotation with moderator hand-off: when a moderator is registered, the
    /// last participant of every round addresses the moderator, which then
    /// decides between another round and the end.
    pub fn next_speaker(
        &self,
        current: &str,
        round: u32,
        total_rounds: u32,
    ) -> Result<Option<String>, DebateError> {
        let next = self.next_participant(current, round, total_rounds)?;
        match self.registry.moderator() {
            Some(moderator) if self.registry.is_last(current) => Ok(Some(moderator.to_string())),
            _ => Ok(next),
        }
    }
}
