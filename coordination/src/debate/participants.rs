//! Fixed, ordered debate membership shared by every bot process.

use serde::{Deserialize, Serialize};

use super::DebateError;

/// Default speaking order.
pub const DEFAULT_PARTICIPANTS: [&str; 3] = ["Claude", "ChatGPT", "Gemini"];

/// Ordered participant list plus an optional non-debating moderator.
///
/// Built once at startup from static configuration; every process must be
/// configured with the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRegistry {
    participants: Vec<String>,
    moderator: Option<String>,
}

impl ParticipantRegistry {
    /// Create a registry. Identifiers must be non-empty and unique.
    pub fn new<I, S>(participants: I) -> Result<Self, DebateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let participants: Vec<String> = participants.into_iter().map(Into::into).collect();
        if participants.is_empty() {
            return Err(DebateError::InvalidRegistry(
                "at least one participant is required".to_string(),
            ));
        }
        for (i, id) in participants.iter().enumerate() {
            if !fits_marker(id) {
                return Err(DebateError::InvalidRegistry(format!(
                    "participant identifier {:?} cannot appear in a marker",
                    id
                )));
            }
            if participants[..i].contains(id) {
                return Err(DebateError::InvalidRegistry(format!(
                    "duplicate participant {}",
                    id
                )));
            }
        }
        Ok(Self {
            participants,
            moderator: None,
        })
    }

    /// Attach a moderator that runs the consensus check between rounds.
    pub fn with_moderator(mut self, moderator: impl Into<String>) -> Result<Self, DebateError> {
        let moderator = moderator.into();
        if self.participants.contains(&moderator) {
            return Err(DebateError::InvalidRegistry(format!(
                "moderator {} is also a participant",
                moderator
            )));
        }
        if !fits_marker(&moderator) {
            return Err(DebateError::InvalidRegistry(format!(
                "moderator identifier {:?} cannot appear in a marker",
                moderator
            )));
        }
        self.moderator = Some(moderator);
        Ok(self)
    }

    /// Position of a participant, or `None` if it is not registered.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.participants.iter().position(|p| p == id)
    }

    /// Participant at position `i`.
    pub fn at(&self, i: usize) -> Option<&str> {
        self.participants.get(i).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Always false; construction rejects empty registries.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Who opens every round.
    pub fn first(&self) -> &str {
        &self.participants[0]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn moderator(&self) -> Option<&str> {
        self.moderator.as_deref()
    }

    pub fn is_moderator(&self, id: &str) -> bool {
        self.moderator.as_deref() == Some(id)
    }

    /// Whether `id` is the last speaker of a round.
    pub fn is_last(&self, id: &str) -> bool {
        self.index_of(id) == Some(self.participants.len() - 1)
    }

    /// 1-indexed position of a speaker within its round. The moderator
    /// follows the last participant.
    pub fn ordinal_of(&self, id: &str) -> Option<u32> {
        if let Some(i) = self.index_of(id) {
            return Some(i as u32 + 1);
        }
        self.is_moderator(id)
            .then_some(self.participants.len() as u32 + 1)
    }

    /// Everyone except `id`, in speaking order.
    pub fn others(&self, id: &str) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.as_str() != id)
            .map(String::as_str)
            .collect()
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self {
            participants: DEFAULT_PARTICIPANTS.iter().map(|p| p.to_string()).collect(),
            moderator: None,
        }
    }
}

/// Whether `id` survives the `NEXT:` field of a marker unchanged.
fn fits_marker(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_whitespace() || c == '|' || c == ']')
}
