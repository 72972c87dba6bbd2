//! Bot and debate configuration.
//!
//! Defaults come from the environment; an optional TOML file overrides them:
//!
//! ```toml
//! [debate]
//! participants = ["Claude", "ChatGPT", "Gemini"]
//! moderator = "Disruption"
//! history_window = 50
//!
//! [[bots]]
//! identifier = "Claude"
//! provider = "anthropic"
//! ```

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::debate::participants::{ParticipantRegistry, DEFAULT_PARTICIPANTS};
use crate::debate::protocol::MAX_CONTENT_CHARS;
use crate::model::{ChatModel, Persona, Provider};

/// Default moderator identifier.
pub const DEFAULT_MODERATOR: &str = "Disruption";

/// Parse `raw`, falling back to `default` when it is missing, malformed or
/// below `min`.
fn parse_at_least<T: FromStr + PartialOrd>(raw: Option<&str>, default: T, min: T) -> T {
    raw.and_then(|v| v.trim().parse().ok())
        .filter(|v| *v >= min)
        .unwrap_or(default)
}

fn env_at_least<T: FromStr + PartialOrd>(key: &str, default: T, min: T) -> T {
    parse_at_least(std::env::var(key).ok().as_deref(), default, min)
}

/// Settings every bot process must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateSettings {
    /// Speaking order.
    pub participants: Vec<String>,
    /// Non-debating moderator; `None` disables consensus checks.
    pub moderator: Option<String>,
    /// Messages fetched per reconstruction.
    pub history_window: usize,
    /// Rounds when a start request names none.
    pub default_rounds: u32,
    /// Upper bound on requested rounds.
    pub max_rounds: u32,
    /// Turn bodies are cut to this many characters.
    pub max_content_chars: usize,
}

impl Default for DebateSettings {
    fn default() -> Self {
        let participants = std::env::var("DEBATE_PARTICIPANTS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PARTICIPANTS.iter().map(|p| p.to_string()).collect());

        let moderator = match std::env::var("DEBATE_MODERATOR") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => Some(DEFAULT_MODERATOR.to_string()),
        };

        Self {
            participants,
            moderator,
            history_window: env_at_least("DEBATE_HISTORY_WINDOW", 50, 1),
            default_rounds: env_at_least("DEBATE_DEFAULT_ROUNDS", 2, 1),
            max_rounds: env_at_least("DEBATE_MAX_ROUNDS", 5, 1),
            max_content_chars: MAX_CONTENT_CHARS,
        }
    }
}

impl DebateSettings {
    /// Rounds to run for a request: default when absent, clamped to
    /// `1..=max_rounds`.
    pub fn clamp_rounds(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_rounds)
            .clamp(1, self.max_rounds.max(1))
    }

    /// Build the shared registry.
    pub fn registry(&self) -> Result<ParticipantRegistry> {
        let registry = ParticipantRegistry::new(self.participants.iter().cloned())
            .context("Invalid participant list")?;
        match &self.moderator {
            Some(m) if !m.trim().is_empty() => registry
                .with_moderator(m.clone())
                .context("Invalid moderator"),
            _ => Ok(registry),
        }
    }

    /// Parse settings from TOML without the `[debate]` header.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s).context("Failed to parse debate settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no bot could debate under.
    pub fn validate(&self) -> Result<()> {
        if self.history_window == 0 {
            bail!("history_window must be at least 1");
        }
        if self.max_content_chars == 0 || self.max_content_chars > MAX_CONTENT_CHARS {
            bail!(
                "max_content_chars must be between 1 and {}",
                MAX_CONTENT_CHARS
            );
        }
        Ok(())
    }
}

/// What a bot does in the debate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotRole {
    #[default]
    Participant,
    Moderator,
}

impl std::fmt::Display for BotRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Participant => write!(f, "participant"),
            Self::Moderator => write!(f, "moderator"),
        }
    }
}

/// One bot process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Identifier used in markers.
    pub identifier: String,
    #[serde(default)]
    pub role: BotRole,
    /// Chat backend; inferred from the identifier when absent.
    #[serde(default)]
    pub provider: Option<Provider>,
    /// System prompt. `funny`, `serious` and `chaos` select presets.
    #[serde(default)]
    pub persona: Option<String>,
    /// Model name override.
    #[serde(default)]
    pub model: Option<String>,
}

impl BotConfig {
    pub fn participant(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            role: BotRole::Participant,
            provider: None,
            persona: None,
            model: None,
        }
    }

    pub fn moderator(identifier: impl Into<String>) -> Self {
        Self {
            role: BotRole::Moderator,
            ..Self::participant(identifier)
        }
    }

    pub fn resolved_provider(&self) -> Result<Provider> {
        self.provider
            .or_else(|| Provider::for_identifier(&self.identifier))
            .with_context(|| format!("No provider configured for bot {}", self.identifier))
    }

    /// System prompt text, with preset names expanded.
    pub fn persona_text(&self) -> Option<String> {
        let persona = self.persona.as_deref()?.trim();
        let preset = match persona.to_ascii_lowercase().as_str() {
            "funny" => Some(Persona::Funny),
            "serious" => Some(Persona::Serious),
            "chaos" => Some(Persona::Chaos),
            _ => None,
        };
        Some(preset.map_or_else(|| persona.to_string(), |p| p.system_prompt().to_string()))
    }

    /// Build the hosted model for this bot.
    pub fn chat_model(&self) -> Result<ChatModel> {
        let provider = self.resolved_provider()?;
        let mut model = ChatModel::new(self.identifier.clone(), provider)
            .with_context(|| format!("Failed to build {} client", provider))?;
        if let Some(name) = &self.model {
            model = model.with_model(name.clone());
        }
        if let Some(persona) = self.persona_text() {
            model = model.with_persona(persona);
        }
        Ok(model)
    }
}

/// Contents of a config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub debate: DebateSettings,
    #[serde(default)]
    pub bots: Vec<BotConfig>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Configured bots, or one default bot per registered identifier.
    pub fn bots_or_default(&self) -> Vec<BotConfig> {
        if !self.bots.is_empty() {
            return self.bots.clone();
        }
        let mut bots: Vec<BotConfig> = self
            .debate
            .participants
            .iter()
            .map(BotConfig::participant)
            .collect();
        if let Some(moderator) = &self.debate.moderator {
            bots.push(BotConfig::moderator(moderator.clone()));
        }
        bots
    }

    fn validate(&self) -> Result<()> {
        self.debate.validate()?;
        for bot in &self.bots {
            let listed = self.debate.participants.contains(&bot.identifier);
            let moderates = self.debate.moderator.as_deref() == Some(bot.identifier.as_str());
            match bot.role {
                BotRole::Participant if !listed => {
                    bail!("bot {} is not in the participant list", bot.identifier)
                }
                BotRole::Moderator if !moderates => {
                    bail!("bot {} is not the configured moderator", bot.identifier)
                }
                _ => {}
            }
        }
        Ok(())
    }
}
