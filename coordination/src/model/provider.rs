//! HTTP chat backends.
//!
//! One [`ChatModel`] type covers every provider; what varies is the
//! [`Provider`] (endpoint, auth, body shape) and an optional [`Persona`]
//! sent as a system prompt.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ModelCapability, ModelError};

/// Completion budget for every provider.
pub const MAX_TOKENS: u32 = 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Hosted chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Gemini,
    Xai,
}

impl Provider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
            Self::Gemini => "gemini-2.5-flash",
            Self::Xai => "grok-3",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GOOGLE_AI_API_KEY",
            Self::Xai => "XAI_API_KEY",
        }
    }

    /// Provider conventionally behind a bot identifier.
    pub fn for_identifier(identifier: &str) -> Option<Self> {
        match identifier.to_ascii_lowercase().as_str() {
            "claude" | "disruption" => Some(Self::Anthropic),
            "chatgpt" | "gpt" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            id if id.starts_with("grok") => Some(Self::Xai),
            _ => None,
        }
    }

    fn endpoint(&self, model: &str, api_key: &str) -> String {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
            Self::OpenAi => "https://api.openai.com/v1/chat/completions".to_string(),
            Self::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
                model, api_key
            ),
            Self::Xai => "https://api.x.ai/v1/chat/completions".to_string(),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Xai => write!(f, "xai"),
        }
    }
}

/// Preset system prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Funny,
    Serious,
    Chaos,
}

impl Persona {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Funny => {
                "You are Grok in fun mode. Be witty, sarcastic, and entertaining. Use humor liberally."
            }
            Self::Serious => {
                "You are Grok in serious mode. Be analytical, thoughtful, and direct. No jokes."
            }
            Self::Chaos => {
                "You are Grok in maximum chaos mode. Be unpredictable, provocative, and challenge everything. Play devil's advocate aggressively."
            }
        }
    }
}

/// A hosted chat model.
pub struct ChatModel {
    name: String,
    provider: Provider,
    model: String,
    persona: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatModel {
    /// Build a model for `provider`, reading its key from the environment.
    /// A missing key is only reported when the model is asked.
    pub fn new(name: impl Into<String>, provider: Provider) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            provider,
            model: provider.default_model().to_string(),
            persona: None,
            api_key: std::env::var(provider.api_key_env())
                .ok()
                .filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelCapability for ChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ask(&self, prompt: &str) -> Result<String, ModelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::MissingApiKey(self.provider.api_key_env().to_string()))?;

        let body = request_body(self.provider, &self.model, self.persona.as_deref(), prompt);
        let mut request = self
            .client
            .post(self.provider.endpoint(&self.model, api_key))
            .header("content-type", "application/json");
        request = match self.provider {
            Provider::Anthropic => request
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01"),
            Provider::OpenAi | Provider::Xai => request.bearer_auth(api_key),
            Provider::Gemini => request,
        };

        debug!(model = %self.model, provider = %self.provider, "Sending chat request");
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.provider, status, body = %body, "Chat API error");
            return Err(ModelError::Api { status, body });
        }

        let resp_json: Value = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;
        extract_content(self.provider, &resp_json)
    }
}

/// JSON body for one single-turn request.
pub fn request_body(provider: Provider, model: &str, persona: Option<&str>, prompt: &str) -> Value {
    match provider {
        Provider::Anthropic => {
            let mut body = json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": [{ "role": "user", "content": prompt }]
            });
            if let Some(system) = persona {
                body["system"] = json!(system);
            }
            body
        }
        Provider::OpenAi | Provider::Xai => {
            let mut messages = Vec::new();
            if let Some(system) = persona {
                messages.push(json!({ "role": "system", "content": system }));
            }
            messages.push(json!({ "role": "user", "content": prompt }));
            json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": messages
            })
        }
        Provider::Gemini => {
            let mut body = json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "maxOutputTokens": MAX_TOKENS }
            });
            if let Some(system) = persona {
                body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
            }
            body
        }
    }
}

/// Pull the completion text out of a provider response.
pub fn extract_content(provider: Provider, resp_json: &Value) -> Result<String, ModelError> {
    let text = match provider {
        Provider::Anthropic => &resp_json["content"][0]["text"],
        Provider::OpenAi | Provider::Xai => &resp_json["choices"][0]["message"]["content"],
        Provider::Gemini => &resp_json["candidates"][0]["content"]["parts"][0]["text"],
    };
    match text.as_str().map(str::trim) {
        Some(content) if !content.is_empty() => Ok(content.to_string()),
        Some(_) => Err(ModelError::EmptyResponse),
        None => Err(ModelError::ParseError(format!(
            "no completion text in {} response",
            provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_body() {
        let body = request_body(Provider::Anthropic, "claude-sonnet-4-20250514", None, "hi");
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["content"], "hi");
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_openai_compatible_body_with_persona() {
        let persona = Persona::Chaos.system_prompt();
        let body = request_body(Provider::Xai, "grok-3", Some(persona), "hi");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], persona);
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_gemini_body() {
        let body = request_body(Provider::Gemini, "gemini-2.5-flash", Some("be brief"), "hi");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
    }

    #[test]
    fn test_extract_content_per_provider() {
        let anthropic = json!({ "content": [{ "type": "text", "text": " Tabs. " }] });
        assert_eq!(extract_content(Provider::Anthropic, &anthropic).unwrap(), "Tabs.");

        let openai = json!({ "choices": [{ "message": { "content": "Spaces." } }] });
        assert_eq!(extract_content(Provider::OpenAi, &openai).unwrap(), "Spaces.");

        let gemini = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Both." }] } }]
        });
        assert_eq!(extract_content(Provider::Gemini, &gemini).unwrap(), "Both.");
    }

    #[test]
    fn test_extract_content_errors() {
        let empty = json!({ "choices": [{ "message": { "content": "   " } }] });
        assert!(matches!(
            extract_content(Provider::Xai, &empty),
            Err(ModelError::EmptyResponse)
        ));
        let wrong = json!({ "error": { "message": "bad key" } });
        assert!(matches!(
            extract_content(Provider::Anthropic, &wrong),
            Err(ModelError::ParseError(_))
        ));
    }

    #[test]
    fn test_provider_for_identifier() {
        assert_eq!(Provider::for_identifier("Claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::for_identifier("ChatGPT"), Some(Provider::OpenAi));
        assert_eq!(Provider::for_identifier("Gemini"), Some(Provider::Gemini));
        assert_eq!(Provider::for_identifier("GrokChaos"), Some(Provider::Xai));
        assert_eq!(Provider::for_identifier("Llama"), None);
    }

    #[tokio::test]
    async fn test_missing_key_reported_at_call_time() {
        let model = ChatModel::new("Gemini", Provider::Gemini).unwrap();
        if model.api_key.is_some() {
            return;
        }
        let err = model.ask("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "GOOGLE_AI_API_KEY not set");
    }

    #[test]
    fn test_builder_overrides() {
        let model = ChatModel::new("GrokFunny", Provider::Xai)
            .unwrap()
            .with_model("grok-3-mini")
            .with_persona(Persona::Funny.system_prompt())
            .with_api_key("test-key");
        assert_eq!(model.provider(), Provider::Xai);
        assert_eq!(model.model(), "grok-3-mini");
        assert_eq!(model.name(), "GrokFunny");
        assert_eq!(model.api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_provider_serde() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"open_ai\"");
        let back: Provider = serde_json::from_str("\"xai\"").unwrap();
        assert_eq!(back, Provider::Xai);
    }
}
