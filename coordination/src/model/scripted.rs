//! Deterministic offline model for tests and `--offline` runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ModelCapability, ModelError};

/// Replies from a queue, then from a fallback template.
///
/// Every prompt is recorded so callers can inspect what was asked.
pub struct ScriptedModel {
    name: String,
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// A model that answers every prompt with a short canned line.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            fallback: Some(format!("{} makes point #{{n}}.", name)),
            name,
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.replies.get_mut().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(mut self, error: ModelError) -> Self {
        self.replies.get_mut().push_back(Err(error));
        self
    }

    /// Replace the fallback template; `{n}` is the 1-based call count.
    /// `None` makes an exhausted queue an error.
    pub fn with_fallback(mut self, template: Option<&str>) -> Self {
        self.fallback = template.map(str::to_string);
        self
    }

    /// Prompts received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl ModelCapability for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ask(&self, prompt: &str) -> Result<String, ModelError> {
        let call = {
            let mut prompts = self.prompts.lock().await;
            prompts.push(prompt.to_string());
            prompts.len()
        };

        match self.replies.lock().await.pop_front() {
            Some(reply) => reply,
            None => match &self.fallback {
                Some(template) => Ok(template.replace("{n}", &call.to_string())),
                None => Err(ModelError::EmptyResponse),
            },
        }
    }
}
