use std::sync::{Arc, Mutex};

use async_openai::{
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

use crate::{error::AppError, utils::config::AppConfig};

#[derive(Clone)]
pub struct GenerationProvider {
    inner: GenerationInner,
}

#[derive(Clone)]
enum GenerationInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
    },
    Fixed {
        reply: String,
        prompts: Arc<Mutex<Vec<String>>>,
    },
}

impl GenerationProvider {
    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
    ) -> Self {
        GenerationProvider {
            inner: GenerationInner::OpenAI { client, model },
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        );
        Self::new_openai(Arc::new(client), config.query_model.clone())
    }

    /// A scripted backend that always answers with `reply` and records every
    /// prompt it receives. Used by tests to assert what reached the model and
    /// whether it was invoked at all.
    pub fn new_fixed(reply: impl Into<String>) -> Self {
        GenerationProvider {
            inner: GenerationInner::Fixed {
                reply: reply.into(),
                prompts: Arc::new(Mutex::new(Vec::new())),
            },
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            GenerationInner::OpenAI { .. } => "openai",
            GenerationInner::Fixed { .. } => "fixed",
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            GenerationInner::OpenAI { model, .. } => Some(model.clone()),
            GenerationInner::Fixed { .. } => None,
        }
    }

    /// Number of times `generate` has been called on the fixed backend.
    pub fn invocation_count(&self) -> usize {
        match &self.inner {
            GenerationInner::Fixed { prompts, .. } => {
                prompts.lock().map(|guard| guard.len()).unwrap_or(0)
            }
            GenerationInner::OpenAI { .. } => 0,
        }
    }

    /// The most recent user prompt seen by the fixed backend.
    pub fn last_prompt(&self) -> Option<String> {
        match &self.inner {
            GenerationInner::Fixed { prompts, .. } => prompts
                .lock()
                .ok()
                .and_then(|guard| guard.last().cloned()),
            GenerationInner::OpenAI { .. } => None,
        }
    }

    /// Produces an answer for the given system/user prompt pair, or fails
    /// with [`AppError::Generation`]. No retry is attempted here; that policy
    /// belongs to the caller.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AppError> {
        match &self.inner {
            GenerationInner::Fixed { reply, prompts } => {
                if let Ok(mut guard) = prompts.lock() {
                    guard.push(user_prompt.to_string());
                }
                Ok(reply.clone())
            }
            GenerationInner::OpenAI { client, model } => {
                let request = CreateChatCompletionRequestArgs::default()
                    .model(model)
                    .messages([
                        ChatCompletionRequestSystemMessage::from(system_prompt.to_string()).into(),
                        ChatCompletionRequestUserMessage::from(user_prompt.to_string()).into(),
                    ])
                    .build()
                    .map_err(|err| AppError::Generation(err.to_string()))?;

                let response = client
                    .chat()
                    .create(request)
                    .await
                    .map_err(|err| AppError::Generation(err.to_string()))?;

                response
                    .choices
                    .first()
                    .and_then(|choice| choice.message.content.clone())
                    .ok_or_else(|| {
                        AppError::Generation("No content found in model response".into())
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_backend_replies_and_records() {
        let provider = GenerationProvider::new_fixed("canned answer");
        assert_eq!(provider.invocation_count(), 0);
        assert!(provider.last_prompt().is_none());

        let answer = provider
            .generate("system", "what is the answer?")
            .await
            .expect("fixed backend should not fail");

        assert_eq!(answer, "canned answer");
        assert_eq!(provider.invocation_count(), 1);
        assert_eq!(provider.last_prompt().as_deref(), Some("what is the answer?"));
    }

    #[test]
    fn test_backend_metadata() {
        let fixed = GenerationProvider::new_fixed("x");
        assert_eq!(fixed.backend_label(), "fixed");
        assert!(fixed.model_code().is_none());
    }
}
