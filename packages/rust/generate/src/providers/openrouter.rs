//! Secondary general-purpose API (OpenRouter), second rung of the cascade.

use async_trait::async_trait;
use reqwest::Client;

use ideaforge_shared::{OpenRouterConfig, read_api_key};

use super::{
    FailureReason, GenerationOutput, GenerationTask, Provider, build_messages, chat_completion,
    parse_for_task,
};

pub struct OpenRouter {
    client: Client,
    config: OpenRouterConfig,
    timeout_secs: u64,
}

impl OpenRouter {
    pub fn new(client: Client, config: OpenRouterConfig, timeout_secs: u64) -> Self {
        Self {
            client,
            config,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Provider for OpenRouter {
    fn id(&self) -> &'static str {
        "openrouter"
    }

    fn model(&self) -> Option<String> {
        Some(self.config.model.clone())
    }

    fn available(&self) -> bool {
        read_api_key(&self.config.api_key_env).is_some()
    }

    async fn attempt(
        &self,
        task: &GenerationTask<'_>,
        hint: Option<&str>,
    ) -> Result<GenerationOutput, FailureReason> {
        let Some(api_key) = read_api_key(&self.config.api_key_env) else {
            return Err(FailureReason::Unavailable);
        };

        let (system, mut user) = build_messages(task, hint);
        user.push_str("\n\nRespond with a single JSON object.");

        let content = chat_completion(
            &self.client,
            &self.config.endpoint,
            &api_key,
            &self.config.model,
            &system,
            &user,
            false,
            self.timeout_secs,
        )
        .await?;

        parse_for_task(task, &content)
    }
}
