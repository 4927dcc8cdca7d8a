//! Primary generation API, in two forms: structured JSON mode and a
//! plain-REST fallback that relies on prompt discipline alone.

use async_trait::async_trait;
use reqwest::Client;

use ideaforge_shared::{OpenAiConfig, read_api_key};

use super::{
    FailureReason, GenerationOutput, GenerationTask, Provider, build_messages, chat_completion,
    parse_for_task,
};

/// Structured-output variant: JSON mode is enforced by the API.
pub struct OpenAiStructured {
    client: Client,
    config: OpenAiConfig,
    timeout_secs: u64,
}

impl OpenAiStructured {
    pub fn new(client: Client, config: OpenAiConfig, timeout_secs: u64) -> Self {
        Self {
            client,
            config,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Provider for OpenAiStructured {
    fn id(&self) -> &'static str {
        "openai-structured"
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

        let (system, user) = build_messages(task, hint);
        let content = chat_completion(
            &self.client,
            &self.config.endpoint,
            &api_key,
            &self.config.model,
            &system,
            &user,
            true,
            self.timeout_secs,
        )
        .await?;

        parse_for_task(task, &content)
    }
}

/// Plain-REST variant of the same API: no structured-output mode, just an
/// explicit "JSON only" instruction. Third rung of the cascade.
pub struct OpenAiRest {
    client: Client,
    config: OpenAiConfig,
    timeout_secs: u64,
}

impl OpenAiRest {
    pub fn new(client: Client, config: OpenAiConfig, timeout_secs: u64) -> Self {
        Self {
            client,
            config,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Provider for OpenAiRest {
    fn id(&self) -> &'static str {
        "openai-rest"
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
        user.push_str("\n\nOutput raw JSON only — no prose, no markdown fences.");

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
