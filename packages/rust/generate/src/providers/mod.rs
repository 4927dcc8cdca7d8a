//! Generation providers: the uniform attempt contract and shared
//! chat-completion plumbing.

pub mod openai;
pub mod openrouter;
pub mod template;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use ideaforge_shared::{ContextBundle, Idea};

use crate::schema::{IdeaDraft, PlanDraft};

// ---------------------------------------------------------------------------
// Task / output / failure
// ---------------------------------------------------------------------------

/// What the cascade is being asked to produce.
#[derive(Debug, Clone)]
pub enum GenerationTask<'a> {
    /// The full ranked idea set for a job.
    Ideas { bundle: &'a ContextBundle },
    /// A step-by-step build plan for one idea.
    Plan {
        bundle: &'a ContextBundle,
        idea: &'a Idea,
    },
    /// A single idea from a caller-written description.
    CustomIdea {
        bundle: &'a ContextBundle,
        description: &'a str,
    },
}

impl GenerationTask<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ideas { .. } => "ideas",
            Self::Plan { .. } => "plan",
            Self::CustomIdea { .. } => "custom_idea",
        }
    }
}

/// What a provider produced.
#[derive(Debug, Clone)]
pub enum GenerationOutput {
    Ideas(Vec<IdeaDraft>),
    Plan(PlanDraft),
    Idea(IdeaDraft),
}

/// Why a provider attempt did not produce output.
#[derive(Debug, Clone)]
pub enum FailureReason {
    /// No credential configured; skip silently to the next provider.
    Unavailable,
    /// The call exceeded its deadline.
    Timeout(String),
    /// Transport or API error (rate limit, 5xx, connect failure).
    Api(String),
    /// The response did not parse or failed schema checks. Retryable once
    /// with a strengthened instruction.
    InvalidResponse(String),
}

impl FailureReason {
    /// Only invalid responses earn a same-provider retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidResponse(_))
    }

    pub fn message(&self) -> String {
        match self {
            Self::Unavailable => "provider unavailable (no credential)".into(),
            Self::Timeout(m) | Self::Api(m) | Self::InvalidResponse(m) => m.clone(),
        }
    }
}

/// Uniform provider contract the cascade drives.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider identifier recorded in evidence.
    fn id(&self) -> &'static str;

    /// Model identifier, when the provider uses one.
    fn model(&self) -> Option<String> {
        None
    }

    /// Whether the provider can be attempted at all (credential present).
    fn available(&self) -> bool;

    /// One attempt at the task. `hint` carries the strengthened
    /// instruction on a retry.
    async fn attempt(
        &self,
        task: &GenerationTask<'_>,
        hint: Option<&str>,
    ) -> Result<GenerationOutput, FailureReason>;
}

// ---------------------------------------------------------------------------
// Prompt building (shared by all API providers)
// ---------------------------------------------------------------------------

/// System + user message pair for a task.
pub(crate) fn build_messages(task: &GenerationTask<'_>, hint: Option<&str>) -> (String, String) {
    let system = "You are a product strategist who proposes small, buildable \
                  software prototypes grounded in real company evidence. \
                  Respond with JSON only."
        .to_string();

    let mut user = match task {
        GenerationTask::Ideas { bundle } => {
            let evidence = ideaforge_evidence::render_prompt(bundle);
            format!(
                "Company evidence:\n{evidence}\n\n\
                 Propose prototype ideas for this company: exactly 3 ideas for each \
                 effort level, from smallest to largest. Effort levels, in order: \
                 starter, sprint, day-build, weekender, flagship.\n\
                 Respond as JSON: {{\"ideas\": [{{\"title\", \"summary\", \"effort\", \
                 \"outline\": {{\"pages\", \"components\", \"data\", \"nice_to_haves\"}}, \
                 \"inspired_by\"}}]}}"
            )
        }
        GenerationTask::Plan { bundle, idea } => {
            let evidence = ideaforge_evidence::render_prompt(bundle);
            format!(
                "Company evidence:\n{evidence}\n\n\
                 Write a step-by-step build plan for this prototype idea:\n\
                 Title: {}\nSummary: {}\nEffort: {}\n\n\
                 Respond as JSON: {{\"setup_script\", \"folder_name\", \"steps\": \
                 [{{\"role\", \"title\", \"instruction\", \"prompt\", \
                 \"done_looks_like\"}}]}}. Each step's \"prompt\" is verbatim text \
                 to paste into a coding agent.",
                idea.title,
                idea.summary,
                idea.effort.as_str()
            )
        }
        GenerationTask::CustomIdea {
            bundle,
            description,
        } => {
            let evidence = ideaforge_evidence::render_prompt(bundle);
            format!(
                "Company evidence:\n{evidence}\n\n\
                 The caller wants a prototype matching this description:\n\
                 {description}\n\n\
                 Respond as JSON: {{\"idea\": {{\"title\", \"summary\", \"effort\", \
                 \"outline\": {{\"pages\", \"components\", \"data\", \
                 \"nice_to_haves\"}}}}}}. The idea must directly address the \
                 description."
            )
        }
    };

    if let Some(hint) = hint {
        user.push_str("\n\nIMPORTANT: ");
        user.push_str(hint);
    }

    (system, user)
}

/// Parse a provider's text content per the task's expected shape.
pub(crate) fn parse_for_task(
    task: &GenerationTask<'_>,
    content: &str,
) -> Result<GenerationOutput, FailureReason> {
    let output = match task {
        GenerationTask::Ideas { .. } => crate::schema::parse_ideas(content)
            .map(GenerationOutput::Ideas)
            .map_err(FailureReason::InvalidResponse)?,
        GenerationTask::Plan { .. } => crate::schema::parse_plan(content)
            .map(GenerationOutput::Plan)
            .map_err(FailureReason::InvalidResponse)?,
        GenerationTask::CustomIdea { .. } => crate::schema::parse_idea(content)
            .map(GenerationOutput::Idea)
            .map_err(FailureReason::InvalidResponse)?,
    };
    Ok(output)
}

// ---------------------------------------------------------------------------
// Chat-completion wire helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// POST a chat-completion request and return the first choice's content.
pub(crate) async fn chat_completion(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    system: &str,
    user: &str,
    json_mode: bool,
    timeout_secs: u64,
) -> Result<String, FailureReason> {
    let mut body = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
    });

    if json_mode {
        body["response_format"] = json!({ "type": "json_object" });
    }

    let response = client
        .post(format!("{endpoint}/chat/completions"))
        .bearer_auth(api_key)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                FailureReason::Timeout(format!("generation call timed out: {e}"))
            } else {
                FailureReason::Api(e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        let detail: String = detail.chars().take(200).collect();
        return Err(FailureReason::Api(format!("HTTP {status}: {detail}")));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| FailureReason::InvalidResponse(format!("bad completion envelope: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| FailureReason::InvalidResponse("completion had no choices".into()))
}
