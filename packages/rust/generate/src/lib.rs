//! Multi-provider generation cascade.
//!
//! A generation request walks an ordered provider list: structured-output
//! API → general-purpose API → plain REST → deterministic templates. A
//! provider with no credential is skipped; a timeout or API error falls
//! through; an invalid response earns exactly one same-provider retry
//! with a strengthened instruction before falling through. The template
//! provider is the terminal state and never fails, so a cascade ending in
//! it always completes. Every attempt is logged with provider, model,
//! duration, and outcome, and the final result records which provider
//! actually produced it.

pub mod providers;
pub mod schema;

use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use ideaforge_shared::{IdeaforgeError, ProvidersConfig, Result};

pub use providers::{FailureReason, GenerationOutput, GenerationTask, Provider};
pub use schema::{IdeaDraft, PlanDraft};

use providers::openai::{OpenAiRest, OpenAiStructured};
use providers::openrouter::OpenRouter;
use providers::template::TemplateProvider;

/// User-Agent string for generation calls.
const USER_AGENT: &str = concat!("ideaforge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Attempt records
// ---------------------------------------------------------------------------

/// One logged provider attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub provider: String,
    pub model: Option<String>,
    pub duration_ms: u64,
    /// `ok`, `unavailable`, `timeout`, `api_error`, or `invalid_response`.
    pub outcome: String,
}

/// Final result of a cascade run.
#[derive(Debug)]
pub struct CascadeOutcome {
    pub output: GenerationOutput,
    /// Which provider actually produced the output.
    pub provider: String,
    pub model: Option<String>,
    /// Total cascade duration.
    pub duration_ms: u64,
    /// Last provider error seen along the way, if any rung failed.
    pub last_error: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}

// ---------------------------------------------------------------------------
// Retry state machine
// ---------------------------------------------------------------------------

/// Bounded per-provider retry state: attempt counter, last failure, and
/// whether the strengthened instruction is active.
struct AttemptState {
    attempts: u8,
    last_failure: Option<String>,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            attempts: 0,
            last_failure: None,
        }
    }

    /// The strengthened instruction, present only on the retry.
    fn hint(&self) -> Option<String> {
        self.last_failure.as_ref().map(|failure| {
            format!(
                "Your previous response was rejected: {failure}. Output JSON \
                 only, match the requested schema exactly, and include every \
                 required element."
            )
        })
    }

    /// Exactly one same-provider retry is allowed.
    fn can_retry(&self) -> bool {
        self.attempts == 1
    }

    fn record_failure(&mut self, message: String) {
        self.last_failure = Some(message);
    }
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// The ordered provider cascade. One driver serves ideas, plans, and
/// custom ideas alike.
pub struct Cascade {
    providers: Vec<Box<dyn Provider>>,
    timeout: Duration,
}

impl Cascade {
    /// Build the standard cascade from config: structured API →
    /// general-purpose API → plain REST → deterministic templates.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IdeaforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        let timeout_secs = config.timeout_secs;
        let providers: Vec<Box<dyn Provider>> = vec![
            Box::new(OpenAiStructured::new(
                client.clone(),
                config.openai.clone(),
                timeout_secs,
            )),
            Box::new(OpenRouter::new(
                client.clone(),
                config.openrouter.clone(),
                timeout_secs,
            )),
            Box::new(OpenAiRest::new(client, config.openai.clone(), timeout_secs)),
            Box::new(TemplateProvider),
        ];

        Ok(Self::new(providers, timeout_secs))
    }

    /// Build a cascade from an explicit provider list (tests, variants).
    pub fn new(providers: Vec<Box<dyn Provider>>, timeout_secs: u64) -> Self {
        Self {
            providers,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run the cascade for one task.
    ///
    /// Errors only when every provider is exhausted — impossible for
    /// cascades that end in the template provider.
    #[instrument(skip_all, fields(task = task.kind()))]
    pub async fn run(&self, task: GenerationTask<'_>) -> Result<CascadeOutcome> {
        let total_start = Instant::now();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<String> = None;

        for provider in &self.providers {
            if !provider.available() {
                attempts.push(AttemptRecord {
                    provider: provider.id().to_string(),
                    model: provider.model(),
                    duration_ms: 0,
                    outcome: "unavailable".into(),
                });
                continue;
            }

            let mut state = AttemptState::new();

            loop {
                let hint = state.hint();
                let started = Instant::now();

                let result = tokio::time::timeout(
                    self.timeout,
                    provider.attempt(&task, hint.as_deref()),
                )
                .await;

                let duration_ms = started.elapsed().as_millis() as u64;
                state.attempts += 1;

                let failure = match result {
                    Err(_) => FailureReason::Timeout(format!(
                        "provider exceeded {}s deadline",
                        self.timeout.as_secs()
                    )),
                    Ok(Err(reason)) => reason,
                    Ok(Ok(output)) => match validate_output(&task, &output) {
                        Ok(()) => {
                            attempts.push(AttemptRecord {
                                provider: provider.id().to_string(),
                                model: provider.model(),
                                duration_ms,
                                outcome: "ok".into(),
                            });

                            info!(
                                provider = provider.id(),
                                duration_ms,
                                attempts = attempts.len(),
                                "generation succeeded"
                            );

                            return Ok(CascadeOutcome {
                                output: finalize_output(output),
                                provider: provider.id().to_string(),
                                model: provider.model(),
                                duration_ms: total_start.elapsed().as_millis() as u64,
                                last_error,
                                attempts,
                            });
                        }
                        Err(message) => FailureReason::InvalidResponse(message),
                    },
                };

                let message = failure.message();
                attempts.push(AttemptRecord {
                    provider: provider.id().to_string(),
                    model: provider.model(),
                    duration_ms,
                    outcome: outcome_tag(&failure).into(),
                });

                warn!(
                    provider = provider.id(),
                    outcome = outcome_tag(&failure),
                    error = %message,
                    "generation attempt failed"
                );

                if failure.is_retryable() && state.can_retry() {
                    state.record_failure(message);
                    continue;
                }

                last_error = Some(message);
                break;
            }
        }

        Err(IdeaforgeError::Provider(
            last_error.unwrap_or_else(|| "no generation provider available".into()),
        ))
    }
}

/// Domain validation on top of schema parsing.
fn validate_output(
    task: &GenerationTask<'_>,
    output: &GenerationOutput,
) -> std::result::Result<(), String> {
    match (task, output) {
        (GenerationTask::Ideas { .. }, GenerationOutput::Ideas(drafts)) => {
            schema::validate_idea_set(drafts)
        }
        (GenerationTask::CustomIdea { description, .. }, GenerationOutput::Idea(draft)) => {
            schema::validate_custom_idea(draft, description)
        }
        (GenerationTask::Plan { .. }, GenerationOutput::Plan(_)) => Ok(()),
        _ => Err("provider returned output of the wrong kind".into()),
    }
}

/// Normalize output before handing it back: idea sets are ordered lowest
/// effort first.
fn finalize_output(output: GenerationOutput) -> GenerationOutput {
    match output {
        GenerationOutput::Ideas(mut drafts) => {
            schema::sort_by_effort(&mut drafts);
            GenerationOutput::Ideas(drafts)
        }
        other => other,
    }
}

fn outcome_tag(failure: &FailureReason) -> &'static str {
    match failure {
        FailureReason::Unavailable => "unavailable",
        FailureReason::Timeout(_) => "timeout",
        FailureReason::Api(_) => "api_error",
        FailureReason::InvalidResponse(_) => "invalid_response",
    }
}
