//! The analysis service: the operations the endpoint layer calls.
//!
//! Owns the stores and shared pipeline dependencies. Job kickoff is an
//! explicit `tokio::spawn` writing through the shared store; polling
//! reads a cloned snapshot and never mutates job state. An unknown job,
//! idea, or plan id is a distinct `NotFound` error that is never retried
//! automatically — the state it refers to is gone.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use ideaforge_generate::{GenerationOutput, GenerationTask};
use ideaforge_resolver::Resolution;
use ideaforge_shared::{
    AppConfig, BuildPlan, CompanyContext, DisambiguationOption, Evidence, Idea, IdeaId,
    IdeaSource, IdeaforgeError, Job, JobId, JobStatus, Result, Theme, db_path,
};
use ideaforge_storage::{KIND_JOB, KIND_PLAN, TieredStore, get_json, put_json};

use crate::orchestrator::{IdeaIndex, KIND_IDEA, PipelineDeps, run_pipeline};
use crate::steps::initial_steps;

/// Custom idea descriptions must be within these bounds.
const MIN_DESCRIPTION_CHARS: usize = 40;
const MAX_DESCRIPTION_CHARS: usize = 600;

/// Outcome of submitting an analysis request.
#[derive(Debug)]
pub enum StartOutcome {
    /// The caller must pick an entity before analysis can begin.
    NeedsDisambiguation { options: Vec<DisambiguationOption> },
    /// The pipeline is running; poll with the job id.
    Started { job_id: JobId },
}

/// Entry point for all analysis operations.
pub struct AnalysisService {
    deps: Arc<PipelineDeps>,
    store: Arc<TieredStore>,
}

impl AnalysisService {
    /// Open the durable store at the configured path and build the
    /// shared pipeline dependencies.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let path = db_path(&config)?;
        let store = Arc::new(TieredStore::open(&path).await?);
        Self::with_store(config, store)
    }

    /// Build against an explicit store (tests, ephemeral runs).
    pub fn with_store(config: AppConfig, store: Arc<TieredStore>) -> Result<Self> {
        Ok(Self {
            deps: Arc::new(PipelineDeps::from_config(config)?),
            store,
        })
    }

    // -----------------------------------------------------------------------
    // Start analysis
    // -----------------------------------------------------------------------

    /// Resolve the subject, then either ask for disambiguation or create
    /// the job and kick off its pipeline task.
    #[instrument(skip_all, fields(input = %input))]
    pub async fn start_analysis(
        &self,
        input: &str,
        choice: Option<DisambiguationOption>,
    ) -> Result<StartOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdeaforgeError::validation("input must not be empty"));
        }

        let choice = match choice {
            Some(choice) => Some(choice),
            None => {
                match ideaforge_resolver::resolve(input, &self.deps.config.lookup).await {
                    Resolution::NeedsDisambiguation { options } => {
                        info!(options = options.len(), "disambiguation required");
                        return Ok(StartOutcome::NeedsDisambiguation { options });
                    }
                    Resolution::AutoResolved { option } => Some(option),
                    Resolution::Unambiguous => None,
                }
            }
        };

        let now = Utc::now();
        let job = Job {
            id: JobId::new(),
            input: input.to_string(),
            choice,
            steps: initial_steps(),
            status: JobStatus::Pending,
            company: CompanyContext::default(),
            theme: None,
            evidence: Evidence::default(),
            bundle: None,
            ideas: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let job_id = job.id;
        put_json(self.store.as_ref(), KIND_JOB, &job_id.to_string(), &job).await?;

        // One independent task per job. There is no cancellation path: a
        // job whose caller goes away runs to completion and persists a
        // result nobody reads.
        tokio::spawn(run_pipeline(job, self.deps.clone(), self.store.clone()));

        info!(%job_id, "analysis started");
        Ok(StartOutcome::Started { job_id })
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Read-only snapshot of a job. Idempotent; never mutates.
    pub async fn job_status(&self, job_id: &JobId) -> Result<Job> {
        get_json(self.store.as_ref(), KIND_JOB, &job_id.to_string())
            .await?
            .ok_or_else(|| IdeaforgeError::not_found("job", job_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Ideas
    // -----------------------------------------------------------------------

    /// One idea plus the job's resolved theme.
    pub async fn idea_detail(&self, idea_id: &IdeaId) -> Result<(Idea, Option<Theme>)> {
        let (job, position) = self.find_idea(idea_id).await?;
        Ok((job.ideas[position].clone(), job.theme))
    }

    /// Create a custom idea from a caller-written description.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn create_custom_idea(&self, job_id: &JobId, description: &str) -> Result<Idea> {
        validate_description(description)?;

        let mut job = self.job_status(job_id).await?;
        let bundle = job.bundle.clone().ok_or_else(|| {
            IdeaforgeError::validation("analysis has not produced an evidence bundle yet")
        })?;

        let outcome = self
            .deps
            .cascade
            .run(GenerationTask::CustomIdea {
                bundle: &bundle,
                description,
            })
            .await?;

        let GenerationOutput::Idea(draft) = outcome.output else {
            return Err(IdeaforgeError::Provider(
                "cascade returned non-idea output for a custom-idea task".into(),
            ));
        };

        let idea = Idea {
            id: IdeaId::new(),
            job_id: *job_id,
            title: draft.title,
            summary: draft.summary,
            effort: draft.effort,
            outline: draft.outline,
            inspired_by: draft.inspired_by,
            source: IdeaSource::Custom,
        };

        job.ideas.push(idea.clone());
        job.updated_at = Utc::now();
        put_json(self.store.as_ref(), KIND_JOB, &job_id.to_string(), &job).await?;
        put_json(
            self.store.as_ref(),
            KIND_IDEA,
            &idea.id.to_string(),
            &IdeaIndex { job_id: *job_id },
        )
        .await?;

        info!(idea_id = %idea.id, provider = %outcome.provider, "custom idea created");
        Ok(idea)
    }

    /// Regenerate an existing idea against a new description. The only
    /// operation that mutates an idea in place.
    #[instrument(skip_all, fields(idea_id = %idea_id))]
    pub async fn regenerate_idea(&self, idea_id: &IdeaId, description: &str) -> Result<Idea> {
        validate_description(description)?;

        let (mut job, position) = self.find_idea(idea_id).await?;
        let bundle = job.bundle.clone().ok_or_else(|| {
            IdeaforgeError::validation("analysis has not produced an evidence bundle yet")
        })?;

        let outcome = self
            .deps
            .cascade
            .run(GenerationTask::CustomIdea {
                bundle: &bundle,
                description,
            })
            .await?;

        let GenerationOutput::Idea(draft) = outcome.output else {
            return Err(IdeaforgeError::Provider(
                "cascade returned non-idea output for a custom-idea task".into(),
            ));
        };

        {
            let idea = &mut job.ideas[position];
            idea.title = draft.title;
            idea.summary = draft.summary;
            idea.effort = draft.effort;
            idea.outline = draft.outline;
            idea.source = IdeaSource::Custom;
        }
        job.updated_at = Utc::now();
        put_json(self.store.as_ref(), KIND_JOB, &job.id.to_string(), &job).await?;

        // A regenerated idea invalidates its cached plan.
        put_json(
            self.store.as_ref(),
            KIND_PLAN,
            &idea_id.to_string(),
            &Option::<BuildPlan>::None,
        )
        .await?;

        Ok(job.ideas[position].clone())
    }

    // -----------------------------------------------------------------------
    // Build plans
    // -----------------------------------------------------------------------

    /// Cached plan if present, else generate and cache.
    #[instrument(skip_all, fields(idea_id = %idea_id))]
    pub async fn build_plan(&self, idea_id: &IdeaId) -> Result<BuildPlan> {
        if let Some(Some(plan)) = get_json::<Option<BuildPlan>>(
            self.store.as_ref(),
            KIND_PLAN,
            &idea_id.to_string(),
        )
        .await?
        {
            info!("build plan served from cache");
            return Ok(plan);
        }

        let (job, position) = self.find_idea(idea_id).await?;
        let bundle = job.bundle.as_ref().ok_or_else(|| {
            IdeaforgeError::validation("analysis has not produced an evidence bundle yet")
        })?;

        let outcome = self
            .deps
            .cascade
            .run(GenerationTask::Plan {
                bundle,
                idea: &job.ideas[position],
            })
            .await?;

        let GenerationOutput::Plan(draft) = outcome.output else {
            return Err(IdeaforgeError::Provider(
                "cascade returned non-plan output for a plan task".into(),
            ));
        };

        let plan = BuildPlan {
            idea_id: *idea_id,
            setup_script: draft.setup_script,
            folder_name: draft.folder_name,
            steps: draft.steps,
            provider: outcome.provider.clone(),
            generated_in_ms: outcome.duration_ms,
        };

        put_json(
            self.store.as_ref(),
            KIND_PLAN,
            &idea_id.to_string(),
            &Some(plan.clone()),
        )
        .await?;

        info!(provider = %outcome.provider, duration_ms = outcome.duration_ms, "build plan generated");
        Ok(plan)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn find_idea(&self, idea_id: &IdeaId) -> Result<(Job, usize)> {
        let index: IdeaIndex = get_json(self.store.as_ref(), KIND_IDEA, &idea_id.to_string())
            .await?
            .ok_or_else(|| IdeaforgeError::not_found("idea", idea_id.to_string()))?;

        let job = self.job_status(&index.job_id).await?;
        let position = job
            .ideas
            .iter()
            .position(|i| i.id == *idea_id)
            .ok_or_else(|| IdeaforgeError::not_found("idea", idea_id.to_string()))?;

        Ok((job, position))
    }
}

fn validate_description(description: &str) -> Result<()> {
    let len = description.trim().chars().count();
    if !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&len) {
        return Err(IdeaforgeError::validation(format!(
            "description must be {MIN_DESCRIPTION_CHARS}-{MAX_DESCRIPTION_CHARS} characters, got {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_shared::StepStatus;
    use std::time::Duration;

    fn offline_config(lookup_endpoint: &str) -> AppConfig {
        let mut config = AppConfig::default();
        // Point the lookup at a dead endpoint so resolution relies on the
        // static table only; news/product indexes stay unconfigured, and
        // provider credentials point at env vars that are never set.
        config.lookup.endpoint = lookup_endpoint.to_string();
        config.lookup.timeout_secs = 1;
        config.fetch.page_timeout_secs = 2;
        config.fetch.probe_timeout_secs = 1;
        config.providers.openai.api_key_env = "IF_TEST_UNSET_OPENAI_KEY".into();
        config.providers.openrouter.api_key_env = "IF_TEST_UNSET_OPENROUTER_KEY".into();
        config
    }

    fn service(config: AppConfig) -> AnalysisService {
        AnalysisService::with_store(config, Arc::new(TieredStore::in_memory())).unwrap()
    }

    async fn wait_for_terminal(service: &AnalysisService, job_id: &JobId) -> Job {
        for _ in 0..200 {
            let job = service.job_status(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job did not reach a terminal status");
    }

    #[tokio::test]
    async fn new_job_starts_with_eight_pending_steps() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let svc = service(offline_config("http://127.0.0.1:9"));
        let outcome = svc.start_analysis(&server.uri(), None).await.unwrap();

        let StartOutcome::Started { job_id } = outcome else {
            panic!("URL input must never disambiguate");
        };

        let job = svc.job_status(&job_id).await.unwrap();
        assert_eq!(job.steps.len(), 8);
        assert_eq!(job.steps[0].id, "resolve");
        assert_eq!(job.steps[7].id, "generate");

        wait_for_terminal(&svc, &job_id).await;
    }

    #[tokio::test]
    async fn ambiguous_name_needs_disambiguation_with_lookup_down() {
        let svc = service(offline_config("http://127.0.0.1:9"));
        let outcome = svc.start_analysis("apple", None).await.unwrap();

        match outcome {
            StartOutcome::NeedsDisambiguation { options } => {
                assert!(options.len() >= 2);
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                assert!(labels.contains(&"Apple Inc."));
                assert!(labels.contains(&"Apple Records"));
            }
            StartOutcome::Started { .. } => panic!("expected disambiguation"),
        }
    }

    #[tokio::test]
    async fn full_pipeline_completes_offline_with_template_ideas() {
        let server = wiremock::MockServer::start().await;

        let home = r#"<html><head><title>Acme</title>
            <meta name="description" content="Rockets for everyone">
            <style>:root { --brand-primary: #635bff; }</style>
        </head><body>
            <nav><a href="/products">Products</a><a href="/pricing">Pricing</a></nav>
            <h1>Acme rockets</h1><h2>Ship faster</h2><h2>Trusted</h2>
            <p>Acme has been building rockets for discerning coyotes since 1949,
            with a catalog spanning anvils, tunnels, and jet-powered skates.</p>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(home))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let svc = service(offline_config("http://127.0.0.1:9"));
        let StartOutcome::Started { job_id } =
            svc.start_analysis(&server.uri(), None).await.unwrap()
        else {
            panic!("URL input must never disambiguate");
        };

        let job = wait_for_terminal(&svc, &job_id).await;

        assert_eq!(job.status, JobStatus::Done);
        // No step remains running; every step is terminal
        assert!(job.steps.iter().all(|s| s.status.is_terminal()));
        assert!(
            job.steps
                .iter()
                .all(|s| s.status != StepStatus::Running && s.status != StepStatus::Pending)
        );

        // News/product indexes were unconfigured → skipped, not failed
        let news = job.steps.iter().find(|s| s.id == "news").unwrap();
        assert_eq!(news.status, StepStatus::Skipped);

        // All providers credential-less → deterministic template output
        assert_eq!(job.evidence.provider_used.as_deref(), Some("template"));
        assert_eq!(job.ideas.len(), 15);
        for pair in job.ideas.windows(2) {
            assert!(pair[0].effort <= pair[1].effort);
        }

        // Theme came from the page's brand variable
        let theme = job.theme.expect("theme");
        assert_eq!(theme.primary, "#635bff");

        // Bundle exists and carries the company identity
        let bundle = job.bundle.expect("bundle");
        assert_eq!(bundle.company.description.as_deref(), Some("Rockets for everyone"));

        // Timings recorded for every step
        assert!(job.evidence.step_timings.len() >= 8);
    }

    #[tokio::test]
    async fn idea_detail_and_plan_flow() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let svc = service(offline_config("http://127.0.0.1:9"));
        let StartOutcome::Started { job_id } =
            svc.start_analysis(&server.uri(), None).await.unwrap()
        else {
            panic!("expected start");
        };
        let job = wait_for_terminal(&svc, &job_id).await;
        let idea_id = job.ideas[0].id;

        // Idea detail resolves via the index
        let (idea, theme) = svc.idea_detail(&idea_id).await.unwrap();
        assert_eq!(idea.id, idea_id);
        assert!(theme.is_some());

        // First plan call generates, second serves the cache
        let plan = svc.build_plan(&idea_id).await.unwrap();
        assert_eq!(plan.provider, "template");
        assert!(plan.steps.len() >= 5);

        let cached = svc.build_plan(&idea_id).await.unwrap();
        assert_eq!(cached.generated_in_ms, plan.generated_in_ms);
        assert_eq!(cached.steps.len(), plan.steps.len());
    }

    #[tokio::test]
    async fn custom_idea_bounds_and_creation() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let svc = service(offline_config("http://127.0.0.1:9"));
        let StartOutcome::Started { job_id } =
            svc.start_analysis(&server.uri(), None).await.unwrap()
        else {
            panic!("expected start");
        };
        let job = wait_for_terminal(&svc, &job_id).await;
        let before = job.ideas.len();

        // Too short
        let err = svc.create_custom_idea(&job_id, "too short").await.unwrap_err();
        assert!(matches!(err, IdeaforgeError::Validation { .. }));

        // Valid description
        let description =
            "an inventory tracker for warehouse teams with barcode scanning and alerts";
        let idea = svc.create_custom_idea(&job_id, description).await.unwrap();
        assert_eq!(idea.source, IdeaSource::Custom);

        let job = svc.job_status(&job_id).await.unwrap();
        assert_eq!(job.ideas.len(), before + 1);

        // Regenerate mutates in place
        let regenerated = svc
            .regenerate_idea(
                &idea.id,
                "a delivery route planner with live traffic awareness for drivers",
            )
            .await
            .unwrap();
        assert_eq!(regenerated.id, idea.id);
        assert!(regenerated.summary.contains("delivery route planner"));

        let job = svc.job_status(&job_id).await.unwrap();
        assert_eq!(job.ideas.len(), before + 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let svc = service(offline_config("http://127.0.0.1:9"));

        let err = svc.job_status(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, IdeaforgeError::NotFound { .. }));

        let err = svc.idea_detail(&IdeaId::new()).await.unwrap_err();
        assert!(matches!(err, IdeaforgeError::NotFound { .. }));

        let err = svc.build_plan(&IdeaId::new()).await.unwrap_err();
        assert!(matches!(err, IdeaforgeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn blocked_site_still_completes_with_evidence_trail() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let svc = service(offline_config("http://127.0.0.1:9"));
        let StartOutcome::Started { job_id } =
            svc.start_analysis(&server.uri(), None).await.unwrap()
        else {
            panic!("expected start");
        };
        let job = wait_for_terminal(&svc, &job_id).await;

        // The pipeline still finishes and produces ideas
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.ideas.len(), 15);

        // The evidence trail distinguishes "blocked" from "no data"
        assert!(
            job.evidence
                .fetch_attempts
                .iter()
                .any(|a| a.status_code == Some(403))
        );
        assert!(job.evidence.thin_content);

        // Theme fell back to the deterministic palette
        assert_eq!(
            job.theme.unwrap().source,
            ideaforge_shared::ThemeSource::Default
        );
    }
}
