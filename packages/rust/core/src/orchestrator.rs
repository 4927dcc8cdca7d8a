//! Pipeline orchestrator: runs one job through the 8 named steps.
//!
//! Steps execute strictly sequentially — a step never starts before its
//! predecessor reaches a terminal status, because later steps consume
//! earlier steps' outputs. Degraded sources mark their step `skipped` or
//! note the degradation; only an unexpected orchestration error (storage,
//! serialization) terminates a job early, marking it `failed` along with
//! any still-running step. The job record is persisted after every status
//! change so polling sees live progress.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};
use url::Url;

use ideaforge_evidence::{ProductEvidence, build_bundle, digest};
use ideaforge_generate::{Cascade, GenerationOutput, GenerationTask};
use ideaforge_reader::{ContentReader, ReadOptions, SiteRead};
use ideaforge_shared::{
    AppConfig, BundlePage, Idea, IdeaId, IdeaforgeError, IdeaSource, Job, JobStatus, NewsItem,
    Result, StepStatus,
};
use ideaforge_storage::{KIND_JOB, Store, TieredStore, put_json};
use ideaforge_theme::ThemeSampler;

use crate::steps::*;

/// User-Agent string for auxiliary evidence fetches.
const USER_AGENT: &str = concat!("ideaforge/", env!("CARGO_PKG_VERSION"));

/// Caps applied when folding evidence into the company context.
const MAX_CONTEXT_HEADINGS: usize = 20;
const MAX_CONTEXT_NAV: usize = 12;
const MAX_CONTEXT_PRESS: usize = 6;
const MAX_CONTEXT_NEWS: usize = 6;
const MAX_SAMPLE: usize = 3;

/// Record kind for the idea → job index.
pub const KIND_IDEA: &str = "idea";

/// Index record mapping an idea id to its owning job.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct IdeaIndex {
    pub job_id: ideaforge_shared::JobId,
}

// ---------------------------------------------------------------------------
// Shared pipeline dependencies
// ---------------------------------------------------------------------------

/// Everything a pipeline run needs, built once per process and shared
/// across concurrent jobs. The samplers own the process-wide caches.
pub struct PipelineDeps {
    pub config: AppConfig,
    pub reader: ContentReader,
    pub sampler: ThemeSampler,
    pub products: ideaforge_evidence::ProductSearcher,
    pub cascade: Cascade,
    pub client: reqwest::Client,
}

impl PipelineDeps {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IdeaforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            reader: ContentReader::new(ReadOptions::from(&config))?,
            sampler: ThemeSampler::new(&config.theme)?,
            products: ideaforge_evidence::ProductSearcher::new(
                client.clone(),
                config.products.clone(),
            ),
            cascade: Cascade::from_config(&config.providers)?,
            client,
            config,
        })
    }
}

// ---------------------------------------------------------------------------
// Pipeline entry point
// ---------------------------------------------------------------------------

/// Run one job to completion. Spawned as an independent task per job;
/// never panics the runtime — a fatal error marks the job failed.
#[instrument(skip_all, fields(job_id = %job.id, input = %job.input))]
pub async fn run_pipeline(job: Job, deps: Arc<PipelineDeps>, store: Arc<TieredStore>) {
    let mut run = PipelineRun {
        job,
        deps,
        store,
        site: None,
        news: Vec::new(),
        products: ProductEvidence::default(),
    };

    if let Err(e) = run.execute().await {
        error!(error = %e, "pipeline failed");
        run.fail(&e).await;
    }
}

/// State carried across steps of one run.
struct PipelineRun {
    job: Job,
    deps: Arc<PipelineDeps>,
    store: Arc<TieredStore>,
    site: Option<SiteRead>,
    news: Vec<NewsItem>,
    products: ProductEvidence,
}

impl PipelineRun {
    async fn execute(&mut self) -> Result<()> {
        self.job.status = JobStatus::Running;
        self.save().await?;

        let started = self.begin(STEP_RESOLVE).await?;
        let note = self.resolve_subject();
        self.complete(STEP_RESOLVE, StepStatus::Done, note, started)
            .await?;

        self.content_step().await?;
        self.theme_step().await?;
        self.press_step().await?;
        self.news_step().await?;
        self.products_step().await?;
        self.bundle_step().await?;
        self.generate_step().await?;

        self.job.status = JobStatus::Done;
        self.save().await?;

        info!(
            ideas = self.job.ideas.len(),
            provider = self.job.evidence.provider_used.as_deref().unwrap_or("none"),
            "pipeline complete"
        );

        Ok(())
    }

    // -- Step 1: resolve ----------------------------------------------------

    /// Fold the resolution outcome into the company context.
    fn resolve_subject(&mut self) -> Option<String> {
        let input = self.job.input.trim().to_string();
        let company = &mut self.job.company;

        let note = match &self.job.choice {
            Some(choice) if !choice.use_as_typed => {
                company.name = choice.label.clone();
                company.description = choice.description.clone();
                if let Some(domain) = &choice.domain {
                    company.url = Some(format!("https://{domain}"));
                }
                Some(format!("resolved to {}", choice.label))
            }
            Some(_) => {
                company.name = input.clone();
                Some("using the input as typed".to_string())
            }
            None => {
                company.name = input.clone();
                None
            }
        };

        if ideaforge_resolver::is_url(&input) {
            let normalized = if input.starts_with("http") {
                input.clone()
            } else {
                format!("https://{input}")
            };
            if let Ok(url) = Url::parse(&normalized) {
                if let Some(host) = url.host_str() {
                    company.name = pretty_name_from_host(host);
                }
                company.url = Some(normalized);
            }
        }

        // Last resort: guess the canonical URL from the name.
        if company.url.is_none() {
            let slug: String = company
                .name
                .to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect();
            if !slug.is_empty() {
                company.url = Some(format!("https://{slug}.com"));
            }
        }

        note
    }

    // -- Step 2: site content -----------------------------------------------

    async fn content_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_CONTENT).await?;

        let Some(url) = self.company_url() else {
            self.complete(
                STEP_CONTENT,
                StepStatus::Skipped,
                Some("no site URL to read".into()),
                started,
            )
            .await?;
            return Ok(());
        };

        let site = self.deps.reader.read_site(&url).await;

        self.job
            .evidence
            .fetch_attempts
            .extend(site.attempts.iter().cloned());
        self.job.evidence.thin_content = site.thin_content;
        self.job.evidence.thin_content_note = site.thin_note.clone();

        let company = &mut self.job.company;
        if let Some(home) = &site.home {
            if company.description.is_none() {
                company.description = home.meta_description.clone();
            }
            company.nav_labels = home
                .nav_labels
                .iter()
                .take(MAX_CONTEXT_NAV)
                .cloned()
                .collect();
        }
        company.headings = site.all_headings().into_iter().take(MAX_CONTEXT_HEADINGS).collect();

        let (status, note) = if site.home.is_none() {
            (
                StepStatus::Failed,
                Some("home page unreachable".to_string()),
            )
        } else if site.thin_content {
            (StepStatus::Done, site.thin_note.clone())
        } else {
            (
                StepStatus::Done,
                Some(format!(
                    "{} pages, {} headings",
                    1 + site.subpages.len(),
                    self.job.company.headings.len()
                )),
            )
        };

        self.site = Some(site);
        self.complete(STEP_CONTENT, status, note, started).await
    }

    // -- Step 3: theme ------------------------------------------------------

    async fn theme_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_THEME).await?;

        let url = self.company_url();
        let home_html = self
            .site
            .as_ref()
            .and_then(|s| s.home_html.as_deref().map(str::to_string));

        let outcome = self
            .deps
            .sampler
            .sample(&self.job.company.name, url.as_ref(), home_html.as_deref())
            .await;

        self.job.evidence.theme_cache_hit = outcome.cache_hit;
        let note = format!("{} theme", outcome.theme.source.as_str());
        self.job.theme = Some(outcome.theme);

        self.complete(STEP_THEME, StepStatus::Done, Some(note), started)
            .await
    }

    // -- Step 4: press ------------------------------------------------------

    async fn press_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_PRESS).await?;

        let Some(origin) = self.company_url().and_then(|u| u.join("/").ok()) else {
            self.complete(
                STEP_PRESS,
                StepStatus::Skipped,
                Some("no site origin".into()),
                started,
            )
            .await?;
            return Ok(());
        };

        let discovery = ideaforge_evidence::discover_press(
            &self.deps.client,
            &origin,
            self.deps.config.fetch.probe_timeout_secs,
        )
        .await;

        self.job
            .evidence
            .fetch_attempts
            .extend(discovery.attempts.iter().cloned());
        self.job.evidence.press_count = discovery.urls.len();
        self.job.evidence.press_sample = discovery
            .headlines
            .iter()
            .take(MAX_SAMPLE)
            .cloned()
            .collect();
        self.job.company.press_headlines = discovery
            .headlines
            .into_iter()
            .take(MAX_CONTEXT_PRESS)
            .collect();

        let note = format!("{} press pages found", self.job.evidence.press_count);
        self.complete(STEP_PRESS, StepStatus::Done, Some(note), started)
            .await
    }

    // -- Step 5: news -------------------------------------------------------

    async fn news_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_NEWS).await?;

        if self.deps.config.news.endpoint.is_none() {
            self.complete(
                STEP_NEWS,
                StepStatus::Skipped,
                Some("news index not configured".into()),
                started,
            )
            .await?;
            return Ok(());
        }

        let domain = self
            .company_url()
            .and_then(|u| u.host_str().map(str::to_string));

        let items = ideaforge_evidence::fetch_news(
            &self.deps.client,
            &self.job.company.name,
            domain.as_deref(),
            &self.deps.config.news,
        )
        .await;

        self.job.evidence.news_count = items.len();
        self.job.evidence.news_sample = items
            .iter()
            .take(MAX_SAMPLE)
            .map(|n| n.title.clone())
            .collect();
        self.job.company.news_titles = items
            .iter()
            .take(MAX_CONTEXT_NEWS)
            .map(|n| n.title.clone())
            .collect();
        self.news = items;

        let note = format!("{} news items", self.job.evidence.news_count);
        self.complete(STEP_NEWS, StepStatus::Done, Some(note), started)
            .await
    }

    // -- Step 6: products ---------------------------------------------------

    async fn products_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_PRODUCTS).await?;

        if self.deps.config.products.endpoint.is_none() {
            self.complete(
                STEP_PRODUCTS,
                StepStatus::Skipped,
                Some("product index not configured".into()),
                started,
            )
            .await?;
            return Ok(());
        }

        let keywords = ideaforge_evidence::derive_keywords(&self.job.company, 3);
        let evidence = self.deps.products.search(&keywords).await;

        self.job.evidence.product_count = evidence.items.len();
        self.job.evidence.trending_cache_hit = evidence.trending_cache_hit;
        self.job.evidence.product_sample = evidence
            .items
            .iter()
            .take(MAX_SAMPLE)
            .map(|p| p.name.clone())
            .collect();
        self.products = evidence;

        let note = format!(
            "{} products via {}",
            self.job.evidence.product_count,
            keywords.join(", ")
        );
        self.complete(STEP_PRODUCTS, StepStatus::Done, Some(note), started)
            .await
    }

    // -- Step 7: bundle -----------------------------------------------------

    async fn bundle_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_BUNDLE).await?;

        let theme = self
            .job
            .theme
            .clone()
            .ok_or_else(|| IdeaforgeError::validation("theme step did not produce a theme"))?;

        let mut pages: Vec<BundlePage> = Vec::new();
        if let Some(site) = &self.site {
            for signals in site.home.iter().chain(site.subpages.iter()) {
                pages.push(BundlePage {
                    url: signals.url.clone(),
                    title: signals.title.clone(),
                    headings: signals.headings.iter().take(8).cloned().collect(),
                });
            }
        }

        let bundle = build_bundle(
            &self.job.company,
            &theme,
            pages,
            self.job.company.press_headlines.clone(),
            std::mem::take(&mut self.news),
            std::mem::take(&mut self.products.items),
            std::mem::take(&mut self.products.patterns),
        );

        info!(summary = %digest(&bundle), "evidence bundle assembled");
        self.job.bundle = Some(bundle);

        self.complete(STEP_BUNDLE, StepStatus::Done, None, started)
            .await
    }

    // -- Step 8: generate ---------------------------------------------------

    async fn generate_step(&mut self) -> Result<()> {
        let started = self.begin(STEP_GENERATE).await?;

        let bundle = self
            .job
            .bundle
            .clone()
            .ok_or_else(|| IdeaforgeError::validation("bundle step did not produce a bundle"))?;

        let outcome = self
            .deps
            .cascade
            .run(GenerationTask::Ideas { bundle: &bundle })
            .await?;

        self.job.evidence.provider_used = Some(outcome.provider.clone());
        self.job.evidence.provider_error = outcome.last_error.clone();

        let GenerationOutput::Ideas(drafts) = outcome.output else {
            return Err(IdeaforgeError::Provider(
                "cascade returned non-idea output for an ideas task".into(),
            ));
        };

        self.job.ideas = drafts
            .into_iter()
            .map(|draft| Idea {
                id: IdeaId::new(),
                job_id: self.job.id,
                title: draft.title,
                summary: draft.summary,
                effort: draft.effort,
                outline: draft.outline,
                inspired_by: draft.inspired_by,
                source: IdeaSource::Generated,
            })
            .collect();

        // Index ideas for direct lookup.
        for idea in &self.job.ideas {
            put_json(
                self.store.as_ref(),
                KIND_IDEA,
                &idea.id.to_string(),
                &IdeaIndex {
                    job_id: self.job.id,
                },
            )
            .await?;
        }

        let note = format!(
            "{} ideas via {}",
            self.job.ideas.len(),
            outcome.provider
        );
        self.complete(STEP_GENERATE, StepStatus::Done, Some(note), started)
            .await
    }

    // -- Plumbing -----------------------------------------------------------

    fn company_url(&self) -> Option<Url> {
        self.job
            .company
            .url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
    }

    fn step_mut(&mut self, id: &str) -> Option<&mut ideaforge_shared::AnalysisStep> {
        self.job.steps.iter_mut().find(|s| s.id == id)
    }

    /// Mark a step running and persist. Terminal steps never regress.
    async fn begin(&mut self, id: &str) -> Result<Instant> {
        let delay = self.deps.config.defaults.step_delay_ms;
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        if let Some(step) = self.step_mut(id) {
            if !step.status.is_terminal() {
                step.status = StepStatus::Running;
            }
        }
        self.save().await?;
        Ok(Instant::now())
    }

    /// Mark a step terminal, record its timing, and persist.
    async fn complete(
        &mut self,
        id: &str,
        status: StepStatus,
        note: Option<String>,
        started: Instant,
    ) -> Result<()> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.job.evidence.record_timing(id, elapsed_ms);

        if let Some(step) = self.step_mut(id) {
            step.status = status;
            step.note = note;
        }

        self.job.updated_at = chrono::Utc::now();
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        put_json(
            self.store.as_ref(),
            KIND_JOB,
            &self.job.id.to_string(),
            &self.job,
        )
        .await
    }

    /// Fatal path: mark the job failed and fail any still-running step.
    async fn fail(&mut self, error: &IdeaforgeError) {
        self.job.status = JobStatus::Failed;
        for step in &mut self.job.steps {
            if step.status == StepStatus::Running {
                step.status = StepStatus::Failed;
                step.note = Some(error.to_string());
            }
        }
        self.job.updated_at = chrono::Utc::now();

        if let Err(e) = self.save().await {
            warn!(error = %e, "could not persist failed job state");
        }
    }
}

/// "docs.example.com" → "Example", "acme.io" → "Acme".
fn pretty_name_from_host(host: &str) -> String {
    let host = host.trim_start_matches("www.");
    let base = host.split('.').next().unwrap_or(host);
    let mut name = base.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_pretty_names() {
        assert_eq!(pretty_name_from_host("www.acme.com"), "Acme");
        assert_eq!(pretty_name_from_host("acme.io"), "Acme");
        assert_eq!(pretty_name_from_host("docs.example.com"), "Docs");
    }
}
