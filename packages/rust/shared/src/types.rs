//! Core domain types for ideaforge analysis runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for job identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A UUID v7 wrapper for idea identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdeaId(pub Uuid);

impl IdeaId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for IdeaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdeaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IdeaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Status of a single pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Skipped,
    Failed,
}

impl StepStatus {
    /// A step in a terminal status never regresses to `running`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }
}

/// One named stage of the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStep {
    /// Stable step identifier (e.g., `resolve`, `theme`).
    pub id: String,
    /// Human-readable label shown to the caller.
    pub label: String,
    /// Current step status.
    pub status: StepStatus,
    /// Optional human-readable note (e.g., fallback reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AnalysisStep {
    pub fn pending(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: StepStatus::Pending,
            note: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Overall status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One end-to-end analysis run for a single subject.
///
/// Created at submission with all steps `pending`; mutated only by the
/// orchestrator; terminal once status is `done` or `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Raw input text as typed by the caller.
    pub input: String,
    /// Disambiguation choice, if the caller picked one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<DisambiguationOption>,
    /// Ordered pipeline steps.
    pub steps: Vec<AnalysisStep>,
    pub status: JobStatus,
    /// Resolved subject attributes, built incrementally by the pipeline.
    pub company: CompanyContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    pub evidence: Evidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<ContextBundle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ideas: Vec<Idea>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Disambiguation
// ---------------------------------------------------------------------------

/// One candidate entity offered to the caller when the subject is ambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationOption {
    /// Display label (e.g., "Apple Inc.").
    pub label: String,
    /// Short description of the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Known web domain, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Knowledge-service entity id, if the candidate came from the lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Synthetic escape option: proceed with the input exactly as typed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_as_typed: bool,
}

// ---------------------------------------------------------------------------
// CompanyContext
// ---------------------------------------------------------------------------

/// Descriptive attributes of the resolved subject.
///
/// Built incrementally by each pipeline stage; read-only to generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyContext {
    /// Resolved display name.
    pub name: String,
    /// Canonical site URL, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub industry_hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nav_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub press_headlines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub news_titles: Vec<String>,
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Outcome of one fetch attempt against a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Ok,
    Blocked,
    Timeout,
    Error,
    NotFound,
    Empty,
}

/// Diagnostic record of one attempted URL fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub url: String,
    pub outcome: FetchOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Elapsed wall-clock time for one pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTiming {
    pub step: String,
    pub ms: u64,
}

/// Observability record paired 1:1 with a job. Append-only during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    /// Whether the theme came from the per-origin cache.
    #[serde(default)]
    pub theme_cache_hit: bool,
    /// Whether the trending product query came from the cache.
    #[serde(default)]
    pub trending_cache_hit: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_timings: Vec<StepTiming>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch_attempts: Vec<FetchAttempt>,
    #[serde(default)]
    pub press_count: usize,
    #[serde(default)]
    pub news_count: usize,
    #[serde(default)]
    pub product_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub press_sample: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub news_sample: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_sample: Vec<String>,
    /// Set when the home-page read came back thin.
    #[serde(default)]
    pub thin_content: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thin_content_note: Option<String>,
    /// Which generation provider actually produced the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    /// Last provider error message, if any provider failed along the way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
}

impl Evidence {
    /// Record the elapsed time of a named step.
    pub fn record_timing(&mut self, step: &str, ms: u64) {
        self.step_timings.push(StepTiming {
            step: step.to_string(),
            ms,
        });
    }
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// Provenance of a derived brand theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeSource {
    #[serde(rename = "site-css")]
    SiteCss,
    #[serde(rename = "favicon")]
    Favicon,
    #[serde(rename = "default")]
    Default,
}

impl ThemeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteCss => "site-css",
            Self::Favicon => "favicon",
            Self::Default => "default",
        }
    }
}

/// Brand visual attributes for a subject. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Primary brand color, hex (`#rrggbb`).
    pub primary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    pub border_radius: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub source: ThemeSource,
}

// ---------------------------------------------------------------------------
// ContextBundle
// ---------------------------------------------------------------------------

/// A news item from the external news index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// A product from the product-discovery index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A page read by the content reader, reduced to its signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlePage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
}

/// Brand colors as seen by generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleBrand {
    pub primary: String,
    pub accent: String,
    pub source: ThemeSource,
}

/// Company identity as seen by generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleCompany {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub industry_hints: Vec<String>,
}

/// The canonical, serializable merge of context + theme + evidence.
///
/// Built once per job after all evidence gathering; consumed only by the
/// generation cascade and the prompt/summary serializers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub company: BundleCompany,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<BundlePage>,
    pub brand: BundleBrand,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub press: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub news: Vec<NewsItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Ideas
// ---------------------------------------------------------------------------

/// How long an idea should take to build, shortest to longest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EffortLevel {
    Starter,
    Sprint,
    DayBuild,
    Weekender,
    Flagship,
}

impl EffortLevel {
    /// All levels in ascending effort order.
    pub fn all() -> [EffortLevel; 5] {
        [
            Self::Starter,
            Self::Sprint,
            Self::DayBuild,
            Self::Weekender,
            Self::Flagship,
        ]
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Starter => "Starter (under an hour)",
            Self::Sprint => "Sprint (a few hours)",
            Self::DayBuild => "Day build",
            Self::Weekender => "Weekender",
            Self::Flagship => "Flagship (a week or more)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Sprint => "sprint",
            Self::DayBuild => "day-build",
            Self::Weekender => "weekender",
            Self::Flagship => "flagship",
        }
    }
}

/// Where an idea came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaSource {
    Generated,
    Custom,
}

/// Structured outline of what an idea's prototype contains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdeaOutline {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nice_to_haves: Vec<String>,
}

/// One generated prototype concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub id: IdeaId,
    pub job_id: JobId,
    pub title: String,
    pub summary: String,
    pub effort: EffortLevel,
    pub outline: IdeaOutline,
    /// Angle borrowed from press/news/product evidence, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspired_by: Option<String>,
    pub source: IdeaSource,
}

// ---------------------------------------------------------------------------
// Build plans
// ---------------------------------------------------------------------------

/// One step of a build plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStep {
    /// Who performs the step (e.g., "terminal", "agent", "you").
    pub role: String,
    pub title: String,
    pub instruction: String,
    /// Verbatim prompt text to paste into a coding agent.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub done_looks_like: Vec<String>,
}

/// Step-by-step build instructions tied to one idea. Cached per idea id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub idea_id: IdeaId,
    /// Terminal script that scaffolds the project.
    pub setup_script: String,
    pub folder_name: String,
    pub steps: Vec<BuildStep>,
    /// Which provider produced the plan.
    pub provider: String,
    /// Generation duration in milliseconds.
    pub generated_in_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_roundtrip() {
        let id = JobId::new();
        let s = id.to_string();
        let parsed: JobId = s.parse().expect("parse JobId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn effort_levels_are_ordered() {
        let all = EffortLevel::all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn step_status_terminal() {
        assert!(StepStatus::Done.is_terminal());
        assert!(StepStatus::Skipped.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }

    #[test]
    fn theme_source_serialization() {
        let json = serde_json::to_string(&ThemeSource::SiteCss).unwrap();
        assert_eq!(json, "\"site-css\"");
        let json = serde_json::to_string(&ThemeSource::Favicon).unwrap();
        assert_eq!(json, "\"favicon\"");
    }

    #[test]
    fn effort_level_serialization() {
        let json = serde_json::to_string(&EffortLevel::DayBuild).unwrap();
        assert_eq!(json, "\"day-build\"");
        let parsed: EffortLevel = serde_json::from_str("\"weekender\"").unwrap();
        assert_eq!(parsed, EffortLevel::Weekender);
    }

    #[test]
    fn fetch_outcome_serialization() {
        let json = serde_json::to_string(&FetchOutcome::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }

    #[test]
    fn bundle_serialization_skips_empty_sections() {
        let bundle = ContextBundle {
            company: BundleCompany {
                name: "Acme".into(),
                url: None,
                description: None,
                industry_hints: vec![],
            },
            pages: vec![],
            brand: BundleBrand {
                primary: "#336699".into(),
                accent: "#cc3366".into(),
                source: ThemeSource::Default,
            },
            press: vec![],
            news: vec![],
            products: vec![],
            product_patterns: vec![],
        };

        let json = serde_json::to_string(&bundle).expect("serialize");
        assert!(!json.contains("\"press\""));
        assert!(!json.contains("\"news\""));
        assert!(!json.contains("\"products\""));
    }

    #[test]
    fn evidence_timings_append() {
        let mut evidence = Evidence::default();
        evidence.record_timing("resolve", 120);
        evidence.record_timing("theme", 340);
        assert_eq!(evidence.step_timings.len(), 2);
        assert_eq!(evidence.step_timings[0].step, "resolve");
        assert_eq!(evidence.step_timings[1].ms, 340);
    }
}
