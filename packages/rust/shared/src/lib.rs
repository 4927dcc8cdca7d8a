//! Shared types, error model, and configuration for ideaforge.
//!
//! This crate is the foundation depended on by all other ideaforge crates.
//! It provides:
//! - [`IdeaforgeError`] — the unified error type
//! - Domain types ([`Job`], [`AnalysisStep`], [`Theme`], [`ContextBundle`], [`Idea`], …)
//! - Configuration ([`AppConfig`], config loading, credential resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, LookupConfig, NewsIndexConfig, OpenAiConfig,
    OpenRouterConfig, ProductIndexConfig, ProvidersConfig, StorageConfig, ThemeConfig,
    config_dir, config_file_path, db_path, init_config, load_config, load_config_from,
    read_api_key,
};
pub use error::{IdeaforgeError, Result};
pub use types::{
    AnalysisStep, BuildPlan, BuildStep, BundleBrand, BundleCompany, BundlePage, CompanyContext,
    ContextBundle, DisambiguationOption, EffortLevel, Evidence, FetchAttempt, FetchOutcome,
    Idea, IdeaId, IdeaOutline, IdeaSource, Job, JobId, JobStatus, NewsItem, ProductItem,
    StepStatus, StepTiming, Theme, ThemeSource,
};
