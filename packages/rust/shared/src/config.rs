//! Application configuration for ideaforge.
//!
//! User config lives at `~/.ideaforge/ideaforge.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are referenced by env-var name and read at call time,
//! never stored in the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IdeaforgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ideaforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ideaforge";

// ---------------------------------------------------------------------------
// Config structs (matching ideaforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Knowledge-lookup service settings.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// External news index settings.
    #[serde(default)]
    pub news: NewsIndexConfig,

    /// Product-discovery index settings.
    #[serde(default)]
    pub products: ProductIndexConfig,

    /// Brand theme settings.
    #[serde(default)]
    pub theme: ThemeConfig,

    /// Generation provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum number of related sub-pages to read per subject.
    #[serde(default = "default_max_subpages")]
    pub max_subpages: usize,

    /// Artificial delay between pipeline steps, for demo pacing.
    #[serde(default)]
    pub step_delay_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_subpages: default_max_subpages(),
            step_delay_ms: 0,
        }
    }
}

fn default_max_subpages() -> usize {
    3
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for direct page fetches (Stage A), seconds.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for existence probes (HEAD/GET), seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Whether the heavyweight-render fallback (Stage B) is enabled.
    #[serde(default)]
    pub render_fallback: bool,

    /// Endpoint of the headless-render service, required when
    /// `render_fallback` is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_endpoint: Option<String>,

    /// Timeout for render-service calls, seconds.
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: default_page_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            render_fallback: false,
            render_endpoint: None,
            render_timeout_secs: default_render_timeout(),
        }
    }
}

fn default_page_timeout() -> u64 {
    8
}
fn default_probe_timeout() -> u64 {
    4
}
fn default_render_timeout() -> u64 {
    20
}

/// `[lookup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Base URL of the knowledge-lookup service (wbsearchentities contract).
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,

    /// Lookup timeout, seconds.
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_lookup_endpoint(),
            timeout_secs: default_lookup_timeout(),
        }
    }
}

fn default_lookup_endpoint() -> String {
    "https://www.wikidata.org/w/api.php".into()
}
fn default_lookup_timeout() -> u64 {
    6
}

/// `[news]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsIndexConfig {
    /// Search endpoint of the news index. Unset disables the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Name of the env var holding the API key (never the key itself).
    #[serde(default = "default_news_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

impl Default for NewsIndexConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: default_news_key_env(),
            timeout_secs: default_index_timeout(),
        }
    }
}

fn default_news_key_env() -> String {
    "NEWS_INDEX_API_KEY".into()
}
fn default_index_timeout() -> u64 {
    8
}

/// `[products]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductIndexConfig {
    /// Search endpoint of the product-discovery index. Unset disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_products_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,

    /// TTL for the cached trending query, seconds.
    #[serde(default = "default_trending_ttl")]
    pub trending_ttl_secs: u64,
}

impl Default for ProductIndexConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: default_products_key_env(),
            timeout_secs: default_index_timeout(),
            trending_ttl_secs: default_trending_ttl(),
        }
    }
}

fn default_products_key_env() -> String {
    "PRODUCT_INDEX_API_KEY".into()
}
fn default_trending_ttl() -> u64 {
    30 * 60
}

/// `[theme]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// TTL for the per-origin theme cache, seconds.
    #[serde(default = "default_theme_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_theme_ttl(),
        }
    }
}

fn default_theme_ttl() -> u64 {
    6 * 60 * 60
}

/// `[providers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Timeout for generation calls, seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            openrouter: OpenRouterConfig::default(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_timeout() -> u64 {
    60
}

/// `[providers.openai]` — primary structured-output API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Base URL, overridable for tests.
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_openai_model(),
            endpoint: default_openai_endpoint(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}

/// `[providers.openrouter]` — secondary general-purpose API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openrouter_model")]
    pub model: String,

    #[serde(default = "default_openrouter_endpoint")]
    pub endpoint: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openrouter_key_env(),
            model: default_openrouter_model(),
            endpoint: default_openrouter_endpoint(),
        }
    }
}

fn default_openrouter_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_openrouter_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_openrouter_endpoint() -> String {
    "https://openrouter.ai/api/v1".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path. Defaults to `<config dir>/ideaforge.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ideaforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| IdeaforgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ideaforge/ideaforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IdeaforgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        IdeaforgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IdeaforgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IdeaforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IdeaforgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path from config, defaulting under the config dir.
pub fn db_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.db_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(config_dir()?.join("ideaforge.db")),
    }
}

/// Read a credential by env-var name. Returns `None` when unset or empty,
/// which providers treat as "unavailable, skip".
pub fn read_api_key(env_name: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("wikidata.org"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_subpages, 3);
        assert_eq!(parsed.fetch.page_timeout_secs, 8);
        assert_eq!(parsed.fetch.probe_timeout_secs, 4);
        assert_eq!(parsed.providers.timeout_secs, 60);
        assert!(!parsed.fetch.render_fallback);
    }

    #[test]
    fn render_fallback_opt_in() {
        let toml_str = r#"
[fetch]
render_fallback = true
render_endpoint = "http://localhost:9222/render"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.fetch.render_fallback);
        assert_eq!(
            config.fetch.render_endpoint.as_deref(),
            Some("http://localhost:9222/render")
        );
    }

    #[test]
    fn read_api_key_empty_is_none() {
        // Use a unique env var name to avoid interfering with other tests
        assert!(read_api_key("IF_TEST_NONEXISTENT_KEY_98765").is_none());
    }
}
