//! Brand theme sampler.
//!
//! Cascades through extraction strategies, short-circuiting on the first
//! success: page style rules → favicon color sampling → deterministic
//! name-derived palette. The terminal strategy never fails, so every
//! subject gets a usable, stable theme even with zero real signal.
//! Results are cached per web origin with a time-to-live.

pub mod css;
pub mod favicon;
pub mod palette;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use ideaforge_shared::{IdeaforgeError, Result, Theme, ThemeConfig, ThemeSource};
use ideaforge_storage::TtlCache;

pub use palette::{derive_palette, is_usable_color};

/// User-Agent string for stylesheet/favicon fetches.
const USER_AGENT: &str = concat!("ideaforge/", env!("CARGO_PKG_VERSION"));

/// Timeout for stylesheet and favicon fetches, seconds.
const ASSET_TIMEOUT_SECS: u64 = 6;

/// At most this many linked stylesheets are fetched.
const MAX_STYLESHEETS: usize = 2;

/// Result of a theme sample, with cache provenance for the evidence trail.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub theme: Theme,
    pub cache_hit: bool,
}

/// Samples brand themes, caching per origin.
pub struct ThemeSampler {
    client: Client,
    cache: TtlCache<Theme>,
}

impl ThemeSampler {
    pub fn new(config: &ThemeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(ASSET_TIMEOUT_SECS))
            .build()
            .map_err(|e| IdeaforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
        })
    }

    /// Sample a theme for a subject.
    ///
    /// `home_url`/`home_html` come from the content reader when available;
    /// with neither, the deterministic palette is used directly.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn sample(
        &self,
        name: &str,
        home_url: Option<&Url>,
        home_html: Option<&str>,
    ) -> SampleOutcome {
        let cache_key = home_url.map(origin_key);

        if let Some(key) = &cache_key {
            if let Some(theme) = self.cache.get(key) {
                debug!(origin = %key, "theme cache hit");
                return SampleOutcome {
                    theme,
                    cache_hit: true,
                };
            }
        }

        let theme = self.compute(name, home_url, home_html).await;

        if let Some(key) = cache_key {
            self.cache.insert(key, theme.clone());
        }

        SampleOutcome {
            theme,
            cache_hit: false,
        }
    }

    async fn compute(&self, name: &str, home_url: Option<&Url>, home_html: Option<&str>) -> Theme {
        // Icon URLs are attached regardless of which color strategy wins.
        let icons = match (home_html, home_url) {
            (Some(html), Some(url)) => favicon::extract_icon_urls(html, url),
            (None, Some(url)) => favicon::IconUrls {
                favicon: url.join("/favicon.ico").ok().map(|u| u.to_string()),
                logo: None,
            },
            _ => favicon::IconUrls::default(),
        };

        let mut font_family = None;

        // Strategy 1: page style rules + theme-color hint
        if let (Some(html), Some(url)) = (home_html, home_url) {
            let mut signals = css::extract_style_signals(html, url);

            for sheet_url in signals.stylesheet_urls.iter().take(MAX_STYLESHEETS) {
                if let Some(sheet) = self.fetch_text(sheet_url).await {
                    css::scan_stylesheet(&sheet, &mut signals.candidates, &mut signals.font_family);
                }
            }
            font_family = signals.font_family.clone();

            if let Some(primary) = signals.candidates.first().cloned() {
                let accent = signals
                    .candidates
                    .iter()
                    .skip(1)
                    .find(|c| **c != primary)
                    .cloned()
                    .unwrap_or_else(|| palette::accent_for(&primary));

                info!(%primary, "theme extracted from site styles");
                return build_theme(primary, accent, font_family, icons, ThemeSource::SiteCss);
            }
        }

        // Strategy 2: favicon dominant color
        if let Some(favicon_url) = &icons.favicon {
            if let Some(bytes) = self.fetch_bytes(favicon_url).await {
                if let Some(primary) = favicon::sample_icon(&bytes) {
                    let accent = palette::accent_for(&primary);
                    info!(%primary, "theme sampled from favicon");
                    return build_theme(primary, accent, font_family, icons, ThemeSource::Favicon);
                }
            }
        }

        // Strategy 3: deterministic name-derived palette
        let (primary, accent) = palette::derive_palette(name);
        info!(%primary, "theme derived from name");
        build_theme(primary, accent, font_family, icons, ThemeSource::Default)
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }

    async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.bytes().await.ok().map(|b| b.to_vec())
    }
}

/// Cache key: scheme + host + port.
fn origin_key(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}://{}:{port}", url.scheme(), url.host_str().unwrap_or("")),
        None => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("")),
    }
}

fn build_theme(
    primary: String,
    accent: String,
    font_family: Option<String>,
    icons: favicon::IconUrls,
    source: ThemeSource,
) -> Theme {
    Theme {
        primary,
        accent,
        background: "#ffffff".into(),
        text: "#1b1b1f".into(),
        font_family,
        border_radius: "12px".into(),
        favicon_url: icons.favicon,
        logo_url: icons.logo,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> ThemeSampler {
        ThemeSampler::new(&ThemeConfig {
            cache_ttl_secs: 3600,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn no_site_yields_deterministic_usable_theme() {
        let sampler = sampler();

        let first = sampler.sample("Acme Rockets", None, None).await;
        let second = sampler.sample("Acme Rockets", None, None).await;

        assert_eq!(first.theme.source, ThemeSource::Default);
        assert!(is_usable_color(&first.theme.primary));
        assert_eq!(first.theme.primary, second.theme.primary);
        assert!(!first.cache_hit);
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_default_themes() {
        let sampler = sampler();
        let a = sampler.sample("Acme Rockets", None, None).await;
        let b = sampler.sample("Road Runner LLC", None, None).await;
        assert_ne!(a.theme.primary, b.theme.primary);
    }

    #[tokio::test]
    async fn css_strategy_wins_when_brand_variable_present() {
        let server = wiremock::MockServer::start().await;
        let url = Url::parse(&server.uri()).unwrap();

        let html = r##"<html><head>
            <style>:root { --brand-primary: #635bff; }</style>
            <link rel="icon" href="/icon.png">
        </head><body></body></html>"##;

        let sampler = sampler();
        let outcome = sampler.sample("Acme", Some(&url), Some(html)).await;

        assert_eq!(outcome.theme.source, ThemeSource::SiteCss);
        assert_eq!(outcome.theme.primary, "#635bff");
        assert!(outcome.theme.favicon_url.as_deref().unwrap().ends_with("/icon.png"));
    }

    #[tokio::test]
    async fn favicon_strategy_used_when_styles_are_bare() {
        let server = wiremock::MockServer::start().await;

        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="#0a9966"/></svg>"##;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/favicon.svg"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(svg))
            .mount(&server)
            .await;

        let html = r#"<html><head>
            <link rel="icon" href="/favicon.svg">
        </head><body></body></html>"#;

        let url = Url::parse(&server.uri()).unwrap();
        let sampler = sampler();
        let outcome = sampler.sample("Acme", Some(&url), Some(html)).await;

        assert_eq!(outcome.theme.source, ThemeSource::Favicon);
        assert_eq!(outcome.theme.primary, "#0a9966");
    }

    #[tokio::test]
    async fn unreachable_site_falls_back_to_derived_palette() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let sampler = sampler();
        let outcome = sampler
            .sample("Acme", Some(&url), Some("<html><body></body></html>"))
            .await;

        assert_eq!(outcome.theme.source, ThemeSource::Default);
        assert!(is_usable_color(&outcome.theme.primary));
        // Favicon URL is still attached even though sampling failed
        assert!(outcome.theme.favicon_url.is_some());
    }

    #[tokio::test]
    async fn second_sample_hits_origin_cache() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let sampler = sampler();

        let first = sampler.sample("Acme", Some(&url), None).await;
        assert!(!first.cache_hit);

        let second = sampler.sample("Acme", Some(&url), None).await;
        assert!(second.cache_hit);
        assert_eq!(first.theme, second.theme);
    }

    #[tokio::test]
    async fn linked_stylesheet_contributes_candidates() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/main.css"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(":root { --primary-color: #e44d26; }"),
            )
            .mount(&server)
            .await;

        let html = r#"<html><head>
            <link rel="stylesheet" href="/main.css">
        </head><body></body></html>"#;

        let url = Url::parse(&server.uri()).unwrap();
        let sampler = sampler();
        let outcome = sampler.sample("Acme", Some(&url), Some(html)).await;

        assert_eq!(outcome.theme.source, ThemeSource::SiteCss);
        assert_eq!(outcome.theme.primary, "#e44d26");
    }
}
