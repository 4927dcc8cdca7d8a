//! Two-stage content reader for a subject's site.
//!
//! Stage A is a direct, low-cost fetch with a short timeout that parses
//! titles, headings, nav labels, links, and visible text length. Stage B —
//! only when explicitly enabled — re-fetches thin pages through a
//! headless-render service, giving JavaScript-gated content a second
//! chance; the richer result wins. Every attempted URL is recorded as a
//! [`FetchAttempt`] for the job's evidence trail.

pub mod parse;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use ideaforge_shared::{AppConfig, FetchAttempt, FetchOutcome, IdeaforgeError, Result};

pub use parse::PageSignals;

/// User-Agent string for page reads.
const USER_AGENT: &str = concat!("ideaforge/", env!("CARGO_PKG_VERSION"));

/// A page is thin below this many headings…
const THIN_HEADING_MIN: usize = 2;
/// …and below this much visible text.
const THIN_TEXT_MIN: usize = 400;

/// Link-path keywords that mark a sub-page as worth reading.
const SUBPAGE_KEYWORDS: &[&str] = &[
    "product", "pricing", "about", "feature", "docs", "solution", "customer", "platform",
    "service",
];

/// Fixed paths probed when link discovery finds fewer than 2 sub-pages.
const COMMON_PATHS: &[&str] = &[
    "/about",
    "/products",
    "/pricing",
    "/features",
    "/solutions",
    "/customers",
    "/docs",
];

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Runtime options for the content reader.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Stage A timeout per page, seconds.
    pub page_timeout_secs: u64,
    /// Existence-probe timeout, seconds.
    pub probe_timeout_secs: u64,
    /// Whether Stage B (headless render) is enabled.
    pub render_fallback: bool,
    /// Render service endpoint; Stage B is skipped when unset.
    pub render_endpoint: Option<String>,
    /// Render call timeout, seconds.
    pub render_timeout_secs: u64,
    /// Maximum sub-pages to read.
    pub max_subpages: usize,
}

impl From<&AppConfig> for ReadOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_timeout_secs: config.fetch.page_timeout_secs,
            probe_timeout_secs: config.fetch.probe_timeout_secs,
            render_fallback: config.fetch.render_fallback,
            render_endpoint: config.fetch.render_endpoint.clone(),
            render_timeout_secs: config.fetch.render_timeout_secs,
            max_subpages: config.defaults.max_subpages,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One page read: parsed signals (if any) plus the diagnostic attempt.
#[derive(Debug, Clone)]
pub struct PageRead {
    pub signals: Option<PageSignals>,
    pub attempt: FetchAttempt,
    /// Raw HTML of the winning stage, kept for downstream style sampling.
    pub html: Option<String>,
}

impl PageRead {
    /// Thin = failed outright, or too few headings and too little text.
    pub fn is_thin(&self) -> bool {
        match &self.signals {
            None => true,
            Some(s) => s.headings.len() < THIN_HEADING_MIN && s.text_len < THIN_TEXT_MIN,
        }
    }
}

/// Result of reading a subject's home page and related sub-pages.
#[derive(Debug, Clone, Default)]
pub struct SiteRead {
    pub home: Option<PageSignals>,
    /// Raw home-page HTML, for the theme sampler.
    pub home_html: Option<String>,
    pub subpages: Vec<PageSignals>,
    /// Every attempted URL with its outcome, for the evidence trail.
    pub attempts: Vec<FetchAttempt>,
    pub thin_content: bool,
    pub thin_note: Option<String>,
}

impl SiteRead {
    /// All headings across home and sub-pages, in read order.
    pub fn all_headings(&self) -> Vec<String> {
        let mut headings = Vec::new();
        if let Some(home) = &self.home {
            headings.extend(home.headings.iter().cloned());
        }
        for page in &self.subpages {
            headings.extend(page.headings.iter().cloned());
        }
        headings
    }
}

// ---------------------------------------------------------------------------
// ContentReader
// ---------------------------------------------------------------------------

/// Reads a subject's home page and a bounded set of related pages.
pub struct ContentReader {
    client: Client,
    options: ReadOptions,
}

impl ContentReader {
    /// Create a reader with the given options.
    pub fn new(options: ReadOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| IdeaforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, options })
    }

    /// Read the home page, discover up to `max_subpages` related pages, and
    /// read those too. Never errors: every failure is recorded as an
    /// attempt and degrades the result instead.
    #[instrument(skip_all, fields(url = %home_url))]
    pub async fn read_site(&self, home_url: &Url) -> SiteRead {
        let mut result = SiteRead::default();

        let home_read = self.read_page(home_url).await;
        result.attempts.push(home_read.attempt.clone());

        let home_links = home_read
            .signals
            .as_ref()
            .map(|s| s.links.clone())
            .unwrap_or_default();
        result.home = home_read.signals;
        result.home_html = home_read.html;

        // Discover sub-pages by keyword-matching outbound links, then fall
        // back to probing common paths if too few were found.
        let mut subpage_urls = discover_subpage_urls(&home_links, home_url, self.options.max_subpages);
        if subpage_urls.len() < 2 {
            let probed = self
                .probe_common_paths(home_url, &mut result.attempts, &subpage_urls)
                .await;
            subpage_urls.extend(probed);
            subpage_urls.truncate(self.options.max_subpages);
        }

        info!(subpages = subpage_urls.len(), "sub-pages selected");

        // Read sub-pages concurrently.
        let mut handles = Vec::new();
        for url in subpage_urls {
            let reader = self.clone_for_task();
            handles.push(tokio::spawn(async move { reader.read_page(&url).await }));
        }

        for handle in handles {
            match handle.await {
                Ok(page) => {
                    result.attempts.push(page.attempt.clone());
                    if let Some(signals) = page.signals {
                        result.subpages.push(signals);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "sub-page task failed");
                }
            }
        }

        // Whole-read thinness: few headings overall and a short home page.
        let total_headings = result.all_headings().len();
        let home_text = result.home.as_ref().map(|h| h.text_len).unwrap_or(0);
        if total_headings < 3 && home_text < THIN_TEXT_MIN {
            result.thin_content = true;
            result.thin_note = Some(format!(
                "site content is thin ({total_headings} headings, {home_text} chars of text)"
            ));
        }

        result
    }

    /// Two-stage read of a single page.
    pub async fn read_page(&self, url: &Url) -> PageRead {
        let stage_a = self.fetch_static(url).await;

        if !stage_a.is_thin() || !self.render_enabled() {
            return stage_a;
        }

        debug!(%url, "stage A thin, trying render fallback");
        match self.fetch_rendered(url).await {
            Some(html) => {
                let rendered = parse::parse_page(&html, url);
                let static_len = stage_a.signals.as_ref().map(|s| s.text_len).unwrap_or(0);

                // The richer result (by text length) wins.
                if rendered.text_len > static_len {
                    let mut attempt = stage_a.attempt;
                    attempt.outcome = FetchOutcome::Ok;
                    attempt.heading_count = Some(rendered.headings.len());
                    attempt.note = Some("render fallback used".into());
                    PageRead {
                        signals: Some(rendered),
                        attempt,
                        html: Some(html),
                    }
                } else {
                    stage_a
                }
            }
            None => stage_a,
        }
    }

    fn render_enabled(&self) -> bool {
        self.options.render_fallback && self.options.render_endpoint.is_some()
    }

    /// Stage A: direct fetch and parse.
    async fn fetch_static(&self, url: &Url) -> PageRead {
        let response = self
            .client
            .get(url.as_str())
            .timeout(std::time::Duration::from_secs(self.options.page_timeout_secs))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                let outcome = if e.is_timeout() {
                    FetchOutcome::Timeout
                } else {
                    FetchOutcome::Error
                };
                return PageRead {
                    signals: None,
                    attempt: FetchAttempt {
                        url: url.to_string(),
                        outcome,
                        status_code: None,
                        heading_count: None,
                        note: Some(e.to_string()),
                    },
                    html: None,
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let outcome = match status.as_u16() {
                401 | 403 => FetchOutcome::Blocked,
                404 | 410 => FetchOutcome::NotFound,
                _ => FetchOutcome::Error,
            };
            return PageRead {
                signals: None,
                attempt: FetchAttempt {
                    url: url.to_string(),
                    outcome,
                    status_code: Some(status.as_u16()),
                    heading_count: None,
                    note: Some(format!("HTTP {status}")),
                },
                html: None,
            };
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return PageRead {
                    signals: None,
                    attempt: FetchAttempt {
                        url: url.to_string(),
                        outcome: FetchOutcome::Error,
                        status_code: Some(status.as_u16()),
                        heading_count: None,
                        note: Some(format!("body read failed: {e}")),
                    },
                    html: None,
                };
            }
        };

        let signals = parse::parse_page(&body, url);

        if signals.text_len == 0 && signals.headings.is_empty() {
            return PageRead {
                signals: Some(signals),
                attempt: FetchAttempt {
                    url: url.to_string(),
                    outcome: FetchOutcome::Empty,
                    status_code: Some(status.as_u16()),
                    heading_count: Some(0),
                    note: None,
                },
                html: Some(body),
            };
        }

        PageRead {
            attempt: FetchAttempt {
                url: url.to_string(),
                outcome: FetchOutcome::Ok,
                status_code: Some(status.as_u16()),
                heading_count: Some(signals.headings.len()),
                note: None,
            },
            signals: Some(signals),
            html: Some(body),
        }
    }

    /// Stage B: ask the render service for post-JavaScript HTML.
    async fn fetch_rendered(&self, url: &Url) -> Option<String> {
        #[derive(Deserialize)]
        struct RenderResponse {
            html: String,
        }

        let endpoint = self.options.render_endpoint.as_ref()?;

        let response = self
            .client
            .post(endpoint)
            .timeout(std::time::Duration::from_secs(self.options.render_timeout_secs))
            .json(&serde_json::json!({ "url": url.as_str() }))
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.json::<RenderResponse>().await {
                Ok(parsed) => Some(parsed.html),
                Err(e) => {
                    debug!(error = %e, "render response was not valid JSON");
                    None
                }
            },
            Ok(r) => {
                debug!(status = %r.status(), "render service returned non-success");
                None
            }
            Err(e) => {
                debug!(error = %e, "render service unreachable");
                None
            }
        }
    }

    /// Probe the fixed common-path list, recording an attempt per probe and
    /// returning the URLs that exist.
    async fn probe_common_paths(
        &self,
        home_url: &Url,
        attempts: &mut Vec<FetchAttempt>,
        already: &[Url],
    ) -> Vec<Url> {
        let mut handles = Vec::new();

        for path in COMMON_PATHS {
            let Ok(url) = home_url.join(path) else {
                continue;
            };
            if already.iter().any(|u| u.path() == url.path()) {
                continue;
            }

            let reader = self.clone_for_task();
            handles.push(tokio::spawn(
                async move { reader.probe_exists(&url).await },
            ));
        }

        let mut found = Vec::new();
        for handle in handles {
            if let Ok((exists, attempt, url)) = handle.await {
                attempts.push(attempt);
                if exists {
                    found.push(url);
                }
            }
        }

        found
    }

    /// Existence check: HEAD first, falling back to GET when HEAD is
    /// rejected.
    async fn probe_exists(&self, url: &Url) -> (bool, FetchAttempt, Url) {
        let timeout = std::time::Duration::from_secs(self.options.probe_timeout_secs);

        let head = self
            .client
            .head(url.as_str())
            .timeout(timeout)
            .send()
            .await;

        match head {
            Ok(r) if r.status().is_success() => {
                return (
                    true,
                    FetchAttempt {
                        url: url.to_string(),
                        outcome: FetchOutcome::Ok,
                        status_code: Some(r.status().as_u16()),
                        heading_count: None,
                        note: Some("probe".into()),
                    },
                    url.clone(),
                );
            }
            Err(e) if e.is_timeout() => {
                return (
                    false,
                    FetchAttempt {
                        url: url.to_string(),
                        outcome: FetchOutcome::Timeout,
                        status_code: None,
                        heading_count: None,
                        note: Some("probe timed out".into()),
                    },
                    url.clone(),
                );
            }
            Ok(_) | Err(_) => {}
        }

        // Some servers reject HEAD; retry the probe as a GET.
        let get = self.client.get(url.as_str()).timeout(timeout).send().await;

        match get {
            Ok(r) if r.status().is_success() => (
                true,
                FetchAttempt {
                    url: url.to_string(),
                    outcome: FetchOutcome::Ok,
                    status_code: Some(r.status().as_u16()),
                    heading_count: None,
                    note: Some("probe".into()),
                },
                url.clone(),
            ),
            Ok(r) => {
                let code = r.status().as_u16();
                let outcome = match code {
                    401 | 403 => FetchOutcome::Blocked,
                    404 | 410 => FetchOutcome::NotFound,
                    _ => FetchOutcome::Error,
                };
                (
                    false,
                    FetchAttempt {
                        url: url.to_string(),
                        outcome,
                        status_code: Some(code),
                        heading_count: None,
                        note: Some("probe".into()),
                    },
                    url.clone(),
                )
            }
            Err(e) => {
                let outcome = if e.is_timeout() {
                    FetchOutcome::Timeout
                } else {
                    FetchOutcome::Error
                };
                (
                    false,
                    FetchAttempt {
                        url: url.to_string(),
                        outcome,
                        status_code: None,
                        heading_count: None,
                        note: Some("probe failed".into()),
                    },
                    url.clone(),
                )
            }
        }
    }

    /// Cheap clone for spawned sub-tasks (reqwest clients share a pool).
    fn clone_for_task(&self) -> Self {
        Self {
            client: self.client.clone(),
            options: self.options.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-page discovery
// ---------------------------------------------------------------------------

/// Pick same-host links whose path matches a sub-page keyword,
/// deduplicated by path, capped at `max`.
fn discover_subpage_urls(links: &[String], home_url: &Url, max: usize) -> Vec<Url> {
    let home_host = home_url.host_str().unwrap_or("");
    let mut selected: Vec<Url> = Vec::new();

    for link in links {
        let Ok(url) = Url::parse(link) else {
            continue;
        };
        if url.host_str().unwrap_or("") != home_host {
            continue;
        }
        let path = url.path().to_lowercase();
        if path == "/" || path.is_empty() {
            continue;
        }
        if !SUBPAGE_KEYWORDS.iter().any(|kw| path.contains(kw)) {
            continue;
        }
        if selected.iter().any(|u| u.path() == url.path()) {
            continue;
        }

        selected.push(url);
        if selected.len() >= max {
            break;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ReadOptions {
        ReadOptions {
            page_timeout_secs: 5,
            probe_timeout_secs: 2,
            render_fallback: false,
            render_endpoint: None,
            render_timeout_secs: 5,
            max_subpages: 3,
        }
    }

    const RICH_HOME: &str = r#"<html><head><title>Acme</title></head><body>
        <nav><a href="/products">Products</a><a href="/pricing">Pricing</a></nav>
        <h1>Acme rockets</h1><h2>Fast delivery</h2><h2>Trusted</h2>
        <p>Acme has been building rockets for discerning coyotes since 1949.
        Our catalog spans everything from anvils to jet-powered roller skates,
        with free returns on all purchases that fail to catch a road runner.</p>
    </body></html>"#;

    const SUB_PAGE: &str = r#"<html><body>
        <h1>Products</h1><h2>Catalog</h2>
        <p>All the rockets, anvils, and skates you could possibly need.</p>
    </body></html>"#;

    #[test]
    fn discovers_keyword_subpages() {
        let home = Url::parse("https://acme.test/").unwrap();
        let links = vec![
            "https://acme.test/products".to_string(),
            "https://acme.test/pricing".to_string(),
            "https://acme.test/careers".to_string(),
            "https://other.test/products".to_string(),
            "https://acme.test/products".to_string(),
        ];

        let urls = discover_subpage_urls(&links, &home, 3);
        let paths: Vec<&str> = urls.iter().map(|u| u.path()).collect();
        assert_eq!(paths, vec!["/products", "/pricing"]);
    }

    #[tokio::test]
    async fn reads_home_and_discovered_subpages() {
        let server = wiremock::MockServer::start().await;

        let home_html = RICH_HOME.replace("/products", &format!("{}/products", server.uri()));

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(&home_html))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/products"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(SUB_PAGE))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/pricing"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(SUB_PAGE))
            .mount(&server)
            .await;

        let reader = ContentReader::new(options()).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = reader.read_site(&url).await;

        assert!(result.home.is_some());
        assert_eq!(result.subpages.len(), 2);
        assert!(!result.thin_content);
        assert!(result
            .attempts
            .iter()
            .all(|a| a.outcome == FetchOutcome::Ok));
    }

    #[tokio::test]
    async fn blocked_site_records_attempts_without_throwing() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let reader = ContentReader::new(options()).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = reader.read_site(&url).await;

        assert!(result.home.is_none());
        assert!(result.subpages.is_empty());
        assert!(result.thin_content);
        assert!(result.thin_note.is_some());
        assert!(result
            .attempts
            .iter()
            .any(|a| a.outcome == FetchOutcome::Blocked && a.status_code == Some(403)));
    }

    #[tokio::test]
    async fn probes_common_paths_when_no_links_match() {
        let server = wiremock::MockServer::start().await;

        // Home page with headings but no nav links at all
        let bare_home = r#"<html><body>
            <h1>Acme</h1><h2>Rockets</h2><h2>Anvils</h2>
            <p>A very long description of the Acme product line that easily
            exceeds the thin-content threshold because it goes on and on about
            rockets, anvils, jet-powered roller skates, tunnels painted on
            rock faces, and the many satisfied coyotes who shop here.</p>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(bare_home))
            .mount(&server)
            .await;

        // Only /about exists
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .and(wiremock::matchers::path("/about"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/about"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(SUB_PAGE))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let reader = ContentReader::new(options()).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let result = reader.read_site(&url).await;

        assert_eq!(result.subpages.len(), 1);
        assert_eq!(result.subpages[0].headings[0], "Products");
        // Probe attempts are part of the evidence trail
        assert!(result
            .attempts
            .iter()
            .any(|a| a.note.as_deref() == Some("probe")));
    }

    #[tokio::test]
    async fn render_fallback_rescues_thin_page() {
        let server = wiremock::MockServer::start().await;

        // Stage A sees an empty JS shell
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><div id=\"app\"></div></body></html>"),
            )
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("HEAD"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // Render service returns the hydrated page
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/render"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "html": RICH_HOME })),
            )
            .mount(&server)
            .await;

        let mut opts = options();
        opts.render_fallback = true;
        opts.render_endpoint = Some(format!("{}/render", server.uri()));

        let reader = ContentReader::new(opts).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let page = reader.read_page(&url).await;

        let signals = page.signals.expect("rendered signals");
        assert_eq!(signals.headings[0], "Acme rockets");
        assert_eq!(page.attempt.note.as_deref(), Some("render fallback used"));
    }

    #[tokio::test]
    async fn render_fallback_disabled_keeps_thin_result() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><div id=\"app\"></div></body></html>"),
            )
            .mount(&server)
            .await;

        let reader = ContentReader::new(options()).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let page = reader.read_page(&url).await;

        assert!(page.is_thin());
        assert!(page.attempt.note.is_none());
    }
}
