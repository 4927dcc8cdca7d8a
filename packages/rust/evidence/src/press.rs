//! Press/news page discovery on the subject's own site.
//!
//! Probes a fixed list of common press paths and scans the sitemap (when
//! present) for press-looking URLs. Best-effort and non-throwing; every
//! probe is recorded as a fetch attempt.

use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use tracing::{debug, instrument};
use url::Url;

use ideaforge_shared::{FetchAttempt, FetchOutcome};

/// Fixed press/news paths probed for existence.
const PRESS_PATHS: &[&str] = &[
    "/press",
    "/news",
    "/newsroom",
    "/media",
    "/blog",
    "/press-releases",
];

/// Combined results (probes + sitemap) are capped here.
const MAX_PRESS_URLS: usize = 8;

/// Sitemap URLs matching this pattern count as press coverage.
fn press_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(press|news|newsroom|blog|media)(/|-)[^/]+").unwrap())
}

/// Result of press discovery.
#[derive(Debug, Clone, Default)]
pub struct PressDiscovery {
    /// Press page URLs, probed paths first.
    pub urls: Vec<String>,
    /// Headlines derived from the discovered URLs.
    pub headlines: Vec<String>,
    pub attempts: Vec<FetchAttempt>,
}

/// Discover press/news pages under the subject's origin.
#[instrument(skip_all, fields(origin = %origin))]
pub async fn discover_press(
    client: &Client,
    origin: &Url,
    probe_timeout_secs: u64,
) -> PressDiscovery {
    let mut discovery = PressDiscovery::default();

    // Probe fixed paths concurrently.
    let mut handles = Vec::new();
    for path in PRESS_PATHS {
        let Ok(url) = origin.join(path) else {
            continue;
        };
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            probe(&client, &url, probe_timeout_secs).await
        }));
    }

    for handle in handles {
        if let Ok((exists, attempt, url)) = handle.await {
            discovery.attempts.push(attempt);
            if exists {
                discovery.urls.push(url.to_string());
            }
        }
    }

    // Scan the sitemap for press-looking URLs.
    if let Ok(sitemap_url) = origin.join("/sitemap.xml") {
        if let Some(body) = fetch_text(client, &sitemap_url, probe_timeout_secs).await {
            for loc in extract_sitemap_locs(&body) {
                if press_url_regex().is_match(&loc) && !discovery.urls.contains(&loc) {
                    discovery.urls.push(loc);
                }
                if discovery.urls.len() >= MAX_PRESS_URLS {
                    break;
                }
            }
        }
    }

    discovery.urls.truncate(MAX_PRESS_URLS);
    discovery.headlines = discovery
        .urls
        .iter()
        .filter_map(|u| headline_from_url(u))
        .collect();

    debug!(
        urls = discovery.urls.len(),
        headlines = discovery.headlines.len(),
        "press discovery complete"
    );

    discovery
}

/// Existence check: HEAD, then GET when HEAD is rejected.
async fn probe(client: &Client, url: &Url, timeout_secs: u64) -> (bool, FetchAttempt, Url) {
    let timeout = std::time::Duration::from_secs(timeout_secs);

    if let Ok(r) = client.head(url.as_str()).timeout(timeout).send().await {
        if r.status().is_success() {
            return (
                true,
                attempt_for(url, FetchOutcome::Ok, Some(r.status().as_u16())),
                url.clone(),
            );
        }
    }

    match client.get(url.as_str()).timeout(timeout).send().await {
        Ok(r) if r.status().is_success() => (
            true,
            attempt_for(url, FetchOutcome::Ok, Some(r.status().as_u16())),
            url.clone(),
        ),
        Ok(r) => {
            let code = r.status().as_u16();
            let outcome = match code {
                401 | 403 => FetchOutcome::Blocked,
                404 | 410 => FetchOutcome::NotFound,
                _ => FetchOutcome::Error,
            };
            (false, attempt_for(url, outcome, Some(code)), url.clone())
        }
        Err(e) => {
            let outcome = if e.is_timeout() {
                FetchOutcome::Timeout
            } else {
                FetchOutcome::Error
            };
            (false, attempt_for(url, outcome, None), url.clone())
        }
    }
}

fn attempt_for(url: &Url, outcome: FetchOutcome, status_code: Option<u16>) -> FetchAttempt {
    FetchAttempt {
        url: url.to_string(),
        outcome,
        status_code,
        heading_count: None,
        note: Some("press probe".into()),
    }
}

async fn fetch_text(client: &Client, url: &Url, timeout_secs: u64) -> Option<String> {
    let response = client
        .get(url.as_str())
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

/// Pull `<loc>` entries out of sitemap XML.
fn extract_sitemap_locs(xml: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").unwrap());

    re.captures_iter(xml)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Turn a press URL's last path segment into a human-readable headline.
fn headline_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;

    if segment.len() < 8 || !segment.contains('-') {
        return None;
    }

    let words: Vec<String> = segment
        .trim_end_matches(".html")
        .split('-')
        .filter(|w| !w.is_empty() && !w.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect();

    if words.len() < 2 {
        return None;
    }

    let mut headline = words.join(" ");
    if let Some(first) = headline.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Some(headline)
}
