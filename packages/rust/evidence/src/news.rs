//! External news index client with widening-window queries.
//!
//! Queries newest-window-first (`"name" domain` over 30 days), broadening
//! to name-only and then a 90-day window only when each narrower query
//! comes back empty. Stops at the first non-empty result. Empty results
//! are a normal outcome, not an error.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use ideaforge_shared::{NewsIndexConfig, NewsItem, read_api_key};

/// Results are capped at this many items.
const MAX_NEWS_ITEMS: usize = 6;

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    title: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

/// Fetch news items for a subject. Best-effort: any failure or exhausted
/// widening sequence yields an empty list.
#[instrument(skip_all, fields(name = %name))]
pub async fn fetch_news(
    client: &Client,
    name: &str,
    domain: Option<&str>,
    config: &NewsIndexConfig,
) -> Vec<NewsItem> {
    let Some(endpoint) = &config.endpoint else {
        debug!("news index not configured");
        return vec![];
    };

    // Narrowest first; each wider query runs only if the previous was empty.
    let mut queries: Vec<(String, u32)> = Vec::new();
    if let Some(domain) = domain {
        queries.push((format!("\"{name}\" {domain}"), 30));
    }
    queries.push((format!("\"{name}\""), 30));
    queries.push((format!("\"{name}\""), 90));

    for (query, days) in queries {
        let items = run_query(client, endpoint, &query, days, config).await;
        if !items.is_empty() {
            debug!(query = %query, days, count = items.len(), "news query hit");
            return items;
        }
    }

    debug!("all news queries empty");
    vec![]
}

async fn run_query(
    client: &Client,
    endpoint: &str,
    query: &str,
    days: u32,
    config: &NewsIndexConfig,
) -> Vec<NewsItem> {
    let mut request = client
        .get(endpoint)
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .query(&[("q", query), ("days", &days.to_string())]);

    if let Some(key) = read_api_key(&config.api_key_env) {
        request = request.header("x-api-key", key);
    }

    let response = match request.send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!(status = %r.status(), "news index returned non-success");
            return vec![];
        }
        Err(e) => {
            debug!(error = %e, "news index unreachable");
            return vec![];
        }
    };

    let parsed: NewsResponse = match response.json().await {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "news response was not valid JSON");
            return vec![];
        }
    };

    parsed
        .articles
        .into_iter()
        .take(MAX_NEWS_ITEMS)
        .map(|a| NewsItem {
            title: a.title,
            source: a.source,
            url: a.url,
            published_at: a.published_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> NewsIndexConfig {
        NewsIndexConfig {
            endpoint: Some(endpoint.to_string()),
            api_key_env: "IF_TEST_NEWS_KEY_UNSET".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn unconfigured_index_returns_empty() {
        let client = Client::new();
        let cfg = NewsIndexConfig {
            endpoint: None,
            ..NewsIndexConfig::default()
        };
        let items = fetch_news(&client, "Acme", None, &cfg).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn stops_at_first_non_empty_query() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("q", "\"Acme\" acme.test"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "articles": [
                        {"title": "Acme raises B", "source": "TechWire", "url": "https://t.test/1"}
                    ]
                }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let items = fetch_news(&client, "Acme", Some("acme.test"), &config(&server.uri())).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Acme raises B");
    }

    #[tokio::test]
    async fn widens_to_longer_window_when_empty() {
        let server = wiremock::MockServer::start().await;

        // 30-day queries are empty
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("days", "30"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "articles": [] })),
            )
            .mount(&server)
            .await;

        // 90-day query finds an item
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("days", "90"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "articles": [{"title": "Acme in review"}]
                }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let items = fetch_news(&client, "Acme", Some("acme.test"), &config(&server.uri())).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Acme in review");
    }

    #[tokio::test]
    async fn index_error_degrades_to_empty() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = Client::new();
        let items = fetch_news(&client, "Acme", None, &config(&server.uri())).await;
        assert!(items.is_empty());
    }
}
