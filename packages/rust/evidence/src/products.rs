//! Product-discovery index client.
//!
//! Searches by derived keywords, falling back to a process-wide cached
//! "trending" query when keyword results are too sparse. Results are
//! deduplicated by name and capped.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use ideaforge_shared::{ProductIndexConfig, ProductItem, read_api_key};
use ideaforge_storage::TtlCache;

/// Combined results are capped at this many products.
const MAX_PRODUCTS: usize = 8;

/// Below this many keyword results, the trending fallback kicks in.
const MIN_KEYWORD_RESULTS: usize = 3;

/// Up to this many derived keywords are searched.
const MAX_KEYWORDS: usize = 3;

/// Cache key for the trending query.
const TRENDING_KEY: &str = "trending";

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    products: Vec<ProductHit>,
}

#[derive(Debug, Deserialize)]
struct ProductHit {
    name: String,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Product evidence plus cache provenance.
#[derive(Debug, Clone, Default)]
pub struct ProductEvidence {
    pub items: Vec<ProductItem>,
    /// Recurring tagline words, a cheap signal of the product space.
    pub patterns: Vec<String>,
    pub trending_cache_hit: bool,
}

/// Searches the product-discovery index, holding the process-wide
/// trending cache.
pub struct ProductSearcher {
    client: Client,
    config: ProductIndexConfig,
    trending_cache: TtlCache<Vec<ProductItem>>,
}

impl ProductSearcher {
    pub fn new(client: Client, config: ProductIndexConfig) -> Self {
        let ttl = Duration::from_secs(config.trending_ttl_secs);
        Self {
            client,
            config,
            trending_cache: TtlCache::new(ttl),
        }
    }

    /// Search by up to [`MAX_KEYWORDS`] keywords, topping up from the
    /// trending query when results are sparse. Best-effort.
    #[instrument(skip_all, fields(keywords = keywords.len()))]
    pub async fn search(&self, keywords: &[String]) -> ProductEvidence {
        let mut evidence = ProductEvidence::default();

        if self.config.endpoint.is_none() {
            debug!("product index not configured");
            return evidence;
        }

        for keyword in keywords.iter().take(MAX_KEYWORDS) {
            let hits = self.run_query(&[("q", keyword.as_str())]).await;
            merge_products(&mut evidence.items, hits);
        }

        if evidence.items.len() < MIN_KEYWORD_RESULTS {
            let (trending, cache_hit) = self.trending().await;
            evidence.trending_cache_hit = cache_hit;
            merge_products(&mut evidence.items, trending);
        }

        evidence.items.truncate(MAX_PRODUCTS);
        evidence.patterns = derive_patterns(&evidence.items);

        debug!(
            products = evidence.items.len(),
            patterns = evidence.patterns.len(),
            trending_cache_hit = evidence.trending_cache_hit,
            "product search complete"
        );

        evidence
    }

    /// The trending query, served from the process-wide cache when fresh.
    async fn trending(&self) -> (Vec<ProductItem>, bool) {
        if let Some(cached) = self.trending_cache.get(TRENDING_KEY) {
            return (cached, true);
        }

        let items = self.run_query(&[("trending", "1")]).await;
        if !items.is_empty() {
            self.trending_cache.insert(TRENDING_KEY, items.clone());
        }
        (items, false)
    }

    async fn run_query(&self, params: &[(&str, &str)]) -> Vec<ProductItem> {
        let Some(endpoint) = &self.config.endpoint else {
            return vec![];
        };

        let mut request = self
            .client
            .get(endpoint)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .query(params);

        if let Some(key) = read_api_key(&self.config.api_key_env) {
            request = request.header("x-api-key", key);
        }

        let response = match request.send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "product index returned non-success");
                return vec![];
            }
            Err(e) => {
                debug!(error = %e, "product index unreachable");
                return vec![];
            }
        };

        let parsed: ProductResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "product response was not valid JSON");
                return vec![];
            }
        };

        parsed
            .products
            .into_iter()
            .map(|hit| ProductItem {
                name: hit.name,
                tagline: hit.tagline,
                url: hit.url,
            })
            .collect()
    }
}

/// Append new products, deduplicating by name (case-insensitive).
fn merge_products(into: &mut Vec<ProductItem>, from: Vec<ProductItem>) {
    for product in from {
        let duplicate = into
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&product.name));
        if !duplicate {
            into.push(product);
        }
    }
}

/// Tagline words appearing across at least two products.
fn derive_patterns(items: &[ProductItem]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for item in items {
        let Some(tagline) = &item.tagline else {
            continue;
        };
        let mut seen: Vec<String> = Vec::new();
        for word in tagline.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if word.len() < 4 || seen.contains(&word) {
                continue;
            }
            seen.push(word.clone());
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut patterns: Vec<(String, usize)> =
        counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    patterns.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    patterns.into_iter().take(5).map(|(w, _)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> ProductIndexConfig {
        ProductIndexConfig {
            endpoint: Some(endpoint.to_string()),
            api_key_env: "IF_TEST_PRODUCTS_KEY_UNSET".into(),
            timeout_secs: 5,
            trending_ttl_secs: 3600,
        }
    }

    fn product_json(names: &[(&str, &str)]) -> serde_json::Value {
        serde_json::json!({
            "products": names
                .iter()
                .map(|(name, tagline)| serde_json::json!({"name": name, "tagline": tagline}))
                .collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn keyword_results_deduplicated() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("q", "rockets"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(product_json(&[
                ("LaunchPad", "Deploy rockets faster"),
                ("Boost", "Rockets for teams"),
            ])))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("q", "propulsion"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(product_json(&[
                ("launchpad", "Deploy rockets faster"),
                ("Thrust", "Propulsion analytics for teams"),
            ])))
            .mount(&server)
            .await;

        let searcher = ProductSearcher::new(Client::new(), config(&server.uri()));
        let evidence = searcher
            .search(&["rockets".into(), "propulsion".into()])
            .await;

        assert_eq!(evidence.items.len(), 3);
        assert!(!evidence.trending_cache_hit);
        // "rockets", "faster", "teams", "deploy" recur across taglines
        assert!(evidence.patterns.contains(&"rockets".to_string()));
    }

    #[tokio::test]
    async fn sparse_results_trigger_trending_fallback() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("trending", "1"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(product_json(&[
                ("Trendy", "What everyone ships"),
                ("Wave", "Riding the wave"),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "products": [] })),
            )
            .mount(&server)
            .await;

        let searcher = ProductSearcher::new(Client::new(), config(&server.uri()));

        let first = searcher.search(&["obscure".into()]).await;
        assert_eq!(first.items.len(), 2);
        assert!(!first.trending_cache_hit);

        // Second search hits the trending cache instead of the index
        let second = searcher.search(&["obscure".into()]).await;
        assert_eq!(second.items.len(), 2);
        assert!(second.trending_cache_hit);
    }

    #[tokio::test]
    async fn unconfigured_index_returns_empty() {
        let searcher = ProductSearcher::new(
            Client::new(),
            ProductIndexConfig {
                endpoint: None,
                ..ProductIndexConfig::default()
            },
        );
        let evidence = searcher.search(&["anything".into()]).await;
        assert!(evidence.items.is_empty());
        assert!(evidence.patterns.is_empty());
    }

    #[test]
    fn patterns_need_two_occurrences() {
        let items = vec![
            ProductItem {
                name: "A".into(),
                tagline: Some("Fast analytics platform".into()),
                url: None,
            },
            ProductItem {
                name: "B".into(),
                tagline: Some("Analytics for everyone".into()),
                url: None,
            },
            ProductItem {
                name: "C".into(),
                tagline: Some("Unique snowflake".into()),
                url: None,
            },
        ];

        let patterns = derive_patterns(&items);
        assert_eq!(patterns, vec!["analytics"]);
    }
}
