//! Subject resolution: free text → zero/one/many candidate entities.
//!
//! Candidates come from a knowledge-lookup service merged with a static
//! table of well-known ambiguous names. The decision policy determines
//! whether the caller must disambiguate before the pipeline runs. Any
//! lookup-service failure degrades to static-table data only — resolution
//! never raises.

mod static_table;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use ideaforge_shared::{DisambiguationOption, LookupConfig};

pub use static_table::lookup as static_lookup;

/// Merged candidate lists are capped at this many options.
const MAX_OPTIONS: usize = 6;

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("ideaforge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of subject resolution.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The caller must pick one of these options before analysis starts.
    NeedsDisambiguation { options: Vec<DisambiguationOption> },
    /// Exactly one plausible entity; analysis proceeds with its profile.
    AutoResolved { option: DisambiguationOption },
    /// Nothing to disambiguate; proceed with the input as typed.
    Unambiguous,
}

impl Resolution {
    pub fn needs_disambiguation(&self) -> bool {
        matches!(self, Self::NeedsDisambiguation { .. })
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Resolve a free-text subject.
///
/// URLs skip resolution entirely (treated as unambiguous). Otherwise the
/// knowledge-lookup service and the static table are consulted and the
/// decision policy applied.
#[instrument(skip_all, fields(input = %input))]
pub async fn resolve(input: &str, config: &LookupConfig) -> Resolution {
    let input = input.trim();

    if is_url(input) {
        debug!("input is a URL, skipping resolution");
        return Resolution::Unambiguous;
    }

    let service = search_entities(input, config).await;
    let statics = static_table::lookup(input);

    info!(
        service_candidates = service.len(),
        static_candidates = statics.len(),
        "resolution candidates gathered"
    );

    decide(input, service, statics)
}

/// Heuristic URL check: a scheme-prefixed string, or a single dotted token
/// that parses once a scheme is assumed.
pub fn is_url(input: &str) -> bool {
    if input.contains(char::is_whitespace) {
        return false;
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        return Url::parse(input).is_ok();
    }
    input.contains('.') && Url::parse(&format!("https://{input}")).is_ok()
}

// ---------------------------------------------------------------------------
// Decision policy
// ---------------------------------------------------------------------------

/// Apply the disambiguation decision policy to gathered candidates.
///
/// Evaluated strictly in order; short inputs with multiple merged matches
/// always disambiguate, and a single service candidate only auto-resolves
/// when the input is long enough to be specific.
fn decide(
    input: &str,
    service: Vec<DisambiguationOption>,
    statics: Vec<DisambiguationOption>,
) -> Resolution {
    let word_count = input.split_whitespace().count();
    let likely_ambiguous = word_count <= 2;

    let merged = merge_candidates(&service, &statics);

    if likely_ambiguous && merged.len() >= 2 {
        return Resolution::NeedsDisambiguation { options: merged };
    }

    if service.len() >= 2 {
        return Resolution::NeedsDisambiguation { options: merged };
    }

    if service.len() == 1 && word_count >= 3 {
        return Resolution::AutoResolved {
            option: service.into_iter().next().expect("one candidate"),
        };
    }

    if service.is_empty() && statics.len() >= 2 {
        return Resolution::NeedsDisambiguation { options: statics };
    }

    if service.len() == 1 {
        // Short input with one match: offer it, plus an escape hatch.
        let mut options = service;
        options.push(use_as_typed_option(input));
        return Resolution::NeedsDisambiguation { options };
    }

    Resolution::Unambiguous
}

/// Merge service and static candidates, deduplicating by display label
/// (case-insensitive) and capping the list.
fn merge_candidates(
    service: &[DisambiguationOption],
    statics: &[DisambiguationOption],
) -> Vec<DisambiguationOption> {
    let mut merged: Vec<DisambiguationOption> = Vec::new();

    for option in service.iter().chain(statics.iter()) {
        let duplicate = merged
            .iter()
            .any(|m| m.label.eq_ignore_ascii_case(&option.label));
        if !duplicate {
            merged.push(option.clone());
        }
        if merged.len() >= MAX_OPTIONS {
            break;
        }
    }

    merged
}

/// The synthetic "use as typed" escape option.
fn use_as_typed_option(input: &str) -> DisambiguationOption {
    DisambiguationOption {
        label: input.to_string(),
        description: Some("Use exactly as typed".to_string()),
        domain: None,
        entity_id: None,
        use_as_typed: true,
    }
}

// ---------------------------------------------------------------------------
// Knowledge-lookup client (wbsearchentities contract)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    label: String,
    #[serde(default)]
    description: Option<String>,
}

/// Query the knowledge-lookup service for candidate entities.
///
/// Every failure mode (client build, timeout, HTTP error, bad JSON) is
/// swallowed and returns an empty list.
async fn search_entities(input: &str, config: &LookupConfig) -> Vec<DisambiguationOption> {
    let client = match build_client(config) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "lookup client build failed");
            return vec![];
        }
    };

    let response = client
        .get(&config.endpoint)
        .query(&[
            ("action", "wbsearchentities"),
            ("search", input),
            ("language", "en"),
            ("format", "json"),
            ("limit", "6"),
        ])
        .send()
        .await;

    let response = match response {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!(status = %r.status(), "lookup service returned non-success");
            return vec![];
        }
        Err(e) => {
            debug!(error = %e, "lookup service unreachable");
            return vec![];
        }
    };

    let parsed: SearchResponse = match response.json().await {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "lookup response was not valid JSON");
            return vec![];
        }
    };

    parsed
        .search
        .into_iter()
        .map(|hit| DisambiguationOption {
            label: hit.label,
            description: hit.description,
            domain: None,
            entity_id: Some(hit.id),
            use_as_typed: false,
        })
        .collect()
}

fn build_client(config: &LookupConfig) -> ideaforge_shared::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| {
            ideaforge_shared::IdeaforgeError::Network(format!("failed to build HTTP client: {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_option(label: &str) -> DisambiguationOption {
        DisambiguationOption {
            label: label.into(),
            description: Some(format!("{label} description")),
            domain: None,
            entity_id: Some("Q1".into()),
            use_as_typed: false,
        }
    }

    #[test]
    fn url_inputs_skip_resolution() {
        assert!(is_url("https://example.com"));
        assert!(is_url("http://example.com/about"));
        assert!(is_url("example.com"));
        assert!(!is_url("Apple Inc."));
        assert!(!is_url("apple"));
    }

    #[test]
    fn one_word_with_two_candidates_disambiguates() {
        let resolution = decide(
            "apple",
            vec![service_option("Apple Inc.")],
            static_table::lookup("apple"),
        );
        match resolution {
            Resolution::NeedsDisambiguation { options } => {
                assert!(options.len() >= 2);
            }
            _ => panic!("expected NeedsDisambiguation"),
        }
    }

    #[test]
    fn static_only_still_disambiguates() {
        // Knowledge service down → empty service list; static table carries it
        let resolution = decide("apple", vec![], static_table::lookup("apple"));
        match resolution {
            Resolution::NeedsDisambiguation { options } => {
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                assert!(labels.contains(&"Apple Inc."));
                assert!(labels.contains(&"Apple Records"));
            }
            _ => panic!("expected NeedsDisambiguation"),
        }
    }

    #[test]
    fn long_input_with_one_candidate_auto_resolves() {
        let resolution = decide(
            "acme rocket supply company",
            vec![service_option("Acme Rocket Supply")],
            vec![],
        );
        match resolution {
            Resolution::AutoResolved { option } => {
                assert_eq!(option.label, "Acme Rocket Supply");
            }
            _ => panic!("expected AutoResolved"),
        }
    }

    #[test]
    fn short_input_with_one_candidate_offers_escape() {
        let resolution = decide("acme", vec![service_option("Acme Corp")], vec![]);
        match resolution {
            Resolution::NeedsDisambiguation { options } => {
                assert_eq!(options.len(), 2);
                assert!(options.last().unwrap().use_as_typed);
            }
            _ => panic!("expected NeedsDisambiguation"),
        }
    }

    #[test]
    fn no_candidates_proceeds_as_typed() {
        let resolution = decide("someunknownco", vec![], vec![]);
        assert!(matches!(resolution, Resolution::Unambiguous));
    }

    #[test]
    fn merge_dedups_by_label_and_caps() {
        let service = vec![service_option("Apple Inc."), service_option("Apple Corps")];
        let statics = static_table::lookup("apple");
        let merged = merge_candidates(&service, &statics);

        let inc_count = merged
            .iter()
            .filter(|o| o.label.eq_ignore_ascii_case("Apple Inc."))
            .count();
        assert_eq!(inc_count, 1);
        assert!(merged.len() <= MAX_OPTIONS);
    }

    #[tokio::test]
    async fn url_input_never_disambiguates() {
        let config = LookupConfig::default();
        let resolution = resolve("https://example.com", &config).await;
        assert!(!resolution.needs_disambiguation());
    }

    #[tokio::test]
    async fn lookup_service_results_parsed() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("action", "wbsearchentities"))
            .and(wiremock::matchers::query_param("search", "linear"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "search": [
                        {"id": "Q1", "label": "Linear", "description": "Issue tracker"},
                        {"id": "Q2", "label": "Linear Technology", "description": "Semiconductors"}
                    ]
                }),
            ))
            .mount(&server)
            .await;

        let config = LookupConfig {
            endpoint: server.uri(),
            timeout_secs: 5,
        };

        let resolution = resolve("linear", &config).await;
        match resolution {
            Resolution::NeedsDisambiguation { options } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[0].entity_id.as_deref(), Some("Q1"));
            }
            _ => panic!("expected NeedsDisambiguation"),
        }
    }

    #[tokio::test]
    async fn lookup_service_error_is_swallowed() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = LookupConfig {
            endpoint: server.uri(),
            timeout_secs: 5,
        };

        // Service 500s; static table still produces options for "apple"
        let resolution = resolve("apple", &config).await;
        match resolution {
            Resolution::NeedsDisambiguation { options } => {
                assert!(options.iter().any(|o| o.label == "Apple Records"));
            }
            _ => panic!("expected NeedsDisambiguation from static table"),
        }
    }
}
