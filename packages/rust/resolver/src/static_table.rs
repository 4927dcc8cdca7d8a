//! Static table of well-known ambiguous company names.
//!
//! Consulted alongside the knowledge-lookup service so that common
//! collisions disambiguate even when the service is unreachable.

use ideaforge_shared::DisambiguationOption;

/// A static candidate entry: (label, description, domain).
type Entry = (&'static str, &'static str, Option<&'static str>);

/// Known-ambiguous names, keyed by lowercased input.
const TABLE: &[(&str, &[Entry])] = &[
    (
        "apple",
        &[
            (
                "Apple Inc.",
                "Consumer electronics and software company",
                Some("apple.com"),
            ),
            (
                "Apple Records",
                "Record label founded by the Beatles",
                None,
            ),
            (
                "Apple Bank",
                "New York savings bank",
                Some("applebank.com"),
            ),
        ],
    ),
    (
        "mercury",
        &[
            (
                "Mercury",
                "Banking platform for startups",
                Some("mercury.com"),
            ),
            (
                "Mercury Insurance",
                "Auto and home insurance group",
                Some("mercuryinsurance.com"),
            ),
            (
                "Mercury Marine",
                "Marine engine manufacturer",
                Some("mercurymarine.com"),
            ),
        ],
    ),
    (
        "phoenix",
        &[
            (
                "Phoenix Group",
                "UK long-term savings and retirement business",
                Some("thephoenixgroup.com"),
            ),
            (
                "Phoenix Contact",
                "Industrial automation and connectivity maker",
                Some("phoenixcontact.com"),
            ),
        ],
    ),
    (
        "delta",
        &[
            (
                "Delta Air Lines",
                "Major US airline",
                Some("delta.com"),
            ),
            (
                "Delta Faucet",
                "Kitchen and bath fixtures manufacturer",
                Some("deltafaucet.com"),
            ),
            (
                "Delta Dental",
                "Dental insurance network",
                Some("deltadental.com"),
            ),
        ],
    ),
    (
        "polaris",
        &[
            (
                "Polaris Inc.",
                "Powersports vehicle manufacturer",
                Some("polaris.com"),
            ),
            (
                "Polaris Dawn",
                "Private spaceflight program",
                None,
            ),
        ],
    ),
    (
        "oscar",
        &[
            (
                "Oscar Health",
                "Technology-driven health insurer",
                Some("hioscar.com"),
            ),
            (
                "Oscar",
                "Academy Award of Merit",
                None,
            ),
        ],
    ),
    (
        "ramp",
        &[
            (
                "Ramp",
                "Corporate cards and spend management",
                Some("ramp.com"),
            ),
            (
                "Ramp Network",
                "Crypto on-ramp infrastructure",
                Some("ramp.network"),
            ),
        ],
    ),
    (
        "notion",
        &[
            (
                "Notion",
                "Connected workspace for notes and docs",
                Some("notion.so"),
            ),
            (
                "Notion Capital",
                "European B2B venture fund",
                Some("notion.vc"),
            ),
        ],
    ),
];

/// Look up static candidates for an input, matching on the lowercased,
/// trimmed text.
pub fn lookup(input: &str) -> Vec<DisambiguationOption> {
    let key = input.trim().to_lowercase();
    TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, entries)| {
            entries
                .iter()
                .map(|(label, description, domain)| DisambiguationOption {
                    label: (*label).to_string(),
                    description: Some((*description).to_string()),
                    domain: domain.map(str::to_string),
                    entity_id: None,
                    use_as_typed: false,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apple_has_inc_and_records() {
        let options = lookup("apple");
        assert!(options.len() >= 2);
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert!(labels.contains(&"Apple Inc."));
        assert!(labels.contains(&"Apple Records"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("Apple").len(), lookup("apple").len());
        assert_eq!(lookup("  DELTA  ").len(), 3);
    }

    #[test]
    fn unknown_name_is_empty() {
        assert!(lookup("veryobscurecompany").is_empty());
    }
}
