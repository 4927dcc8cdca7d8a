//! Keyword derivation: rank candidate words by how many independent
//! context sources mention them.

use std::collections::HashMap;

use ideaforge_shared::CompanyContext;

/// Words never worth searching for.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "your", "our", "you", "are", "that", "this", "from", "have",
    "has", "was", "will", "can", "all", "any", "more", "new", "get", "how", "why", "what",
    "into", "about", "their", "its", "them", "they", "who", "were", "been", "than", "then",
    "when", "where", "which", "while", "also", "over", "under", "just", "only", "very", "make",
    "made", "use", "using", "used", "one", "two", "three", "first", "best", "top", "now",
    "today", "here", "there", "every", "each", "per", "via", "like", "most", "some", "other",
    "not", "but", "out", "own", "off", "on", "in", "at", "to", "of", "by", "it", "is", "as",
    "an", "or", "we", "us", "up", "home", "page", "site", "website", "learn", "read", "see",
    "sign", "login", "contact", "inc", "llc", "ltd", "company", "corp",
];

/// Deterministic fallback keywords when no context signal exists.
const FALLBACK_KEYWORDS: &[&str] = &["productivity", "tools"];

/// Derive up to `max` search keywords from all available context signals,
/// excluding stopwords and the subject's own name tokens.
///
/// Ranking: number of independent sources mentioning the word, then total
/// frequency, then alphabetical for stability. Always returns at least
/// the deterministic fallback set.
pub fn derive_keywords(context: &CompanyContext, max: usize) -> Vec<String> {
    let name_tokens: Vec<String> = tokenize(&context.name);

    // Each source contributes once to the source count, however often the
    // word appears inside it.
    let sources: Vec<Vec<String>> = vec![
        tokenize(context.description.as_deref().unwrap_or("")),
        context.headings.iter().flat_map(|h| tokenize(h)).collect(),
        context.nav_labels.iter().flat_map(|n| tokenize(n)).collect(),
        context
            .press_headlines
            .iter()
            .flat_map(|p| tokenize(p))
            .collect(),
        context.news_titles.iter().flat_map(|t| tokenize(t)).collect(),
        context
            .industry_hints
            .iter()
            .flat_map(|i| tokenize(i))
            .collect(),
    ];

    let mut source_counts: HashMap<String, usize> = HashMap::new();
    let mut frequencies: HashMap<String, usize> = HashMap::new();

    for source in &sources {
        let mut seen_in_source: Vec<&str> = Vec::new();
        for word in source {
            if word.len() < 4 {
                continue;
            }
            if STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            if name_tokens.iter().any(|t| t == word) {
                continue;
            }

            *frequencies.entry(word.clone()).or_insert(0) += 1;
            if !seen_in_source.contains(&word.as_str()) {
                seen_in_source.push(word);
                *source_counts.entry(word.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = source_counts
        .into_iter()
        .map(|(word, sources)| {
            let freq = frequencies.get(&word).copied().unwrap_or(0);
            (word, sources, freq)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(b.2.cmp(&a.2))
            .then(a.0.cmp(&b.0))
    });

    let mut keywords: Vec<String> = ranked.into_iter().take(max).map(|(w, _, _)| w).collect();

    if keywords.is_empty() {
        keywords = FALLBACK_KEYWORDS
            .iter()
            .take(max)
            .map(|k| (*k).to_string())
            .collect();
    }

    keywords
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CompanyContext {
        CompanyContext {
            name: "Acme Rockets".into(),
            description: Some("Acme builds rockets and propulsion systems".into()),
            headings: vec!["Propulsion for startups".into(), "Rockets shipped fast".into()],
            nav_labels: vec!["Propulsion".into(), "Pricing".into()],
            press_headlines: vec!["Acme launches new propulsion line".into()],
            news_titles: vec![],
            industry_hints: vec!["aerospace".into()],
            url: None,
        }
    }

    #[test]
    fn multi_source_words_rank_first() {
        let keywords = derive_keywords(&context(), 3);
        // "propulsion" appears in description, headings, nav, and press
        assert_eq!(keywords[0], "propulsion");
    }

    #[test]
    fn name_tokens_excluded() {
        let keywords = derive_keywords(&context(), 5);
        assert!(!keywords.contains(&"acme".to_string()));
        assert!(!keywords.contains(&"rockets".to_string()));
    }

    #[test]
    fn empty_context_gets_fallback_set() {
        let empty = CompanyContext {
            name: "Acme".into(),
            ..Default::default()
        };
        let keywords = derive_keywords(&empty, 3);
        assert_eq!(keywords, vec!["productivity", "tools"]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_keywords(&context(), 3);
        let b = derive_keywords(&context(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn short_words_and_stopwords_filtered() {
        let ctx = CompanyContext {
            name: "Zed".into(),
            description: Some("the and for a to of best new platform platform".into()),
            ..Default::default()
        };
        let keywords = derive_keywords(&ctx, 3);
        assert_eq!(keywords[0], "platform");
        assert!(!keywords.contains(&"the".to_string()));
    }
}
