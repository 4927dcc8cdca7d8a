//! HTML signal extraction: titles, metas, headings, nav labels, links.

use scraper::{Html, Selector};
use url::Url;

/// Signals parsed out of one page.
#[derive(Debug, Clone, Default)]
pub struct PageSignals {
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headings: Vec<String>,
    pub nav_labels: Vec<String>,
    /// Absolute outbound links, fragment-stripped.
    pub links: Vec<String>,
    /// Length of the page's visible text, whitespace-collapsed.
    pub text_len: usize,
}

/// Parse a page's HTML into its signals.
pub fn parse_page(html: &str, base_url: &Url) -> PageSignals {
    let doc = Html::parse_document(html);

    PageSignals {
        url: base_url.to_string(),
        title: extract_title(&doc),
        meta_description: extract_meta_description(&doc),
        headings: extract_headings(&doc),
        nav_labels: extract_nav_labels(&doc),
        links: extract_links(&doc, base_url),
        text_len: visible_text_len(&doc),
    }
}

/// Page title: `<title>` first, falling back to the first H1.
fn extract_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").unwrap();
    let from_title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    if from_title.is_some() {
        return from_title;
    }

    let h1_sel = Selector::parse("h1").unwrap();
    doc.select(&h1_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_meta_description(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"meta[name="description"]"#).unwrap();
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// H1–H3 texts, trimmed, deduplicated, in document order.
fn extract_headings(doc: &Html) -> Vec<String> {
    let sel = Selector::parse("h1, h2, h3").unwrap();
    let mut headings: Vec<String> = Vec::new();

    for el in doc.select(&sel) {
        let text = el.text().collect::<String>();
        let text = collapse_whitespace(&text);
        if text.is_empty() || headings.iter().any(|h| h == &text) {
            continue;
        }
        headings.push(text);
    }

    headings
}

/// Link labels inside `<nav>` (or header fallback), deduplicated.
fn extract_nav_labels(doc: &Html) -> Vec<String> {
    let mut labels = nav_labels_for(doc, "nav a");
    if labels.is_empty() {
        labels = nav_labels_for(doc, "header a");
    }
    labels
}

fn nav_labels_for(doc: &Html, selector: &str) -> Vec<String> {
    let sel = Selector::parse(selector).unwrap();
    let mut labels: Vec<String> = Vec::new();

    for el in doc.select(&sel) {
        let text = collapse_whitespace(&el.text().collect::<String>());
        if text.is_empty() || text.len() > 40 {
            continue;
        }
        if !labels.iter().any(|l| l.eq_ignore_ascii_case(&text)) {
            labels.push(text);
        }
    }

    labels
}

/// Extract all links from a document, resolved against the base URL.
pub fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").unwrap();
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            // Skip anchors, javascript:, mailto:
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            // Resolve relative URLs
            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                let s = resolved.to_string();
                if !links.contains(&s) {
                    links.push(s);
                }
            }
        }
    }

    links
}

/// Approximate length of the page's visible text.
fn visible_text_len(doc: &Html) -> usize {
    let body_sel = Selector::parse("body").unwrap();
    let Some(body) = doc.select(&body_sel).next() else {
        return 0;
    };

    body.text()
        .map(|chunk| collapse_whitespace(chunk).len())
        .sum()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<html>
      <head>
        <title>Acme — Rockets for Everyone</title>
        <meta name="description" content="Acme builds affordable rockets.">
      </head>
      <body>
        <nav>
          <a href="/products">Products</a>
          <a href="/pricing">Pricing</a>
          <a href="/about">About us</a>
        </nav>
        <h1>Rockets for everyone</h1>
        <h2>Ship faster</h2>
        <h2>Ship faster</h2>
        <h3>Trusted by coyotes</h3>
        <p>Acme has been building rockets since 1949.</p>
        <a href="/blog/launch">Read more</a>
        <a href="#section">Anchor</a>
        <a href="mailto:hi@acme.test">Mail</a>
      </body>
    </html>"##;

    #[test]
    fn parses_title_and_description() {
        let base = Url::parse("https://acme.test/").unwrap();
        let signals = parse_page(SAMPLE, &base);
        assert_eq!(signals.title.as_deref(), Some("Acme — Rockets for Everyone"));
        assert_eq!(
            signals.meta_description.as_deref(),
            Some("Acme builds affordable rockets.")
        );
    }

    #[test]
    fn headings_are_deduplicated() {
        let base = Url::parse("https://acme.test/").unwrap();
        let signals = parse_page(SAMPLE, &base);
        assert_eq!(
            signals.headings,
            vec!["Rockets for everyone", "Ship faster", "Trusted by coyotes"]
        );
    }

    #[test]
    fn nav_labels_extracted() {
        let base = Url::parse("https://acme.test/").unwrap();
        let signals = parse_page(SAMPLE, &base);
        assert_eq!(signals.nav_labels, vec!["Products", "Pricing", "About us"]);
    }

    #[test]
    fn links_resolved_and_filtered() {
        let base = Url::parse("https://acme.test/").unwrap();
        let signals = parse_page(SAMPLE, &base);
        assert!(signals.links.contains(&"https://acme.test/blog/launch".to_string()));
        assert!(!signals.links.iter().any(|l| l.contains('#')));
        assert!(!signals.links.iter().any(|l| l.starts_with("mailto:")));
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1>Only Heading</h1></body></html>";
        let base = Url::parse("https://acme.test/").unwrap();
        let signals = parse_page(html, &base);
        assert_eq!(signals.title.as_deref(), Some("Only Heading"));
    }

    #[test]
    fn text_len_counts_visible_text() {
        let base = Url::parse("https://acme.test/").unwrap();
        let signals = parse_page(SAMPLE, &base);
        assert!(signals.text_len > 50);

        let empty = parse_page("<html><body></body></html>", &base);
        assert_eq!(empty.text_len, 0);
    }
}
