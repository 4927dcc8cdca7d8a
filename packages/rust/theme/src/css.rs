//! Brand color extraction from page markup and style rules.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::palette::{is_usable_color, parse_hex, to_hex};

/// Brand-variable naming conventions, in preference order.
const BRAND_VAR_PREFIXES: &[&str] = &["brand", "primary", "accent", "theme", "main"];

fn var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"--([a-z][a-z0-9-]*)\s*:\s*(#[0-9a-fA-F]{3,8}|rgba?\([^)]*\))",
        )
        .unwrap()
    })
}

fn font_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"font-family\s*:\s*([^;}]+)"#).unwrap())
}

fn rgb_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})").unwrap()
    })
}

/// What the style pass found on a page.
#[derive(Debug, Clone, Default)]
pub struct StyleSignals {
    /// Usable color candidates, best first.
    pub candidates: Vec<String>,
    pub font_family: Option<String>,
    /// Hrefs of linked stylesheets (resolved), for the caller to fetch.
    pub stylesheet_urls: Vec<String>,
}

/// Extract style signals from the home page markup.
///
/// Candidates come from CSS custom properties matching brand naming
/// conventions (embedded `<style>` blocks) and the `theme-color` meta hint.
/// Only colors passing the usability filter are kept.
pub fn extract_style_signals(html: &str, base_url: &Url) -> StyleSignals {
    let doc = Html::parse_document(html);
    let mut signals = StyleSignals::default();

    // Embedded style blocks
    let style_sel = Selector::parse("style").unwrap();
    let mut css_text = String::new();
    for el in doc.select(&style_sel) {
        css_text.push_str(&el.text().collect::<String>());
        css_text.push('\n');
    }
    collect_candidates(&css_text, &mut signals.candidates);
    signals.font_family = extract_font_family(&css_text);

    // theme-color meta hint ranks after explicit brand variables
    let meta_sel = Selector::parse(r#"meta[name="theme-color"]"#).unwrap();
    if let Some(content) = doc
        .select(&meta_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
    {
        if let Some(hex) = normalize_color(content) {
            if is_usable_color(&hex) && !signals.candidates.contains(&hex) {
                signals.candidates.push(hex);
            }
        }
    }

    // Linked stylesheets for the caller to fetch and re-scan
    let link_sel = Selector::parse(r#"link[rel="stylesheet"]"#).unwrap();
    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            if let Ok(resolved) = base_url.join(href) {
                signals.stylesheet_urls.push(resolved.to_string());
            }
        }
    }

    signals
}

/// Scan fetched stylesheet text for further candidates.
pub fn scan_stylesheet(css: &str, candidates: &mut Vec<String>, font_family: &mut Option<String>) {
    collect_candidates(css, candidates);
    if font_family.is_none() {
        *font_family = extract_font_family(css);
    }
}

/// Collect usable brand-variable colors from CSS text, preferring known
/// brand naming conventions over other custom properties.
fn collect_candidates(css: &str, out: &mut Vec<String>) {
    let mut preferred: Vec<String> = Vec::new();
    let mut other: Vec<String> = Vec::new();

    for caps in var_regex().captures_iter(css) {
        let var_name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let raw = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let Some(hex) = normalize_color(raw) else {
            continue;
        };
        if !is_usable_color(&hex) {
            continue;
        }

        let bucket = if BRAND_VAR_PREFIXES
            .iter()
            .any(|prefix| var_name.starts_with(prefix))
        {
            &mut preferred
        } else {
            &mut other
        };
        if !bucket.contains(&hex) {
            bucket.push(hex);
        }
    }

    for hex in preferred.into_iter().chain(other) {
        if !out.contains(&hex) {
            out.push(hex);
        }
    }
}

/// First declared font family, unquoted (e.g. `Inter`).
fn extract_font_family(css: &str) -> Option<String> {
    font_regex()
        .captures(css)
        .and_then(|caps| {
            caps[1]
                .split(',')
                .next()
                .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        })
        .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("inherit"))
}

/// Normalize `#hex` or `rgb()/rgba()` to canonical `#rrggbb`.
pub fn normalize_color(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if raw.starts_with('#') {
        return parse_hex(raw).map(|(r, g, b)| to_hex(r, g, b));
    }

    if let Some(caps) = rgb_regex().captures(raw) {
        let r: u16 = caps[1].parse().ok()?;
        let g: u16 = caps[2].parse().ok()?;
        let b: u16 = caps[3].parse().ok()?;
        if r > 255 || g > 255 || b > 255 {
            return None;
        }
        return Some(to_hex(r as u8, g as u8, b as u8));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_variables_ranked_first() {
        let html = r##"<html><head><style>
            :root {
                --spacing-unit: 8px;
                --gray-100: #f5f5f5;
                --brand-primary: #635bff;
                --sidebar-bg: #e44d26;
            }
        </style></head><body></body></html>"##;

        let base = Url::parse("https://acme.test/").unwrap();
        let signals = extract_style_signals(html, &base);

        assert_eq!(signals.candidates[0], "#635bff");
        // Gray utility token filtered, unrelated usable color kept behind
        assert!(signals.candidates.contains(&"#e44d26".to_string()));
        assert!(!signals.candidates.contains(&"#f5f5f5".to_string()));
    }

    #[test]
    fn theme_color_meta_is_a_candidate() {
        let html = r##"<html><head>
            <meta name="theme-color" content="#0a7cff">
        </head><body></body></html>"##;

        let base = Url::parse("https://acme.test/").unwrap();
        let signals = extract_style_signals(html, &base);
        assert_eq!(signals.candidates, vec!["#0a7cff"]);
    }

    #[test]
    fn near_white_theme_color_rejected() {
        let html = r##"<html><head>
            <meta name="theme-color" content="#ffffff">
        </head><body></body></html>"##;

        let base = Url::parse("https://acme.test/").unwrap();
        let signals = extract_style_signals(html, &base);
        assert!(signals.candidates.is_empty());
    }

    #[test]
    fn rgb_values_normalized() {
        assert_eq!(normalize_color("rgb(99, 91, 255)"), Some("#635bff".into()));
        assert_eq!(
            normalize_color("rgba(228, 77, 38, 0.9)"),
            Some("#e44d26".into())
        );
        assert_eq!(normalize_color("rgb(300, 0, 0)"), None);
        assert_eq!(normalize_color("#abc"), Some("#aabbcc".into()));
    }

    #[test]
    fn stylesheet_links_resolved() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/assets/main.css">
        </head><body></body></html>"#;

        let base = Url::parse("https://acme.test/").unwrap();
        let signals = extract_style_signals(html, &base);
        assert_eq!(
            signals.stylesheet_urls,
            vec!["https://acme.test/assets/main.css"]
        );
    }

    #[test]
    fn font_family_extracted() {
        let html = r#"<html><head><style>
            body { font-family: "Inter", sans-serif; color: #333; }
        </style></head><body></body></html>"#;

        let base = Url::parse("https://acme.test/").unwrap();
        let signals = extract_style_signals(html, &base);
        assert_eq!(signals.font_family.as_deref(), Some("Inter"));
    }
}
