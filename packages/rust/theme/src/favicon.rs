//! Favicon and logo discovery, plus dominant-color sampling.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

use crate::css::normalize_color;
use crate::palette::{is_usable_color, saturation, to_hex};

/// Pixels with alpha below this are ignored when sampling.
const MIN_ALPHA: u8 = 128;

/// Icon and logo URLs discovered on a page.
#[derive(Debug, Clone, Default)]
pub struct IconUrls {
    pub favicon: Option<String>,
    pub logo: Option<String>,
}

/// Extract favicon and logo URLs from page markup, falling back to the
/// conventional `/favicon.ico` location.
pub fn extract_icon_urls(html: &str, base_url: &Url) -> IconUrls {
    let doc = Html::parse_document(html);
    let mut icons = IconUrls::default();

    let icon_sel = Selector::parse(r#"link[rel~="icon"], link[rel="apple-touch-icon"]"#).unwrap();
    for el in doc.select(&icon_sel) {
        if let Some(href) = el.value().attr("href") {
            if let Ok(resolved) = base_url.join(href) {
                icons.favicon = Some(resolved.to_string());
                break;
            }
        }
    }

    if icons.favicon.is_none() {
        if let Ok(fallback) = base_url.join("/favicon.ico") {
            icons.favicon = Some(fallback.to_string());
        }
    }

    let logo_sel = Selector::parse("img[src]").unwrap();
    for el in doc.select(&logo_sel) {
        let src = el.value().attr("src").unwrap_or("");
        let alt = el.value().attr("alt").unwrap_or("");
        if src.to_lowercase().contains("logo") || alt.to_lowercase().contains("logo") {
            if let Ok(resolved) = base_url.join(src) {
                icons.logo = Some(resolved.to_string());
                break;
            }
        }
    }

    icons
}

/// Sample the dominant usable color of an icon.
///
/// Raster icons are decoded and bucketed; vector icons are scanned for
/// literal color values. Returns `None` when nothing usable is found.
pub fn sample_icon(bytes: &[u8]) -> Option<String> {
    if looks_like_svg(bytes) {
        let text = String::from_utf8_lossy(bytes);
        return scan_svg_colors(&text);
    }
    sample_raster(bytes)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let head = head.trim_start();
    head.starts_with("<svg") || head.starts_with("<?xml")
}

/// First usable literal color in SVG markup.
fn scan_svg_colors(svg: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(#[0-9a-fA-F]{3,8}|rgba?\([^)]*\))").unwrap()
    });

    for caps in re.captures_iter(svg) {
        if let Some(hex) = normalize_color(&caps[1]) {
            if is_usable_color(&hex) {
                return Some(hex);
            }
        }
    }
    None
}

/// Decode pixels, bucket by quantized color, and score buckets by
/// frequency weighted by saturation — a vivid-but-less-frequent color
/// beats a frequent gray. The first bucket passing the usability filter
/// wins.
fn sample_raster(bytes: &[u8]) -> Option<String> {
    let img = image::load_from_memory(bytes).ok()?.to_rgba8();

    // Bucket key: 4 bits per channel. Track sums for a mean representative.
    struct Bucket {
        count: u64,
        r_sum: u64,
        g_sum: u64,
        b_sum: u64,
    }

    let mut buckets: HashMap<(u8, u8, u8), Bucket> = HashMap::new();

    for pixel in img.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < MIN_ALPHA {
            continue;
        }
        let key = (r >> 4, g >> 4, b >> 4);
        let bucket = buckets.entry(key).or_insert(Bucket {
            count: 0,
            r_sum: 0,
            g_sum: 0,
            b_sum: 0,
        });
        bucket.count += 1;
        bucket.r_sum += r as u64;
        bucket.g_sum += g as u64;
        bucket.b_sum += b as u64;
    }

    let mut scored: Vec<(f32, (u8, u8, u8))> = buckets
        .values()
        .map(|bucket| {
            let r = (bucket.r_sum / bucket.count) as u8;
            let g = (bucket.g_sum / bucket.count) as u8;
            let b = (bucket.b_sum / bucket.count) as u8;
            let score = bucket.count as f32 * (0.25 + saturation(r, g, b));
            (score, (r, g, b))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .map(|(_, (r, g, b))| to_hex(r, g, b))
        .find(|hex| is_usable_color(hex))
}
